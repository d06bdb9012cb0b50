//! Events emitted toward the presentation layer and the chat transport.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::ChatSender;
use crate::model::SessionState;

/// Notifications for the windowing layer.
///
/// Callbacks are delivered over an `mpsc` channel; the receiver is
/// responsible for marshaling onto its own thread if it needs to.
#[derive(Debug)]
pub enum DccEvent {
    /// An inbound CHAT or SEND needs an accept/reject decision.
    IncomingRequest { session_id: Uuid },

    /// The destination for an accepted inbound file already exists; the
    /// user must choose append, overwrite or rename.
    ResumeConflict { session_id: Uuid },

    /// The direct socket is up. For chat sessions this carries the line
    /// writer the UI sends outbound text through.
    Connected {
        session_id: Uuid,
        chat: Option<ChatSender>,
    },

    /// A line of chat text arrived from the peer.
    ChatLine { session_id: Uuid, text: String },

    /// Cumulative bytes moved so far. Values are monotonically
    /// non-decreasing within a session.
    Progress { session_id: Uuid, bytes: u64 },

    /// The session reached a terminal state and all resources are released.
    SessionTerminal {
        session_id: Uuid,
        state: SessionState,
        error: Option<String>,
    },
}

/// A control payload to relay to a peer over the chat transport.
///
/// The payload is the full `DCC <VERB> ...` line; CTCP tagging is the
/// router's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundControl {
    pub nickname: String,
    pub payload: String,
}

/// Cloneable sink for [`DccEvent`]s.
///
/// Lifecycle events are awaited; per-chunk progress uses `try_send` so a
/// slow consumer can never stall a transfer.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<DccEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<DccEvent>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: DccEvent) {
        let _ = self.tx.send(event).await;
    }

    pub fn emit_progress(&self, session_id: Uuid, bytes: u64) {
        let _ = self.tx.try_send(DccEvent::Progress { session_id, bytes });
    }
}
