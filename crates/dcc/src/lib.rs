//! DCC session management.
//!
//! Sits between the chat-protocol router and the transfer engine: parses
//! inbound control payloads, correlates RESUME/ACCEPT handshakes against
//! the pending registries, asks the presentation layer to accept or reject
//! inbound offers, and runs one transfer worker per approved session.
//!
//! The presentation layer and the chat router are collaborators, reached
//! through channels: [`DccEvent`] notifications flow out, prompt answers
//! come back as calls on [`DccManager`], and [`OutboundControl`] payloads
//! are handed to the router for delivery inside the chat protocol.

pub mod config;
pub mod manager;
pub mod negotiator;
pub mod registry;
pub mod resume;

pub use config::DccConfig;
pub use manager::{AcceptOutcome, DccManager};
pub use registry::Registry;
pub use resume::ResumeChoice;

pub use sidewire_transfer::{
    ChatSender, DccEvent, OutboundControl, Session, SessionKind, SessionRole, SessionState,
};

use std::path::PathBuf;

use uuid::Uuid;

/// Errors returned by the session manager's public API.
///
/// Inbound protocol trouble (malformed payloads, unmatched lookups) is not
/// represented here: those messages are dropped silently, per protocol.
#[derive(Debug, thiserror::Error)]
pub enum DccError {
    #[error("unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("session {0} is not awaiting that action")]
    InvalidState(Uuid),

    #[error("could not access {}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("control channel closed")]
    ControlChannelClosed,
}
