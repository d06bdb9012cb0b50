//! The session manager.
//!
//! Owns the live-session table, the pending-handshake registries and the
//! per-session cancellation tokens, and spawns one transfer worker per
//! approved session. The presentation layer answers prompts by calling
//! back into this type; see the crate docs for the collaborator contract.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use sidewire_transfer::{
    DccEvent, EventSink, OutboundControl, Session, SessionKind, SessionRole, SessionState,
    TransferEngine,
};

use crate::DccError;
use crate::config::DccConfig;
use crate::registry::Registry;

/// Result of accepting an inbound file offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The transfer worker is running.
    Started,
    /// The destination already exists; a [`crate::ResumeChoice`] is needed
    /// before anything moves (a `ResumeConflict` event was emitted).
    DestinationExists,
}

/// Manages every active DCC session.
pub struct DccManager {
    pub(crate) config: DccConfig,
    /// Dotted-quad IPv4 address advertised in outbound offers.
    pub(crate) local_ip: String,
    pub(crate) registry: Registry,
    pub(crate) sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    pub(crate) control_tx: mpsc::Sender<OutboundControl>,
    pub(crate) events: EventSink,
}

pub(crate) struct SessionHandle {
    pub(crate) session: Arc<Session>,
    pub(crate) cancel: CancellationToken,
    pub(crate) engine_started: bool,
}

impl DccManager {
    /// Creates a manager.
    ///
    /// `control_tx` delivers outbound control payloads to the chat router;
    /// `events_tx` carries notifications to the presentation layer.
    pub fn new(
        config: DccConfig,
        control_tx: mpsc::Sender<OutboundControl>,
        events_tx: mpsc::Sender<DccEvent>,
    ) -> Arc<Self> {
        let local_ip = config
            .advertise_ip
            .clone()
            .or_else(detect_local_ipv4)
            .unwrap_or_else(|| "127.0.0.1".into());
        Arc::new(Self {
            config,
            local_ip,
            registry: Registry::new(),
            sessions: Mutex::new(HashMap::new()),
            control_tx,
            events: EventSink::new(events_tx),
        })
    }

    /// Starts a direct chat with `nickname`. We listen; the peer connects.
    pub fn start_chat(self: &Arc<Self>, nickname: &str) -> Uuid {
        let session = Arc::new(Session::local_chat(nickname));
        let id = session.id();
        self.track(Arc::clone(&session));
        self.spawn_engine(&session);
        id
    }

    /// Offers `path` to `nickname`.
    ///
    /// The session is registered as a pending SEND before the worker
    /// starts, so a RESUME from the peer can correlate against it.
    pub fn start_send(self: &Arc<Self>, nickname: &str, path: &Path) -> Result<Uuid, DccError> {
        let size = std::fs::metadata(path)
            .map_err(|e| DccError::File {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();
        let session = Arc::new(Session::local_send(nickname, path, size));
        let id = session.id();
        self.track(Arc::clone(&session));
        self.registry.register_send(&session);
        self.spawn_engine(&session);
        Ok(id)
    }

    /// Accepts an inbound chat offer.
    pub fn accept_chat(self: &Arc<Self>, id: Uuid) -> Result<(), DccError> {
        let session = self.pending_session(id, SessionKind::Chat)?;
        self.spawn_engine(&session);
        Ok(())
    }

    /// Accepts an inbound file offer, receiving into `destination`.
    ///
    /// If the destination already exists nothing is started yet: a
    /// `ResumeConflict` event asks the user to append, overwrite or rename,
    /// answered via [`resolve_conflict`](Self::resolve_conflict).
    pub async fn accept_send(
        self: &Arc<Self>,
        id: Uuid,
        destination: &Path,
    ) -> Result<AcceptOutcome, DccError> {
        let session = self.pending_session(id, SessionKind::FileSend)?;
        session.set_destination(destination);
        if destination.exists() {
            self.events
                .emit(DccEvent::ResumeConflict { session_id: id })
                .await;
            return Ok(AcceptOutcome::DestinationExists);
        }
        self.spawn_engine(&session);
        Ok(AcceptOutcome::Started)
    }

    /// Rejects an inbound offer.
    pub async fn reject(self: &Arc<Self>, id: Uuid) -> Result<(), DccError> {
        self.abort(id).await
    }

    /// Aborts a session.
    ///
    /// For a running worker this cancels its token; the worker's pending
    /// socket or file operation unblocks and its own cleanup path finalizes
    /// the session. There is no graceful goodbye to the peer.
    pub async fn abort(self: &Arc<Self>, id: Uuid) -> Result<(), DccError> {
        let (session, cancel, engine_started) = {
            let sessions = self.sessions.lock().unwrap();
            let handle = sessions.get(&id).ok_or(DccError::UnknownSession(id))?;
            (
                Arc::clone(&handle.session),
                handle.cancel.clone(),
                handle.engine_started,
            )
        };
        if engine_started {
            cancel.cancel();
        } else {
            self.finalize(&session, SessionState::Aborted, None).await;
        }
        Ok(())
    }

    /// Looks up a live session.
    pub fn session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap()
            .get(&id)
            .map(|h| Arc::clone(&h.session))
    }

    /// All live sessions, in no particular order.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .map(|h| Arc::clone(&h.session))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internals shared with the negotiator and the resume coordinator
    // -----------------------------------------------------------------------

    pub(crate) fn track(&self, session: Arc<Session>) {
        let id = session.id();
        self.sessions.lock().unwrap().insert(
            id,
            SessionHandle {
                session,
                cancel: CancellationToken::new(),
                engine_started: false,
            },
        );
    }

    /// Returns a tracked session that is still awaiting a prompt answer.
    pub(crate) fn pending_session(
        &self,
        id: Uuid,
        kind: SessionKind,
    ) -> Result<Arc<Session>, DccError> {
        let sessions = self.sessions.lock().unwrap();
        let handle = sessions.get(&id).ok_or(DccError::UnknownSession(id))?;
        let session = &handle.session;
        if handle.engine_started
            || session.role() != SessionRole::RemotelyInitiated
            || session.state() != SessionState::Init
            || session.kind() != kind
        {
            return Err(DccError::InvalidState(id));
        }
        Ok(Arc::clone(session))
    }

    pub(crate) fn engine_started(&self, id: Uuid) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|h| h.engine_started)
    }

    /// Spawns the transfer worker for a session and arranges bookkeeping
    /// for its terminal transition.
    pub(crate) fn spawn_engine(self: &Arc<Self>, session: &Arc<Session>) {
        let cancel = {
            let mut sessions = self.sessions.lock().unwrap();
            let Some(handle) = sessions.get_mut(&session.id()) else {
                debug!(session = %session.id(), "not spawning worker for untracked session");
                return;
            };
            handle.engine_started = true;
            handle.cancel.clone()
        };

        let mut settings = self.config.engine_settings();
        settings.advertise_ip = self.local_ip.clone();

        let engine = TransferEngine::new(
            Arc::clone(session),
            settings,
            self.control_tx.clone(),
            self.events.clone(),
            cancel,
        );

        let manager = Arc::clone(self);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            engine.run().await;
            // Registry entries and the session-table slot are released on
            // every terminal transition, success or failure.
            manager.registry.forget(session.id());
            manager.sessions.lock().unwrap().remove(&session.id());
        });
    }

    /// Finalizes a session that never got a worker.
    pub(crate) async fn finalize(
        &self,
        session: &Arc<Session>,
        state: SessionState,
        error: Option<String>,
    ) {
        session.set_state(state);
        self.registry.forget(session.id());
        self.sessions.lock().unwrap().remove(&session.id());
        self.events
            .emit(DccEvent::SessionTerminal {
                session_id: session.id(),
                state,
                error,
            })
            .await;
    }
}

/// Returns the first local non-loopback IPv4 address, excluding link-local
/// (169.254.x.x).
fn detect_local_ipv4() -> Option<String> {
    if_addrs::get_if_addrs()
        .ok()?
        .into_iter()
        .find_map(|iface| {
            if iface.is_loopback() {
                return None;
            }
            match iface.ip() {
                std::net::IpAddr::V4(ip) => {
                    if ip.octets()[0] == 169 && ip.octets()[1] == 254 {
                        return None;
                    }
                    Some(ip.to_string())
                }
                _ => None,
            }
        })
}
