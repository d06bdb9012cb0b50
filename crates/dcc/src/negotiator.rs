//! Inbound control-message dispatch.
//!
//! CHAT and SEND create new remotely initiated sessions and hand them to
//! the presentation layer for an accept/reject decision. RESUME and ACCEPT
//! correlate against the pending registries; unmatched or malformed
//! messages are dropped silently — a stale or unsolicited handshake step
//! must never take the client down.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sidewire_protocol::{ControlMessage, wire_to_ip};
use sidewire_transfer::{DccEvent, OutboundControl, Session};

use crate::manager::DccManager;

impl DccManager {
    /// Handles one inbound control payload from `nickname`.
    ///
    /// The payload is the raw `<VERB> <args...>` line (a leading `DCC ` tag
    /// is tolerated); CTCP tagging has already been stripped by the router.
    pub async fn handle_control(self: &Arc<Self>, nickname: &str, payload: &str) {
        let message = match ControlMessage::parse(payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(%nickname, error = %e, "dropping malformed control message");
                return;
            }
        };
        match message {
            ControlMessage::Chat { wire_ip, port } => {
                self.on_chat(nickname, &wire_ip, port).await;
            }
            ControlMessage::Send {
                file_name,
                wire_ip,
                port,
                file_size,
            } => {
                self.on_send(nickname, &file_name, &wire_ip, port, file_size)
                    .await;
            }
            ControlMessage::Resume {
                port,
                file_name,
                offset,
            } => {
                self.on_resume(nickname, port, file_name, offset).await;
            }
            ControlMessage::Accept { port, .. } => {
                self.on_accept(nickname, port).await;
            }
        }
    }

    /// The peer offers a direct chat.
    async fn on_chat(self: &Arc<Self>, nickname: &str, wire_ip: &str, port: u16) {
        info!(%nickname, "incoming DCC CHAT offer");
        let session = Arc::new(Session::remote_chat(nickname, &wire_to_ip(wire_ip), port));
        let id = session.id();
        self.track(session);
        self.events
            .emit(DccEvent::IncomingRequest { session_id: id })
            .await;
    }

    /// The peer offers a file.
    async fn on_send(
        self: &Arc<Self>,
        nickname: &str,
        file_name: &str,
        wire_ip: &str,
        port: u16,
        file_size: u64,
    ) {
        info!(%nickname, file_name, file_size, "incoming DCC SEND offer");
        let session = Arc::new(Session::remote_send(
            nickname,
            file_name,
            &wire_to_ip(wire_ip),
            port,
            file_size,
        ));
        let id = session.id();
        self.track(session);
        self.events
            .emit(DccEvent::IncomingRequest { session_id: id })
            .await;
    }

    /// The peer asks us to resume a SEND we advertised.
    async fn on_resume(
        self: &Arc<Self>,
        nickname: &str,
        port: u16,
        file_name: Option<String>,
        offset: u64,
    ) {
        let Some(session) = self.registry.take_send(nickname, port) else {
            debug!(%nickname, port, "unsolicited RESUME dropped");
            return;
        };
        info!(%nickname, port, offset, "peer requested resume");
        session.set_resume(offset);

        // Grant the request, echoing the arguments back.
        let reply = ControlMessage::Accept {
            port,
            file_name,
            offset,
        };
        if self
            .control_tx
            .send(OutboundControl {
                nickname: nickname.to_string(),
                payload: reply.to_string(),
            })
            .await
            .is_err()
        {
            warn!(%nickname, "control channel closed, cannot grant RESUME");
            return;
        }

        // The worker spawned when the SEND was advertised is still
        // listening on that port; with the offset recorded before the
        // ACCEPT goes out, it serves the resumed connection. A session
        // never gets a second concurrent worker.
        if !self.engine_started(session.id()) {
            self.spawn_engine(&session);
        }
    }

    /// The peer grants a RESUME we emitted: start receiving at the offset
    /// that was fixed when the request went out.
    async fn on_accept(self: &Arc<Self>, nickname: &str, port: u16) {
        let Some(session) = self.registry.take_resume(nickname, port) else {
            debug!(%nickname, port, "unsolicited ACCEPT dropped");
            return;
        };
        info!(%nickname, port, offset = session.resume_offset(), "peer granted resume");
        self.spawn_engine(&session);
    }
}
