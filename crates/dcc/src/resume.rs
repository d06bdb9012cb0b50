//! Resume coordination for inbound files whose destination already exists.
//!
//! Append requires a handshake: the RESUME request goes out over the chat
//! transport and the worker may not open its socket until the peer's
//! ACCEPT comes back. Overwrite and Rename start immediately.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use sidewire_protocol::ControlMessage;
use sidewire_transfer::{OutboundControl, SessionKind, SessionState};

use crate::DccError;
use crate::manager::DccManager;

impl DccManager {
    /// Applies the user's choice for a destination that already exists.
    ///
    /// `id` must identify an accepted inbound file offer that reported
    /// [`AcceptOutcome::DestinationExists`](crate::AcceptOutcome).
    pub async fn resolve_conflict(
        self: &Arc<Self>,
        id: Uuid,
        choice: ResumeChoice,
    ) -> Result<(), DccError> {
        let session = self.pending_session(id, SessionKind::FileSend)?;
        match choice {
            ResumeChoice::Append => {
                let path = session.absolute_path();
                let offset = std::fs::metadata(&path)
                    .map_err(|e| DccError::File {
                        path: path.clone(),
                        source: e,
                    })?
                    .len();
                session.mark_resume_requested(offset);
                self.registry.register_resume(&session);

                info!(peer = %session.peer(), offset, "requesting resume");
                let message = ControlMessage::Resume {
                    port: session.peer_port(),
                    file_name: Some(session.file_name()),
                    offset,
                };
                self.control_tx
                    .send(OutboundControl {
                        nickname: session.peer().to_string(),
                        payload: message.to_string(),
                    })
                    .await
                    .map_err(|_| DccError::ControlChannelClosed)?;
                // No worker yet: the peer's ACCEPT gates it.
            }
            ResumeChoice::Overwrite => {
                let path = session.absolute_path();
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        // Failed before any network I/O for this path.
                        self.finalize(&session, SessionState::Failed, Some(e.to_string()))
                            .await;
                        return Err(DccError::File { path, source: e });
                    }
                }
                self.spawn_engine(&session);
            }
            ResumeChoice::Rename(path) => {
                session.set_destination(&path);
                self.spawn_engine(&session);
            }
        }
        Ok(())
    }
}

/// How to proceed when the destination of an inbound file already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeChoice {
    /// Keep the existing bytes and continue at the current file length.
    Append,
    /// Delete the existing file and receive from byte zero.
    Overwrite,
    /// Keep the existing file and receive into a different path.
    Rename(PathBuf),
}
