//! Session data model.
//!
//! A [`Session`] is the unit of one DCC exchange. It is shared (`Arc`)
//! between the negotiator, the registries and the transfer engine; mutable
//! state lives behind an internal `RwLock`. The resume offset is fixed
//! before the engine starts and never changes afterwards.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use uuid::Uuid;

/// What a session carries over the direct socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Line-oriented direct chat.
    Chat,
    /// A file transfer in either direction.
    FileSend,
    /// A receive-side file transfer whose RESUME request is awaiting the
    /// peer's ACCEPT.
    FileResumeRequest,
}

/// Which side opened the negotiation. Determines whether the engine listens
/// or connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    LocallyInitiated,
    RemotelyInitiated,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connecting,
    Connected,
    Transferring,
    Completed,
    Failed,
    Aborted,
}

impl SessionState {
    /// Returns `true` for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

/// One DCC exchange (chat or file transfer) with a single peer.
pub struct Session {
    id: Uuid,
    role: SessionRole,
    peer: String,
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    kind: SessionKind,
    peer_addr: String,
    peer_port: u16,
    /// Port our own listener advertised (locally initiated sessions only).
    local_port: u16,
    file_name: String,
    absolute_path: PathBuf,
    file_size: u64,
    resume_offset: u64,
    resuming: bool,
    state: SessionState,
    transferred: u64,
}

impl Session {
    fn new(role: SessionRole, peer: &str, inner: SessionInner) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            peer: peer.to_string(),
            inner: RwLock::new(inner),
        }
    }

    fn blank_inner(kind: SessionKind) -> SessionInner {
        SessionInner {
            kind,
            peer_addr: String::new(),
            peer_port: 0,
            local_port: 0,
            file_name: String::new(),
            absolute_path: PathBuf::new(),
            file_size: 0,
            resume_offset: 0,
            resuming: false,
            state: SessionState::Init,
            transferred: 0,
        }
    }

    /// A chat session started by the local user.
    pub fn local_chat(peer: &str) -> Self {
        Self::new(
            SessionRole::LocallyInitiated,
            peer,
            Self::blank_inner(SessionKind::Chat),
        )
    }

    /// A file send started by the local user.
    pub fn local_send(peer: &str, absolute_path: &Path, file_size: u64) -> Self {
        let mut inner = Self::blank_inner(SessionKind::FileSend);
        inner.file_name = absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        inner.absolute_path = absolute_path.to_path_buf();
        inner.file_size = file_size;
        Self::new(SessionRole::LocallyInitiated, peer, inner)
    }

    /// A chat session offered by the peer (inbound `CHAT`).
    pub fn remote_chat(peer: &str, peer_addr: &str, peer_port: u16) -> Self {
        let mut inner = Self::blank_inner(SessionKind::Chat);
        inner.peer_addr = peer_addr.to_string();
        inner.peer_port = peer_port;
        Self::new(SessionRole::RemotelyInitiated, peer, inner)
    }

    /// A file offered by the peer (inbound `SEND`).
    pub fn remote_send(
        peer: &str,
        file_name: &str,
        peer_addr: &str,
        peer_port: u16,
        file_size: u64,
    ) -> Self {
        let mut inner = Self::blank_inner(SessionKind::FileSend);
        inner.file_name = file_name.to_string();
        inner.peer_addr = peer_addr.to_string();
        inner.peer_port = peer_port;
        inner.file_size = file_size;
        Self::new(SessionRole::RemotelyInitiated, peer, inner)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Nickname of the DCC partner.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn kind(&self) -> SessionKind {
        self.inner.read().unwrap().kind
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().unwrap().state
    }

    pub fn set_state(&self, state: SessionState) {
        self.inner.write().unwrap().state = state;
    }

    pub fn peer_addr(&self) -> String {
        self.inner.read().unwrap().peer_addr.clone()
    }

    pub fn peer_port(&self) -> u16 {
        self.inner.read().unwrap().peer_port
    }

    pub fn local_port(&self) -> u16 {
        self.inner.read().unwrap().local_port
    }

    /// Records the port our listener bound. Called by the engine before the
    /// advertisement goes out, so a later RESUME can correlate against it.
    pub fn set_local_port(&self, port: u16) {
        self.inner.write().unwrap().local_port = port;
    }

    /// The port a RESUME/ACCEPT for this session would carry: our advertised
    /// listener port when we initiated, the peer's port otherwise.
    pub fn correlation_port(&self) -> u16 {
        let inner = self.inner.read().unwrap();
        match self.role {
            SessionRole::LocallyInitiated => inner.local_port,
            SessionRole::RemotelyInitiated => inner.peer_port,
        }
    }

    pub fn file_name(&self) -> String {
        self.inner.read().unwrap().file_name.clone()
    }

    pub fn absolute_path(&self) -> PathBuf {
        self.inner.read().unwrap().absolute_path.clone()
    }

    /// Sets the local destination for an inbound file, keeping the file
    /// name in step with the path.
    pub fn set_destination(&self, path: &Path) {
        let mut inner = self.inner.write().unwrap();
        inner.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        inner.absolute_path = path.to_path_buf();
    }

    pub fn file_size(&self) -> u64 {
        self.inner.read().unwrap().file_size
    }

    pub fn resume_offset(&self) -> u64 {
        self.inner.read().unwrap().resume_offset
    }

    pub fn resuming(&self) -> bool {
        self.inner.read().unwrap().resuming
    }

    /// Marks a sender session as resuming at `offset` (peer sent RESUME).
    pub fn set_resume(&self, offset: u64) {
        let mut inner = self.inner.write().unwrap();
        inner.resuming = true;
        inner.resume_offset = offset;
    }

    /// Marks a receiver session as awaiting the peer's ACCEPT for a RESUME
    /// we emitted at `offset`.
    pub fn mark_resume_requested(&self, offset: u64) {
        let mut inner = self.inner.write().unwrap();
        inner.kind = SessionKind::FileResumeRequest;
        inner.resuming = true;
        inner.resume_offset = offset;
    }

    /// Cumulative bytes moved by the engine since it started.
    pub fn transferred(&self) -> u64 {
        self.inner.read().unwrap().transferred
    }

    pub fn record_progress(&self, total: u64) {
        self.inner.write().unwrap().transferred = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_send_takes_name_from_path() {
        let session = Session::local_send("ada", Path::new("/home/u/docs/notes.txt"), 2048);
        assert_eq!(session.file_name(), "notes.txt");
        assert_eq!(session.file_size(), 2048);
        assert_eq!(session.role(), SessionRole::LocallyInitiated);
        assert_eq!(session.kind(), SessionKind::FileSend);
        assert_eq!(session.state(), SessionState::Init);
        assert!(!session.resuming());
    }

    #[test]
    fn remote_send_records_peer_endpoint() {
        let session = Session::remote_send("ada", "pic.png", "10.0.0.9", 5000, 999);
        assert_eq!(session.peer(), "ada");
        assert_eq!(session.peer_addr(), "10.0.0.9");
        assert_eq!(session.peer_port(), 5000);
        assert_eq!(session.correlation_port(), 5000);
    }

    #[test]
    fn correlation_port_follows_role() {
        let local = Session::local_send("ada", Path::new("f.bin"), 10);
        assert_eq!(local.correlation_port(), 0);
        local.set_local_port(6001);
        assert_eq!(local.correlation_port(), 6001);

        let remote = Session::remote_chat("ada", "10.0.0.9", 7002);
        assert_eq!(remote.correlation_port(), 7002);
    }

    #[test]
    fn resume_marking() {
        let session = Session::remote_send("ada", "f.bin", "10.0.0.9", 5000, 2000);
        session.mark_resume_requested(800);
        assert_eq!(session.kind(), SessionKind::FileResumeRequest);
        assert!(session.resuming());
        assert_eq!(session.resume_offset(), 800);
    }

    #[test]
    fn set_destination_updates_both_fields() {
        let session = Session::remote_send("ada", "f.bin", "10.0.0.9", 5000, 2000);
        session.set_destination(Path::new("/tmp/downloads/f (1).bin"));
        assert_eq!(session.file_name(), "f (1).bin");
        assert_eq!(
            session.absolute_path(),
            PathBuf::from("/tmp/downloads/f (1).bin")
        );
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Aborted.is_terminal());
        assert!(!SessionState::Init.is_terminal());
        assert!(!SessionState::Transferring.is_terminal());
    }
}
