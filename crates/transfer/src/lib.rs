//! Direct peer-socket engine for DCC sessions.
//!
//! Once a session has been negotiated over the chat server, this crate does
//! the rest: it opens the direct TCP connection (listening or connecting
//! depending on who initiated), then streams either CRLF-terminated chat
//! lines or fixed-size file chunks with per-chunk acknowledgments, resume
//! offsets, progress reporting and guaranteed cleanup on every exit path.

pub mod chat;
pub mod engine;
pub mod events;
pub mod model;
pub mod wire;

pub use chat::ChatSender;
pub use engine::{EngineSettings, TransferEngine};
pub use events::{DccEvent, EventSink, OutboundControl};
pub use model::{Session, SessionKind, SessionRole, SessionState};

use std::path::PathBuf;

use sidewire_protocol::ProtocolError;

/// Default file-transfer chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not open {}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not set up listening socket: {0}")]
    Bind(std::io::Error),

    #[error("timed out waiting for {peer} to connect")]
    AcceptTimeout { peer: String },

    #[error("attempt to connect to {peer} has timed out")]
    ConnectTimeout { peer: String },

    #[error("{peer}'s address is incorrect: {addr}")]
    UnknownHost { peer: String, addr: String },

    #[error("{peer} is not listening")]
    ConnectionRefused { peer: String },

    #[error("no route to {peer}")]
    NoRoute { peer: String },

    #[error("unexpected acknowledgment: expected {expected}, got {got}")]
    AckMismatch { expected: u64, got: u64 },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("control channel closed")]
    ControlChannelClosed,

    #[error("aborted")]
    Aborted,
}
