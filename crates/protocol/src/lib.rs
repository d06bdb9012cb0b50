//! DCC control-message grammar and wire address codec.
//!
//! DCC (Direct Client-to-Client) sessions are negotiated through the chat
//! server with out-of-band control messages and then carried over a direct
//! TCP connection between the peers. This crate covers the text side of that
//! negotiation: the `DCC CHAT/SEND/RESUME/ACCEPT` payload grammar and the
//! packed-decimal IPv4 address form those payloads use.
//!
//! The CTCP tagging around the payload (`\x01...\x01` inside a PRIVMSG) is
//! applied and stripped by the chat-protocol router, not here.

pub mod addr;
pub mod control;

pub use addr::{ip_to_wire, wire_to_ip};
pub use control::ControlMessage;

/// Errors produced while parsing or rendering control messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("unknown control verb: {0}")]
    UnknownVerb(String),

    #[error("missing argument in {0} message")]
    MissingArgument(&'static str),

    #[error("invalid numeric field {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}
