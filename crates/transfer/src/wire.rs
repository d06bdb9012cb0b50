//! Peer-socket wire helpers.
//!
//! # Wire format
//!
//! ```text
//! Chat:  free-form UTF-8 text lines, CRLF-terminated.
//! File:  raw binary chunks (configured chunk size, final chunk may be
//!        shorter), each answered by the reader with an 8-byte big-endian
//!        unsigned integer carrying the cumulative byte count observed.
//! ```
//!
//! Acknowledgments are advisory: senders verify them but a mismatch does
//! not abort the transfer (see the engine).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Writes a cumulative-byte-count acknowledgment.
pub async fn write_ack<W: AsyncWrite + Unpin>(writer: &mut W, total: u64) -> std::io::Result<()> {
    writer.write_u64(total).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads a cumulative-byte-count acknowledgment.
pub async fn read_ack<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<u64> {
    reader.read_u64().await
}
