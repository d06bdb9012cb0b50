//! Outbound side of a direct chat session.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::TransferError;

/// Handle for sending lines to the chat partner.
///
/// Clones share one mutex-guarded socket writer, so there is exactly one
/// writer at a time and lines are never interleaved.
#[derive(Clone)]
pub struct ChatSender {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl ChatSender {
    pub(crate) fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Sends one line of text, CRLF-terminated.
    pub async fn send_line(&self, text: &str) -> Result<(), TransferError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

impl fmt::Debug for ChatSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSender").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn lines_are_crlf_terminated() {
        let (tx, mut rx) = tokio::io::duplex(256);
        let sender = ChatSender::new(tx);
        sender.send_line("hello there").await.unwrap();
        drop(sender);

        let mut received = String::new();
        rx.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "hello there\r\n");
    }

    #[tokio::test]
    async fn concurrent_sends_never_interleave() {
        let (tx, mut rx) = tokio::io::duplex(16 * 1024);
        let sender = ChatSender::new(tx);

        let mut handles = Vec::new();
        for i in 0..8 {
            let s = sender.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..20 {
                    s.send_line(&format!("task{i} line{j}")).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        drop(sender);

        let mut received = String::new();
        rx.read_to_string(&mut received).await.unwrap();
        let lines: Vec<&str> = received.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 8 * 20);
        for line in lines {
            let mut words = line.split(' ');
            assert!(words.next().unwrap().starts_with("task"));
            assert!(words.next().unwrap().starts_with("line"));
            assert!(words.next().is_none());
        }
    }
}
