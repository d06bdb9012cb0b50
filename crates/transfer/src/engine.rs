//! The transfer engine: one worker per session.
//!
//! Drives a session INIT → CONNECTING → CONNECTED → TRANSFERRING →
//! {COMPLETED | FAILED | ABORTED}. A locally initiated session binds an
//! ephemeral listener and advertises it over the chat transport; a remotely
//! initiated one connects to the peer's advertised endpoint. After that the
//! engine streams chat lines or file chunks to completion.
//!
//! Every exit path funnels through [`TransferEngine::run`], which records
//! the terminal state and emits exactly one `SessionTerminal` event. The
//! socket and file handle are owned by the worker and dropped on the way
//! out, so closing twice is impossible by construction.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sidewire_protocol::{ControlMessage, ip_to_wire};

use crate::chat::ChatSender;
use crate::events::{DccEvent, EventSink, OutboundControl};
use crate::model::{Session, SessionKind, SessionRole, SessionState};
use crate::{DEFAULT_CHUNK_SIZE, TransferError, wire};

/// Tunables for a transfer worker.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// File chunk size in bytes (also the socket buffer size).
    pub chunk_size: usize,
    /// How long a listening session waits for the peer to connect. The
    /// protocol has no bound here; the default is deliberately generous.
    pub accept_timeout: Duration,
    /// How long a connecting session waits for the peer to answer.
    pub connect_timeout: Duration,
    /// How long the sender waits for a per-chunk acknowledgment before
    /// giving up on acknowledgments for the rest of the transfer.
    pub ack_timeout: Duration,
    /// Fail the session on a mismatched acknowledgment instead of logging
    /// and continuing.
    pub strict_acks: bool,
    /// Dotted-quad IPv4 address advertised in outbound CHAT/SEND messages.
    pub advertise_ip: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            accept_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(10),
            strict_acks: false,
            advertise_ip: "127.0.0.1".into(),
        }
    }
}

/// A worker that runs one session's direct connection to a terminal state.
pub struct TransferEngine {
    session: Arc<Session>,
    settings: EngineSettings,
    control_tx: mpsc::Sender<OutboundControl>,
    events: EventSink,
    cancel: CancellationToken,
}

impl TransferEngine {
    pub fn new(
        session: Arc<Session>,
        mut settings: EngineSettings,
        control_tx: mpsc::Sender<OutboundControl>,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        if settings.chunk_size == 0 {
            settings.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        Self {
            session,
            settings,
            control_tx,
            events,
            cancel,
        }
    }

    /// Runs the session to a terminal state.
    ///
    /// Infallible by design: failures are recorded on the session and
    /// reported through the event sink.
    pub async fn run(self) {
        let result = self.drive().await;
        let (state, error) = match result {
            Ok(()) => (SessionState::Completed, None),
            Err(TransferError::Aborted) => (SessionState::Aborted, None),
            Err(e) => {
                warn!(
                    session = %self.session.id(),
                    peer = %self.session.peer(),
                    "session failed: {e}"
                );
                (SessionState::Failed, Some(e.to_string()))
            }
        };
        self.session.set_state(state);
        self.events
            .emit(DccEvent::SessionTerminal {
                session_id: self.session.id(),
                state,
                error,
            })
            .await;
    }

    async fn drive(&self) -> Result<(), TransferError> {
        self.session.set_state(SessionState::Connecting);
        let stream = match self.session.role() {
            SessionRole::LocallyInitiated => self.listen_for_peer().await?,
            SessionRole::RemotelyInitiated => self.connect_to_peer().await?,
        };
        self.session.set_state(SessionState::Connected);

        match self.session.kind() {
            SessionKind::Chat => self.run_chat(stream).await,
            _ => match self.session.role() {
                SessionRole::LocallyInitiated => self.run_file_send(stream).await,
                SessionRole::RemotelyInitiated => self.run_file_receive(stream).await,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Connection establishment
    // -----------------------------------------------------------------------

    /// Binds an ephemeral listener, advertises it to the peer over the chat
    /// transport, and waits for the peer to connect.
    async fn listen_for_peer(&self) -> Result<TcpStream, TransferError> {
        let listener = TcpListener::bind(("0.0.0.0", 0))
            .await
            .map_err(TransferError::Bind)?;
        let port = listener.local_addr().map_err(TransferError::Bind)?.port();

        // Recorded before the advertisement leaves the process, so an
        // inbound RESUME can correlate against it.
        self.session.set_local_port(port);
        self.advertise(port).await?;
        debug!(port, peer = %self.session.peer(), "listening for peer");

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(TransferError::Aborted);
            }
            result = tokio::time::timeout(self.settings.accept_timeout, listener.accept()) => {
                match result {
                    Ok(Ok((stream, addr))) => {
                        info!(%addr, peer = %self.session.peer(), "peer connected");
                        stream
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        return Err(TransferError::AcceptTimeout {
                            peer: self.session.peer().to_string(),
                        });
                    }
                }
            }
        };

        // The listener's job is done; only the accepted connection is kept.
        drop(listener);
        Ok(stream)
    }

    /// Sends the CHAT/SEND advertisement for our freshly bound listener.
    async fn advertise(&self, port: u16) -> Result<(), TransferError> {
        let wire_ip = ip_to_wire(&self.settings.advertise_ip)?;
        let message = match self.session.kind() {
            SessionKind::Chat => ControlMessage::Chat { wire_ip, port },
            _ => ControlMessage::Send {
                file_name: self.session.file_name(),
                wire_ip,
                port,
                file_size: self.session.file_size(),
            },
        };
        self.control_tx
            .send(OutboundControl {
                nickname: self.session.peer().to_string(),
                payload: message.to_string(),
            })
            .await
            .map_err(|_| TransferError::ControlChannelClosed)
    }

    /// Connects to the endpoint the peer advertised.
    async fn connect_to_peer(&self) -> Result<TcpStream, TransferError> {
        let peer = self.session.peer().to_string();
        let addr_text = self.session.peer_addr();
        let ip: Ipv4Addr = addr_text
            .parse()
            .map_err(|_| TransferError::UnknownHost {
                peer: peer.clone(),
                addr: addr_text.clone(),
            })?;
        let addr = SocketAddr::from((ip, self.session.peer_port()));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(TransferError::Aborted)
            }
            result = tokio::time::timeout(self.settings.connect_timeout, TcpStream::connect(addr)) => {
                match result {
                    Ok(Ok(stream)) => {
                        info!(%addr, %peer, "connected to peer");
                        Ok(stream)
                    }
                    Ok(Err(e)) => Err(match e.kind() {
                        std::io::ErrorKind::ConnectionRefused => {
                            TransferError::ConnectionRefused { peer }
                        }
                        std::io::ErrorKind::HostUnreachable
                        | std::io::ErrorKind::NetworkUnreachable => {
                            TransferError::NoRoute { peer }
                        }
                        _ => TransferError::Io(e),
                    }),
                    Err(_) => Err(TransferError::ConnectTimeout { peer }),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Chat streaming
    // -----------------------------------------------------------------------

    async fn run_chat(&self, stream: TcpStream) -> Result<(), TransferError> {
        let (read_half, write_half) = stream.into_split();
        self.events
            .emit(DccEvent::Connected {
                session_id: self.session.id(),
                chat: Some(ChatSender::new(write_half)),
            })
            .await;
        self.session.set_state(SessionState::Transferring);

        let mut lines = BufReader::new(read_half).lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Aborted),
                line = lines.next_line() => line?,
            };
            match line {
                Some(text) => {
                    self.events
                        .emit(DccEvent::ChatLine {
                            session_id: self.session.id(),
                            text,
                        })
                        .await;
                }
                None => {
                    info!(peer = %self.session.peer(), "chat partner closed the connection");
                    return Ok(());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // File streaming
    // -----------------------------------------------------------------------

    async fn run_file_send(&self, stream: TcpStream) -> Result<(), TransferError> {
        let (mut read_half, write_half) = stream.into_split();
        let mut writer = BufWriter::with_capacity(self.settings.chunk_size, write_half);
        self.events
            .emit(DccEvent::Connected {
                session_id: self.session.id(),
                chat: None,
            })
            .await;

        let path = self.session.absolute_path();
        let mut file = File::open(&path).await.map_err(|e| TransferError::File {
            path: path.clone(),
            source: e,
        })?;
        if self.session.resuming() {
            file.seek(std::io::SeekFrom::Start(self.session.resume_offset()))
                .await?;
        }

        self.session.set_state(SessionState::Transferring);
        let mut buf = vec![0u8; self.settings.chunk_size];
        let mut total: u64 = 0;
        let mut peer_acks = true;

        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Aborted);
            }

            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            writer.write_all(&buf[..n]).await?;
            writer.flush().await?;
            total += n as u64;
            self.session.record_progress(total);
            self.events.emit_progress(self.session.id(), total);

            if peer_acks {
                peer_acks = self.await_ack(&mut read_half, total).await?;
            }
        }

        info!(peer = %self.session.peer(), total, "file sent");
        Ok(())
    }

    /// Reads one acknowledgment, tolerating peers that stop sending them.
    ///
    /// Returns whether acknowledgments should still be awaited. A value
    /// that does not match the running total is a protocol violation, but
    /// the data already arrived; unless strict mode is on, the mismatch is
    /// logged and the transfer continues.
    async fn await_ack(
        &self,
        reader: &mut OwnedReadHalf,
        expected: u64,
    ) -> Result<bool, TransferError> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TransferError::Aborted),
            result = tokio::time::timeout(self.settings.ack_timeout, wire::read_ack(reader)) => result,
        };
        match result {
            Ok(Ok(ack)) => {
                if ack != expected {
                    warn!(
                        peer = %self.session.peer(),
                        ack,
                        expected,
                        "unexpected acknowledgment"
                    );
                    if self.settings.strict_acks {
                        return Err(TransferError::AckMismatch {
                            expected,
                            got: ack,
                        });
                    }
                }
                Ok(true)
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // The peer half-closed its write side. Not all clients
                // acknowledge at all; the data keeps flowing regardless.
                warn!(peer = %self.session.peer(), "peer stopped acknowledging; continuing without");
                Ok(false)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(peer = %self.session.peer(), "no acknowledgment within timeout; continuing without");
                Ok(false)
            }
        }
    }

    async fn run_file_receive(&self, stream: TcpStream) -> Result<(), TransferError> {
        let (mut read_half, mut write_half) = stream.into_split();
        self.events
            .emit(DccEvent::Connected {
                session_id: self.session.id(),
                chat: None,
            })
            .await;

        let path = self.session.absolute_path();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| TransferError::File {
                path: path.clone(),
                source: e,
            })?;
        if self.session.resuming() {
            file.seek(std::io::SeekFrom::Start(self.session.resume_offset()))
                .await?;
        }

        self.session.set_state(SessionState::Transferring);
        let mut buf = vec![0u8; self.settings.chunk_size];
        let mut total: u64 = 0;

        loop {
            let n = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TransferError::Aborted),
                n = read_half.read(&mut buf) => n?,
            };
            if n == 0 {
                // Stream end: the sender is done.
                break;
            }

            file.write_all(&buf[..n]).await?;
            total += n as u64;
            self.session.record_progress(total);
            self.events.emit_progress(self.session.id(), total);

            wire::write_ack(&mut write_half, total).await?;
        }

        file.flush().await?;
        info!(peer = %self.session.peer(), total, "file received");
        Ok(())
    }
}
