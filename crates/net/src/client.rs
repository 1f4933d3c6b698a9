//! TCP client side of the transport

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::ReadHalf;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, PROTOCOL_VERSION};
use crate::transport::{DisconnectReason, TransportEvent};

/// Host is considered dead if no traffic for this many milliseconds
const HOST_DEAD_TIMEOUT_MS: u64 = 6000;

enum ClientCommand {
    Send(Message),
}

/// Aborts the wrapped task when dropped, including when the owning task is
/// itself aborted
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a connection task
pub(crate) struct ClientHandle {
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    /// Start connecting in the background. The outcome arrives on `events`.
    pub(crate) fn connect(
        runtime: &Handle,
        server: SocketAddr,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        info!(addr = %server, "Connecting to server");
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(connection_task(server, events, cmd_rx));
        Self { cmd_tx, task }
    }

    pub(crate) fn send(&self, msg: Message) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(msg))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Close the connection without reporting a disconnect event
    pub(crate) fn disconnect(self) {
        self.task.abort();
    }
}

async fn connection_task(
    server: SocketAddr,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
) {
    let stream = match TcpStream::connect(server).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(addr = %server, error = %e, "Connect failed");
            let _ = events.send(TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::ConnectionFailed(e.to_string()),
            });
            return;
        }
    };
    let _ = stream.set_nodelay(true);
    let (mut reader, mut writer) = tokio::io::split(stream);

    if let Err(e) = write_frame(&mut writer, &Message::Hello { version: PROTOCOL_VERSION }).await {
        let _ = events.send(TransportEvent::DisconnectedFromServer {
            reason: DisconnectReason::ConnectionFailed(e.to_string()),
        });
        return;
    }

    // Wait for the handshake answer
    match read_frame(&mut reader).await {
        Ok(Message::Welcome { client_id }) => {
            info!(client = %client_id, "Joined server");
            let _ = events.send(TransportEvent::ConnectedToServer {
                local_id: client_id,
            });
        }
        Ok(Message::Rejected { reason }) => {
            warn!(reason = %reason, "Join rejected");
            let _ = events.send(TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::Rejected(reason),
            });
            return;
        }
        Ok(_) => {
            let _ = events.send(TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::ConnectionFailed("unexpected handshake reply".into()),
            });
            return;
        }
        Err(e) => {
            let _ = events.send(TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::ConnectionFailed(e.to_string()),
            });
            return;
        }
    }

    // Frames are read on their own task so the select below never cancels a
    // half-read frame
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    let _reader = AbortOnDrop(tokio::spawn(reader_task(reader, frame_tx)));

    let watchdog_interval = Duration::from_millis(1000);
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Some(Ok(Message::Ping)) => {
                        last_seen = Instant::now();
                        if let Err(e) = write_frame(&mut writer, &Message::Pong).await {
                            break Some(DisconnectReason::ConnectionLost(e.to_string()));
                        }
                    }
                    Some(Ok(Message::ServerShutdown)) => {
                        debug!("Server announced shutdown");
                        break Some(DisconnectReason::ServerShutdown);
                    }
                    Some(Ok(msg)) => {
                        last_seen = Instant::now();
                        let _ = events.send(TransportEvent::FromServer(msg));
                    }
                    Some(Err(Error::ConnectionClosed)) | None => {
                        debug!("Server closed connection");
                        break Some(DisconnectReason::ConnectionLost("closed by host".into()));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read error");
                        break Some(DisconnectReason::ConnectionLost(e.to_string()));
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break Some(DisconnectReason::ConnectionLost(e.to_string()));
                        }
                    }
                    None => {
                        debug!("Client handle dropped");
                        break None;
                    }
                }
            }

            _ = tokio::time::sleep(watchdog_interval) => {
                let elapsed = last_seen.elapsed().as_millis() as u64;
                if elapsed > HOST_DEAD_TIMEOUT_MS {
                    warn!(elapsed_ms = elapsed, "Host appears dead - no heartbeat");
                    break Some(DisconnectReason::HostUnresponsive);
                }
            }
        }
    };

    if let Some(reason) = reason {
        let _ = events.send(TransportEvent::DisconnectedFromServer { reason });
    }
    info!("Disconnected from server");
}

async fn reader_task(
    mut reader: ReadHalf<TcpStream>,
    frames: mpsc::UnboundedSender<Result<Message>>,
) {
    loop {
        let frame = read_frame(&mut reader).await;
        let failed = frame.is_err();
        if frames.send(frame).is_err() || failed {
            break;
        }
    }
}
