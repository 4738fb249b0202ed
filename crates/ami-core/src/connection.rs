use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::action::{Action, ActionResponse};
use crate::codec::{AmiFrameDecoder, Frame, MAX_FRAME_SIZE};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::message::{AmiMessage, MessageKind};
use crate::session::ManagerSession;

const READ_BUFFER_SIZE: usize = 8192;

/// TCP connection to an Asterisk manager interface
#[derive(Clone)]
pub struct AmiConnection {
    inner: Arc<AmiConnectionInner>,
}

struct AmiConnectionInner {
    config: ConnectionConfig,
    writer: Mutex<OwnedWriteHalf>,
    pending: DashMap<String, oneshot::Sender<AmiMessage>>,
    connected: AtomicBool,
    closing: AtomicBool,
    server_version: OnceLock<String>,
}

impl AmiConnection {
    /// Open the TCP connection and start reading
    ///
    /// Returns the connection together with the receiver of unsolicited
    /// events. The receiver closes when the connection goes away.
    pub async fn connect(config: ConnectionConfig) -> Result<(Self, mpsc::Receiver<AmiMessage>)> {
        let address = config.address();
        let stream = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&address))
            .await
            .map_err(|_| Error::timeout(format!("connecting to {}", address)))??;
        stream.set_nodelay(true)?;
        info!("🔌 Connected to AMI at {}", address);

        let (read_half, write_half) = stream.into_split();
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);

        let connection = AmiConnection {
            inner: Arc::new(AmiConnectionInner {
                config,
                writer: Mutex::new(write_half),
                pending: DashMap::new(),
                connected: AtomicBool::new(true),
                closing: AtomicBool::new(false),
                server_version: OnceLock::new(),
            }),
        };

        connection.spawn_receive_loop(read_half, events_tx);

        Ok((connection, events_rx))
    }

    /// Version from the manager greeting, once received
    pub fn server_version(&self) -> Option<&str> {
        self.inner.server_version.get().map(String::as_str)
    }

    /// Number of actions waiting for a response
    pub fn pending_actions(&self) -> usize {
        self.inner.pending.len()
    }

    fn spawn_receive_loop(&self, mut reader: OwnedReadHalf, events_tx: mpsc::Sender<AmiMessage>) {
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let mut decoder = AmiFrameDecoder::new();
            let mut buf = vec![0u8; READ_BUFFER_SIZE];

            'read: loop {
                let n = match reader.read(&mut buf).await {
                    Ok(0) => {
                        debug!("AMI peer closed the connection");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        if inner.connected.load(Ordering::Relaxed) {
                            error!("Error reading from AMI: {}", e);
                        }
                        break;
                    }
                };

                decoder.extend(&buf[..n]);

                loop {
                    match decoder.next_frame() {
                        Ok(Some(Frame::Greeting(version))) => {
                            info!("AMI greeting received, version {}", version);
                            let _ = inner.server_version.set(version);
                        }
                        Ok(Some(Frame::Message(message))) => inner.route(message, &events_tx).await,
                        Ok(None) => break,
                        Err(e) if decoder.buffered() > MAX_FRAME_SIZE => {
                            error!("Closing AMI connection: {}", e);
                            break 'read;
                        }
                        Err(e) => warn!("Dropping malformed AMI block: {}", e),
                    }
                }
            }

            inner.connected.store(false, Ordering::Relaxed);
            // Dropping the senders wakes every waiter with ConnectionClosed
            inner.pending.clear();
            info!("AMI receive loop terminated");
        });
    }
}

impl AmiConnectionInner {
    async fn route(&self, message: AmiMessage, events_tx: &mpsc::Sender<AmiMessage>) {
        match message.kind() {
            MessageKind::Event(name) => {
                trace!("AMI event {}", name);
                if events_tx.send(message).await.is_err() {
                    debug!("Event receiver dropped, discarding {}", name);
                }
            }
            _ => {
                let Some(action_id) = message.action_id().map(str::to_string) else {
                    debug!("Ignoring AMI message without ActionID: {}", message);
                    return;
                };
                match self.pending.remove(&action_id) {
                    Some((_, waiter)) => {
                        let _ = waiter.send(message);
                    }
                    None => debug!("No pending action for response [{}]", action_id),
                }
            }
        }
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ManagerSession for AmiConnection {
    async fn login(&self) -> Result<()> {
        let action = Action::Login {
            username: self.inner.config.username.clone(),
            secret: self.inner.config.secret.clone(),
        };
        let response = self.send_action(action, self.inner.config.action_timeout()).await?;

        if !response.is_success() {
            warn!("AMI login rejected for user {}", self.inner.config.username);
            return Err(Error::Authentication(response.message().to_string()));
        }

        info!("✅ Logged in to AMI as {}", self.inner.config.username);
        Ok(())
    }

    async fn logoff(&self) -> Result<()> {
        if self.inner.closing.swap(true, Ordering::SeqCst) || !self.is_connected() {
            return Ok(());
        }

        let result = self
            .send_action(Action::Logoff, self.inner.config.action_timeout())
            .await;
        if let Err(e) = &result {
            debug!("Logoff did not complete cleanly: {}", e);
        }

        self.inner.connected.store(false, Ordering::Relaxed);
        let mut writer = self.inner.writer.lock().await;
        let _ = writer.shutdown().await;

        info!("👋 Disconnected from AMI at {}", self.inner.config.address());
        Ok(())
    }

    async fn send_action(&self, action: Action, timeout: Duration) -> Result<ActionResponse> {
        if !self.is_connected() {
            return Err(Error::ConnectionClosed);
        }

        let action_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(action_id.clone(), tx);

        debug!("Sending {} [{}]", action, action_id);
        let wire = action.to_message(&action_id).to_wire();
        if let Err(e) = self.inner.write(wire.as_bytes()).await {
            self.inner.pending.remove(&action_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => Ok(ActionResponse::new(message)),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.inner.pending.remove(&action_id);
                Err(Error::timeout(format!("{} [{}]", action, action_id)))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for AmiConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AmiConnection({}, connected={})",
            self.inner.config.address(),
            self.is_connected()
        )
    }
}
