//! Unix domain socket server for IPC
//!
//! Provides request-response control of the gesture pipeline and push
//! notifications of pipeline events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use crate::control::{ControlInput, ControlRequest, PipelineStatus};
use crate::events::PipelineEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    context: ClientContext,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
struct ServerState {
    start_time: Instant,
    hotkey_registered: bool,
}

/// What each client handler needs
#[derive(Clone)]
struct ClientContext {
    state: Arc<RwLock<ServerState>>,
    control_tx: mpsc::Sender<ControlInput>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(
        socket_path: &Path,
        control_tx: mpsc::Sender<ControlInput>,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to set socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let context = ClientContext {
            state: Arc::new(RwLock::new(ServerState {
                start_time: Instant::now(),
                hotkey_registered: false,
            })),
            control_tx,
            event_tx,
        };

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            context,
            shutdown_tx,
        })
    }

    /// Record whether the kill-switch hotkey is active
    pub async fn set_hotkey_registered(&self, registered: bool) {
        self.context.state.write().await.hotkey_registered = registered;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = self.context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
async fn handle_client<S>(stream: S, context: ClientContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    loop {
        let Some(body) = read_message(&mut reader).await? else {
            debug!("client disconnected");
            return Ok(());
        };

        let request: Request = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                debug!(?e, "unparseable request");
                send_message(&mut writer, &Response::error("bad_request", e.to_string())).await?;
                continue;
            }
        };

        debug!(?request, "received request");

        if request == Request::Subscribe {
            // Subscribe before confirming so no event slips in between
            let event_rx = context.event_tx.subscribe();
            send_message(&mut writer, &Response::Subscribed).await?;
            debug!("client subscribed to notifications");
            return push_events(&mut reader, &mut writer, event_rx).await;
        }

        let response = process_request(request, &context).await;
        send_message(&mut writer, &response).await?;
    }
}

/// Forward pipeline events until the client goes away
async fn push_events<R, W>(
    reader: &mut R,
    writer: &mut W,
    mut event_rx: broadcast::Receiver<PipelineEvent>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut probe = [0u8; 64];

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Ok(event) => {
                    send_message(writer, &Notification::Event { event }).await?;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            read = reader.read(&mut probe) => match read {
                // Subscribed connections are push-only; input is ignored
                Ok(n) if n > 0 => {}
                _ => {
                    debug!("subscriber disconnected");
                    return Ok(());
                }
            },
        }
    }
}

/// Answer one request, forwarding it to the control thread when needed
async fn process_request(request: Request, context: &ClientContext) -> Response {
    let Some(control) = request.to_control() else {
        return match request {
            Request::Ping => Response::Pong,
            _ => Response::error("bad_request", "request not valid here"),
        };
    };

    if matches!(control, ControlRequest::EmergencyStop | ControlRequest::SetControl(false)) {
        info!(?control, "control request via IPC");
    }

    let pipeline = match query_control(control, &context.control_tx).await {
        Ok(status) => status,
        Err(e) => {
            warn!(?e, "control thread did not answer");
            return Response::error("control_unavailable", e.to_string());
        }
    };

    let state = context.state.read().await;
    Response::Status(DaemonStatus {
        uptime_secs: state.start_time.elapsed().as_secs(),
        hotkey_registered: state.hotkey_registered,
        pipeline,
        ..DaemonStatus::default()
    })
}

async fn query_control(
    request: ControlRequest,
    control_tx: &mpsc::Sender<ControlInput>,
) -> Result<PipelineStatus> {
    let (reply_tx, reply_rx) = oneshot::channel();
    control_tx
        .send(ControlInput::Request {
            request,
            reply: Some(reply_tx),
        })
        .await
        .context("control thread is not running")?;
    reply_rx.await.context("control thread dropped the request")
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = u32::try_from(msg_bytes.len())
        .context("message too large")?
        .to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}

/// Read one length-prefixed message; `None` on disconnect
async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        warn!(len, "message too large, disconnecting");
        return Ok(None);
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    fn context(
        control_tx: mpsc::Sender<ControlInput>,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> ClientContext {
        ClientContext {
            state: Arc::new(RwLock::new(ServerState {
                start_time: Instant::now(),
                hotkey_registered: true,
            })),
            control_tx,
            event_tx,
        }
    }

    async fn roundtrip<T: serde::de::DeserializeOwned>(
        client: &mut DuplexStream,
        request: &Request,
    ) -> T {
        send_message(client, request).await.unwrap();
        let body = read_message(client).await.unwrap().unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_ping_and_status() {
        let (control_tx, mut control_rx) = mpsc::channel(4);
        let (event_tx, _) = broadcast::channel(4);
        let (mut client, server_side) = duplex(4096);

        tokio_test::block_on(async move {
            let control = async {
                match control_rx.recv().await {
                    Some(ControlInput::Request {
                        request,
                        reply: Some(reply),
                    }) => {
                        assert_eq!(request, ControlRequest::SetSensitivity(2.5));
                        let _ = reply.send(PipelineStatus {
                            sensitivity: 2.5,
                            ..PipelineStatus::default()
                        });
                    }
                    other => panic!("unexpected control input: {:?}", other),
                }
            };

            let session = async move {
                let pong: Response = roundtrip(&mut client, &Request::Ping).await;
                assert_eq!(pong, Response::Pong);

                let status: Response =
                    roundtrip(&mut client, &Request::SetSensitivity { value: 2.5 }).await;
                match status {
                    Response::Status(status) => {
                        assert!(status.hotkey_registered);
                        assert_eq!(status.pipeline.sensitivity, 2.5);
                    }
                    other => panic!("unexpected response: {:?}", other),
                }
            };

            let (result, _, _) = tokio::join!(
                handle_client(server_side, context(control_tx, event_tx)),
                control,
                session
            );
            assert!(result.is_ok());
        });
    }

    #[test]
    fn test_control_thread_gone() {
        let (control_tx, control_rx) = mpsc::channel(4);
        drop(control_rx);
        let (event_tx, _) = broadcast::channel(4);
        let (mut client, server_side) = duplex(4096);

        tokio_test::block_on(async move {
            let session = async move {
                let resp: Response = roundtrip(&mut client, &Request::GetStatus).await;
                assert!(matches!(resp, Response::Error { ref code, .. } if code == "control_unavailable"));
            };
            let (result, _) = tokio::join!(
                handle_client(server_side, context(control_tx, event_tx)),
                session
            );
            assert!(result.is_ok());
        });
    }

    #[test]
    fn test_bad_request_keeps_connection() {
        let (control_tx, _control_rx) = mpsc::channel(4);
        let (event_tx, _) = broadcast::channel(4);
        let (mut client, server_side) = duplex(4096);

        tokio_test::block_on(async move {
            let session = async move {
                let garbage = br#"{"type":"launch_rockets"}"#;
                client
                    .write_all(&(garbage.len() as u32).to_le_bytes())
                    .await
                    .unwrap();
                client.write_all(garbage).await.unwrap();
                let body = read_message(&mut client).await.unwrap().unwrap();
                let resp: Response = serde_json::from_slice(&body).unwrap();
                assert!(matches!(resp, Response::Error { ref code, .. } if code == "bad_request"));

                let pong: Response = roundtrip(&mut client, &Request::Ping).await;
                assert_eq!(pong, Response::Pong);
            };
            let (result, _) = tokio::join!(
                handle_client(server_side, context(control_tx, event_tx)),
                session
            );
            assert!(result.is_ok());
        });
    }

    #[test]
    fn test_subscriber_receives_events() {
        let (control_tx, _control_rx) = mpsc::channel(4);
        let (event_tx, _) = broadcast::channel(4);
        let publisher = event_tx.clone();
        let (mut client, server_side) = duplex(4096);

        tokio_test::block_on(async move {
            let session = async move {
                let resp: Response = roundtrip(&mut client, &Request::Subscribe).await;
                assert_eq!(resp, Response::Subscribed);

                publisher
                    .send(PipelineEvent::ControlToggled { enabled: false })
                    .unwrap();

                let body = read_message(&mut client).await.unwrap().unwrap();
                let note: Notification = serde_json::from_slice(&body).unwrap();
                assert_eq!(
                    note,
                    Notification::Event {
                        event: PipelineEvent::ControlToggled { enabled: false }
                    }
                );
            };
            let (result, _) = tokio::join!(
                handle_client(server_side, context(control_tx, event_tx)),
                session
            );
            assert!(result.is_ok());
        });
    }
}
