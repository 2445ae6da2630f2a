use super::protocol::{decode_request, MessageFrame, Request, Response};
use crate::access::AccessClaim;
use crate::dispatcher::{Command, DispatchOutcome, Dispatcher, InboundRequest};
use crate::reporter::{QueuedReporter, Reporter, WebhookReporter};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use tracing::{debug, error, info, trace, warn};

/// Streams reports back to the connected client and optionally queues them
/// for the chat webhook.
struct ChannelReporter {
    tx: mpsc::UnboundedSender<String>,
    mirror: Option<Arc<QueuedReporter>>,
}

#[async_trait]
impl Reporter for ChannelReporter {
    async fn report(&self, message: &str) {
        trace!("Report: {}", message);
        if self.tx.send(message.to_string()).is_err() {
            debug!("Client went away, report not streamed");
        }
        if let Some(mirror) = &self.mirror {
            mirror.report(message).await;
        }
    }
}

pub struct DaemonServer {
    socket_path: PathBuf,
    dispatcher: Arc<Dispatcher>,
    webhook: Option<WebhookReporter>,
    mirror: Option<Arc<QueuedReporter>>,
    started_at: Instant,
    version: String,
}

impl DaemonServer {
    pub fn new(socket_path: PathBuf, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            socket_path,
            dispatcher,
            webhook: None,
            mirror: None,
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Mirror every report to a chat webhook as well. Delivery happens on a
    /// background queue so a slow webhook never holds up a procedure.
    pub fn with_webhook(mut self, url: impl Into<String>) -> Result<Self> {
        self.webhook = Some(WebhookReporter::new(url)?);
        Ok(self)
    }

    pub async fn run(mut self) -> Result<()> {
        info!("palbot daemon starting...");

        if let Some(webhook) = self.webhook.take() {
            let (queue, _) = QueuedReporter::spawn(Arc::new(webhook));
            self.mirror = Some(Arc::new(queue));
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = tokio::net::UnixListener::bind(&self.socket_path)?;

        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        info!("IPC server listening on: {}", self.socket_path.display());

        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let server = Arc::new(self);
        info!("palbot daemon ready");

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    match conn {
                        Ok((stream, _)) => {
                            let server = Arc::clone(&server);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    error!("Connection handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    break;
                }
            }
        }

        if let Some(running) = server.dispatcher.orchestrator().in_flight() {
            warn!("Shutting down while '{}' is in progress", running);
        }

        if server.socket_path.exists() {
            std::fs::remove_file(&server.socket_path)?;
        }

        info!("palbot daemon stopped");
        Ok(())
    }

    async fn handle_connection(&self, mut stream: UnixStream) -> Result<()> {
        let cred = stream.peer_cred()?;
        if !peer_allowed(cred.uid()) {
            warn!(uid = cred.uid(), pid = ?cred.pid(), "Refusing connection from foreign user");
            return Ok(());
        }
        trace!(uid = cred.uid(), pid = ?cred.pid(), "New connection accepted");

        let request_buf = MessageFrame::read_frame(&mut stream).await?;
        trace!("Request length: {} bytes", request_buf.len());

        let request = decode_request(&request_buf)
            .map_err(|e| anyhow::anyhow!("Failed to deserialize request: {}", e))?;

        match request {
            Request::Ping => {
                debug!("Handling: Ping");
                let pong = Response::Pong {
                    uptime_secs: self.started_at.elapsed().as_secs(),
                    version: self.version.clone(),
                };
                write_response(&mut stream, &pong).await?;
            }
            Request::Invoke {
                text,
                caller,
                roles,
                relay_token,
            } => {
                info!(caller = %caller, peer_uid = cred.uid(), peer_pid = ?cred.pid(), "Invoke: {}", text);
                let claim = AccessClaim {
                    caller,
                    roles,
                    relay_token,
                };
                self.handle_invoke(&mut stream, &text, claim).await?;
            }
        }

        trace!("Response sent");
        Ok(())
    }

    /// Runs the command in its own task so a procedure keeps going even if
    /// the client disconnects mid-way.
    async fn handle_invoke(&self, stream: &mut UnixStream, text: &str, claim: AccessClaim) -> Result<()> {
        let Some(command) = Command::parse(text) else {
            return write_response(stream, &Response::Unknown { name: String::new() }).await;
        };
        let name = command.name.clone();
        let caller = claim.caller.clone();
        let request = InboundRequest { command, claim };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ChannelReporter {
            tx,
            mirror: self.mirror.clone(),
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        let task = tokio::spawn(async move { dispatcher.dispatch(&request, &reporter).await });

        while let Some(text) = rx.recv().await {
            write_response(stream, &Response::Message { text }).await?;
        }

        let terminal = match task.await {
            Ok(Ok(DispatchOutcome::Completed | DispatchOutcome::Rejected)) => Response::Done,
            Ok(Ok(DispatchOutcome::Denied)) => Response::Denied { caller },
            Ok(Ok(DispatchOutcome::Unknown)) => Response::Unknown { name },
            Ok(Err(e)) => {
                error!(command = %name, kind = e.slug(), "Unexpected failure: {}", e);
                Response::Error {
                    message: e.to_string(),
                }
            }
            Err(e) => {
                error!(command = %name, "Command task failed: {}", e);
                Response::Error {
                    message: e.to_string(),
                }
            }
        };
        write_response(stream, &terminal).await
    }
}

/// Same user as the daemon, or root. Matches the socket's 0600 mode; the
/// caller name and roles inside a request are taken on trust from these peers.
fn peer_allowed(uid: u32) -> bool {
    let own = unsafe { libc::geteuid() };
    uid == own || uid == 0
}

async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    let bytes = MessageFrame::encode_response(response)
        .map_err(|e| anyhow::anyhow!("Failed to encode response: {}", e))?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}
