//! Client side of the daemon socket, used by `send`, `hook` and `ping`.

use super::protocol::{decode_response, MessageFrame, Request, Response};
use crate::access::AccessClaim;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

/// How an invocation ended, after all streamed messages were delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    Done,
    Denied { caller: String },
    Unknown { name: String },
    Failed { message: String },
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Returns `(uptime_secs, version)`.
    pub async fn ping(&self) -> Result<(u64, String)> {
        let mut stream = self.send(&Request::Ping).await?;
        match read_response(&mut stream).await? {
            Response::Pong {
                uptime_secs,
                version,
            } => Ok((uptime_secs, version)),
            other => Err(anyhow!("Unexpected response to ping: {:?}", other)),
        }
    }

    /// Sends one command and feeds every streamed message to `on_message`
    /// until the terminal frame arrives.
    pub async fn invoke<F>(&self, text: &str, claim: &AccessClaim, mut on_message: F) -> Result<InvokeOutcome>
    where
        F: FnMut(&str),
    {
        let request = Request::Invoke {
            text: text.to_string(),
            caller: claim.caller.clone(),
            roles: claim.roles.clone(),
            relay_token: claim.relay_token.clone(),
        };
        let mut stream = self.send(&request).await?;

        loop {
            let outcome = match read_response(&mut stream).await? {
                Response::Message { text } => {
                    on_message(&text);
                    continue;
                }
                Response::Done => InvokeOutcome::Done,
                Response::Denied { caller } => InvokeOutcome::Denied { caller },
                Response::Unknown { name } => InvokeOutcome::Unknown { name },
                Response::Error { message } => InvokeOutcome::Failed { message },
                Response::Pong { .. } => return Err(anyhow!("Unexpected pong in command stream")),
            };
            return Ok(outcome);
        }
    }

    async fn send(&self, request: &Request) -> Result<UnixStream> {
        let mut stream = UnixStream::connect(&self.socket_path).await.with_context(|| {
            format!(
                "Failed to connect to daemon at {} (is `palbot serve` running?)",
                self.socket_path.display()
            )
        })?;
        let bytes = MessageFrame::encode_request(request)
            .map_err(|e| anyhow!("Failed to encode request: {}", e))?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        Ok(stream)
    }
}

async fn read_response(stream: &mut UnixStream) -> Result<Response> {
    let body = MessageFrame::read_frame(stream)
        .await
        .context("Daemon closed the connection")?;
    decode_response(&body).map_err(|e| anyhow!("Failed to deserialize response: {}", e))
}
