use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AdminError, Result};

/// Upper bound on one webhook delivery, connect included.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sink for human-readable progress and results. Delivery problems are the
/// sink's own concern and never fail the procedure that reports.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, message: &str);
}

/// Prints each report on its own paragraph.
pub struct StdoutReporter;

#[async_trait]
impl Reporter for StdoutReporter {
    async fn report(&self, message: &str) {
        println!("{}\n", message);
    }
}

/// Keeps every report in memory, in order.
#[derive(Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All reports joined by newlines.
    pub fn transcript(&self) -> String {
        self.messages().join("\n")
    }
}

#[async_trait]
impl Reporter for MemoryReporter {
    async fn report(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// Posts each report as `{"content": ...}` to a chat webhook.
pub struct WebhookReporter {
    client: reqwest::Client,
    url: String,
}

impl WebhookReporter {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("palbot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::Config(format!("Failed to build webhook client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Reporter for WebhookReporter {
    async fn report(&self, message: &str) {
        let body = serde_json::json!({ "content": message });
        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::trace!(status = %response.status(), "Report delivered to webhook");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Webhook rejected report");
            }
            Err(e) => tracing::warn!("Failed to deliver report to webhook: {}", e),
        }
    }
}

/// Hands reports to a background task that delivers them to `inner` in
/// order. `report` never waits on the inner sink.
pub struct QueuedReporter {
    tx: mpsc::UnboundedSender<String>,
}

impl QueuedReporter {
    /// Must be called inside a tokio runtime. The task ends once every
    /// `QueuedReporter` handle is dropped and the queue is drained.
    pub fn spawn(inner: Arc<dyn Reporter>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                inner.report(&message).await;
            }
            tracing::debug!("Report queue closed");
        });
        (Self { tx }, handle)
    }
}

#[async_trait]
impl Reporter for QueuedReporter {
    async fn report(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            tracing::warn!("Report queue is gone, dropping report");
        }
    }
}
