//! Fire-and-forget delivery of payloads to the collection endpoint

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A serialized payload and the content type it is sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    content_type: &'static str,
    content: String,
}

impl Body {
    /// Standard events travel as JSON text labelled `text/plain`.
    pub fn text(content: String) -> Self {
        Self {
            content_type: TEXT_PLAIN,
            content,
        }
    }

    pub fn json(content: String) -> Self {
        Self {
            content_type: APPLICATION_JSON,
            content,
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `endpoint`, returning the response status. Any status,
    /// 2xx or not, is a settled exchange.
    async fn post(&self, endpoint: &str, body: Body) -> Result<u16, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vantevo-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client for event delivery")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &str, body: Body) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, body.content_type())
            .body(body.into_string())
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

/// Completion callback, run once the exchange settles.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// How an exchange ended. Informational only; callers are notified the same
/// way either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Status(u16),
    Failed(String),
}

/// Single-shot completion signal for one in-flight send.
#[derive(Debug)]
pub struct Delivery {
    rx: oneshot::Receiver<Settlement>,
}

impl Delivery {
    /// Wait for the exchange to settle. `None` if the task was abandoned
    /// (e.g. the runtime shut down).
    pub async fn settled(self) -> Option<Settlement> {
        self.rx.await.ok()
    }
}

/// Spawn the POST on `handle` and return its completion signal.
pub fn deliver(
    handle: &Handle,
    transport: Arc<dyn Transport>,
    endpoint: String,
    body: Body,
    callback: Option<Callback>,
) -> Delivery {
    let (tx, rx) = oneshot::channel();

    handle.spawn(async move {
        let settlement = match transport.post(&endpoint, body).await {
            Ok(status) => {
                debug!(endpoint = %endpoint, status, "Event delivered");
                Settlement::Status(status)
            }
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "Event delivery failed");
                Settlement::Failed(err.to_string())
            }
        };

        if let Some(callback) = callback {
            callback();
        }
        let _ = tx.send(settlement);
    });

    Delivery { rx }
}
