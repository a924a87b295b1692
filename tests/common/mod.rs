//! Shared helpers for the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use vantevo::dom::memory::MemoryPage;
use vantevo::transport::{Body, Transport, TransportError};
use vantevo::{Config, Tracker};

/// Transport that records every POST instead of performing it.
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, Body)>>,
    status: u16,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Self::with_status(202)
    }

    pub fn with_status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            status,
        })
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn bodies(&self) -> Vec<Body> {
        self.sent.lock().iter().map(|(_, b)| b.clone()).collect()
    }

    /// Sent payloads parsed back into JSON.
    pub fn payloads(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|(_, body)| serde_json::from_str(body.as_str()).expect("payload is JSON"))
            .collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.payloads()
            .iter()
            .map(|p| p["e_n"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, endpoint: &str, body: Body) -> Result<u16, TransportError> {
        self.sent.lock().push((endpoint.to_string(), body));
        Ok(self.status)
    }
}

pub fn site_config() -> Config {
    Config {
        domain: Some("example.com".into()),
        ..Config::default()
    }
}

pub fn page(url: &str) -> Arc<MemoryPage> {
    Arc::new(MemoryPage::new(url).expect("valid test URL").with_title("Example"))
}

pub fn tracker(
    config: Config,
    page: &Arc<MemoryPage>,
    transport: &Arc<RecordingTransport>,
) -> Tracker {
    Tracker::new(config, page.clone(), transport.clone()).expect("inside a tokio runtime")
}

/// Let spawned triggers and deliveries run to completion.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
