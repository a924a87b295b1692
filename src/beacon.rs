//! The guard → builder → transport pipeline every event goes through.

use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dom::Host;
use crate::guard::{EnvironmentGuard, Suppression, Verdict};
use crate::payload::{EcommerceValues, Meta, PayloadBuilder};
use crate::transport::{deliver, Body, Callback, Delivery, Transport};

/// Outcome of recording one event.
#[derive(Debug)]
pub enum Dispatch {
    /// Dropped before anything was built or sent.
    Suppressed(Suppression),
    /// Dev mode: logged locally, callback already invoked.
    Logged,
    /// Handed to the transport.
    Sent(Delivery),
    /// The payload could not be serialized.
    Dropped(String),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent(_))
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Dispatch::Suppressed(_))
    }

    pub fn into_delivery(self) -> Option<Delivery> {
        match self {
            Dispatch::Sent(delivery) => Some(delivery),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Beacon {
    inner: Arc<BeaconInner>,
}

struct BeaconInner {
    config: Arc<Config>,
    guard: EnvironmentGuard,
    builder: PayloadBuilder,
    host: Arc<dyn Host>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
}

impl Beacon {
    pub fn new(
        config: Arc<Config>,
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let guard = EnvironmentGuard::new(&config);
        let builder = PayloadBuilder::new(&config);
        Self {
            inner: Arc::new(BeaconInner {
                config,
                guard,
                builder,
                host,
                transport,
                runtime,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// Evaluate the guard without recording anything.
    pub fn check(&self, event: Option<&str>) -> Verdict {
        self.inner.guard.evaluate(event, self.inner.host.as_ref())
    }

    /// Record a standard event; `None` records a pageview.
    pub fn record(&self, event: Option<&str>, meta: Meta, callback: Option<Callback>) -> Dispatch {
        if let Verdict::Suppress(reason) = self.check(event) {
            debug!(event = ?event, reason = %reason, "Hit suppressed");
            return Dispatch::Suppressed(reason);
        }

        let payload = self.inner.builder.build(event, meta, self.inner.host.as_ref());
        let endpoint = self.inner.config.proxy_server.clone();
        self.send(&payload, endpoint, Body::text, callback)
    }

    pub fn record_ecommerce(
        &self,
        event: &str,
        values: EcommerceValues,
        callback: Option<Callback>,
    ) -> Dispatch {
        if let Verdict::Suppress(reason) = self.check(Some(event)) {
            debug!(event = %event, reason = %reason, "E-commerce hit suppressed");
            return Dispatch::Suppressed(reason);
        }

        let payload = match self
            .inner
            .builder
            .build_ecommerce(event, values, self.inner.host.as_ref())
        {
            Ok(payload) => payload,
            Err(err) => {
                warn!(event = %event, error = %err, "Invalid e-commerce event");
                return Dispatch::Suppressed(Suppression::Invalid(err));
            }
        };
        let endpoint = self.inner.config.proxy_server_ecommerce.clone();
        self.send(&payload, endpoint, Body::json, callback)
    }

    fn send<P: Serialize>(
        &self,
        payload: &P,
        endpoint: String,
        body: fn(String) -> Body,
        callback: Option<Callback>,
    ) -> Dispatch {
        let content = match serde_json::to_string(payload) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "Failed to serialize event payload");
                return Dispatch::Dropped(err.to_string());
            }
        };

        if self.inner.config.dev {
            info!(payload = %content, "SUCCESS HIT!");
            if let Some(callback) = callback {
                callback();
            }
            return Dispatch::Logged;
        }

        Dispatch::Sent(deliver(
            &self.inner.runtime,
            Arc::clone(&self.inner.transport),
            endpoint,
            body(content),
            callback,
        ))
    }
}
