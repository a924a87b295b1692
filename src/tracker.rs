use std::sync::Arc;

use anyhow::Context;
use tokio::runtime::Handle;
use tracing::info;

use crate::beacon::{Beacon, Dispatch};
use crate::config::Config;
use crate::dom::Host;
use crate::guard::Verdict;
use crate::links::{LinkInterceptor, LinkRule};
use crate::navigation::NavigationWatcher;
use crate::payload::{EcommerceValues, Meta};
use crate::teardown::Teardown;
use crate::transport::{Callback, HttpTransport, Transport};

/// Public entry point: explicit recording plus three independently
/// toggleable capture features.
#[derive(Clone)]
pub struct Tracker {
    beacon: Beacon,
    navigation: NavigationWatcher,
}

impl Tracker {
    /// Build a tracker bound to the current tokio runtime.
    pub fn new(
        config: Config,
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        let runtime =
            Handle::try_current().context("the tracker must be created inside a tokio runtime")?;
        Ok(Self::with_runtime(config, host, transport, runtime))
    }

    /// Build a tracker delivering over HTTP.
    pub fn with_http(config: Config, host: Arc<dyn Host>) -> anyhow::Result<Self> {
        let transport = HttpTransport::new()?;
        Self::new(config, host, Arc::new(transport))
    }

    pub fn with_runtime(
        config: Config,
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let beacon = Beacon::new(Arc::new(config), host, transport, runtime);
        let navigation = NavigationWatcher::new(beacon.clone());
        Self { beacon, navigation }
    }

    pub fn config(&self) -> &Config {
        self.beacon.config()
    }

    /// Whether a hit for `event` would currently be sent.
    pub fn check(&self, event: Option<&str>) -> Verdict {
        self.beacon.check(event)
    }

    /// Record an explicit event. `None` records a pageview.
    pub fn record(
        &self,
        event: Option<&str>,
        meta: Option<Meta>,
        callback: Option<Callback>,
    ) -> Dispatch {
        self.beacon.record(event, meta.unwrap_or_default(), callback)
    }

    pub fn record_ecommerce(
        &self,
        event: &str,
        values: EcommerceValues,
        callback: Option<Callback>,
    ) -> Dispatch {
        self.beacon.record_ecommerce(event, values, callback)
    }

    /// Track single-page-application route changes.
    pub fn enable_tracker(&self) -> Teardown {
        info!(hash = self.config().hash, "Enabling automatic pageview tracking");
        self.navigation.enable()
    }

    pub fn enable_outbound_link(&self) -> Teardown {
        info!("Enabling outbound link tracking");
        LinkInterceptor::new(self.beacon.clone(), LinkRule::Outbound).enable()
    }

    /// Track clicks on links to files whose extension is in the comma
    /// separated `extensions` list.
    pub fn enable_track_files(&self, extensions: &str, save_extension: bool) -> Teardown {
        let rule = LinkRule::files(extensions, save_extension);
        info!(rule = ?rule, "Enabling file download tracking");
        LinkInterceptor::new(self.beacon.clone(), rule).enable()
    }

    pub fn navigation(&self) -> &NavigationWatcher {
        &self.navigation
    }
}
