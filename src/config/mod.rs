use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_PROXY_SERVER: &str = "https://api.vantevo.io/event";
pub const DEFAULT_PROXY_SERVER_ECOMMERCE: &str = "https://api.vantevo.io/event/ecommerce";

/// Tracker options, resolved once and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Glob-like path patterns that suppress pageview hits
    #[serde(default, alias = "excludePath")]
    pub exclude_path: Vec<String>,

    /// Log hits locally instead of sending them
    #[serde(default)]
    pub dev: bool,

    /// Track fragment-only route changes
    #[serde(default)]
    pub hash: bool,

    /// Explicit site identifier; the page hostname stands in when absent
    #[serde(default)]
    pub domain: Option<String>,

    /// Extra parameters merged into every event in the order given; null
    /// values are dropped
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,

    #[serde(default = "Config::default_proxy_server", alias = "proxyServer")]
    pub proxy_server: String,

    #[serde(
        default = "Config::default_proxy_server_ecommerce",
        alias = "proxyServerEcommerce"
    )]
    pub proxy_server_ecommerce: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_path: Vec::new(),
            dev: false,
            hash: false,
            domain: None,
            params: serde_json::Map::new(),
            proxy_server: Self::default_proxy_server(),
            proxy_server_ecommerce: Self::default_proxy_server_ecommerce(),
        }
    }
}

impl Config {
    fn default_proxy_server() -> String {
        DEFAULT_PROXY_SERVER.to_string()
    }

    fn default_proxy_server_ecommerce() -> String {
        DEFAULT_PROXY_SERVER_ECOMMERCE.to_string()
    }

    /// Load from `.env`, `VANTEVO_*` environment variables and, when given,
    /// a configuration file (JSON, TOML or YAML by extension).
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VANTEVO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("exclude_path"),
        );

        let config: Config = builder
            .build()
            .context("failed to read tracker configuration")?
            .try_deserialize()
            .context("invalid tracker configuration")?;

        config.resolve()
    }

    /// Parse an options record given as JSON.
    pub fn from_json(options: &str) -> anyhow::Result<Self> {
        let config: Config =
            serde_json::from_str(options).context("failed to parse tracker options")?;
        config.resolve()
    }

    /// The explicit site identifier, if one is set. Blank values count as
    /// unset so the page hostname stands in.
    pub fn site_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
    }

    fn resolve(mut self) -> anyhow::Result<Self> {
        Url::parse(&self.proxy_server)
            .with_context(|| format!("proxy_server '{}' is not a valid URL", self.proxy_server))?;
        Url::parse(&self.proxy_server_ecommerce).with_context(|| {
            format!(
                "proxy_server_ecommerce '{}' is not a valid URL",
                self.proxy_server_ecommerce
            )
        })?;

        self.domain = self.site_domain().map(str::to_string);
        Ok(self)
    }
}
