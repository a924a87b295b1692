//! Environment guard
//!
//! Decides, before anything is built or sent, whether a hit should be
//! dropped: automation tools, local origins and excluded paths.

pub mod pattern;

use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::dom::Document;
use crate::payload::{is_pageview, PayloadError};

pub use pattern::PathPattern;

/// Globals left behind by headless browsers and test runners.
pub const AUTOMATION_MARKERS: &[&str] = &[
    "__phantomas",
    "_phantom",
    "callPhantom",
    "__nightmare",
    "navigator.webdriver",
    "Cypress",
];

const LOCALHOST_MESSAGE: &str = "Ignores hit on localhost.";

/// Why a hit was not sent.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Suppression {
    #[error("automation environment detected")]
    Automation,
    #[error("hit from a local origin")]
    LocalOrigin,
    #[error("path matches exclusion pattern '{0}'")]
    ExcludedPath(String),
    #[error(transparent)]
    Invalid(#[from] PayloadError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Proceed,
    Suppress(Suppression),
}

impl Verdict {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Verdict::Proceed)
    }
}

pub struct EnvironmentGuard {
    dev: bool,
    domain: Option<String>,
    excluded: Vec<PathPattern>,
}

impl EnvironmentGuard {
    /// Compile the exclusion patterns once. Patterns that fail to compile are
    /// logged and skipped.
    pub fn new(config: &Config) -> Self {
        let excluded = config
            .exclude_path
            .iter()
            .filter_map(|raw| match PathPattern::compile(raw) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    warn!(pattern = %raw, error = %err, "Skipping invalid exclude path pattern");
                    None
                }
            })
            .collect();

        Self {
            dev: config.dev,
            domain: config.site_domain().map(str::to_string),
            excluded,
        }
    }

    pub fn evaluate<D: Document + ?Sized>(&self, event: Option<&str>, document: &D) -> Verdict {
        if AUTOMATION_MARKERS.iter().any(|m| document.has_global(m)) {
            return Verdict::Suppress(Suppression::Automation);
        }

        let location = document.location();

        if !self.dev {
            let local_file = location.scheme() == "file";
            let local_domain = match &self.domain {
                Some(domain) => is_local_hostname(domain),
                None => location.host_str().is_some_and(is_local_hostname),
            };
            if local_file || local_domain {
                warn!("{}", LOCALHOST_MESSAGE);
                return Verdict::Suppress(Suppression::LocalOrigin);
            }
        }

        if is_pageview(event) {
            if let Some(pattern) = self.excluded_by(location.path()) {
                if self.dev {
                    warn!(pattern = %pattern.as_str(), "Exclude page");
                }
                return Verdict::Suppress(Suppression::ExcludedPath(pattern.as_str().to_string()));
            }
        }

        Verdict::Proceed
    }

    fn excluded_by(&self, path: &str) -> Option<&PathPattern> {
        self.excluded.iter().find(|pattern| pattern.matches(path))
    }
}

/// `localhost` with any suffix, or a `127.x.y.z` dotted quad.
pub fn is_local_hostname(hostname: &str) -> bool {
    let lower = hostname.to_ascii_lowercase();
    if lower.starts_with("localhost") {
        return true;
    }
    let octets: Vec<&str> = lower.split('.').collect();
    octets.len() == 4
        && octets[0] == "127"
        && octets[1..]
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()))
}
