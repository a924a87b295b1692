//! Outbound-link and file-download interception
//!
//! Both features share one click handler: resolve the nearest anchor, decide
//! whether it is trackable under the active [`LinkRule`], record the event,
//! and hold back same-window navigation long enough for the beacon to leave
//! the page.

pub mod attributes;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::beacon::{Beacon, Dispatch};
use crate::dom::{host_of, ClickEvent, Document, Element, NavigationContext};
use crate::payload::Meta;
use crate::teardown::Teardown;

pub use attributes::{
    collect_data_attributes, DATA_PREFIX, EXCLUDE_OUTBOUND_LINK, EXCLUDE_TRACK_FILE,
    SAVE_EXTENSION,
};

pub const OUTBOUND_LINK: &str = "Outbound Link";
pub const FILE_DOWNLOAD: &str = "File Download";

/// How long a same-window navigation is held back after a tracked click.
pub const NAVIGATION_DELAY: Duration = Duration::from_millis(150);

/// The anchor a click resolved to.
#[derive(Clone)]
pub struct Anchor {
    pub element: Arc<dyn Element>,
    pub href: String,
    pub url: Option<Url>,
    pub target: Option<String>,
}

impl Anchor {
    pub fn host(&self) -> Option<String> {
        self.url.as_ref().and_then(host_of)
    }

    /// No `target`, or one of `_self`, `_parent`, `_top`.
    pub fn opens_in_same_window(&self) -> bool {
        match self.target.as_deref() {
            None | Some("") => true,
            Some(target) => ["_self", "_parent", "_top"]
                .iter()
                .any(|keyword| target.eq_ignore_ascii_case(keyword)),
        }
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.element.attribute(name).is_some()
    }
}

/// Walk up from `target` to the nearest `a` element carrying an `href`.
pub fn resolve_anchor(target: Option<Arc<dyn Element>>) -> Option<Anchor> {
    let mut current = target;
    while let Some(element) = current {
        let is_anchor = element
            .tag_name()
            .is_some_and(|tag| tag.eq_ignore_ascii_case("a"));
        if is_anchor {
            if let Some(href) = element.href().filter(|href| !href.is_empty()) {
                return Some(Anchor {
                    url: Url::parse(&href).ok(),
                    target: element.attribute("target"),
                    href,
                    element,
                });
            }
        }
        current = element.parent();
    }
    None
}

/// Split a comma separated extension list. Whitespace is removed and empty
/// entries are dropped.
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Extension of the final path segment of `href`, if it has one.
pub fn file_extension(href: &str) -> Option<String> {
    let segment = match Url::parse(href) {
        Ok(url) => url.path_segments()?.last()?.to_string(),
        Err(_) => {
            let path = href.split(&['?', '#'][..]).next().unwrap_or(href);
            path.rsplit('/').next()?.to_string()
        }
    };
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_string())
}

/// What makes an anchor trackable.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkRule {
    Outbound,
    Files {
        extensions: Vec<String>,
        save_extension: bool,
    },
}

/// A trackable click: the event to emit and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub event: &'static str,
    pub meta: Meta,
}

impl LinkRule {
    pub fn files(extensions: &str, save_extension: bool) -> Self {
        LinkRule::Files {
            extensions: parse_extensions(extensions),
            save_extension,
        }
    }

    pub fn classify(&self, anchor: &Anchor, page_host: Option<&str>) -> Option<Classification> {
        match self {
            LinkRule::Outbound => {
                let host = anchor.host()?;
                if Some(host.as_str()) == page_host || anchor.has_attribute(EXCLUDE_OUTBOUND_LINK) {
                    return None;
                }
                Some(Classification {
                    event: OUTBOUND_LINK,
                    meta: link_meta(anchor),
                })
            }
            LinkRule::Files {
                extensions,
                save_extension,
            } => {
                if extensions.is_empty() || anchor.has_attribute(EXCLUDE_TRACK_FILE) {
                    return None;
                }
                let extension = file_extension(&anchor.href)?;
                if !extensions.iter().any(|ext| *ext == extension) {
                    return None;
                }

                let save = match anchor.element.attribute(SAVE_EXTENSION) {
                    Some(value) => value != "false",
                    None => *save_extension,
                };
                let mut meta = link_meta(anchor);
                if save {
                    meta.insert("extension".into(), Value::String(extension));
                }
                Some(Classification {
                    event: FILE_DOWNLOAD,
                    meta,
                })
            }
        }
    }
}

fn link_meta(anchor: &Anchor) -> Meta {
    let mut meta = collect_data_attributes(anchor.element.as_ref());
    meta.insert("url".into(), Value::String(anchor.href.clone()));
    meta
}

/// Click handler for one [`LinkRule`].
#[derive(Clone)]
pub struct LinkInterceptor {
    beacon: Beacon,
    rule: Arc<LinkRule>,
}

impl LinkInterceptor {
    pub fn new(beacon: Beacon, rule: LinkRule) -> Self {
        Self {
            beacon,
            rule: Arc::new(rule),
        }
    }

    pub fn rule(&self) -> &LinkRule {
        &self.rule
    }

    /// Handle one click or auxclick. Returns the dispatch outcome when the
    /// click was on a trackable anchor.
    pub fn handle(&self, event: &ClickEvent) -> Option<Dispatch> {
        if !(event.is_primary_click() || event.is_middle_click()) {
            return None;
        }

        let anchor = resolve_anchor(event.target.clone())?;
        let host = self.beacon.host();
        let page_host = host_of(&host.location());
        let classification = self.rule.classify(&anchor, page_host.as_deref())?;

        let dispatch = self
            .beacon
            .record(Some(classification.event), classification.meta, None);

        if event.is_primary_click() && !event.modifiers.any() && anchor.opens_in_same_window() {
            event.prevent_default();
            let host = Arc::clone(host);
            let href = anchor.href;
            debug!(href = %href, delay_ms = NAVIGATION_DELAY.as_millis() as u64, "Delaying navigation");
            self.beacon.runtime().spawn(async move {
                tokio::time::sleep(NAVIGATION_DELAY).await;
                host.navigate(&href);
            });
        }

        Some(dispatch)
    }

    /// Register the handler on the document for clicks and auxclicks.
    pub fn enable(&self) -> Teardown {
        let host = Arc::clone(self.beacon.host());
        let interceptor = self.clone();
        let id = host.add_click_listener(Arc::new(move |event: &ClickEvent| {
            interceptor.handle(event);
        }));

        Teardown::new(move || host.remove_click_listener(id))
    }
}
