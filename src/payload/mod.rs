//! Wire payloads and the builder that assembles them from page state

pub mod ecommerce;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::dom::Document;

pub use ecommerce::{EcommercePayload, EcommerceValues, LineItem};

pub const PAGEVIEW: &str = "pageview";

/// Arbitrary event metadata.
pub type Meta = serde_json::Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("e-commerce event name is required")]
    MissingEventName,
    #[error("e-commerce event requires at least one item")]
    EmptyItems,
}

/// `None` and `"pageview"` both mean a pageview.
pub fn is_pageview(event: Option<&str>) -> bool {
    event.map_or(true, |e| e == PAGEVIEW)
}

/// Standard event payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    /// Epoch milliseconds
    pub ts: i64,
    pub url: String,
    pub t: String,
    #[serde(rename = "ref")]
    pub referrer: String,
    pub w: u32,
    pub h: u32,
    pub params: String,
    pub e_n: String,
    pub e_m: Meta,
}

pub struct PayloadBuilder {
    params: Vec<(String, Option<String>)>,
    domain: Option<String>,
    hash: bool,
}

impl PayloadBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            params: config
                .params
                .iter()
                .map(|(k, v)| (k.clone(), value_as_param(v)))
                .collect(),
            domain: config.site_domain().map(str::to_string),
            hash: config.hash,
        }
    }

    pub fn build<D: Document + ?Sized>(
        &self,
        event: Option<&str>,
        meta: Meta,
        document: &D,
    ) -> Payload {
        let pageview = is_pageview(event);

        let path = if pageview {
            meta.get("path").and_then(override_value)
        } else {
            None
        };

        let title = meta
            .get("title")
            .filter(|_| pageview)
            .and_then(override_value)
            .unwrap_or_else(|| document.title());

        let (w, h) = document.screen();

        Payload {
            ts: chrono::Utc::now().timestamp_millis(),
            url: document.location().to_string(),
            t: title,
            referrer: document.referrer(),
            w,
            h,
            params: self.params_string(path),
            e_n: event.unwrap_or(PAGEVIEW).to_string(),
            e_m: meta,
        }
    }

    /// Merge static params, domain, hash marker and an optional path, then
    /// encode the non-null entries in merge order.
    pub fn params_string(&self, path: Option<String>) -> String {
        let mut entries = self.params.clone();
        if let Some(domain) = &self.domain {
            merge(&mut entries, "domain", Some(domain.clone()));
        }
        if self.hash {
            merge(&mut entries, "hash", Some("true".to_string()));
        }
        if let Some(path) = path {
            merge(&mut entries, "path", Some(path));
        }
        encode_params(&entries)
    }
}

/// Set `key`, keeping the position of an existing entry.
fn merge(entries: &mut Vec<(String, Option<String>)>, key: &str, value: Option<String>) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key.to_string(), value)),
    }
}

/// `k=v&k=v` over the non-null entries, percent-encoded.
pub fn encode_params(entries: &[(String, Option<String>)]) -> String {
    entries
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Title and path overrides apply only when set to something non-empty.
fn override_value(value: &Value) -> Option<String> {
    value_as_param(value).filter(|v| !v.is_empty())
}

fn value_as_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::MemoryPage;
    use serde_json::json;

    fn page() -> MemoryPage {
        MemoryPage::new("https://example.com/docs?x=1")
            .unwrap()
            .with_title("Docs")
            .with_referrer("https://search.test/")
            .with_screen(1280, 800)
    }

    fn meta(value: Value) -> Meta {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn null_params_are_dropped() {
        let params = meta(json!({"a": "1", "b": null}));
        let builder = PayloadBuilder::new(&Config {
            params,
            domain: Some("x.io".into()),
            ..Config::default()
        });

        let encoded = builder.params_string(None);
        assert_eq!(encoded, "a=1&domain=x.io");
        assert!(!encoded.contains("b="));
    }

    #[test]
    fn static_params_are_kept_without_domain() {
        let params = meta(json!({"campaign": "spring sale"}));
        let builder = PayloadBuilder::new(&Config {
            params,
            hash: true,
            ..Config::default()
        });

        assert_eq!(builder.params_string(None), "campaign=spring%20sale&hash=true");
    }

    #[test]
    fn pageview_path_and_title_overrides() {
        let builder = PayloadBuilder::new(&Config {
            domain: Some("example.com".into()),
            ..Config::default()
        });
        let payload = builder.build(
            Some("pageview"),
            meta(json!({"path": "/virtual/step-2", "title": "Step 2"})),
            &page(),
        );

        assert_eq!(payload.params, "domain=example.com&path=%2Fvirtual%2Fstep-2");
        assert_eq!(payload.t, "Step 2");
        assert_eq!(payload.e_n, "pageview");
    }

    #[test]
    fn params_follow_insertion_order() {
        let config = Config::from_json(
            r#"{"params": {"zeta": "1", "alpha": "2"}, "domain": "x.io", "hash": true}"#,
        )
        .unwrap();
        let builder = PayloadBuilder::new(&config);
        assert_eq!(builder.params_string(None), "zeta=1&alpha=2&domain=x.io&hash=true");
    }

    #[test]
    fn static_domain_param_is_replaced_in_place() {
        let builder = PayloadBuilder::new(&Config {
            params: meta(json!({"domain": "stale", "a": "1"})),
            domain: Some("x.io".into()),
            ..Config::default()
        });
        assert_eq!(builder.params_string(None), "domain=x.io&a=1");
    }

    #[test]
    fn blank_domain_is_not_sent() {
        let builder = PayloadBuilder::new(&Config {
            domain: Some(" ".into()),
            ..Config::default()
        });
        assert_eq!(builder.params_string(None), "");
    }

    #[test]
    fn empty_path_and_title_do_not_override() {
        let builder = PayloadBuilder::new(&Config::default());
        let payload = builder.build(None, meta(json!({"path": "", "title": ""})), &page());

        assert_eq!(payload.params, "");
        assert_eq!(payload.t, "Docs");
    }

    #[test]
    fn custom_events_ignore_path_and_title() {
        let builder = PayloadBuilder::new(&Config::default());
        let payload = builder.build(
            Some("signup"),
            meta(json!({"path": "/x", "title": "Other", "plan": "pro"})),
            &page(),
        );

        assert_eq!(payload.params, "");
        assert_eq!(payload.t, "Docs");
        assert_eq!(payload.e_m.get("plan"), Some(&json!("pro")));
    }

    #[test]
    fn page_state_is_read_at_build_time() {
        let builder = PayloadBuilder::new(&Config::default());
        let page = page();
        let payload = builder.build(None, Meta::new(), &page);

        assert_eq!(payload.url, "https://example.com/docs?x=1");
        assert_eq!(payload.referrer, "https://search.test/");
        assert_eq!((payload.w, payload.h), (1280, 800));
        assert_eq!(payload.e_n, "pageview");

        page.set_title("Renamed");
        assert_eq!(builder.build(None, Meta::new(), &page).t, "Renamed");
    }

    #[test]
    fn wire_names() {
        let builder = PayloadBuilder::new(&Config::default());
        let value = serde_json::to_value(builder.build(None, Meta::new(), &page())).unwrap();
        for key in ["ts", "url", "t", "ref", "w", "h", "params", "e_n", "e_m"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
