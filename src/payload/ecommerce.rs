use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Meta, PayloadBuilder, PayloadError};
use crate::dom::Document;

/// Top-level keys of [`EcommercePayload`]; extra fields may not shadow them.
const RESERVED_KEYS: &[&str] = &[
    "ts",
    "url",
    "t",
    "ref",
    "w",
    "h",
    "params",
    "event",
    "items",
    "total",
    "coupon",
    "coupon_value",
    "payment_type",
    "shipping_method",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl LineItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: None,
            quantity: None,
            discount: None,
            category: None,
            variant: None,
            position: None,
            brand: None,
        }
    }
}

/// Caller-supplied values for an e-commerce event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EcommerceValues {
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub coupon: Option<String>,
    #[serde(default)]
    pub coupon_value: Option<f64>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    /// Passed through as additional top-level payload fields
    #[serde(flatten)]
    pub extra: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EcommercePayload {
    pub ts: i64,
    pub url: String,
    pub t: String,
    #[serde(rename = "ref")]
    pub referrer: String,
    pub w: u32,
    pub h: u32,
    pub params: String,
    pub event: String,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub coupon: String,
    pub coupon_value: f64,
    pub payment_type: String,
    pub shipping_method: String,
    #[serde(flatten)]
    pub extra: Meta,
}

impl PayloadBuilder {
    pub fn build_ecommerce<D: Document + ?Sized>(
        &self,
        event: &str,
        values: EcommerceValues,
        document: &D,
    ) -> Result<EcommercePayload, PayloadError> {
        if event.trim().is_empty() {
            return Err(PayloadError::MissingEventName);
        }
        if values.items.is_empty() {
            return Err(PayloadError::EmptyItems);
        }

        let mut extra = values.extra;
        extra.retain(|key, _| {
            let reserved = RESERVED_KEYS.contains(&key.as_str());
            if reserved {
                debug!(key = %key, "Dropping e-commerce field that shadows a payload field");
            }
            !reserved
        });

        let (w, h) = document.screen();

        Ok(EcommercePayload {
            ts: chrono::Utc::now().timestamp_millis(),
            url: document.location().to_string(),
            t: document.title(),
            referrer: document.referrer(),
            w,
            h,
            params: self.params_string(None),
            event: event.to_string(),
            items: values.items,
            total: values.total.unwrap_or(0.0),
            coupon: values.coupon.unwrap_or_default(),
            coupon_value: values.coupon_value.unwrap_or(0.0),
            payment_type: values.payment_type.unwrap_or_default(),
            shipping_method: values.shipping_method.unwrap_or_default(),
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dom::memory::MemoryPage;
    use serde_json::json;

    fn page() -> MemoryPage {
        MemoryPage::new("https://shop.example.com/checkout")
            .unwrap()
            .with_title("Checkout")
    }

    #[test]
    fn rejects_missing_event_and_items() {
        let builder = PayloadBuilder::new(&Config::default());
        let values = EcommerceValues {
            items: vec![LineItem::new("sku-1", "Mug")],
            ..Default::default()
        };

        assert_eq!(
            builder.build_ecommerce("  ", values, &page()),
            Err(PayloadError::MissingEventName)
        );
        assert_eq!(
            builder.build_ecommerce("purchase", EcommerceValues::default(), &page()),
            Err(PayloadError::EmptyItems)
        );
    }

    #[test]
    fn order_fields_default_and_extras_pass_through() {
        let builder = PayloadBuilder::new(&Config {
            domain: Some("shop.example.com".into()),
            ..Config::default()
        });
        let values: EcommerceValues = serde_json::from_value(json!({
            "items": [{"id": "sku-1", "name": "Mug", "price": 9.5, "quantity": 2}],
            "total": 19.0,
            "currency": "EUR",
            "ts": 1
        }))
        .unwrap();

        let payload = builder.build_ecommerce("purchase", values, &page()).unwrap();
        assert_eq!(payload.coupon, "");
        assert_eq!(payload.coupon_value, 0.0);
        assert_eq!(payload.payment_type, "");
        assert_eq!(payload.total, 19.0);
        assert_eq!(payload.params, "domain=shop.example.com");

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["currency"], json!("EUR"));
        assert_eq!(body["event"], json!("purchase"));
        assert_eq!(body["items"][0]["quantity"], json!(2));
        assert!(body["items"][0].get("brand").is_none());
        assert_ne!(body["ts"], json!(1));
    }
}
