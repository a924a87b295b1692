//! `data-vantevo-*` attribute protocol

use serde_json::Value;

use crate::dom::Element;
use crate::payload::Meta;

pub const DATA_PREFIX: &str = "data-vantevo-";

pub const EXCLUDE_OUTBOUND_LINK: &str = "data-vantevo-exclude-outbound-link";
pub const EXCLUDE_TRACK_FILE: &str = "data-vantevo-exclude-track-file";
pub const SAVE_EXTENSION: &str = "data-vantevo-save-extension";

/// Toggles behaviour rather than carrying metadata.
const RESERVED: &[&str] = &[EXCLUDE_OUTBOUND_LINK, EXCLUDE_TRACK_FILE, SAVE_EXTENSION];

/// Collect every `data-vantevo-<key>` attribute of `element` as `<key>`.
pub fn collect_data_attributes(element: &dyn Element) -> Meta {
    let candidates = element.attribute_names();

    candidates
        .into_iter()
        .filter(|name| !RESERVED.contains(&name.as_str()))
        .filter_map(|name| {
            let key = name.strip_prefix(DATA_PREFIX)?;
            if key.is_empty() {
                return None;
            }
            let value = element.attribute(&name)?;
            Some((key.to_string(), Value::String(value)))
        })
        .collect()
}
