//! Flattens nested catalog attributes into top-level columns.
//!
//! Catalog items carry two nested structures that are awkward to query:
//!
//! - `hashtags`, a list of `"key:value"` strings, and
//! - `assets`, a map of asset name to `{"href": ...}` objects.
//!
//! [flatten] turns both into plain attributes and removes the nested source,
//! so flattening twice is the same as flattening once.

use crate::Feature;
use crate::feature::ASSETS;
use serde_json::{Map, Value};

/// The attribute that holds a feature's hashtags before they are flattened.
pub const HASHTAGS: &str = "hashtags";

/// Flattens a feature's hashtags, then its assets.
///
/// A hashtag `key:value` sets the column `key` to `value`. When the key
/// repeats within the feature, values are joined with `,` in encounter order.
/// An asset named `X` sets the column `X` to the asset's href.
///
/// # Examples
///
/// ```
/// use pdssp::Feature;
/// use serde_json::json;
///
/// let mut feature = Feature::new()
///     .attribute("hashtags", json!(["mission:MRO", "mission:HiRISE"]))
///     .attribute("assets", json!({"thumbnail": {"href": "http://x/y.png"}}));
/// pdssp::normalize::flatten(&mut feature);
/// assert_eq!(feature.attributes["mission"], "MRO,HiRISE");
/// assert_eq!(feature.attributes["thumbnail"], "http://x/y.png");
/// assert!(!feature.attributes.contains_key("hashtags"));
/// ```
pub fn flatten(feature: &mut Feature) {
    flatten_hashtags(&mut feature.attributes);
    flatten_assets(&mut feature.attributes);
}

/// Flattens every feature in a batch.
pub fn flatten_all<'a>(features: impl IntoIterator<Item = &'a mut Feature>) {
    for feature in features {
        flatten(feature);
    }
}

fn flatten_hashtags(attributes: &mut Map<String, Value>) {
    let Some(hashtags) = attributes.shift_remove(HASHTAGS) else {
        return;
    };
    let tags = match hashtags {
        Value::Array(tags) => tags,
        Value::Null => return,
        other => {
            tracing::warn!("hashtags is not a list, skipping: {other}");
            return;
        }
    };
    for tag in tags {
        let Some((key, value)) = tag.as_str().and_then(|tag| tag.split_once(':')) else {
            tracing::warn!("hashtag is not a key:value string, skipping: {tag}");
            continue;
        };
        let merged = match attributes.get(key).filter(|existing| !existing.is_null()) {
            Some(existing) => format!("{},{}", unquoted(existing), value),
            None => value.to_string(),
        };
        let _ = attributes.insert(key.to_string(), Value::String(merged));
    }
}

fn flatten_assets(attributes: &mut Map<String, Value>) {
    let Some(assets) = attributes.shift_remove(ASSETS) else {
        return;
    };
    let assets = match assets {
        Value::Object(assets) => assets,
        Value::Null => return,
        other => {
            tracing::warn!("assets is not an object, skipping: {other}");
            return;
        }
    };
    for (name, asset) in assets {
        match asset.get("href").and_then(Value::as_str) {
            Some(href) => {
                let _ = attributes.insert(name, Value::String(href.to_string()));
            }
            None => tracing::warn!("asset {name} has no href, skipping"),
        }
    }
}

fn unquoted(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
