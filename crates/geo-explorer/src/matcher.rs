//! Feature lookup by property value.
//!
//! A feature matches when the named property equals the target, compared
//! case-insensitively after trimming. Features that do not match that way
//! are scanned for any string property equal to the target. Upstream
//! datasets disagree on which key holds the display name, so the scan is
//! intentionally loose; it can match an unrelated string field that happens
//! to equal the search term.

use std::borrow::Cow;

use serde_json::Value;

use crate::types::{Feature, FeatureCollection, GeoError, GeoResult, Layer};

/// Normalized text of a scalar value. Null has none.
pub fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        other => Some(Cow::Owned(other.to_string())),
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// All features matching `target`, in document order.
pub fn find_features<'a>(
    collection: &'a FeatureCollection,
    property: Option<&str>,
    target: &Value,
) -> Vec<&'a Feature> {
    let Some(target) = scalar_text(target).map(|t| normalize(&t)) else {
        return Vec::new();
    };

    collection
        .features
        .iter()
        .filter(|feature| matches_named(feature, property, &target) || matches_any(feature, &target))
        .collect()
}

/// The first matching feature, or [`GeoError::NotFound`].
pub fn first_match<'a>(
    layer: Layer,
    collection: &'a FeatureCollection,
    property: Option<&str>,
    target: &Value,
) -> GeoResult<&'a Feature> {
    find_features(collection, property, target)
        .into_iter()
        .next()
        .ok_or_else(|| GeoError::NotFound {
            layer,
            value: target.clone(),
        })
}

fn matches_named(feature: &Feature, property: Option<&str>, target: &str) -> bool {
    property
        .and_then(|key| feature.property(key))
        .and_then(scalar_text)
        .is_some_and(|text| normalize(&text) == target)
}

fn matches_any(feature: &Feature, target: &str) -> bool {
    feature
        .properties()
        .into_iter()
        .flat_map(|props| props.values())
        .filter_map(Value::as_str)
        .any(|s| normalize(s) == target)
}
