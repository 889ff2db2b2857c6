//! Core data types for boundary layers and GeoJSON documents.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type tag carried by every valid feature collection.
pub const FEATURE_COLLECTION_TYPE: &str = "FeatureCollection";

/// A named category of boundaries served by the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// First-level administrative regions.
    Counties,
    /// Electoral sub-regions.
    Constituency,
    /// National outline, used as the map inset.
    Kenya,
}

impl Layer {
    /// Every known layer, in display order.
    pub const ALL: [Layer; 3] = [Layer::Counties, Layer::Constituency, Layer::Kenya];

    /// Canonical name, used as the cache key and in request bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Counties => "counties",
            Layer::Constituency => "constituency",
            Layer::Kenya => "kenya",
        }
    }

    /// Suffixes answered by `GET /get_<suffix>`. The first one is canonical.
    pub fn route_names(self) -> &'static [&'static str] {
        match self {
            Layer::Counties => &["counties"],
            Layer::Constituency => &["constituencies", "constituency"],
            Layer::Kenya => &["kenya_inset", "kenya"],
        }
    }

    /// Human-readable label for error messages.
    pub fn label(self) -> &'static str {
        match self {
            Layer::Counties => "Counties",
            Layer::Constituency => "Constituency",
            Layer::Kenya => "Kenya inset",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counties" | "county" => Ok(Layer::Counties),
            "constituency" | "constituencies" | "const" => Ok(Layer::Constituency),
            "kenya" | "kenya_inset" | "inset" => Ok(Layer::Kenya),
            other => Err(GeoError::Validation(format!("Unknown layer: {other}"))),
        }
    }
}

/// A GeoJSON feature, kept exactly as it was read.
///
/// Only the members the matcher needs get typed accessors; everything else,
/// including explicit nulls and absent members, survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(Map<String, Value>);

impl Feature {
    /// Build a feature from a properties object with a null geometry.
    pub fn from_properties(properties: Map<String, Value>) -> Self {
        let mut raw = Map::new();
        raw.insert("type".into(), Value::String("Feature".into()));
        raw.insert("geometry".into(), Value::Null);
        raw.insert("properties".into(), Value::Object(properties));
        Self(raw)
    }

    /// The properties object. Missing, null or non-object values have none.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.0.get("properties").and_then(Value::as_object)
    }

    /// Look up a property, treating JSON null as absent.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties()?.get(key).filter(|v| !v.is_null())
    }

    pub fn geometry(&self) -> Option<&Value> {
        self.0.get("geometry")
    }

    /// Every member of the feature object.
    pub fn members(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// An ordered collection of features with a type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureCollection {
    /// Create a tagged collection from features.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: Some(FEATURE_COLLECTION_TYPE.to_string()),
            features,
            extra: Map::new(),
        }
    }

    /// Whether the type tag is exactly `"FeatureCollection"`.
    pub fn has_collection_tag(&self) -> bool {
        self.kind.as_deref() == Some(FEATURE_COLLECTION_TYPE)
    }

    /// A missing tag is tolerated; a different one is not.
    pub fn tag_is_consistent(&self) -> bool {
        self.kind.is_none() || self.has_collection_tag()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Failures talking to the remote geospatial provider.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("Remote provider not initialized: {0}")]
    NotInitialized(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for asset {asset_id}")]
    Status { status: u16, asset_id: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors that can occur while resolving or looking up boundary data.
#[derive(thiserror::Error, Debug)]
pub enum GeoError {
    #[error("Remote provider unavailable")]
    ProviderUnavailable,

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to read local file {path}: {reason}")]
    LocalRead { path: PathBuf, reason: String },

    #[error("{} data not available", .0.label())]
    NotAvailable(Layer),

    #[error("Feature not found in {layer}: {value}")]
    NotFound { layer: Layer, value: Value },

    #[error("Invalid input: {0}")]
    Validation(String),
}

/// Convenience result type.
pub type GeoResult<T> = Result<T, GeoError>;
