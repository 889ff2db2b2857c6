//! Per-layer, time-bounded cache of resolved feature collections.
//!
//! Every known layer has an entry from construction onwards; an entry is
//! either empty or holds a collection with the moment it was resolved.
//! Entries are replaced wholesale, so a reader sees either the old or the
//! new collection, never a mix.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::types::{FeatureCollection, Layer};

/// Where a cached collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Remote,
    Local,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Remote => "remote",
            Source::Local => "local",
        }
    }
}

/// One layer's cached state.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub cached_at: Option<DateTime<Utc>>,
    pub geojson: Option<Arc<FeatureCollection>>,
    pub source: Option<Source>,
}

impl CacheEntry {
    /// Whether the entry is populated and younger than `ttl` at `now`.
    pub fn is_valid_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let (Some(cached_at), Some(_)) = (self.cached_at, &self.geojson) else {
            return false;
        };
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(cached_at) < ttl
    }

    /// [`CacheEntry::is_valid_at`] against the current time.
    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.is_valid_at(ttl, Utc::now())
    }

    pub fn is_empty(&self) -> bool {
        self.cached_at.is_none() || self.geojson.is_none()
    }
}

/// Diagnostic view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryStatus {
    pub layer: Layer,
    pub cached_at: Option<DateTime<Utc>>,
    pub source: Option<Source>,
    pub features: Option<usize>,
}

/// Thread-safe layer cache.
pub struct LayerCache {
    entries: DashMap<Layer, CacheEntry>,
    ttl: Duration,
}

impl LayerCache {
    /// Create a cache with an empty entry for every layer.
    pub fn new(ttl: Duration) -> Self {
        let entries = DashMap::new();
        for layer in Layer::ALL {
            entries.insert(layer, CacheEntry::default());
        }
        Self { entries, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Copy of the entry for `layer`.
    pub fn entry(&self, layer: Layer) -> CacheEntry {
        self.entries
            .get(&layer)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// The cached collection, if the entry is still within its TTL.
    pub fn get_valid(&self, layer: Layer) -> Option<Arc<FeatureCollection>> {
        let entry = self.entries.get(&layer)?;
        if entry.is_valid(self.ttl) {
            entry.geojson.clone()
        } else {
            None
        }
    }

    /// Store a collection stamped with the current time.
    pub fn set(&self, layer: Layer, geojson: Arc<FeatureCollection>, source: Source) {
        self.set_at(layer, geojson, source, Utc::now());
    }

    /// Store a collection with an explicit timestamp.
    pub fn set_at(
        &self,
        layer: Layer,
        geojson: Arc<FeatureCollection>,
        source: Source,
        cached_at: DateTime<Utc>,
    ) {
        self.entries.insert(
            layer,
            CacheEntry {
                cached_at: Some(cached_at),
                geojson: Some(geojson),
                source: Some(source),
            },
        );
    }

    /// Reset one layer to empty.
    pub fn clear(&self, layer: Layer) {
        self.entries.insert(layer, CacheEntry::default());
    }

    /// Reset every layer to empty.
    pub fn clear_all(&self) {
        for layer in Layer::ALL {
            self.clear(layer);
        }
    }

    /// Status of every layer, in [`Layer::ALL`] order.
    pub fn snapshot(&self) -> Vec<EntryStatus> {
        Layer::ALL
            .iter()
            .map(|&layer| {
                let entry = self.entry(layer);
                EntryStatus {
                    layer,
                    cached_at: entry.cached_at,
                    source: entry.source,
                    features: entry.geojson.as_ref().map(|fc| fc.len()),
                }
            })
            .collect()
    }
}
