//! Geo Explorer: boundary layer resolution, caching, and feature lookup.

pub mod cache;
pub mod catalog;
pub mod local;
pub mod matcher;
pub mod remote;
pub mod resolver;
pub mod types;

pub use cache::{CacheEntry, EntryStatus, LayerCache, Source};
pub use catalog::{LayerCatalog, LayerSource};
pub use local::LocalStore;
pub use matcher::{find_features, first_match};
pub use remote::{HttpProvider, NoopProvider, ProviderConfig, RemoteProvider};
pub use resolver::{Resolver, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT};
pub use types::*;
