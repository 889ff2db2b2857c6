//! Shared server state.

use std::sync::Arc;
use std::time::Instant;

use geo_explorer::{HttpProvider, LayerCache, NoopProvider, RemoteProvider, Resolver};

use crate::config::ServerConfig;

/// State shared by every handler via axum `State`.
pub struct AppState {
    pub resolver: Resolver,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration, initializing the remote provider once.
    pub fn from_config(config: ServerConfig) -> Self {
        let provider = init_provider(&config);
        Self::with_provider(config, provider)
    }

    /// Build state around an already constructed provider.
    pub fn with_provider(config: ServerConfig, provider: Arc<dyn RemoteProvider>) -> Self {
        let cache = Arc::new(LayerCache::new(config.cache_ttl));
        let resolver = Resolver::new(config.catalog.clone(), cache, provider)
            .with_fetch_timeout(config.fetch_timeout);
        Self {
            resolver,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Connect the HTTP provider, substituting a no-op one on failure.
fn init_provider(config: &ServerConfig) -> Arc<dyn RemoteProvider> {
    let Some(provider_config) = config.provider_config() else {
        let msg = "Remote provider not configured; serving local files only";
        tracing::warn!("{msg}");
        return Arc::new(NoopProvider::new(msg));
    };

    match HttpProvider::connect(&provider_config) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            let msg = format!("Remote provider init failed: {e}");
            tracing::warn!("{msg}");
            Arc::new(NoopProvider::new(msg))
        }
    }
}
