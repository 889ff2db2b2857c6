//! Layer resolution: cache, then remote provider, then local file.
//!
//! Remote failures of any kind are logged and absorbed; the local file is
//! the last resort. Only "no data anywhere" reaches the caller, as
//! [`GeoError::NotAvailable`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::cache::{LayerCache, Source};
use crate::catalog::LayerCatalog;
use crate::local::LocalStore;
use crate::remote::RemoteProvider;
use crate::types::{FeatureCollection, GeoError, GeoResult, Layer, ProviderError};

/// Default cache lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default bound on a single remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves layers to feature collections.
pub struct Resolver {
    catalog: LayerCatalog,
    cache: Arc<LayerCache>,
    provider: Arc<dyn RemoteProvider>,
    fetch_timeout: Duration,
    /// One lock per layer so concurrent misses issue a single fetch.
    inflight: HashMap<Layer, Mutex<()>>,
}

impl Resolver {
    pub fn new(
        catalog: LayerCatalog,
        cache: Arc<LayerCache>,
        provider: Arc<dyn RemoteProvider>,
    ) -> Self {
        let inflight = Layer::ALL.iter().map(|&l| (l, Mutex::new(()))).collect();
        Self {
            catalog,
            cache,
            provider,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            inflight,
        }
    }

    /// Override the remote fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<LayerCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<dyn RemoteProvider> {
        &self.provider
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    /// Resolve a layer. `force_refresh` skips the cache read but the result
    /// is still written back to the cache.
    pub async fn resolve(
        &self,
        layer: Layer,
        force_refresh: bool,
    ) -> GeoResult<Arc<FeatureCollection>> {
        if !force_refresh {
            if let Some(cached) = self.cache.get_valid(layer) {
                tracing::debug!("Returning {layer} from cache");
                return Ok(cached);
            }
        }

        let _guard = match self.inflight.get(&layer) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        // Another request may have filled the entry while we waited.
        if !force_refresh {
            if let Some(cached) = self.cache.get_valid(layer) {
                tracing::debug!("Returning {layer} from cache after concurrent refresh");
                return Ok(cached);
            }
        }

        let source = self.catalog.source(layer);

        match self.fetch_remote(&source.asset_id).await {
            Ok(collection) => {
                let collection = Arc::new(collection);
                tracing::info!(
                    "Fetched {layer} from remote asset {} ({} features)",
                    source.asset_id,
                    collection.len()
                );
                self.cache.set(layer, Arc::clone(&collection), Source::Remote);
                return Ok(collection);
            }
            Err(GeoError::ProviderUnavailable) => {
                tracing::debug!("Remote provider unavailable, using local {layer}");
            }
            Err(e) => {
                tracing::warn!("Remote {layer} failed, will try local fallback: {e}");
            }
        }

        match LocalStore::read(&source.local_path).await {
            Ok(collection) => {
                let collection = Arc::new(collection);
                tracing::info!(
                    "Loaded {layer} from {} ({} features)",
                    source.local_path.display(),
                    collection.len()
                );
                self.cache.set(layer, Arc::clone(&collection), Source::Local);
                Ok(collection)
            }
            Err(e) => {
                tracing::warn!("No data for {layer}: {e}");
                Err(GeoError::NotAvailable(layer))
            }
        }
    }

    async fn fetch_remote(&self, asset_id: &str) -> GeoResult<FeatureCollection> {
        if !self.provider.is_available() {
            return Err(GeoError::ProviderUnavailable);
        }
        let collection =
            match tokio::time::timeout(self.fetch_timeout, self.provider.fetch(asset_id)).await {
                Ok(result) => result?,
                Err(_) => return Err(ProviderError::Timeout(self.fetch_timeout).into()),
            };
        if !collection.has_collection_tag() {
            return Err(ProviderError::Malformed(format!(
                "{asset_id}: expected type FeatureCollection, got {:?}",
                collection.kind
            ))
            .into());
        }
        Ok(collection)
    }

    /// Drop the cached copy of one layer.
    pub fn invalidate(&self, layer: Layer) {
        self.cache.clear(layer);
    }

    /// Drop every cached layer, e.g. after local files were replaced.
    pub fn invalidate_all(&self) {
        self.cache.clear_all();
        tracing::info!("Cleared all cached layers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::NoopProvider;
    use crate::types::Feature;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that counts calls and either succeeds or fails.
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingProvider {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteProvider for CountingProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn status(&self) -> String {
            "counting".into()
        }

        async fn fetch(&self, asset_id: &str) -> Result<FeatureCollection, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProviderError::Auth(401));
            }
            let mut props = serde_json::Map::new();
            props.insert("asset".into(), json!(asset_id));
            Ok(FeatureCollection::new(vec![Feature::from_properties(props)]))
        }
    }

    fn write_local(dir: &Path, layer: Layer) {
        let path = LayerCatalog::default_source(layer, dir).local_path;
        std::fs::write(
            path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":null,"properties":{"origin":"local"}}]}"#,
        )
        .unwrap();
    }

    fn resolver(dir: &Path, provider: Arc<dyn RemoteProvider>) -> Resolver {
        Resolver::new(
            LayerCatalog::with_defaults(dir),
            Arc::new(LayerCache::new(DEFAULT_CACHE_TTL)),
            provider,
        )
    }

    fn origin(fc: &FeatureCollection) -> serde_json::Value {
        let feature = &fc.features[0];
        feature
            .property("origin")
            .or_else(|| feature.property("asset"))
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_remote_success_populates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::ok();
        let r = resolver(dir.path(), provider.clone());

        let fc = r.resolve(Layer::Counties, false).await.unwrap();
        assert_eq!(origin(&fc), "projects/ee-celestakim019/assets/counties");
        assert_eq!(provider.calls(), 1);
        assert_eq!(r.cache().entry(Layer::Counties).source, Some(Source::Remote));
    }

    #[tokio::test]
    async fn test_fallback_to_local_on_remote_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), Layer::Constituency);
        let provider = CountingProvider::failing();
        let r = resolver(dir.path(), provider.clone());

        let fc = r.resolve(Layer::Constituency, false).await.unwrap();
        assert_eq!(origin(&fc), "local");
        assert_eq!(provider.calls(), 1);

        let entry = r.cache().entry(Layer::Constituency);
        assert_eq!(entry.source, Some(Source::Local));
        assert!(Arc::ptr_eq(entry.geojson.as_ref().unwrap(), &fc));
    }

    #[tokio::test]
    async fn test_total_unavailability_leaves_cache_empty() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), Arc::new(NoopProvider::new("not configured")));

        let err = r.resolve(Layer::Kenya, false).await.unwrap_err();
        assert!(matches!(err, GeoError::NotAvailable(Layer::Kenya)));
        assert!(r.cache().entry(Layer::Kenya).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_not_called() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), Layer::Kenya);
        let r = resolver(dir.path(), Arc::new(NoopProvider::new("offline")));

        let fc = r.resolve(Layer::Kenya, false).await.unwrap();
        assert_eq!(origin(&fc), "local");
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::ok();
        let r = resolver(dir.path(), provider.clone());

        let first = r.resolve(Layer::Counties, false).await.unwrap();
        let forced = r.resolve(Layer::Counties, true).await.unwrap();
        assert_eq!(provider.calls(), 2);
        assert!(!Arc::ptr_eq(&first, &forced));

        // The forced result is what later unforced calls see.
        let after = r.resolve(Layer::Counties, false).await.unwrap();
        assert!(Arc::ptr_eq(&forced, &after));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_repeated_resolve_within_ttl_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::ok();
        let r = resolver(dir.path(), provider.clone());

        let a = r.resolve(Layer::Constituency, false).await.unwrap();
        let b = r.resolve(Layer::Constituency, false).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(
            serde_json::to_vec(&*a).unwrap(),
            serde_json::to_vec(&*b).unwrap()
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_remote_timeout_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), Layer::Counties);
        let provider = CountingProvider::slow(Duration::from_secs(5));
        let r = resolver(dir.path(), provider.clone())
            .with_fetch_timeout(Duration::from_millis(20));

        let fc = r.resolve(Layer::Counties, false).await.unwrap();
        assert_eq!(origin(&fc), "local");
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::slow(Duration::from_millis(50));
        let r = Arc::new(resolver(dir.path(), provider.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&r);
                tokio::spawn(async move { r.resolve(Layer::Kenya, false).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CountingProvider::ok();
        let r = resolver(dir.path(), provider.clone());

        r.resolve(Layer::Counties, false).await.unwrap();
        r.invalidate_all();
        assert!(r.cache().entry(Layer::Counties).is_empty());
        r.resolve(Layer::Counties, false).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    /// Provider that answers with a document of the wrong type.
    struct TopologyProvider;

    #[async_trait]
    impl RemoteProvider for TopologyProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn status(&self) -> String {
            "topology".into()
        }

        async fn fetch(&self, _asset_id: &str) -> Result<FeatureCollection, ProviderError> {
            let mut fc = FeatureCollection::new(Vec::new());
            fc.kind = Some("Topology".into());
            Ok(fc)
        }
    }

    #[tokio::test]
    async fn test_mistagged_remote_document_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), Layer::Kenya);
        let r = resolver(dir.path(), Arc::new(TopologyProvider));

        let fc = r.resolve(Layer::Kenya, false).await.unwrap();
        assert_eq!(origin(&fc), "local");
        assert!(fc.has_collection_tag());
        assert_eq!(r.cache().entry(Layer::Kenya).source, Some(Source::Local));
    }

    #[tokio::test]
    async fn test_mistagged_remote_document_without_local_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), Arc::new(TopologyProvider));

        let err = r.resolve(Layer::Counties, false).await.unwrap_err();
        assert!(matches!(err, GeoError::NotAvailable(Layer::Counties)));
        assert!(r.cache().entry(Layer::Counties).is_empty());
    }
}
