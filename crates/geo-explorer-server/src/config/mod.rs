//! Configuration loading and resolution.
//!
//! Every setting resolves as: explicit CLI value, then environment
//! variable, then built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use geo_explorer::{
    Layer, LayerCatalog, LayerSource, ProviderConfig, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
};

/// Application name reported by `/meta`.
pub const APP_NAME: &str = "Kenya GIS Explorer";

/// Default listen address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

/// Default directory holding the local fallback files.
pub const DEFAULT_DATA_DIR: &str = "static/data";

/// Service account key picked up from the working directory when present.
pub const DEFAULT_CREDENTIALS_FILE: &str = "key.json";

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub addr: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub cache_ttl_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub provider_url: Option<String>,
    pub credentials: Option<PathBuf>,
    pub upload_token: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub provider_url: Option<String>,
    pub credentials: Option<PathBuf>,
    pub upload_token: Option<String>,
    pub catalog: LayerCatalog,
}

impl ServerConfig {
    /// Resolve against the process environment.
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve using `env` to look up environment variables.
    pub fn resolve_with(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let addr = overrides
            .addr
            .or_else(|| env("GEO_EXPLORER_ADDR"))
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let data_dir = overrides
            .data_dir
            .or_else(|| env("GEO_EXPLORER_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let cache_ttl = match overrides.cache_ttl_secs {
            Some(secs) => Duration::from_secs(secs),
            None => parse_secs("GEO_EXPLORER_CACHE_TTL", env("GEO_EXPLORER_CACHE_TTL"))?
                .unwrap_or(DEFAULT_CACHE_TTL),
        };

        let fetch_timeout = match overrides.fetch_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => parse_secs(
                "GEO_EXPLORER_FETCH_TIMEOUT",
                env("GEO_EXPLORER_FETCH_TIMEOUT"),
            )?
            .unwrap_or(DEFAULT_FETCH_TIMEOUT),
        };

        let provider_url = overrides
            .provider_url
            .or_else(|| env("GEO_EXPLORER_PROVIDER_URL"));

        let credentials = overrides
            .credentials
            .or_else(|| env("GEO_EXPLORER_CREDENTIALS").map(PathBuf::from))
            .or_else(default_credentials);

        let upload_token = overrides
            .upload_token
            .or_else(|| env("GEO_EXPLORER_UPLOAD_TOKEN"))
            .or_else(|| env("UPLOAD_TOKEN"));

        let sources: Vec<(Layer, LayerSource)> = Layer::ALL
            .iter()
            .map(|&layer| {
                let stock = LayerCatalog::default_source(layer, &data_dir);
                let prefix = format!("GEO_EXPLORER_{}", layer.as_str().to_ascii_uppercase());
                let asset_id = env(&format!("{prefix}_ASSET")).unwrap_or(stock.asset_id);
                let local_path = env(&format!("{prefix}_FILE"))
                    .map(|f| resolve_in(&data_dir, &f))
                    .unwrap_or(stock.local_path);
                (layer, LayerSource { asset_id, local_path })
            })
            .collect();

        Ok(Self {
            addr,
            catalog: LayerCatalog::new(&data_dir, sources),
            data_dir,
            cache_ttl,
            fetch_timeout,
            provider_url,
            credentials,
            upload_token,
        })
    }

    /// Provider settings, if an endpoint is configured.
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        self.provider_url.as_ref().map(|endpoint| ProviderConfig {
            endpoint: endpoint.clone(),
            credentials_path: self.credentials.clone(),
            timeout: self.fetch_timeout,
        })
    }
}

fn parse_secs(key: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value,
                reason: e.to_string(),
            })
    })
    .transpose()
}

/// Relative file names are taken relative to the data directory.
fn resolve_in(data_dir: &Path, file: &str) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    }
}

fn default_credentials() -> Option<PathBuf> {
    let path = PathBuf::from(DEFAULT_CREDENTIALS_FILE);
    path.exists().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::resolve_with(Overrides::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert!(cfg.provider_config().is_none());
        assert_eq!(
            cfg.catalog.source(Layer::Kenya).local_path,
            PathBuf::from("static/data/Kenya.geojson")
        );
    }

    #[test]
    fn test_cli_beats_env() {
        let overrides = Overrides {
            addr: Some("0.0.0.0:8080".into()),
            cache_ttl_secs: Some(5),
            ..Default::default()
        };
        let env = env_of(&[
            ("GEO_EXPLORER_ADDR", "127.0.0.1:1"),
            ("GEO_EXPLORER_CACHE_TTL", "900"),
            ("GEO_EXPLORER_FETCH_TIMEOUT", "7"),
        ]);
        let cfg = ServerConfig::resolve_with(overrides, env).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:8080");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(5));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_layer_overrides_from_env() {
        let env = env_of(&[
            ("GEO_EXPLORER_DATA_DIR", "/srv/geo"),
            ("GEO_EXPLORER_COUNTIES_ASSET", "users/me/counties"),
            ("GEO_EXPLORER_COUNTIES_FILE", "counties.geojson"),
            ("GEO_EXPLORER_KENYA_FILE", "/abs/kenya.json"),
            ("GEO_EXPLORER_PROVIDER_URL", "https://geo.example.com/v1"),
            ("UPLOAD_TOKEN", "tok"),
        ]);
        let cfg = ServerConfig::resolve_with(Overrides::default(), env).unwrap();
        let counties = cfg.catalog.source(Layer::Counties);
        assert_eq!(counties.asset_id, "users/me/counties");
        assert_eq!(counties.local_path, PathBuf::from("/srv/geo/counties.geojson"));
        assert_eq!(
            cfg.catalog.source(Layer::Kenya).local_path,
            PathBuf::from("/abs/kenya.json")
        );
        assert_eq!(cfg.upload_token.as_deref(), Some("tok"));
        assert_eq!(
            cfg.provider_config().unwrap().endpoint,
            "https://geo.example.com/v1"
        );
    }

    #[test]
    fn test_invalid_ttl() {
        let env = env_of(&[("GEO_EXPLORER_CACHE_TTL", "five minutes")]);
        assert!(matches!(
            ServerConfig::resolve_with(Overrides::default(), env),
            Err(ConfigError::InvalidValue { key: "GEO_EXPLORER_CACHE_TTL", .. })
        ));
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let env = env_of(&[("UPLOAD_TOKEN", "  "), ("GEO_EXPLORER_ADDR", "")]);
        let cfg = ServerConfig::resolve_with(Overrides::default(), env).unwrap();
        assert!(cfg.upload_token.is_none());
        assert_eq!(cfg.addr, DEFAULT_ADDR);
    }
}
