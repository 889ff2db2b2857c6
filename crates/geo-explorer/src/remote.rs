//! Remote geospatial provider.
//!
//! The resolver only sees the [`RemoteProvider`] capability: whether the
//! provider came up at startup, and a fetch-by-asset-id operation. When the
//! provider cannot be constructed a [`NoopProvider`] stands in for it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::{FeatureCollection, ProviderError};

/// Retries for 5xx responses and transport errors.
const MAX_RETRIES: u32 = 2;

const DEFAULT_CREDENTIALS_STATUS: &str = "Initialized provider with default credentials";

/// A source of feature collections keyed by asset identifier.
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Whether startup initialization succeeded.
    fn is_available(&self) -> bool;
    /// Human-readable initialization status.
    fn status(&self) -> String;
    /// Fetch the collection stored under `asset_id`.
    async fn fetch(&self, asset_id: &str) -> Result<FeatureCollection, ProviderError>;
}

/// Stand-in used when no remote provider could be initialized.
pub struct NoopProvider {
    reason: String,
}

impl NoopProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RemoteProvider for NoopProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn status(&self) -> String {
        self.reason.clone()
    }

    async fn fetch(&self, _asset_id: &str) -> Result<FeatureCollection, ProviderError> {
        Err(ProviderError::NotInitialized(self.reason.clone()))
    }
}

/// Settings for [`HttpProvider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL; assets are fetched from `{endpoint}/{asset_id}`.
    pub endpoint: String,
    /// Service account JSON holding `client_email` and `token`.
    pub credentials_path: Option<PathBuf>,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct ServiceAccount {
    client_email: Option<String>,
    token: Option<String>,
}

/// Provider that serves assets as GeoJSON over HTTP.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    status: String,
}

impl HttpProvider {
    /// Initialize the provider: validate the endpoint and load credentials.
    pub fn connect(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(ProviderError::NotInitialized(
                "no provider endpoint configured".to_string(),
            ));
        }
        reqwest::Url::parse(&endpoint).map_err(|e| {
            ProviderError::NotInitialized(format!("invalid provider endpoint {endpoint}: {e}"))
        })?;

        let (token, status) = match config.credentials_path.as_deref().map(load_service_account) {
            Some(Ok(ServiceAccount {
                client_email,
                token: Some(token),
            })) => {
                let who = client_email.unwrap_or_else(|| "(unnamed)".to_string());
                (
                    Some(token),
                    format!("Initialized provider with service account {who}"),
                )
            }
            Some(Ok(_)) => {
                tracing::warn!(
                    "Service account key carries no bearer token, using default credentials"
                );
                (None, DEFAULT_CREDENTIALS_STATUS.to_string())
            }
            Some(Err(e)) => {
                tracing::warn!("Service account init failed, using default credentials: {e}");
                (None, DEFAULT_CREDENTIALS_STATUS.to_string())
            }
            None => (None, DEFAULT_CREDENTIALS_STATUS.to_string()),
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("geo-explorer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::info!("{status} ({endpoint})");

        Ok(Self {
            client,
            endpoint,
            token,
            status,
        })
    }

    fn asset_url(&self, asset_id: &str) -> String {
        format!("{}/{}", self.endpoint, asset_id.trim_start_matches('/'))
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let mut retries = 0u32;
        loop {
            let mut request = self.client.get(url);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(resp) if resp.status().is_server_error() && retries < MAX_RETRIES => {
                    tracing::debug!("{url} returned {}, retrying", resp.status());
                }
                Ok(resp) => return Ok(resp),
                Err(e) if retries < MAX_RETRIES && !e.is_timeout() => {
                    tracing::debug!("{url} failed: {e}, retrying");
                }
                Err(e) => return Err(e.into()),
            }

            retries += 1;
            let delay = Duration::from_millis(250 * 2u64.pow(retries - 1));
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteProvider for HttpProvider {
    fn is_available(&self) -> bool {
        true
    }

    fn status(&self) -> String {
        self.status.clone()
    }

    async fn fetch(&self, asset_id: &str) -> Result<FeatureCollection, ProviderError> {
        let url = self.asset_url(asset_id);
        let resp = self.get_with_retry(&url).await?;

        let status = resp.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => return Err(ProviderError::Auth(status)),
            _ => {
                return Err(ProviderError::Status {
                    status,
                    asset_id: asset_id.to_string(),
                })
            }
        }

        let body = resp.bytes().await?;
        let collection: FeatureCollection = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Malformed(format!("{asset_id}: {e}")))?;

        if !collection.has_collection_tag() {
            return Err(ProviderError::Malformed(format!(
                "{asset_id}: expected type FeatureCollection, got {:?}",
                collection.kind
            )));
        }

        Ok(collection)
    }
}

fn load_service_account(path: &Path) -> Result<ServiceAccount, ProviderError> {
    let raw = std::fs::read(path)
        .map_err(|e| ProviderError::Credentials(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&raw)
        .map_err(|e| ProviderError::Credentials(format!("{}: {e}", path.display())))
}
