//! Local GeoJSON fallback files.

use std::io::ErrorKind;
use std::path::Path;

use crate::types::{FeatureCollection, GeoError, GeoResult};

/// Reader for the local fallback files.
pub struct LocalStore;

impl LocalStore {
    /// Read a feature collection from a file.
    ///
    /// Missing files and documents that are not a feature collection both
    /// surface as [`GeoError::LocalRead`].
    pub async fn read(path: &Path) -> GeoResult<FeatureCollection> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Local file not found: {}", path.display());
                return Err(local_error(path, "file not found"));
            }
            Err(e) => {
                tracing::error!("Failed to read {}: {e}", path.display());
                return Err(local_error(path, e));
            }
        };
        Self::parse(path, &bytes).inspect_err(|e| tracing::error!("{e}"))
    }

    /// Parse a feature collection from raw bytes read from `path`.
    ///
    /// Does not log; callers decide how loud a bad document is.
    pub fn parse(path: &Path, bytes: &[u8]) -> GeoResult<FeatureCollection> {
        let collection: FeatureCollection =
            serde_json::from_slice(bytes).map_err(|e| local_error(path, e))?;

        if !collection.tag_is_consistent() {
            let kind = collection.kind.unwrap_or_default();
            return Err(local_error(
                path,
                format!("type {kind:?} is not a FeatureCollection"),
            ));
        }

        Ok(collection)
    }
}

fn local_error(path: &Path, reason: impl ToString) -> GeoError {
    GeoError::LocalRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
