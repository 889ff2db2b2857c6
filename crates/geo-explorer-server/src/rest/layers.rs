//! `GET /get_<layer>`: whole-layer GeoJSON.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use geo_explorer::{GeoError, Layer};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RefreshParams {
    refresh: Option<String>,
}

impl RefreshParams {
    /// Only `refresh=1` forces a refetch.
    pub fn force(&self) -> bool {
        self.refresh.as_deref().map(str::trim) == Some("1")
    }
}

pub async fn get_layer(
    layer: Layer,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> ApiResult<Response> {
    match state.resolver.resolve(layer, params.force()).await {
        Ok(collection) => super::json_response(collection.as_ref()),
        Err(e @ GeoError::NotAvailable(_)) => Err(e.into()),
        Err(e) => Err(ApiError::internal(
            format!("Server error fetching {}", layer.label().to_lowercase()),
            e,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_flag() {
        let p = |v: Option<&str>| RefreshParams {
            refresh: v.map(String::from),
        };
        assert!(p(Some("1")).force());
        assert!(!p(Some("0")).force());
        assert!(!p(Some("true")).force());
        assert!(!p(None).force());
    }
}
