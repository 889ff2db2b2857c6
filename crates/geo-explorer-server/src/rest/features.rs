//! Single-feature lookups: `POST /properties` and `POST /download_feature`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use geo_explorer::matcher::{first_match, scalar_text};
use geo_explorer::{Feature, FeatureCollection, GeoError, Layer};

use crate::error::{ApiError, ApiResult};
use crate::filename;
use crate::state::AppState;

/// Parsed body shared by both endpoints.
#[derive(Debug, Clone)]
pub struct FeatureQuery {
    pub layer: Layer,
    pub id_prop: Option<String>,
    pub id_val: Value,
    pub filename: Option<String>,
}

impl FeatureQuery {
    /// Validate a request body. Missing values are checked before the layer
    /// name is interpreted.
    pub fn from_body(body: &Value) -> ApiResult<Self> {
        let Some(obj) = body.as_object() else {
            return Err(ApiError::bad_request("JSON object body required"));
        };

        let layer_name = obj
            .get("layer")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let id_val = obj.get("id_val").filter(|v| is_present(v));

        let (Some(layer_name), Some(id_val)) = (layer_name, id_val) else {
            return Err(ApiError::bad_request("layer and id_val are required"));
        };

        let layer = layer_name.parse::<Layer>().map_err(|_| ApiError::bad_request("Unknown layer"))?;

        Ok(Self {
            layer,
            id_prop: non_empty_str(obj.get("id_prop")),
            id_val: id_val.clone(),
            filename: non_empty_str(obj.get("filename")),
        })
    }

    /// First matching feature in `collection`.
    fn first_in<'a>(&self, collection: &'a FeatureCollection) -> ApiResult<&'a Feature> {
        Ok(first_match(
            self.layer,
            collection,
            self.id_prop.as_deref(),
            &self.id_val,
        )?)
    }

    /// Download name: the explicit hint, else the target value.
    fn download_name(&self) -> String {
        let hint = self
            .filename
            .clone()
            .or_else(|| scalar_text(&self.id_val).map(|t| t.into_owned()))
            .unwrap_or_else(|| "feature".to_string());
        let safe = filename::sanitize(&format!("{hint}.geojson"));
        if safe.is_empty() || safe == "geojson" {
            "feature.geojson".to_string()
        } else {
            safe
        }
    }
}

/// Empty strings, zero, false, null and empty containers count as missing.
/// Whitespace is a value.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_body(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<FeatureQuery> {
    let Json(body) = payload.map_err(|e| {
        tracing::debug!("Rejected body: {e}");
        ApiError::bad_request("JSON body required")
    })?;
    FeatureQuery::from_body(&body)
}

async fn resolve(state: &AppState, query: &FeatureQuery) -> ApiResult<Arc<FeatureCollection>> {
    match state.resolver.resolve(query.layer, false).await {
        Ok(collection) => Ok(collection),
        Err(e @ GeoError::NotAvailable(_)) => Err(e.into()),
        Err(e) => Err(ApiError::internal("Server error", e)),
    }
}

/// Properties and full feature of the first match.
pub async fn properties(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let query = parse_body(payload)?;
    let collection = resolve(&state, &query).await?;
    let feature = query.first_in(&collection)?;

    super::json_response(&json!({
        "properties": feature.properties(),
        "feature": feature,
    }))
}

/// The first match wrapped in its own collection, as an attachment.
pub async fn download_feature(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let query = parse_body(payload)?;
    let collection = resolve(&state, &query).await?;
    let feature = query.first_in(&collection)?;

    let single = FeatureCollection::new(vec![feature.clone()]);
    let body = serde_json::to_vec_pretty(&single)
        .map_err(|e| ApiError::internal("Failed to encode feature", e))?;
    let name = query.download_name();
    tracing::info!("Serving {} feature download as {name}", query.layer);

    Ok((
        [
            (header::CONTENT_TYPE, "application/geo+json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        body,
    )
        .into_response())
}
