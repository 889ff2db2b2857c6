//! Diagnostic endpoints: `/health` and `/meta`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use geo_explorer::Layer;

use crate::config::APP_NAME;
use crate::state::AppState;

fn provider_status(state: &AppState) -> Value {
    let provider = state.resolver.provider();
    json!({
        "ok": provider.is_available(),
        "msg": provider.status(),
    })
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Liveness plus per-layer cache timestamps.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cache: Map<String, Value> = state
        .resolver
        .cache()
        .snapshot()
        .into_iter()
        .map(|entry| {
            let ts = entry
                .cached_at
                .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true)))
                .unwrap_or(Value::Null);
            (entry.layer.to_string(), ts)
        })
        .collect();

    Json(json!({
        "status": "ok",
        "time": now(),
        "uptime_seconds": state.started_at.elapsed().as_secs_f64(),
        "provider": provider_status(&state),
        "cache": cache,
    }))
}

/// Application metadata for clients.
pub async fn meta(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cache = state.resolver.cache();
    let layers: Vec<Value> = Layer::ALL
        .iter()
        .map(|&layer| {
            let source = state.resolver.catalog().source(layer);
            let entry = cache.entry(layer);
            json!({
                "name": layer.as_str(),
                "label": layer.label(),
                "route": format!("/get_{}", layer.route_names()[0]),
                "asset_id": source.asset_id,
                "cached_from": entry.source,
                "features": entry.geojson.as_ref().map(|fc| fc.len()),
            })
        })
        .collect();

    Json(json!({
        "app": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "time": now(),
        "provider": provider_status(&state),
        "cache_ttl_seconds": cache.ttl().as_secs(),
        "layers": layers,
    }))
}
