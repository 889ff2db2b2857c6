//! HTTP REST API.
//!
//! Thin adapter over the resolver and matcher: every handler resolves a
//! layer, optionally looks up a feature, and shapes the JSON response.

pub mod features;
pub mod layers;
pub mod status;
pub mod upload;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use geo_explorer::Layer;

use crate::config::MAX_BODY_BYTES;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router: Router<Arc<AppState>> = Router::new()
        .route("/health", get(status::health))
        .route("/meta", get(status::meta))
        .route("/properties", post(features::properties))
        .route("/download_feature", post(features::download_feature))
        .route("/upload_geojson", post(upload::upload_geojson));

    for layer in Layer::ALL {
        for name in layer.route_names() {
            router = router.route(
                &format!("/get_{name}"),
                get(
                    move |state: State<Arc<AppState>>, params: Query<layers::RefreshParams>| {
                        layers::get_layer(layer, state, params)
                    },
                ),
            );
        }
    }

    router
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
        .into_response()
}

/// Serialize a borrowed value as a JSON response.
pub(crate) fn json_response<T: Serialize + ?Sized>(value: &T) -> ApiResult<Response> {
    let body =
        serde_json::to_vec(value).map_err(|e| ApiError::internal("Failed to encode response", e))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
