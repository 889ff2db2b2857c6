//! HTTP-facing errors and their JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use geo_explorer::GeoError;

/// All errors a handler can return.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid upload token")]
    Unauthorized,

    #[error("Feature not found")]
    FeatureNotFound { layer: String, id_val: Value },

    #[error("{0}")]
    Unavailable(String),

    #[error("{context}")]
    Internal { context: String, details: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    /// Wrap an unexpected failure with a short description of what failed.
    pub fn internal(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            context: context.into(),
            details: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::FeatureNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::FeatureNotFound { layer, id_val } => json!({
                "error": self.to_string(),
                "layer": layer,
                "id_val": id_val,
            }),
            ApiError::Internal { context, details } => json!({
                "error": context,
                "details": details,
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl From<GeoError> for ApiError {
    fn from(e: GeoError) -> Self {
        match e {
            GeoError::Validation(msg) => ApiError::BadRequest(msg),
            GeoError::NotFound { layer, value } => ApiError::FeatureNotFound {
                layer: layer.to_string(),
                id_val: value,
            },
            e @ GeoError::NotAvailable(_) => ApiError::Unavailable(e.to_string()),
            other => ApiError::internal("Server error", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{status}: {self:?}");
        }
        (status, Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
