//! Geo Explorer server: boundary GeoJSON layers over HTTP.

pub mod config;
pub mod error;
pub mod filename;
pub mod logging;
pub mod rest;
pub mod state;

pub use config::{Overrides, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use rest::router;
pub use state::AppState;
