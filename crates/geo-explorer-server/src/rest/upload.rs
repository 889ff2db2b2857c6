//! `POST /upload_geojson`: replace a local fallback file.
//!
//! Multipart fields: `file` (required), `save_as` (target name, defaults to
//! the uploaded name) and `token` (checked when an upload token is
//! configured). A successful upload clears every cached layer so the new
//! file takes effect on the next request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::response::Response;
use serde_json::json;

use geo_explorer::LocalStore;

use crate::error::{ApiError, ApiResult};
use crate::filename;
use crate::state::AppState;

/// Extensions accepted for uploaded files.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["json", "geojson"];

#[derive(Default)]
struct UploadForm {
    token: Option<String>,
    save_as: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
                form.file = Some((file_name, bytes.to_vec()));
            }
            "token" | "save_as" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read {name}: {e}")))?;
                if name == "token" {
                    form.token = Some(text);
                } else {
                    form.save_as = Some(text).filter(|s| !s.trim().is_empty());
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

fn check_extension(name: &str) -> ApiResult<()> {
    match filename::extension(name) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ApiError::bad_request("unsupported extension")),
    }
}

pub async fn upload_geojson(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let multipart = multipart.map_err(|_| ApiError::bad_request("no file part"))?;
    let form = read_form(multipart).await?;

    if let Some(expected) = &state.config.upload_token {
        if form.token.as_deref() != Some(expected.as_str()) {
            tracing::warn!("Rejected upload with invalid token");
            return Err(ApiError::Unauthorized);
        }
    }

    let Some((original_name, bytes)) = form.file else {
        return Err(ApiError::bad_request("no file part"));
    };
    if original_name.trim().is_empty() {
        return Err(ApiError::bad_request("no selected file"));
    }

    let uploaded = filename::sanitize(&original_name);
    check_extension(&uploaded)?;

    let target = filename::sanitize(form.save_as.as_deref().unwrap_or(&uploaded));
    check_extension(&target)?;

    let data_dir = &state.config.data_dir;
    let save_path = data_dir.join(&target);
    LocalStore::parse(&save_path, &bytes).map_err(|e| {
        tracing::debug!("Rejected upload {original_name}: {e}");
        ApiError::bad_request(format!("invalid GeoJSON: {e}"))
    })?;

    write_atomic(data_dir, &save_path, &bytes)
        .await
        .map_err(|e| ApiError::internal("server error", e))?;

    state.resolver.invalidate_all();
    tracing::info!("Uploaded file saved to {}", save_path.display());

    super::json_response(&json!({
        "status": "ok",
        "path": save_path.display().to_string(),
    }))
}

/// Write through a temporary file in the same directory, then rename.
async fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let tmp: PathBuf = dir.join(format!(".upload-{}.tmp", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_check() {
        assert!(check_extension("Kenya.geojson").is_ok());
        assert!(check_extension("counties.JSON").is_ok());
        assert!(check_extension("shape.shp").is_err());
        assert!(check_extension("noext").is_err());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data").join("Kenya.geojson");
        write_atomic(&dir.path().join("data"), &target, b"old").await.unwrap();
        write_atomic(&dir.path().join("data"), &target, b"new").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        let leftovers = std::fs::read_dir(dir.path().join("data")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
