//! Uploads API
//!
//! Multipart upload (field `file`) and download by stored name.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::api::common::ApiResponse;
use crate::api::middleware::Authenticated;
use crate::error::PlatformError;
use crate::service::{BlobStore, StoredBlob};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub filename: String,
    #[serde(rename = "originalname")]
    pub original_name: String,
    pub upload_path: String,
    pub size: u64,
}

impl From<StoredBlob> for UploadResponse {
    fn from(b: StoredBlob) -> Self {
        Self {
            filename: b.filename,
            original_name: b.original_name,
            upload_path: b.path,
            size: b.size,
        }
    }
}

#[derive(Clone)]
pub struct UploadsState {
    pub blob_store: Arc<dyn BlobStore>,
}

fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Upload a file
#[utoipa::path(
    post,
    path = "",
    tag = "uploads",
    request_body(content_type = "multipart/form-data", description = "Multipart body with a `file` field"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file field in the body")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload(
    State(state): State<UploadsState>,
    _auth: Authenticated,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadResponse>>), PlatformError> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            warn!(error = %e, "Rejected multipart body");
            PlatformError::validation("invalid multipart body")
        })?;
        let Some(field) = field else {
            return Err(PlatformError::validation("missing file"));
        };
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read upload");
            PlatformError::validation("invalid multipart body")
        })?;

        let stored = state.blob_store.put(&original_name, data).await?;
        return Ok(ApiResponse::created(stored.into()));
    }
}

/// Download a stored file
#[utoipa::path(
    get,
    path = "/{filename}",
    tag = "uploads",
    params(
        ("filename" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "No such file")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    State(state): State<UploadsState>,
    _auth: Authenticated,
    Path(filename): Path<String>,
) -> Result<Response, PlatformError> {
    if filename.trim().is_empty() {
        return Err(PlatformError::validation("missing filename"));
    }

    let data = state.blob_store
        .get(&filename)
        .await?
        .ok_or_else(PlatformError::not_found)?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&filename))], data).into_response())
}

pub fn uploads_router(state: UploadsState) -> Router {
    Router::new()
        .route("/", post(upload))
        .route("/:filename", get(get_file))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(content_type_for("1700000000000.PNG"), "image/png");
        assert_eq!(content_type_for("1700000000000.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("1700000000000"), "application/octet-stream");
    }
}
