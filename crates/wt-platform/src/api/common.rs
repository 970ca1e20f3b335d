//! Common API types and utilities

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::error::{ErrorKind, PlatformError};

/// Success envelope: `{ status: true, message, data }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            status: true,
            message: "OK".to_string(),
            data,
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (
            StatusCode::CREATED,
            Json(Self {
                status: true,
                message: "Created".to_string(),
                data,
            }),
        )
    }
}

/// Error envelope: `{ status: false, error, message }`
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub status: bool,
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: false,
            error: kind.code().to_string(),
            message: message.into(),
        }
    }
}

pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!(error = %self, "Request failed");
        }
        let body = ApiError::new(kind, self.public_message());
        (status_code(kind), Json(body)).into_response()
    }
}

/// JSON request body whose rejections use the error envelope.
///
/// A blank body, or one sent without a JSON content type, reads as
/// `T::default()` so missing fields surface through the handler's own
/// validation instead of a framework rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

fn parse_body<T: DeserializeOwned + Default>(json_content: bool, bytes: &[u8]) -> Result<T, PlatformError> {
    if !json_content || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        debug!(error = %e, "Rejected request body");
        PlatformError::validation("invalid request body")
    })
}

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json_content = is_json_content(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| PlatformError::validation("invalid request body"))?;
        parse_body(json_content, &bytes).map(JsonBody)
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix
pub fn format_time(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fallback for unmatched routes
pub async fn not_found() -> PlatformError {
    PlatformError::not_found()
}
