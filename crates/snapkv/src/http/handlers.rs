//! HTTP request handlers for the key-value endpoints.
//!
//! Handlers only translate between HTTP and [`Store`](crate::Store) calls.
//! Bodies are read before the store lock is taken, so no lock is held while a
//! client is slow to send.

use crate::server::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `POST /set`.
///
/// Absent fields decode as empty strings; an empty key is rejected.
#[derive(Debug, Deserialize)]
pub struct SetRequest {
    /// Key to write
    #[serde(default)]
    pub key: String,
    /// Value to store
    #[serde(default)]
    pub value: String,
}

/// Query of `GET /get`.
#[derive(Debug, Deserialize)]
pub struct GetParams {
    /// Key to look up
    pub key: Option<String>,
}

/// Response of `POST /set`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always `"OK"`
    pub status: &'static str,
}

/// Response of `GET /get`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetResponse {
    /// Requested key
    pub key: String,
    /// Stored value
    pub value: String,
}

/// Response of `GET /count`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountResponse {
    /// Number of distinct keys
    pub count: usize,
}

/// Handle POST /set.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` for an unreadable body, invalid JSON or a
/// missing key.
pub async fn handle_set(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let body = body.map_err(|e| {
        tracing::debug!("Failed to read /set body: {e}");
        ApiError::BadRequest("Error reading request body")
    })?;

    let request: SetRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Invalid /set body: {e}");
        ApiError::BadRequest("Error parsing JSON")
    })?;

    if request.key.is_empty() {
        return Err(ApiError::BadRequest("Missing key"));
    }

    state.store().set(request.key, request.value);
    Ok(Json(StatusResponse { status: "OK" }))
}

/// Handle GET /get?key=...
///
/// # Errors
///
/// Returns `ApiError::BadRequest` without a key, `ApiError::NotFound` if the
/// key is absent.
pub async fn handle_get(
    State(state): State<Arc<AppState>>,
    params: Result<Query<GetParams>, QueryRejection>,
) -> Result<Json<GetResponse>, ApiError> {
    let key = params
        .ok()
        .and_then(|Query(params)| params.key)
        .filter(|key| !key.is_empty())
        .ok_or(ApiError::BadRequest("Missing key"))?;

    let value = state.store().get(&key).ok_or(ApiError::NotFound)?;
    Ok(Json(GetResponse { key, value }))
}

/// Handle GET /count.
pub async fn handle_count(State(state): State<Arc<AppState>>) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.store().count(),
    })
}

/// Fallback for unsupported methods on a known route.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Application-level error type for HTTP handlers.
///
/// Rendered as `{"error": "<message>"}` with the matching status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// Malformed request (400)
    BadRequest(&'static str),
    /// Key not present (404)
    NotFound,
    /// Wrong method for the route (405)
    MethodNotAllowed,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Message placed in the `error` field.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::BadRequest(msg) => msg,
            Self::NotFound => "Key not found",
            Self::MethodNotAllowed => "Method not allowed",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorBody {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
