use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures of the map client's outbound lookups (reverse geocode, accident area).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error (status {status}) from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Malformed response: missing `{0}`")]
    Missing(&'static str),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum OverpassError {
    #[error("Overpass request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Overpass returned status {0}")]
    Status(u16),
}

#[derive(Debug, Error, PartialEq)]
pub enum AreaError {
    #[error("Way has {0} distinct node(s); at least 2 are needed to build an area")]
    Degenerate(usize),

    #[error("extension_meters must be a finite, non-negative distance, got {0}")]
    InvalidExtension(f64),
}

/// Errors returned by the HTTP handlers, rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Way not found or has no coordinates")]
    WayNotFound,

    #[error(transparent)]
    Upstream(#[from] OverpassError),

    #[error(transparent)]
    Area(#[from] AreaError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::WayNotFound => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Area(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
