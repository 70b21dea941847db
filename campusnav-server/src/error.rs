use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campusnav_core::Error;
use serde_json::json;

use crate::session::SessionId;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownSession(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Core(error) => match error {
                Error::UnknownNode(_)
                | Error::UnknownBuilding(_)
                | Error::UnknownFloor { .. }
                | Error::NoPathFound { .. }
                | Error::NoRoutesFound => StatusCode::NOT_FOUND,
                Error::FetchFailed(_) | Error::MissingPolyline => StatusCode::BAD_GATEWAY,
                Error::NoShuttleAvailable => StatusCode::CONFLICT,
                Error::InvalidData(_) | Error::DuplicateNode(_) => StatusCode::BAD_REQUEST,
                Error::GeoJsonError(_) | Error::IoError(_) | Error::JsonError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
