// Error responses for HTTP handlers
use crate::application::view_service::ViewError;
use crate::domain::error::DecimateError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ViewError> for ApiError {
    fn from(error: ViewError) -> Self {
        let status = match &error {
            ViewError::UnknownFile(_) | ViewError::UnknownView(_) => StatusCode::NOT_FOUND,
            ViewError::Superseded(_) => StatusCode::CONFLICT,
            ViewError::Align { .. }
            | ViewError::Merge(_)
            | ViewError::Decimate(DecimateError::ColumnLength { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ViewError::Decimate(_) => StatusCode::BAD_REQUEST,
            ViewError::Source(_) => StatusCode::BAD_GATEWAY,
            ViewError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{}", error);
        } else {
            tracing::warn!("{}", error);
        }

        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
