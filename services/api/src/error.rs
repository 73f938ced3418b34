use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quarry_common::error::QuarryError;

pub struct ApiError(pub QuarryError);

impl From<QuarryError> for ApiError {
    fn from(err: QuarryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            QuarryError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            QuarryError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
