use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::core::error::DeckError;

/// `Json` whose rejections (bad syntax, missing fields, unknown variants)
/// surface as `DeckError::Validation` inside the standard envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(DeckError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for DeckError {
    fn from(rejection: JsonRejection) -> Self {
        DeckError::validation(rejection.body_text())
    }
}

impl DeckError {
    fn status(&self) -> StatusCode {
        match self {
            DeckError::NotFound(_) => StatusCode::NOT_FOUND,
            DeckError::Validation(_) => StatusCode::BAD_REQUEST,
            DeckError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DeckError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DeckError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self);
        }
        (
            status,
            Json(serde_json::json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
