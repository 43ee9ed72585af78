use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::core::error::DeckError;

/// Identity every owner-scoped handler acts as.
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub(crate) user_id: String,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let raw_token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let user_id = match raw_token {
        Some(token) => match state.store.resolve_api_token(&token).await {
            Ok(Some(user)) => user.id,
            Ok(None) => {
                return DeckError::Unauthorized("Invalid or unauthorized API token".into())
                    .into_response();
            }
            Err(e) => return DeckError::Internal(e).into_response(),
        },
        // No bearer token: open access only as the configured dev user on loopback.
        None => match (&state.dev_user, state.loopback) {
            (Some(dev_user), true) => dev_user.clone(),
            _ => {
                return DeckError::Unauthorized(
                    "Missing or invalid Authorization header. Use: Bearer <token>".into(),
                )
                .into_response();
            }
        },
    };

    req.extensions_mut().insert(Caller { user_id });
    next.run(req).await
}
