use axum::{
    Json,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use itemboard_types::api::Claims;
use itemboard_types::models::Role;

use crate::error::{ApiError, ErrorDetail};
use crate::state::AppState;
use crate::tokens::{self, TokenKind};

/// Extract and validate the access token from the Authorization header.
/// On success the verified `Claims` are available to handlers as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized("No token provided"))?;

    let claims = tokens::verify(&state.config, TokenKind::Access, token)
        .ok_or(ApiError::Unauthorized("Invalid token"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub async fn require_editor_or_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let role = verified_role(&req)?;
    if !role.can_edit() {
        return Err(ApiError::Forbidden("Editor or admin access required"));
    }
    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    if verified_role(&req)? != Role::Admin {
        return Err(ApiError::Forbidden("Admin access required"));
    }
    Ok(next.run(req).await)
}

/// Role from the verified token. Request bodies are never consulted.
fn verified_role(req: &Request) -> Result<Role, ApiError> {
    req.extensions()
        .get::<Claims>()
        .map(|c| c.role)
        .ok_or(ApiError::Unauthorized("Unauthorized"))
}

/// Outside production, rewrite internal error responses to include the
/// cause chain under `stack`.
pub async fn expose_error_detail(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    if state.config.production {
        return response;
    }

    match response.extensions_mut().remove::<ErrorDetail>() {
        Some(detail) => (
            response.status(),
            Json(json!({ "error": detail.message, "stack": detail.stack })),
        )
            .into_response(),
        None => response,
    }
}
