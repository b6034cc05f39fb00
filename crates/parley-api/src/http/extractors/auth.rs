//! Bearer-credential authentication extractor.
//!
//! Reads `Authorization: Bearer <token>` and verifies it with the identity
//! service the WebSocket endpoint uses.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use parley_core::identity::IdentityService;
use parley_core::timeout::within;
use parley_types::error::GatewayError;
use parley_types::identity::Identity;

use crate::http::error::AppError;
use crate::state::AppState;

/// The verified caller of an HTTP request.
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or_else(|| {
            AppError::Unauthorized(
                "Missing credential. Provide via 'Authorization: Bearer <token>' header."
                    .to_string(),
            )
        })?;

        let identity = within(
            state.config.collaborator_timeout(),
            "credential verification",
            state.identity.verify(&token),
        )
        .await?
        .map_err(GatewayError::from)?;

        Ok(AuthUser(identity))
    }
}

/// The bearer token from the `Authorization` header, if one is present.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(auth) = headers.get("authorization") else {
        return Ok(None);
    };
    let auth_str = auth.to_str().map_err(|_| {
        AppError::Unauthorized("Invalid Authorization header encoding".to_string())
    })?;
    Ok(auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string))
}
