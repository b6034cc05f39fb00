//! Presence handler.

use std::time::Instant;

use axum::extract::State;

use parley_types::session::OnlineUser;

use crate::http::extractors::auth::AuthUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/presence - Users currently holding a session.
pub async fn online_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResponse<Vec<OnlineUser>> {
    let start = Instant::now();
    ApiResponse::list(state.gateway.online_users(), start)
}
