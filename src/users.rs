use std::sync::Arc;

use axum::{
    Router, debug_handler,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    ApiResponse, AppResult, AppState,
    auth::CurrentUser,
    db::{self, Profile},
    dispatch::Dispatcher,
    error::ChatError,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(profile))
        .route("/{user_id}/presence", get(user_presence))
}

#[debug_handler(state = AppState)]
async fn profile(
    Path(user_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    _: CurrentUser,
) -> AppResult<ApiResponse<Profile>> {
    let profile = db::users::find_profile(&db_pool, user_id)
        .await?
        .ok_or(ChatError::NotFound("User not found"))?;
    Ok(ApiResponse::ok("User retrieved successfully", profile))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserPresence {
    user_id: Uuid,
    online: bool,
}

#[debug_handler(state = AppState)]
async fn user_presence(
    Path(user_id): Path<Uuid>,
    State(hub): State<Arc<Dispatcher>>,
    _: CurrentUser,
) -> ApiResponse<UserPresence> {
    let online = hub.presence().is_online(user_id);
    ApiResponse::ok("Presence retrieved successfully", UserPresence { user_id, online })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OnlineCount {
    online_count: usize,
}

#[debug_handler(state = AppState)]
pub(crate) async fn online_count(State(hub): State<Arc<Dispatcher>>) -> ApiResponse<OnlineCount> {
    ApiResponse::ok(
        "Presence retrieved successfully",
        OnlineCount {
            online_count: hub.presence().count(),
        },
    )
}
