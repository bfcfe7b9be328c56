//! Public user views and the follow toggle

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::domain::{social, social::SocialError, tweets, users};
use crate::routes::auth::{AuthUser, MaybeAuthUser};
use crate::services::error::LogErr;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/follow", post(follow))
}

#[derive(Serialize)]
struct UserViewResponse {
    user: users::PublicUser,
    tweets: Vec<tweets::Tweet>,
    following: bool,
}

/// GET /users/{id} - A user's public page: their row (no email) and the
/// tweets the current viewer is allowed to see.
async fn get_user(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<UserViewResponse>, StatusCode> {
    let user = users::get_public_user(&state.db, user_id)
        .await
        .log_500("Get user error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    let tweets = tweets::visible_tweets_by_user(&state.db, viewer, user_id)
        .await
        .log_500("User tweets error")?;

    let following = match viewer {
        Some(viewer_id) => social::is_following(&state.db, viewer_id, user_id)
            .await
            .log_500("Follow lookup error")?,
        None => false,
    };

    Ok(Json(UserViewResponse {
        user,
        tweets,
        following,
    }))
}

/// POST /users/{id}/follow - Toggle following the target user
async fn follow(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(target_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let following = match social::toggle_follow(&state.db, user_id, target_id).await {
        Ok(on) => on,
        Err(SocialError::NotFoundOrForbidden) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(e).log_500("Toggle follow error"),
    };

    Ok(Json(json!({ "following": following })))
}
