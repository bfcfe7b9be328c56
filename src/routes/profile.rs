//! Own-profile endpoints, including avatar upload

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{tweets, users};
use crate::routes::auth::AuthUser;
use crate::services::error::LogErr;
use crate::storage;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}

#[derive(Serialize)]
struct ProfileResponse {
    user: users::User,
    tweets: Vec<tweets::Tweet>,
}

/// GET /profile - The current user's row and their own tweets
async fn get_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let user = users::get_user(&state.db, user_id)
        .await
        .log_500("Get user error")?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let tweets = tweets::tweets_by_user(&state.db, user_id)
        .await
        .log_500("Profile tweets error")?;

    Ok(Json(ProfileResponse { user, tweets }))
}

/// PUT /profile - Update name, bio, and optionally the avatar.
/// Multipart form with text fields "name" and "bio" and an optional file
/// field "avatar". An upload with an unsupported content type is skipped and
/// the text fields still apply.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let mut name = String::new();
    let mut bio = String::new();
    let mut avatar_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .log_status("Multipart field error", StatusCode::BAD_REQUEST)?
    {
        match field.name() {
            Some("name") => {
                name = field
                    .text()
                    .await
                    .log_status("Multipart name error", StatusCode::BAD_REQUEST)?;
            }
            Some("bio") => {
                bio = field
                    .text()
                    .await
                    .log_status("Multipart bio error", StatusCode::BAD_REQUEST)?;
            }
            Some("avatar") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let Some(extension) = storage::extension_for(&content_type) else {
                    warn!("skipping avatar with unsupported content type {}", content_type);
                    continue;
                };

                let data = field
                    .bytes()
                    .await
                    .log_status("Multipart avatar error", StatusCode::BAD_REQUEST)?;

                let public_path =
                    storage::store_avatar(&state.upload_dir, user_id, extension, &data)
                        .await
                        .log_500("Avatar write error")?;
                avatar_url = Some(public_path);
            }
            _ => {}
        }
    }

    users::update_profile(&state.db, user_id, &name, &bio, avatar_url.as_deref())
        .await
        .log_500("Update profile error")?;

    get_profile(State(state), AuthUser(user_id)).await
}
