//! Tweet lifecycle and interaction endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::domain::{social, social::SocialError, tweets};
use crate::routes::auth::AuthUser;
use crate::services::error::LogErr;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tweets", post(post_tweet))
        .route("/tweets/{id}", axum::routing::delete(delete_tweet))
        .route("/tweets/{id}/like", post(like))
        .route("/tweets/{id}/retweet", post(retweet))
}

#[derive(Deserialize)]
struct PostTweetRequest {
    tweet_text: String,
    #[serde(default)]
    is_private: bool,
}

#[derive(Serialize)]
struct PostTweetResponse {
    id: i64,
}

/// POST /tweets - Publish a tweet
async fn post_tweet(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<PostTweetRequest>,
) -> Result<(StatusCode, Json<PostTweetResponse>), StatusCode> {
    let id = tweets::create_tweet(&state.db, user_id, &req.tweet_text, req.is_private)
        .await
        .log_500("Create tweet error")?;

    Ok((StatusCode::CREATED, Json(PostTweetResponse { id })))
}

/// DELETE /tweets/{id} - Remove one of your own tweets.
/// Someone else's tweet and a missing tweet both 404.
async fn delete_tweet(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(tweet_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let deleted = tweets::delete_tweet(&state.db, user_id, tweet_id)
        .await
        .log_500("Delete tweet error")?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /tweets/{id}/like - Toggle a like on a visible tweet
async fn like(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(tweet_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let liked = match social::toggle_like(&state.db, user_id, tweet_id).await {
        Ok(on) => on,
        Err(SocialError::NotFoundOrForbidden) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(e).log_500("Toggle like error"),
    };

    Ok(Json(json!({ "liked": liked })))
}

/// POST /tweets/{id}/retweet - Toggle a retweet on a visible tweet
async fn retweet(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(tweet_id): Path<i64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let retweeted = match social::toggle_retweet(&state.db, user_id, tweet_id).await {
        Ok(on) => on,
        Err(SocialError::NotFoundOrForbidden) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(e).log_500("Toggle retweet error"),
    };

    Ok(Json(json!({ "retweeted": retweeted })))
}
