//! Feed, search, and explore endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{social, tweets, users};
use crate::routes::auth::AuthUser;
use crate::services::error::LogErr;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // The index listing is the global feed
        .route("/", get(global))
        .route("/feed/global", get(global))
        .route("/feed/timeline", get(timeline))
        .route("/feed/public", get(public))
        .route("/search", get(search))
        .route("/explore", get(explore))
}

/// GET /feed/global - Every tweet, newest first, privacy ignored
async fn global(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<tweets::FeedTweet>>, StatusCode> {
    let feed = tweets::global_feed(&state.db)
        .await
        .log_500("Global feed error")?;
    Ok(Json(feed))
}

/// GET /feed/timeline - Your tweets and those of people you follow
async fn timeline(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<tweets::FeedTweet>>, StatusCode> {
    let feed = tweets::personal_timeline(&state.db, user_id)
        .await
        .log_500("Timeline error")?;
    Ok(Json(feed))
}

/// GET /feed/public - Public tweets only
async fn public(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<tweets::FeedTweet>>, StatusCode> {
    let feed = tweets::public_feed(&state.db)
        .await
        .log_500("Public feed error")?;
    Ok(Json(feed))
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    users: Vec<users::PublicUser>,
    tweets: Vec<tweets::FeedTweet>,
}

/// GET /search?q= - Users by username substring, tweets by text substring
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let users = users::search_users(&state.db, &params.q)
        .await
        .log_500("User search error")?;
    let tweets = tweets::search_tweets(&state.db, &params.q)
        .await
        .log_500("Tweet search error")?;

    Ok(Json(SearchResponse { users, tweets }))
}

#[derive(Serialize)]
struct ExploreResponse {
    trending_topics: Vec<social::TrendingTopic>,
    popular_users: Vec<users::PopularUser>,
}

/// GET /explore - Top trending topics and most-followed users
async fn explore(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExploreResponse>, StatusCode> {
    let trending_topics = social::trending_topics(&state.db)
        .await
        .log_500("Trending topics error")?;
    let popular_users = users::popular_users(&state.db)
        .await
        .log_500("Popular users error")?;

    Ok(Json(ExploreResponse {
        trending_topics,
        popular_users,
    }))
}
