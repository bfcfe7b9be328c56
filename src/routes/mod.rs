pub mod auth;
pub mod feeds;
pub mod profile;
pub mod tweets;
pub mod users;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(feeds::routes())
        .merge(profile::routes())
        .merge(tweets::routes())
        .merge(users::routes())
}
