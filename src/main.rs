mod config;
mod db;
mod domain;
mod routes;
mod services;
mod storage;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;

pub struct AppState {
    pub db: SqlitePool,
    pub jwt_secret: Vec<u8>,
    pub upload_dir: PathBuf,
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();

    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::init_schema(&pool).await.expect("Failed to apply schema");

    if let Err(e) = services::session::cleanup_expired_tokens(&pool).await {
        error!("Refresh token cleanup failed: {}", e);
    }

    let upload_dir = PathBuf::from(&config.upload_dir);
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .expect("Failed to create upload directory");

    let state = Arc::new(AppState {
        db: pool,
        jwt_secret: config.jwt_secret,
        upload_dir: upload_dir.clone(),
    });

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::build_routes())
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    info!("Listening on http://{}", addr);
    // ConnectInfo gives the rate limiter a peer address to key on
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed");
}
