//! Registration, login, and session endpoints

use axum::{
    extract::{FromRequestParts, State},
    http::{header::SET_COOKIE, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing::error;

use crate::domain::users::{self, IdentityError};
use crate::services::error::LogErr;
use crate::services::{cookies, password, session};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit credential endpoints to slow down brute force attempts
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .layer(rate_limit_layer)
}

// ============================================================================
// Auth extractors - resolve the current user from the access token cookie
// ============================================================================

/// Extractor that validates the access_token cookie and returns the user_id
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                error!("Cookie extraction error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        let access_token = jar
            .get(cookies::ACCESS_TOKEN_NAME)
            .map(|c| c.value())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let user_id = session::validate_access_token(access_token, &state.jwt_secret)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser(user_id))
    }
}

/// Like [`AuthUser`], but anonymous requests pass through as `None` instead
/// of being rejected. Used by endpoints that serve both.
pub struct MaybeAuthUser(pub Option<i64>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let viewer = match AuthUser::from_request_parts(parts, state).await {
            Ok(AuthUser(id)) => Some(id),
            Err(_) => None,
        };
        Ok(MaybeAuthUser(viewer))
    }
}

// ============================================================================
// Credential endpoints
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    email: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: i64,
    username: String,
}

/// POST /auth/register - Create an account
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), StatusCode> {
    if req.username.is_empty() || req.password.is_empty() || req.email.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let hash = password::hash_password(&req.password).log_500("Password hashing error")?;

    let id = match users::create_user(&state.db, &req.username, &req.email, &hash).await {
        Ok(id) => id,
        Err(IdentityError::DuplicateIdentity) => return Err(StatusCode::CONFLICT),
        Err(e) => return Err(e).log_500("Create user error"),
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id,
            username: req.username,
        }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user_id: i64,
    username: String,
}

/// POST /auth/login - Check credentials and establish a session
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, StatusCode> {
    let user_id = match users::authenticate(&state.db, &req.username, &req.password).await {
        Ok(id) => id,
        Err(IdentityError::InvalidCredential) => return Err(StatusCode::UNAUTHORIZED),
        Err(e) => return Err(e).log_500("Authenticate error"),
    };

    let access_token =
        session::create_access_token(user_id, &state.jwt_secret).log_500("Access token error")?;
    let refresh_token = session::create_refresh_token(user_id, &state.db)
        .await
        .log_500("Refresh token error")?;

    let mut response = Json(LoginResponse {
        user_id,
        username: req.username,
    })
    .into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_access_cookie(&access_token)?);
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_refresh_cookie(&refresh_token)?);

    Ok(response)
}

/// POST /auth/refresh - Refresh the access token using the refresh token cookie.
/// Implements refresh token rotation: the old token is invalidated, a new one issued.
async fn refresh_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, StatusCode> {
    let old_refresh_token = jar
        .get(cookies::REFRESH_TOKEN_NAME)
        .map(|c| c.value().to_string())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Invalid or expired tokens are routine for stale sessions, so no logging
    let (user_id, new_refresh_token) =
        session::rotate_refresh_token(&old_refresh_token, &state.db)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let access_token =
        session::create_access_token(user_id, &state.jwt_secret).log_500("Access token error")?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_access_cookie(&access_token)?);
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_refresh_cookie(&new_refresh_token)?,
    );

    Ok(response)
}

/// POST /auth/logout - Revoke the refresh token and clear session cookies
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(refresh_token) = jar.get(cookies::REFRESH_TOKEN_NAME) {
        if let Err(e) = session::revoke_refresh_token(refresh_token.value(), &state.db).await {
            // The user still ends up logged out client-side
            error!("Failed to revoke refresh token during logout: {}", e);
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_clear_cookie(cookies::ACCESS_TOKEN_NAME),
    );
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_clear_cookie(cookies::REFRESH_TOKEN_NAME),
    );

    response
}

/// GET /auth/me - Current user for a valid session
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<users::User>, StatusCode> {
    let user = users::get_user(&state.db, user_id)
        .await
        .log_500("Get user error")?;

    // A valid token for a vanished user is still unauthorized
    let user = user.ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(user))
}
