//! Cookie building for session management
//!
//! Centralizes Set-Cookie formatting so login, refresh, and logout stay
//! consistent about flags and lifetimes.

use axum::http::{HeaderValue, StatusCode};
use tracing::error;

/// Access token cookie name
pub const ACCESS_TOKEN_NAME: &str = "access_token";
/// Refresh token cookie name
pub const REFRESH_TOKEN_NAME: &str = "refresh_token";

/// Access token max-age in seconds (10 minutes)
const ACCESS_TOKEN_MAX_AGE_SECS: u32 = 600;
/// Refresh token max-age in seconds (30 days)
const REFRESH_TOKEN_MAX_AGE_SECS: u32 = 30 * 24 * 60 * 60;

fn is_dev() -> bool {
    std::env::var("ENV").as_deref() != Ok("prod")
}

fn build(name: &str, value: &str, max_age: u32) -> Result<HeaderValue, StatusCode> {
    let secure = if is_dev() { "" } else { " Secure;" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        name, value, secure, max_age
    );
    cookie.parse().map_err(|_| {
        error!("failed to parse {} cookie header", name);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build an access token Set-Cookie header value
pub fn build_access_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build(ACCESS_TOKEN_NAME, token, ACCESS_TOKEN_MAX_AGE_SECS)
}

/// Build a refresh token Set-Cookie header value
pub fn build_refresh_cookie(token: &str) -> Result<HeaderValue, StatusCode> {
    build(REFRESH_TOKEN_NAME, token, REFRESH_TOKEN_MAX_AGE_SECS)
}

/// Build a Set-Cookie header that clears the named session cookie
pub fn build_clear_cookie(name: &str) -> HeaderValue {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
        .parse()
        .expect("static cookie string should always parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_cookie_shape() {
        let value = build_access_cookie("abc123").expect("cookie");
        let s = value.to_str().expect("ascii");
        assert!(s.starts_with("access_token=abc123;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Max-Age=600"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let s = build_clear_cookie(REFRESH_TOKEN_NAME);
        assert!(s.to_str().expect("ascii").contains("Max-Age=0"));
    }
}
