//! Cookie building utilities for the OAuth flow
//!
//! The state cookie carries only the opaque state token; the durable flow
//! record lives in Postgres. The callback cross-checks the cookie against the
//! `state` query value and clears it unconditionally.

use axum::http::{HeaderValue, StatusCode};

use crate::constants::OAUTH_STATE_TTL_SECS;

/// OAuth state cookie name
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

fn is_dev() -> bool {
    std::env::var("ENV").as_deref() != Ok("prod")
}

/// Build the Set-Cookie header carrying the OAuth state token
pub fn build_oauth_state_cookie(state: &str) -> Result<HeaderValue, StatusCode> {
    let secure = if is_dev() { "" } else { " Secure;" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        OAUTH_STATE_COOKIE, state, secure, OAUTH_STATE_TTL_SECS
    );
    cookie.parse().map_err(|_| {
        eprintln!("Failed to parse OAuth state cookie header");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Build a Set-Cookie header that clears the OAuth state cookie
pub fn build_clear_oauth_state_cookie() -> HeaderValue {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        OAUTH_STATE_COOKIE
    )
    .parse()
    .expect("static cookie string should always parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cookie_attributes() {
        let cookie = build_oauth_state_cookie("abc123").unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("oauth_state=abc123;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=600"));
    }

    #[test]
    fn test_clear_cookie_zeroes_max_age() {
        let value = build_clear_oauth_state_cookie();
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
    }
}
