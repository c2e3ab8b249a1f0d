//! OAuth endpoints (/auth/{platform}, /auth/{platform}/callback)
//!
//! The initiation endpoint 302-redirects to the provider consent screen and
//! sets the state cookie; the callback consumes the flow state, connects the
//! account, and bounces back to the app root with a `connected` or `error`
//! query parameter. The state cookie is cleared on every callback outcome.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{
        StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::AuthUser;
use crate::AppState;
use crate::models::Platform;
use crate::services::social::SocialError;
use crate::services::{cookies, oauth};

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit: stricter for OAuth - 5 requests per minute to prevent abuse
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(12) // Refill rate
        .burst_size(5) // Allow burst of 5 requests, then 1 per 12 seconds
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/auth/{platform}", get(auth_initiate))
        .route("/auth/{platform}/callback", get(auth_callback))
        .layer(rate_limit_layer)
}

/// GET /auth/{platform} - redirect the user to the provider consent screen
async fn auth_initiate(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(platform): Path<String>,
) -> Result<Response, StatusCode> {
    let platform = Platform::parse(&platform).ok_or(StatusCode::BAD_REQUEST)?;
    let client = state.registry.get(platform).map_err(|e| {
        eprintln!("[oauth] {}", e);
        StatusCode::BAD_REQUEST
    })?;

    // Opportunistic GC of abandoned flows
    if let Err(e) = oauth::sweep_expired_states(&state.db).await {
        eprintln!("[oauth] Failed to sweep expired states: {}", e);
    }

    let auth_request = oauth::begin_authorization(client);

    if let Err(e) = oauth::save_flow_state(
        &state.db,
        &auth_request.state,
        platform,
        user_id,
        auth_request.code_verifier.as_deref(),
    )
    .await
    {
        // Redirect anyway - the callback will fail InvalidState if the row
        // isn't there, which beats blocking the user here
        eprintln!("[oauth] Failed to save flow state: {}", e);
    }

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(
        LOCATION,
        auth_request
            .url
            .parse()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
    );
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_oauth_state_cookie(&auth_request.state)?,
    );
    Ok(response)
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /auth/{platform}/callback - finish the flow and bounce to the app
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let Some(platform) = Platform::parse(&platform) else {
        return redirect_to_app(&state.app_url, "error=oauth_failed");
    };

    // The user declined on the provider's consent screen
    if let Some(provider_error) = query.error {
        eprintln!("[oauth] {} consent denied: {}", platform, provider_error);
        return redirect_to_app(&state.app_url, "error=oauth_denied");
    }

    let (Some(code), Some(state_param)) = (query.code, query.state) else {
        return redirect_to_app(&state.app_url, "error=oauth_failed");
    };

    // The state cookie set at initiation must match the callback's state
    match jar.get(cookies::OAUTH_STATE_COOKIE) {
        Some(cookie) if cookie.value() == state_param => {}
        _ => {
            eprintln!("[oauth] {} callback state cookie missing or mismatched", platform);
            return redirect_to_app(&state.app_url, "error=oauth_failed");
        }
    }

    let client = match state.registry.get(platform) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("[oauth] {}", e);
            return redirect_to_app(&state.app_url, "error=oauth_failed");
        }
    };

    match oauth::complete(&state.db, client, platform, &code, &state_param).await {
        Ok(account) => {
            let username = account.platform_username.unwrap_or_default();
            redirect_to_app(
                &state.app_url,
                &format!(
                    "connected={}&username={}",
                    platform,
                    crate::services::social::percent_encode(&username)
                ),
            )
        }
        Err(SocialError::NoBusinessAccount) => {
            redirect_to_app(&state.app_url, "error=no_instagram_business_account")
        }
        Err(e) => {
            eprintln!("[oauth] {} callback failed: {}", platform, e);
            redirect_to_app(&state.app_url, "error=oauth_failed")
        }
    }
}

/// 302 to the application root with the given query string, clearing the
/// state cookie.
fn redirect_to_app(app_url: &str, query: &str) -> Response {
    let location = format!("{}?{}", app_url, query);
    let mut response = StatusCode::FOUND.into_response();
    match location.parse() {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(_) => {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_oauth_state_cookie());
    response
}
