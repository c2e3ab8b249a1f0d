//! Token lifecycle management
//!
//! Decides when an account's access token must be refreshed, runs the
//! platform's refresh operation, and persists the result. A failed refresh
//! never falls back to the stale token.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use super::social::{SocialClient, SocialError};
use crate::constants::TOKEN_EXPIRY_LEEWAY_SECS;
use crate::domain::accounts;
use crate::models::SocialAccount;

/// A token with no recorded expiry is treated as non-expiring. One expiring
/// within the leeway window (or already expired) must be refreshed.
pub fn needs_refresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        None => false,
        Some(t) => t <= now + Duration::seconds(TOKEN_EXPIRY_LEEWAY_SECS),
    }
}

/// Return a usable access token for the account, refreshing and persisting
/// first when the current one is within the expiry window.
pub async fn ensure_valid_token(
    db: &PgPool,
    client: &dyn SocialClient,
    account: &SocialAccount,
) -> Result<String, SocialError> {
    if !needs_refresh(account.token_expires_at, Utc::now()) {
        return Ok(account.access_token.clone());
    }

    // Twitter/LinkedIn present a refresh token; Facebook/Instagram re-run the
    // long-lived exchange on the current access token instead.
    let refresh_source = match &account.refresh_token {
        Some(token) => token.as_str(),
        None if client.refreshes_with_access_token() => account.access_token.as_str(),
        None => return Err(SocialError::RefreshUnavailable),
    };

    let grant = client.refresh_token(refresh_source).await?;

    let expires_at = grant
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs));

    // Keep the old refresh token when the provider omits one from the response
    accounts::update_account_tokens(
        db,
        account.id,
        &grant.access_token,
        grant.refresh_token.as_deref(),
        expires_at,
    )
    .await?;

    println!(
        "[tokens] Refreshed {} token for account {}",
        account.platform, account.id
    );

    Ok(grant.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_expiry_never_refreshes() {
        assert!(!needs_refresh(None, Utc::now()));
    }

    #[test]
    fn test_expiry_within_window_refreshes() {
        let now = Utc::now();
        // 2 minutes out: inside the 5-minute leeway
        assert!(needs_refresh(Some(now + Duration::minutes(2)), now));
        // Already expired
        assert!(needs_refresh(Some(now - Duration::minutes(1)), now));
    }

    #[test]
    fn test_expiry_outside_window_does_not_refresh() {
        let now = Utc::now();
        assert!(!needs_refresh(Some(now + Duration::minutes(10)), now));
    }
}
