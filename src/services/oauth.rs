//! OAuth flow coordination
//!
//! Correlates the authorization redirect with its callback through a durable,
//! single-use flow-state record keyed by the random `state` token. The state
//! survives across request-handling instances (it lives in Postgres, never in
//! process memory) and the consume is a single atomic DELETE so two racing
//! callbacks produce at most one account upsert.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::social::{SocialClient, SocialError};
use crate::constants::OAUTH_STATE_TTL_SECS;
use crate::domain::accounts;
use crate::models::{OAuthFlowState, Platform, SocialAccount};

/// Everything the initiation endpoint needs: where to send the user and what
/// to persist for the callback.
#[derive(Debug)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: Option<String>,
}

/// Random state token for CSRF protection (32 bytes, base64url)
fn generate_state() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE verifier (32 random bytes, base64url)
fn generate_code_verifier() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge: base64url(SHA-256(verifier))
pub fn derive_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Build the provider authorization URL and the flow state to persist
pub fn begin_authorization(client: &dyn SocialClient) -> AuthorizeRequest {
    let state = generate_state();

    if client.requires_pkce() {
        let verifier = generate_code_verifier();
        let challenge = derive_code_challenge(&verifier);
        AuthorizeRequest {
            url: client.authorize_url(&state, Some(&challenge)),
            state,
            code_verifier: Some(verifier),
        }
    } else {
        AuthorizeRequest {
            url: client.authorize_url(&state, None),
            state,
            code_verifier: None,
        }
    }
}

pub async fn save_flow_state(
    db: &PgPool,
    state: &str,
    platform: Platform,
    user_id: i64,
    code_verifier: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO oauth_flow_states (state, platform, user_id, code_verifier)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(state)
    .bind(platform.as_str())
    .bind(user_id)
    .bind(code_verifier)
    .execute(db)
    .await?;
    Ok(())
}

/// Consume the flow state for this (state, platform) pair.
///
/// Atomic DELETE + RETURNING: two racing callbacks on the same state get at
/// most one row between them, so the state is single-use by construction.
/// The freshness predicate doubles as the TTL check.
pub async fn consume_flow_state(
    db: &PgPool,
    state: &str,
    platform: Platform,
) -> Result<Option<OAuthFlowState>, sqlx::Error> {
    sqlx::query_as(
        r#"
        DELETE FROM oauth_flow_states
        WHERE state = $1
          AND platform = $2
          AND created_at > NOW() - ($3::text || ' seconds')::interval
        RETURNING state, platform, user_id, code_verifier, created_at
        "#,
    )
    .bind(state)
    .bind(platform.as_str())
    .bind(OAUTH_STATE_TTL_SECS)
    .fetch_optional(db)
    .await
}

/// Garbage-collect flow states that were never consumed
pub async fn sweep_expired_states(db: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM oauth_flow_states
        WHERE created_at <= NOW() - ($1::text || ' seconds')::interval
        "#,
    )
    .bind(OAUTH_STATE_TTL_SECS)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Complete the flow: consume the state, exchange the code, resolve the
/// identity, and upsert the account.
pub async fn complete(
    db: &PgPool,
    client: &dyn SocialClient,
    platform: Platform,
    code: &str,
    state: &str,
) -> Result<SocialAccount, SocialError> {
    let flow = consume_flow_state(db, state, platform)
        .await?
        .ok_or(SocialError::InvalidState)?;

    let grant = client
        .exchange_code(code, flow.code_verifier.as_deref())
        .await?;

    let identity = client.fetch_identity(&grant.access_token).await?;

    let expires_at: Option<DateTime<Utc>> = grant
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs));

    let account = accounts::upsert_account(
        db,
        flow.user_id,
        platform,
        &identity,
        &grant.access_token,
        grant.refresh_token.as_deref(),
        expires_at,
    )
    .await?;

    println!(
        "[oauth] Connected {} account {} for user {}",
        platform, account.platform_user_id, flow.user_id
    );

    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::social::test_support::MockClient;

    #[test]
    fn test_state_has_32_bytes_of_entropy() {
        let state = generate_state();
        // 32 bytes base64url without padding is 43 chars
        assert_eq!(state.len(), 43);
        assert_ne!(state, generate_state());
    }

    #[test]
    fn test_code_challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            derive_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_begin_authorization_embeds_state() {
        let client = MockClient {
            platform: Platform::LinkedIn,
            publish_result: Ok("1".into()),
        };
        let req = begin_authorization(&client);
        assert!(req.url.contains(&format!("state={}", req.state)));
        assert!(req.code_verifier.is_none());
    }
}
