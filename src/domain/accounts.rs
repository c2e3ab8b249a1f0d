//! Social account domain - DB queries for connected accounts
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` and `&mut PgConnection` (transactions).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

use crate::models::{Platform, SocialAccount};
use crate::services::social::PlatformIdentity;

const ACCOUNT_COLUMNS: &str = "id, user_id, platform, platform_user_id, platform_username, \
     access_token, refresh_token, token_expires_at, page_id, page_access_token, \
     created_at, updated_at";

/// Upsert on (user, platform, platform_user_id): reconnecting the same
/// external identity updates the record instead of duplicating it. The access
/// token is always overwritten; the refresh token only when the provider
/// returned one; username and page identity unconditionally.
pub async fn upsert_account<'e, E>(
    executor: E,
    user_id: i64,
    platform: Platform,
    identity: &PlatformIdentity,
    access_token: &str,
    refresh_token: Option<&str>,
    token_expires_at: Option<DateTime<Utc>>,
) -> Result<SocialAccount, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (page_id, page_access_token) = match &identity.page {
        Some(page) => (Some(page.id.as_str()), Some(page.access_token.as_str())),
        None => (None, None),
    };

    let query = format!(
        r#"
        INSERT INTO social_accounts (
            user_id, platform, platform_user_id, platform_username,
            access_token, refresh_token, token_expires_at,
            page_id, page_access_token
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (user_id, platform, platform_user_id)
        DO UPDATE SET
            platform_username = EXCLUDED.platform_username,
            access_token = EXCLUDED.access_token,
            refresh_token = COALESCE(EXCLUDED.refresh_token, social_accounts.refresh_token),
            token_expires_at = EXCLUDED.token_expires_at,
            page_id = EXCLUDED.page_id,
            page_access_token = EXCLUDED.page_access_token,
            updated_at = NOW()
        RETURNING {ACCOUNT_COLUMNS}
        "#
    );

    sqlx::query_as(&query)
        .bind(user_id)
        .bind(platform.as_str())
        .bind(&identity.platform_user_id)
        .bind(&identity.display_name)
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .bind(page_id)
        .bind(page_access_token)
        .fetch_one(executor)
        .await
}

pub async fn get_account<'e, E>(
    executor: E,
    account_id: i64,
) -> Result<Option<SocialAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM social_accounts WHERE id = $1");
    sqlx::query_as(&query).bind(account_id).fetch_optional(executor).await
}

/// Fetch an account only if the caller owns it
pub async fn get_owned_account<'e, E>(
    executor: E,
    account_id: i64,
    user_id: i64,
) -> Result<Option<SocialAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query =
        format!("SELECT {ACCOUNT_COLUMNS} FROM social_accounts WHERE id = $1 AND user_id = $2");
    sqlx::query_as(&query)
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

pub async fn list_accounts<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<SocialAccount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts WHERE user_id = $1 ORDER BY created_at DESC"
    );
    sqlx::query_as(&query).bind(user_id).fetch_all(executor).await
}

/// Disconnect an account. Returns false when the caller doesn't own it.
/// Posts keep their account reference set to NULL (ON DELETE SET NULL).
pub async fn delete_account<'e, E>(
    executor: E,
    account_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM social_accounts WHERE id = $1 AND user_id = $2")
        .bind(account_id)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Persist a refresh result. The old refresh token is retained when the
/// provider's response omitted one.
pub async fn update_account_tokens<'e, E>(
    executor: E,
    account_id: i64,
    access_token: &str,
    refresh_token: Option<&str>,
    token_expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE social_accounts SET
            access_token = $2,
            refresh_token = COALESCE($3, refresh_token),
            token_expires_at = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(token_expires_at)
    .execute(executor)
    .await?;
    Ok(())
}
