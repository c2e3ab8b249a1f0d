//! Schema bootstrap
//!
//! Creates the tables idempotently at startup. Timestamps are stored as
//! TIMESTAMPTZ so they map to `DateTime<Utc>` on the Rust side.

use sqlx::PgPool;

pub async fn initialize_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email VARCHAR(255) UNIQUE NOT NULL,
            name VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS social_accounts (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            platform VARCHAR(50) NOT NULL,
            platform_user_id VARCHAR(255) NOT NULL,
            platform_username VARCHAR(255),
            access_token TEXT NOT NULL,
            refresh_token TEXT,
            token_expires_at TIMESTAMPTZ,
            page_id VARCHAR(255),
            page_access_token TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE(user_id, platform, platform_user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            media_url TEXT,
            media_type VARCHAR(50),
            platform VARCHAR(50) NOT NULL,
            status VARCHAR(50) NOT NULL DEFAULT 'draft',
            scheduled_at TIMESTAMPTZ,
            published_at TIMESTAMPTZ,
            platform_post_id VARCHAR(255),
            social_account_id BIGINT REFERENCES social_accounts(id) ON DELETE SET NULL,
            last_error TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id BIGSERIAL PRIMARY KEY,
            post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            author VARCHAR(255) NOT NULL,
            text TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS oauth_flow_states (
            state VARCHAR(255) PRIMARY KEY,
            platform VARCHAR(50) NOT NULL,
            user_id BIGINT NOT NULL,
            code_verifier TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Reconciler lookup: due scheduled posts
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_posts_scheduled
        ON posts(scheduled_at)
        WHERE status = 'scheduled' AND scheduled_at IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure the default user exists and return its id. Callers that don't send
/// an x-user-id header are attributed to this user.
pub async fn ensure_default_user(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, name)
        VALUES ('demo@example.com', 'Demo User')
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
