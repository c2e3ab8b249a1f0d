//! Post domain - DB queries for posts, including the atomic publish claims
//!
//! The `scheduled -> publishing` claim is the only concurrency guard in the
//! pipeline: it must be persisted before any network call so a second
//! reconciliation pass (or a racing manual publish) selects zero rows and
//! skips silently.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

use crate::models::{Platform, Post, PostStatus};

const POST_COLUMNS: &str = "id, user_id, content, media_url, media_type, platform, status, \
     scheduled_at, published_at, platform_post_id, social_account_id, last_error, \
     created_at, updated_at";

/// Fields accepted when creating a post
#[derive(Debug)]
pub struct NewPost<'a> {
    pub content: &'a str,
    pub media_url: Option<&'a str>,
    pub media_type: Option<&'a str>,
    pub platform: Platform,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub social_account_id: Option<i64>,
}

/// Optional fields for a composer edit; None leaves the column unchanged
#[derive(Debug, Default)]
pub struct PostPatch<'a> {
    pub content: Option<&'a str>,
    pub media_url: Option<&'a str>,
    pub media_type: Option<&'a str>,
    pub platform: Option<Platform>,
    pub status: Option<PostStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub social_account_id: Option<i64>,
}

pub async fn create_post<'e, E>(
    executor: E,
    user_id: i64,
    post: NewPost<'_>,
) -> Result<Post, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        INSERT INTO posts (
            user_id, content, media_url, media_type, platform,
            status, scheduled_at, social_account_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as(&query)
        .bind(user_id)
        .bind(post.content)
        .bind(post.media_url)
        .bind(post.media_type)
        .bind(post.platform.as_str())
        .bind(post.status.as_str())
        .bind(post.scheduled_at)
        .bind(post.social_account_id)
        .fetch_one(executor)
        .await
}

pub async fn get_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND user_id = $2");
    sqlx::query_as(&query)
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

pub async fn count_posts<'e, E>(executor: E, user_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// List posts newest-first by their relevant date (scheduled time when set,
/// else creation time)
pub async fn list_posts<'e, E>(
    executor: E,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE user_id = $1
        ORDER BY COALESCE(scheduled_at, created_at) DESC
        LIMIT $2 OFFSET $3
        "#
    );
    sqlx::query_as(&query)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
}

pub async fn update_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
    patch: PostPatch<'_>,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        UPDATE posts SET
            content = COALESCE($3, content),
            media_url = COALESCE($4, media_url),
            media_type = COALESCE($5, media_type),
            platform = COALESCE($6, platform),
            status = COALESCE($7, status),
            scheduled_at = COALESCE($8, scheduled_at),
            social_account_id = COALESCE($9, social_account_id),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as(&query)
        .bind(post_id)
        .bind(user_id)
        .bind(patch.content)
        .bind(patch.media_url)
        .bind(patch.media_type)
        .bind(patch.platform.map(|p| p.as_str()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.scheduled_at)
        .bind(patch.social_account_id)
        .fetch_optional(executor)
        .await
}

pub async fn delete_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Attach the schedule: status, timestamp, and the account to publish through
pub async fn schedule_post<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
    scheduled_at: DateTime<Utc>,
    social_account_id: i64,
) -> Result<Option<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        UPDATE posts SET
            status = 'scheduled',
            scheduled_at = $3,
            social_account_id = $4,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as(&query)
        .bind(post_id)
        .bind(user_id)
        .bind(scheduled_at)
        .bind(social_account_id)
        .fetch_optional(executor)
        .await
}

/// Atomically claim up to `limit` due scheduled posts for publishing, oldest
/// due first. FOR UPDATE SKIP LOCKED keeps overlapping runs from blocking on
/// (or double-claiming) the same rows; the status predicate makes the claim
/// conditional so each post has at most one winner.
pub async fn claim_due_posts<'e, E>(executor: E, limit: i64) -> Result<Vec<Post>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        WITH due AS (
            SELECT id FROM posts
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE posts p
        SET status = 'publishing', updated_at = NOW()
        FROM due
        WHERE p.id = due.id AND p.status = 'scheduled'
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as(&query).bind(limit).fetch_all(executor).await
}

/// Claim a single post for a manual publish. Published and in-flight posts
/// cannot be claimed. Returns the claimed post plus its pre-claim status so a
/// failed attempt can put it back where it was.
pub async fn claim_post_for_publish<'e, E>(
    executor: E,
    post_id: i64,
    user_id: i64,
    social_account_id: i64,
) -> Result<Option<(Post, String)>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        WITH claimed AS (
            SELECT id, status AS prev_status FROM posts
            WHERE id = $1 AND user_id = $2
              AND status NOT IN ('published', 'publishing')
            FOR UPDATE
        )
        UPDATE posts p
        SET status = 'publishing', social_account_id = $3, updated_at = NOW()
        FROM claimed
        WHERE p.id = claimed.id
        RETURNING {POST_COLUMNS}, claimed.prev_status
        "#
    );

    let row: Option<PostWithPrevStatus> = sqlx::query_as(&query)
        .bind(post_id)
        .bind(user_id)
        .bind(social_account_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(|r| (r.post, r.prev_status)))
}

/// Record a successful publish: terminal state, publish timestamp, and the
/// platform-assigned post id.
pub async fn mark_published<'e, E>(
    executor: E,
    post_id: i64,
    platform_post_id: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE posts SET
            status = 'published',
            published_at = NOW(),
            platform_post_id = $2,
            last_error = NULL,
            updated_at = NOW()
        WHERE id = $1 AND status = 'publishing'
        "#,
    )
    .bind(post_id)
    .bind(platform_post_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Put a failed attempt back into the given status (scheduled for reconciler
/// claims, the pre-claim status for manual ones), leaving scheduled_at
/// untouched and recording the failure.
pub async fn revert_publishing<'e, E>(
    executor: E,
    post_id: i64,
    status: &str,
    error: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE posts SET
            status = $2,
            last_error = $3,
            updated_at = NOW()
        WHERE id = $1 AND status = 'publishing'
        "#,
    )
    .bind(post_id)
    .bind(status)
    .bind(error)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct PostWithPrevStatus {
    #[sqlx(flatten)]
    post: Post,
    prev_status: String,
}
