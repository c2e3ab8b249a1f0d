//! Comment domain - append-only feedback entries owned by a post

use sqlx::{Executor, Postgres};

use crate::models::Comment;

pub async fn add_comment<'e, E>(
    executor: E,
    post_id: i64,
    author: &str,
    text: &str,
) -> Result<Comment, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO comments (post_id, author, text)
        VALUES ($1, $2, $3)
        RETURNING id, post_id, author, text, created_at
        "#,
    )
    .bind(post_id)
    .bind(author)
    .bind(text)
    .fetch_one(executor)
    .await
}

pub async fn list_for_post<'e, E>(executor: E, post_id: i64) -> Result<Vec<Comment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, post_id, author, text, created_at
        FROM comments
        WHERE post_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(executor)
    .await
}

/// Fetch comments for a page of posts in one round trip
pub async fn list_for_posts<'e, E>(
    executor: E,
    post_ids: &[i64],
) -> Result<Vec<Comment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, post_id, author, text, created_at
        FROM comments
        WHERE post_id = ANY($1)
        ORDER BY created_at ASC
        "#,
    )
    .bind(post_ids)
    .fetch_all(executor)
    .await
}
