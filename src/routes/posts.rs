//! Post endpoints (/posts, /posts/{id}, /posts/{id}/comments, /posts/schedule)
//!
//! CRUD plus scheduling. The state machine in `models` owns which status
//! changes are legal; handlers here translate violations into 400s with the
//! specific reason.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{ApiError, AuthUser};
use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::{accounts, comments, posts};
use crate::models::{Comment, Platform, Post, PostStatus, validate_schedule, validate_transition};
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/comments", post(add_comment))
        .route("/posts/schedule", post(schedule_post))
}

/// Post API response DTO
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub platform: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub platform_post_id: Option<String>,
    pub social_account_id: Option<i64>,
    pub account_username: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
}

impl PostResponse {
    fn build(post: Post, account_username: Option<String>, comments: Vec<Comment>) -> Self {
        Self {
            id: post.id,
            content: post.content,
            media_url: post.media_url,
            media_type: post.media_type,
            platform: post.platform,
            status: post.status,
            scheduled_at: post.scheduled_at,
            published_at: post.published_at,
            platform_post_id: post.platform_post_id,
            social_account_id: post.social_account_id,
            account_username,
            last_error: post.last_error,
            created_at: post.created_at,
            updated_at: post.updated_at,
            comments,
        }
    }
}

/// Username lookup for the caller's accounts, for embedding in responses
async fn account_username_map(
    state: &AppState,
    user_id: i64,
) -> Result<HashMap<i64, String>, StatusCode> {
    let map = accounts::list_accounts(&state.db, user_id)
        .await
        .log_500("List accounts for posts error")?
        .into_iter()
        .filter_map(|a| a.platform_username.map(|name| (a.id, name)))
        .collect();
    Ok(map)
}

#[derive(Deserialize)]
struct ListPostsQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
struct ListPostsResponse {
    posts: Vec<PostResponse>,
    total: i64,
    has_more: bool,
}

/// GET /posts - list the caller's posts with comments, newest first
async fn list_posts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ListPostsResponse>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let total = posts::count_posts(&state.db, user_id)
        .await
        .log_500("Count posts error")?;
    let page = posts::list_posts(&state.db, user_id, limit, offset)
        .await
        .log_500("List posts error")?;

    let post_ids: Vec<i64> = page.iter().map(|p| p.id).collect();
    let mut by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
    for comment in comments::list_for_posts(&state.db, &post_ids)
        .await
        .log_500("List comments error")?
    {
        by_post.entry(comment.post_id).or_default().push(comment);
    }

    let usernames = account_username_map(&state, user_id).await?;

    let has_more = offset + (page.len() as i64) < total;
    let posts = page
        .into_iter()
        .map(|p| {
            let username = p
                .social_account_id
                .and_then(|id| usernames.get(&id).cloned());
            let post_comments = by_post.remove(&p.id).unwrap_or_default();
            PostResponse::build(p, username, post_comments)
        })
        .collect();

    Ok(Json(ListPostsResponse {
        posts,
        total,
        has_more,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    content: String,
    media_url: Option<String>,
    media_type: Option<String>,
    platform: Platform,
    status: Option<PostStatus>,
    scheduled_at: Option<DateTime<Utc>>,
    social_account_id: Option<i64>,
}

/// POST /posts - create a post (draft by default)
async fn create_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let status = req.status.unwrap_or(PostStatus::Draft);

    if matches!(status, PostStatus::Publishing | PostStatus::Published) {
        return Err(ApiError::bad_request(format!(
            "Posts cannot be created as {}",
            status
        )));
    }

    // Creating straight into the schedule gets the same checks as /posts/schedule
    if status == PostStatus::Scheduled {
        let scheduled_at = req
            .scheduled_at
            .ok_or_else(|| ApiError::bad_request("Missing scheduledAt for a scheduled post"))?;
        let account_id = req
            .social_account_id
            .ok_or_else(|| ApiError::bad_request("Missing socialAccountId for a scheduled post"))?;
        let account = accounts::get_owned_account(&state.db, account_id, user_id)
            .await
            .log_500("Get account error")?
            .ok_or_else(|| ApiError::not_found("Social account not found"))?;
        let account_platform = account
            .platform()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        validate_schedule(
            PostStatus::Draft,
            req.platform,
            account_platform,
            scheduled_at,
            Utc::now(),
        )
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }

    let post = posts::create_post(
        &state.db,
        user_id,
        posts::NewPost {
            content: &req.content,
            media_url: req.media_url.as_deref(),
            media_type: req.media_type.as_deref(),
            platform: req.platform,
            status,
            scheduled_at: req.scheduled_at,
            social_account_id: req.social_account_id,
        },
    )
    .await
    .log_500("Create post error")?;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse::build(post, None, Vec::new())),
    ))
}

/// GET /posts/{id}
async fn get_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = posts::get_post(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let username = match post.social_account_id {
        Some(account_id) => accounts::get_account(&state.db, account_id)
            .await
            .log_500("Get account error")?
            .and_then(|a| a.platform_username),
        None => None,
    };

    let post_comments = comments::list_for_post(&state.db, post_id)
        .await
        .log_500("List comments error")?;

    Ok(Json(PostResponse::build(post, username, post_comments)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePostRequest {
    content: Option<String>,
    media_url: Option<String>,
    media_type: Option<String>,
    platform: Option<Platform>,
    status: Option<PostStatus>,
    scheduled_at: Option<DateTime<Utc>>,
    social_account_id: Option<i64>,
}

/// PUT /posts/{id} - composer edit. Published posts are immutable; status
/// changes go through the state machine, and moving into `scheduled` gets
/// the full scheduling checks.
async fn update_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let existing = posts::get_post(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let current = existing.status().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    if current == PostStatus::Published {
        return Err(ApiError::bad_request("Published posts cannot be modified"));
    }

    if let Some(target) = req.status {
        validate_transition(current, target)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        if target == PostStatus::Scheduled {
            let scheduled_at = req
                .scheduled_at
                .or(existing.scheduled_at)
                .ok_or_else(|| ApiError::bad_request("Missing scheduledAt for a scheduled post"))?;
            let account_id = req
                .social_account_id
                .or(existing.social_account_id)
                .ok_or_else(|| {
                    ApiError::bad_request("Missing socialAccountId for a scheduled post")
                })?;
            let account = accounts::get_owned_account(&state.db, account_id, user_id)
                .await
                .log_500("Get account error")?
                .ok_or_else(|| ApiError::not_found("Social account not found"))?;
            let account_platform = account
                .platform()
                .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
            let post_platform = req
                .platform
                .or_else(|| existing.platform())
                .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

            validate_schedule(current, post_platform, account_platform, scheduled_at, Utc::now())
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
        }
    }

    let updated = posts::update_post(
        &state.db,
        post_id,
        user_id,
        posts::PostPatch {
            content: req.content.as_deref(),
            media_url: req.media_url.as_deref(),
            media_type: req.media_type.as_deref(),
            platform: req.platform,
            status: req.status,
            scheduled_at: req.scheduled_at,
            social_account_id: req.social_account_id,
        },
    )
    .await
    .log_500("Update post error")?
    .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let post_comments = comments::list_for_post(&state.db, post_id)
        .await
        .log_500("List comments error")?;

    Ok(Json(PostResponse::build(updated, None, post_comments)))
}

#[derive(Serialize)]
struct DeletePostResponse {
    success: bool,
    deleted_id: i64,
}

/// DELETE /posts/{id} - published posts cannot be deleted
async fn delete_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<DeletePostResponse>, ApiError> {
    let existing = posts::get_post(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if existing.status() == Some(PostStatus::Published) {
        return Err(ApiError::bad_request("Published posts cannot be modified"));
    }

    posts::delete_post(&state.db, post_id, user_id)
        .await
        .log_500("Delete post error")?;

    Ok(Json(DeletePostResponse {
        success: true,
        deleted_id: post_id,
    }))
}

#[derive(Deserialize)]
struct AddCommentRequest {
    author: Option<String>,
    text: String,
}

/// POST /posts/{id}/comments - append feedback to a post
async fn add_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<i64>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    // Ownership check before writing the child row
    posts::get_post(&state.db, post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let author = req.author.as_deref().unwrap_or("You");
    let comment = comments::add_comment(&state.db, post_id, author, &req.text)
        .await
        .log_500("Add comment error")?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchedulePostRequest {
    post_id: i64,
    scheduled_at: DateTime<Utc>,
    social_account_id: i64,
}

#[derive(Serialize)]
struct SchedulePostResponse {
    success: bool,
    post: PostResponse,
    message: String,
}

/// POST /posts/schedule - attach a future time and a matching account
async fn schedule_post(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<SchedulePostRequest>,
) -> Result<Json<SchedulePostResponse>, ApiError> {
    let post = posts::get_post(&state.db, req.post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let account = accounts::get_owned_account(&state.db, req.social_account_id, user_id)
        .await
        .log_500("Get account error")?
        .ok_or_else(|| ApiError::not_found("Social account not found"))?;

    let current = post.status().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let post_platform = post.platform().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let account_platform = account
        .platform()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    validate_schedule(
        current,
        post_platform,
        account_platform,
        req.scheduled_at,
        Utc::now(),
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let updated = posts::schedule_post(
        &state.db,
        req.post_id,
        user_id,
        req.scheduled_at,
        req.social_account_id,
    )
    .await
    .log_500("Schedule post error")?
    .ok_or_else(|| ApiError::not_found("Post not found"))?;

    println!(
        "[posts] Post {} scheduled for {} on {}",
        updated.id, req.scheduled_at, updated.platform
    );

    let message = format!("Post scheduled for {}", req.scheduled_at.to_rfc3339());
    Ok(Json(SchedulePostResponse {
        success: true,
        post: PostResponse::build(updated, account.platform_username, Vec::new()),
        message,
    }))
}
