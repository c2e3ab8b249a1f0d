//! Publish endpoints: manual publish and the internal reconciliation trigger
//!
//! Both run through the same claim -> publish -> resolve pipeline as the
//! scheduled reconciler, so a manual publish and an overlapping cron run can
//! never double-post the same post.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, AuthUser};
use crate::AppState;
use crate::domain::{accounts, posts};
use crate::models::{PostError, PostStatus};
use crate::publisher::{self, RunReport};
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/social/publish", post(manual_publish))
        .route("/internal/publish-scheduled", post(trigger_reconciliation))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualPublishRequest {
    post_id: i64,
    account_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManualPublishResponse {
    success: bool,
    platform_post_id: String,
    message: String,
}

/// POST /social/publish - synchronous publish of one post
async fn manual_publish(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<ManualPublishRequest>,
) -> Result<Json<ManualPublishResponse>, ApiError> {
    let post = posts::get_post(&state.db, req.post_id, user_id)
        .await
        .log_500("Get post error")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let account = accounts::get_owned_account(&state.db, req.account_id, user_id)
        .await
        .log_500("Get account error")?
        .ok_or_else(|| ApiError::not_found("Social account not found"))?;

    // The account must post to the same platform the content was written for
    let post_platform = post.platform().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let account_platform = account
        .platform()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    if account_platform != post_platform {
        return Err(ApiError::bad_request(
            PostError::PlatformMismatch {
                account: account_platform,
                post: post_platform,
            }
            .to_string(),
        ));
    }

    if post.status() == Some(PostStatus::Published) {
        return Err(ApiError::bad_request("Published posts cannot be modified"));
    }

    // Atomic claim; losing it means another publisher has this post right now
    let claimed = posts::claim_post_for_publish(&state.db, req.post_id, user_id, req.account_id)
        .await
        .log_500("Claim post error")?;

    let Some((claimed_post, prev_status)) = claimed else {
        return Err(ApiError::Message(
            StatusCode::CONFLICT,
            "Post is already being published".to_string(),
        ));
    };

    match publisher::attempt_publish(&state.db, &state.registry, &claimed_post).await {
        Ok(platform_post_id) => {
            posts::mark_published(&state.db, claimed_post.id, &platform_post_id)
                .await
                .log_500("Mark published error")?;

            println!(
                "[publish] Post {} published manually -> {}",
                claimed_post.id, platform_post_id
            );

            Ok(Json(ManualPublishResponse {
                success: true,
                platform_post_id,
                message: "Post published successfully".to_string(),
            }))
        }
        Err(e) => {
            // Put the post back where it was; a draft stays a draft
            let error_text = e.to_string();
            posts::revert_publishing(&state.db, claimed_post.id, &prev_status, &error_text)
                .await
                .log_500("Revert post error")?;

            Err(ApiError::bad_request(error_text))
        }
    }
}

/// POST /internal/publish-scheduled - reconciliation trigger for the external
/// scheduler. Requires the shared-secret bearer credential when one is
/// configured.
async fn trigger_reconciliation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunReport>, StatusCode> {
    if let Some(secret) = &state.cron_secret {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| token == secret)
            .unwrap_or(false);

        if !authorized {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let report = publisher::run_reconciliation(&state.db, &state.registry)
        .await
        .log_500("Reconciliation run error")?;

    Ok(Json(report))
}
