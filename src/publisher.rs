//! Scheduled-publish reconciler
//!
//! Periodically finds due scheduled posts, claims each with the atomic
//! `scheduled -> publishing` update, publishes through the platform adapter,
//! and resolves to `published` or back to `scheduled`. Runs as an apalis cron
//! worker; the same reconciliation entry point backs the authenticated
//! internal trigger endpoint.

use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use apalis_sql::postgres::PostgresStorage;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::PUBLISH_BATCH_SIZE;
use crate::domain::{accounts, posts};
use crate::models::Post;
use crate::services::social::{PublishAuth, SocialError, SocialRegistry};
use crate::services::tokens;

const CRON_SCHEDULE: &str = "0 * * * * *"; // once per minute

/// Cron tick marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
}

impl From<chrono::DateTime<chrono::Utc>> for PublishJob {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        PublishJob { scheduled_at: dt }
    }
}

/// Shared context for the publish worker
#[derive(Clone)]
pub struct PublisherContext {
    pub pool: PgPool,
    pub registry: Arc<SocialRegistry>,
}

/// Result of one post's publish attempt within a run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub post_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-run report returned by the internal trigger endpoint
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub processed: usize,
    pub results: Vec<PublishOutcome>,
}

impl RunReport {
    fn from_outcomes(outcomes: Vec<(i64, Result<String, SocialError>)>) -> Self {
        let results: Vec<PublishOutcome> = outcomes
            .into_iter()
            .map(|(post_id, result)| match result {
                Ok(platform_post_id) => PublishOutcome {
                    post_id,
                    success: true,
                    platform_post_id: Some(platform_post_id),
                    error: None,
                },
                Err(e) => PublishOutcome {
                    post_id,
                    success: false,
                    platform_post_id: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        RunReport {
            processed: results.len(),
            results,
        }
    }
}

/// Publish one claimed post: resolve the account, ensure a usable token,
/// dispatch to the platform adapter. Callers own the status write-back.
pub async fn attempt_publish(
    pool: &PgPool,
    registry: &SocialRegistry,
    post: &Post,
) -> Result<String, SocialError> {
    let account_id = post.social_account_id.ok_or(SocialError::AccountNotFound)?;
    let account = accounts::get_account(pool, account_id)
        .await?
        .ok_or(SocialError::AccountNotFound)?;

    let platform = account
        .platform()
        .ok_or_else(|| SocialError::UnsupportedPlatform(account.platform.clone()))?;
    let client = registry.get(platform)?;

    let access_token = tokens::ensure_valid_token(pool, client, &account).await?;
    let auth = PublishAuth::for_account(&account, access_token);

    client
        .publish(&auth, &post.content, post.media_url.as_deref())
        .await
}

/// One reconciliation sweep: claim due posts, attempt each independently,
/// resolve each claim, and report.
pub async fn run_reconciliation(
    pool: &PgPool,
    registry: &SocialRegistry,
) -> Result<RunReport, sqlx::Error> {
    let claimed = posts::claim_due_posts(pool, PUBLISH_BATCH_SIZE).await?;
    let mut outcomes: Vec<(i64, Result<String, SocialError>)> = Vec::with_capacity(claimed.len());

    for post in claimed {
        let result = attempt_publish(pool, registry, &post).await;

        // A post stuck in 'publishing' would never be retried, so a failed
        // write-back is the one thing worth shouting about.
        match &result {
            Ok(platform_post_id) => {
                println!(
                    "[reconciler] Published post {} -> {}",
                    post.id, platform_post_id
                );
                if let Err(db_err) = posts::mark_published(pool, post.id, platform_post_id).await {
                    eprintln!(
                        "[reconciler] CRITICAL: published post {} but failed to record it: {}",
                        post.id, db_err
                    );
                }
            }
            Err(e) => {
                eprintln!("[reconciler] Post {} failed: {}", post.id, e);
                if let Err(db_err) =
                    posts::revert_publishing(pool, post.id, "scheduled", &e.to_string()).await
                {
                    eprintln!(
                        "[reconciler] CRITICAL: failed to revert post {} to scheduled: {}",
                        post.id, db_err
                    );
                }
            }
        }

        outcomes.push((post.id, result));
    }

    Ok(RunReport::from_outcomes(outcomes))
}

/// Job handler - one reconciliation sweep per tick.
/// Always returns Ok; per-post failures are resolved inside the run and a
/// failed run itself is retried by the next tick anyway.
async fn process_publish_job(_job: PublishJob, ctx: Data<PublisherContext>) -> Result<(), Error> {
    match run_reconciliation(&ctx.pool, &ctx.registry).await {
        Ok(report) => {
            if report.processed > 0 {
                let failed = report.results.iter().filter(|r| !r.success).count();
                println!(
                    "[reconciler] Run complete: {} processed, {} failed",
                    report.processed, failed
                );
            }
        }
        Err(e) => {
            eprintln!("[reconciler] Run error (next tick retries): {}", e);
        }
    }
    Ok(())
}

/// Start the scheduled-publish worker
pub async fn run_publish_worker(pool: PgPool, registry: Arc<SocialRegistry>) {
    let ctx = PublisherContext {
        pool: pool.clone(),
        registry,
    };

    // Run apalis migrations
    PostgresStorage::setup(&pool)
        .await
        .expect("Failed to set up apalis storage");

    let storage: PostgresStorage<PublishJob> = PostgresStorage::new(pool.clone());
    let schedule = Schedule::from_str(CRON_SCHEDULE).expect("Invalid publish worker schedule");
    let cron = CronStream::new(schedule);
    let backend = cron.pipe_to_storage(storage);

    println!("[reconciler] Apalis worker starting (every 60s, batch {})", PUBLISH_BATCH_SIZE);

    let worker = WorkerBuilder::new("publish-worker")
        .data(ctx)
        .backend(backend)
        .build_fn(process_publish_job);

    Monitor::new()
        .register(worker)
        .run()
        .await
        .expect("Publish worker monitor failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use crate::services::social::test_support::MockClient;

    #[test]
    fn test_report_counts_mixed_outcomes() {
        // The reconciliation-batch shape from a run where one post publishes,
        // one hits an adapter error, and one has an expired token with no
        // refresh token on file.
        let outcomes = vec![
            (1_i64, Ok("tw-100".to_string())),
            (2_i64, Err(SocialError::Api("rate limited".to_string()))),
            (3_i64, Err(SocialError::RefreshUnavailable)),
        ];

        let report = RunReport::from_outcomes(outcomes);
        assert_eq!(report.processed, 3);

        let successes: Vec<_> = report.results.iter().filter(|r| r.success).collect();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].platform_post_id.as_deref(), Some("tw-100"));

        let failures: Vec<_> = report.results.iter().filter(|r| !r.success).collect();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].error.as_deref().unwrap().contains("rate limited"));
        assert!(failures[1].error.as_deref().unwrap().contains("no refresh token"));
    }

    #[test]
    fn test_report_serializes_with_camel_case_keys() {
        let report = RunReport::from_outcomes(vec![(7, Ok("ig-9".to_string()))]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["processed"], 1);
        assert_eq!(json["results"][0]["postId"], 7);
        assert_eq!(json["results"][0]["platformPostId"], "ig-9");
        assert_eq!(json["results"][0].get("error"), None);
    }

    #[tokio::test]
    async fn test_adapter_failure_surfaces_raw_error_text() {
        let client = MockClient {
            platform: Platform::Twitter,
            publish_result: Err("duplicate content".to_string()),
        };
        let auth = PublishAuth {
            access_token: "t".into(),
            platform_user_id: "u".into(),
            page_id: None,
            page_access_token: None,
        };
        let err = crate::services::social::SocialClient::publish(&client, &auth, "hi", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("duplicate content"));
    }
}
