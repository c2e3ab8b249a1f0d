//! Shared data models: platforms, the post state machine, and DB row structs.
//!
//! Status and platform columns are stored as lowercase text; the enums here
//! own parsing and the transition rules so that route handlers and the
//! publisher never compare raw strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Destination platform for a post or connected account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    LinkedIn,
    Facebook,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::Facebook,
        Platform::Instagram,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "twitter" => Some(Platform::Twitter),
            "linkedin" => Some(Platform::LinkedIn),
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Pending,
    Approved,
    Scheduled,
    Publishing,
    Published,
}

impl PostStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PostStatus::Draft),
            "pending" => Some(PostStatus::Pending),
            "approved" => Some(PostStatus::Approved),
            "scheduled" => Some(PostStatus::Scheduled),
            "publishing" => Some(PostStatus::Publishing),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
        }
    }

    /// Whether `self -> to` is a legal state change.
    ///
    /// The review workflow moves freely between draft/pending/approved.
    /// The publish pipeline is strict: only the reconciler claim takes a post
    /// into `publishing`, and `published` is terminal.
    fn can_transition(self, to: PostStatus) -> bool {
        use PostStatus::*;
        matches!(
            (self, to),
            (Draft | Pending | Approved, Draft | Pending | Approved)
                | (Draft | Pending | Approved, Scheduled)
                | (Scheduled, Publishing)
                | (Publishing, Published)
                | (Publishing, Scheduled)
        )
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for post edits, scheduling, and status changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    PlatformMismatch { account: Platform, post: Platform },
    ScheduleInPast,
    PostImmutable,
    InvalidTransition { from: PostStatus, to: PostStatus },
}

impl std::fmt::Display for PostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostError::PlatformMismatch { account, post } => write!(
                f,
                "Account platform ({}) does not match post platform ({})",
                account, post
            ),
            PostError::ScheduleInPast => write!(f, "Scheduled time must be in the future"),
            PostError::PostImmutable => write!(f, "Published posts cannot be modified"),
            PostError::InvalidTransition { from, to } => {
                write!(f, "Cannot move a {} post to {}", from, to)
            }
        }
    }
}

impl std::error::Error for PostError {}

/// Validate a requested status change. Same-state requests are field updates,
/// not transitions, and pass.
pub fn validate_transition(from: PostStatus, to: PostStatus) -> Result<(), PostError> {
    if from == to {
        return Ok(());
    }
    if from == PostStatus::Published {
        return Err(PostError::PostImmutable);
    }
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(PostError::InvalidTransition { from, to })
    }
}

/// Validate the preconditions for scheduling a post: a legal transition into
/// `scheduled`, a matching account platform, and a future timestamp.
pub fn validate_schedule(
    current: PostStatus,
    post_platform: Platform,
    account_platform: Platform,
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), PostError> {
    validate_transition(current, PostStatus::Scheduled)?;
    if account_platform != post_platform {
        return Err(PostError::PlatformMismatch {
            account: account_platform,
            post: post_platform,
        });
    }
    if scheduled_at <= now {
        return Err(PostError::ScheduleInPast);
    }
    Ok(())
}

/// A connected social account row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SocialAccount {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub page_id: Option<String>,
    pub page_access_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialAccount {
    pub fn platform(&self) -> Option<Platform> {
        Platform::parse(&self.platform)
    }
}

/// A post row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub platform: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub platform_post_id: Option<String>,
    pub social_account_id: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn status(&self) -> Option<PostStatus> {
        PostStatus::parse(&self.status)
    }

    pub fn platform(&self) -> Option<Platform> {
        Platform::parse(&self.platform)
    }
}

/// A feedback comment attached to a post (append-only)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// An in-flight OAuth authorization, keyed by its random state token.
/// Single-use: consumed (deleted) exactly once at callback time.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OAuthFlowState {
    pub state: String,
    pub platform: String,
    pub user_id: i64,
    pub code_verifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_platform_parse_roundtrip() {
        for p in Platform::ALL {
            assert_eq!(Platform::parse(p.as_str()), Some(p));
        }
        assert_eq!(Platform::parse("myspace"), None);
    }

    #[test]
    fn test_pipeline_transitions() {
        use PostStatus::*;
        assert!(validate_transition(Draft, Scheduled).is_ok());
        assert!(validate_transition(Pending, Scheduled).is_ok());
        assert!(validate_transition(Approved, Scheduled).is_ok());
        assert!(validate_transition(Scheduled, Publishing).is_ok());
        assert!(validate_transition(Publishing, Published).is_ok());
        // Failure path: a publishing post reverts to scheduled
        assert!(validate_transition(Publishing, Scheduled).is_ok());
    }

    #[test]
    fn test_review_workflow_transitions() {
        use PostStatus::*;
        assert!(validate_transition(Draft, Pending).is_ok());
        assert!(validate_transition(Pending, Approved).is_ok());
        assert!(validate_transition(Approved, Draft).is_ok());
    }

    #[test]
    fn test_illegal_transitions() {
        use PostStatus::*;
        assert_eq!(
            validate_transition(Draft, Publishing),
            Err(PostError::InvalidTransition {
                from: Draft,
                to: Publishing
            })
        );
        assert_eq!(
            validate_transition(Scheduled, Published),
            Err(PostError::InvalidTransition {
                from: Scheduled,
                to: Published
            })
        );
        assert_eq!(
            validate_transition(Approved, Published),
            Err(PostError::InvalidTransition {
                from: Approved,
                to: Published
            })
        );
    }

    #[test]
    fn test_published_is_terminal() {
        use PostStatus::*;
        for to in [Draft, Pending, Approved, Scheduled, Publishing] {
            assert_eq!(
                validate_transition(Published, to),
                Err(PostError::PostImmutable)
            );
        }
        // Same-state is a field update, not a transition
        assert!(validate_transition(Published, Published).is_ok());
    }

    #[test]
    fn test_schedule_requires_future_timestamp() {
        let now = Utc::now();
        let err = validate_schedule(
            PostStatus::Draft,
            Platform::Twitter,
            Platform::Twitter,
            now - Duration::minutes(1),
            now,
        );
        assert_eq!(err, Err(PostError::ScheduleInPast));

        assert!(
            validate_schedule(
                PostStatus::Draft,
                Platform::Twitter,
                Platform::Twitter,
                now + Duration::hours(1),
                now,
            )
            .is_ok()
        );
    }

    #[test]
    fn test_schedule_requires_platform_match() {
        let now = Utc::now();
        let err = validate_schedule(
            PostStatus::Approved,
            Platform::Instagram,
            Platform::Facebook,
            now + Duration::hours(1),
            now,
        );
        assert_eq!(
            err,
            Err(PostError::PlatformMismatch {
                account: Platform::Facebook,
                post: Platform::Instagram,
            })
        );
    }

    #[test]
    fn test_schedule_rejects_published_posts() {
        let now = Utc::now();
        let err = validate_schedule(
            PostStatus::Published,
            Platform::Twitter,
            Platform::Twitter,
            now + Duration::hours(1),
            now,
        );
        assert_eq!(err, Err(PostError::PostImmutable));
    }
}
