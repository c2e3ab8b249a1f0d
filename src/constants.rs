//! Application constants

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;

/// Maximum number of due posts claimed per reconciliation run
pub const PUBLISH_BATCH_SIZE: i64 = 10;

/// Refresh the access token when it expires within this window (5 minutes)
pub const TOKEN_EXPIRY_LEEWAY_SECS: i64 = 5 * 60;

/// OAuth flow states are single-use and dead after this age (10 minutes)
pub const OAUTH_STATE_TTL_SECS: i64 = 10 * 60;

/// Timeout applied to every outbound provider call
pub const HTTP_TIMEOUT_SECS: u64 = 30;
