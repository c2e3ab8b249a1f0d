//! Social platform integrations behind a single capability interface.
//!
//! Each platform implements [`SocialClient`]; everything above this module
//! (OAuth coordinator, token manager, publisher) dispatches through the
//! [`SocialRegistry`] and never branches on the platform itself. Protocol
//! differences - PKCE on Twitter, the page/business-account indirection and
//! long-lived token exchange on Facebook/Instagram, Instagram's two-phase
//! publish - stay inside the adapter that owns them.

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

pub use facebook::FacebookClient;
pub use instagram::InstagramClient;
pub use linkedin::LinkedInClient;
pub use twitter::TwitterClient;

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use crate::constants::HTTP_TIMEOUT_SECS;
use crate::models::{Platform, SocialAccount};

/// Tokens returned by a code exchange or a refresh
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// A page the authenticated user can post through (Facebook/Instagram)
#[derive(Debug, Clone)]
pub struct PageIdentity {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

/// The resolved identity behind an access token
#[derive(Debug, Clone)]
pub struct PlatformIdentity {
    pub platform_user_id: String,
    pub display_name: String,
    /// Set for platforms that publish through a page rather than the user
    pub page: Option<PageIdentity>,
}

/// Credentials handed to `publish`: the (possibly refreshed) user token plus
/// the page identity for platforms that need one.
#[derive(Debug, Clone)]
pub struct PublishAuth {
    pub access_token: String,
    pub platform_user_id: String,
    pub page_id: Option<String>,
    pub page_access_token: Option<String>,
}

impl PublishAuth {
    pub fn for_account(account: &SocialAccount, access_token: String) -> Self {
        Self {
            access_token,
            platform_user_id: account.platform_user_id.clone(),
            page_id: account.page_id.clone(),
            page_access_token: account.page_access_token.clone(),
        }
    }
}

/// Errors from the social pipeline (OAuth, token lifecycle, publishing)
#[derive(Debug)]
pub enum SocialError {
    /// The provider rejected the authorization-code exchange; carries the raw body
    OAuthExchangeFailed(String),
    /// Unknown, expired, or already-consumed OAuth flow state
    InvalidState,
    /// No Instagram business account is linked to any of the user's pages
    NoBusinessAccount,
    /// The provider rejected a token refresh
    TokenRefreshFailed(String),
    /// The token is expired and nothing is on file to refresh it with
    RefreshUnavailable,
    /// The platform requires an image and the post has none
    MissingMedia,
    /// The platform posts through a page and the account has none configured
    MissingPageIdentity,
    AccountNotFound,
    UnsupportedPlatform(String),
    /// Non-success response from a provider API; carries the raw body
    Api(String),
    Http(reqwest::Error),
    Db(sqlx::Error),
}

impl std::fmt::Display for SocialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocialError::OAuthExchangeFailed(e) => write!(f, "OAuth code exchange failed: {}", e),
            SocialError::InvalidState => write!(f, "Invalid or expired OAuth state"),
            SocialError::NoBusinessAccount => {
                write!(f, "No Instagram business account linked to any Facebook page")
            }
            SocialError::TokenRefreshFailed(e) => write!(f, "Token refresh failed: {}", e),
            SocialError::RefreshUnavailable => {
                write!(f, "Token expired and no refresh token available")
            }
            SocialError::MissingMedia => write!(f, "This platform requires an image"),
            SocialError::MissingPageIdentity => {
                write!(f, "No page is configured for this account")
            }
            SocialError::AccountNotFound => write!(f, "Social account not found"),
            SocialError::UnsupportedPlatform(p) => write!(f, "Unsupported platform: {}", p),
            SocialError::Api(e) => write!(f, "Provider API error: {}", e),
            SocialError::Http(e) => write!(f, "HTTP error: {}", e),
            SocialError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for SocialError {}

impl From<reqwest::Error> for SocialError {
    fn from(e: reqwest::Error) -> Self {
        SocialError::Http(e)
    }
}

impl From<sqlx::Error> for SocialError {
    fn from(e: sqlx::Error) -> Self {
        SocialError::Db(e)
    }
}

/// Capability contract every platform adapter implements
#[async_trait]
pub trait SocialClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Twitter is the only platform that binds the code to a PKCE challenge
    fn requires_pkce(&self) -> bool {
        false
    }

    /// Facebook/Instagram refresh by exchanging the current access token for
    /// a fresh long-lived one instead of presenting a refresh token
    fn refreshes_with_access_token(&self) -> bool {
        false
    }

    /// Provider consent-screen URL embedding the given state (and, where the
    /// platform requires it, the PKCE challenge)
    fn authorize_url(&self, state: &str, pkce_challenge: Option<&str>) -> String;

    /// One-shot exchange of an authorization code for tokens
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, SocialError>;

    /// Resolve who the token belongs to (and any page/business identity)
    async fn fetch_identity(&self, access_token: &str) -> Result<PlatformIdentity, SocialError>;

    /// Obtain a fresh access token. For Facebook/Instagram this is the
    /// short-to-long-lived exchange and `refresh_token` is the current
    /// access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SocialError>;

    /// Publish content, returning the platform-assigned post id.
    /// Media/page preconditions are checked before any network call.
    async fn publish(
        &self,
        auth: &PublishAuth,
        content: &str,
        media_url: Option<&str>,
    ) -> Result<String, SocialError>;
}

/// Adapter lookup keyed by platform. Adding a platform means adding one
/// adapter and one `register` call in main.
pub struct SocialRegistry {
    clients: HashMap<Platform, Box<dyn SocialClient>>,
}

impl SocialRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    pub fn register(&mut self, client: Box<dyn SocialClient>) {
        self.clients.insert(client.platform(), client);
    }

    pub fn get(&self, platform: Platform) -> Result<&dyn SocialClient, SocialError> {
        self.clients
            .get(&platform)
            .map(|c| c.as_ref())
            .ok_or_else(|| SocialError::UnsupportedPlatform(platform.to_string()))
    }
}

impl Default for SocialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared reqwest client with the outbound-call timeout applied
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
}

pub(crate) fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Scripted adapter for pipeline tests
    pub struct MockClient {
        pub platform: Platform,
        pub publish_result: Result<String, String>,
    }

    #[async_trait]
    impl SocialClient for MockClient {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn authorize_url(&self, state: &str, _pkce_challenge: Option<&str>) -> String {
            format!("https://example.com/authorize?state={}", state)
        }

        async fn exchange_code(
            &self,
            _code: &str,
            _pkce_verifier: Option<&str>,
        ) -> Result<TokenGrant, SocialError> {
            Ok(TokenGrant {
                access_token: "mock-access".into(),
                refresh_token: Some("mock-refresh".into()),
                expires_in: Some(3600),
            })
        }

        async fn fetch_identity(
            &self,
            _access_token: &str,
        ) -> Result<PlatformIdentity, SocialError> {
            Ok(PlatformIdentity {
                platform_user_id: "mock-user".into(),
                display_name: "Mock User".into(),
                page: None,
            })
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenGrant, SocialError> {
            Ok(TokenGrant {
                access_token: "mock-refreshed".into(),
                refresh_token: None,
                expires_in: Some(3600),
            })
        }

        async fn publish(
            &self,
            _auth: &PublishAuth,
            _content: &str,
            _media_url: Option<&str>,
        ) -> Result<String, SocialError> {
            self.publish_result
                .clone()
                .map_err(SocialError::Api)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockClient;
    use super::*;

    #[test]
    fn test_registry_dispatches_by_platform() {
        let mut registry = SocialRegistry::new();
        registry.register(Box::new(MockClient {
            platform: Platform::Twitter,
            publish_result: Ok("1".into()),
        }));

        assert_eq!(
            registry.get(Platform::Twitter).unwrap().platform(),
            Platform::Twitter
        );
        assert!(matches!(
            registry.get(Platform::LinkedIn),
            Err(SocialError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_publish_auth_carries_page_identity() {
        use chrono::Utc;
        let account = SocialAccount {
            id: 1,
            user_id: 1,
            platform: "facebook".into(),
            platform_user_id: "fb-1".into(),
            platform_username: Some("Page Owner".into()),
            access_token: "stale".into(),
            refresh_token: None,
            token_expires_at: None,
            page_id: Some("page-9".into()),
            page_access_token: Some("page-token".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let auth = PublishAuth::for_account(&account, "fresh".into());
        assert_eq!(auth.access_token, "fresh");
        assert_eq!(auth.platform_user_id, "fb-1");
        assert_eq!(auth.page_id.as_deref(), Some("page-9"));
        assert_eq!(auth.page_access_token.as_deref(), Some("page-token"));
    }
}
