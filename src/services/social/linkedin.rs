//! LinkedIn adapter - plain OAuth 2.0, ugcPosts publish
//!
//! The created post id comes back in the `x-restli-id` response header, not
//! the body.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{
    PlatformIdentity, PublishAuth, SocialClient, SocialError, TokenGrant, http_client,
    percent_encode,
};
use crate::models::Platform;

const API_BASE: &str = "https://api.linkedin.com/v2";
const OAUTH_BASE: &str = "https://www.linkedin.com/oauth/v2";

const SCOPES: &str = "openid profile email w_member_social";

pub struct LinkedInClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl LinkedInClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: http_client(),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, SocialError> {
        let resp = self
            .http
            .post(format!("{}/accessToken", OAUTH_BASE))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: Some(token.expires_in),
        })
    }
}

#[async_trait]
impl SocialClient for LinkedInClient {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn authorize_url(&self, state: &str, _pkce_challenge: Option<&str>) -> String {
        format!(
            "{}/authorization?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            OAUTH_BASE,
            percent_encode(&self.client_id),
            percent_encode(&self.redirect_uri),
            percent_encode(SCOPES),
            percent_encode(state),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, SocialError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
        .map_err(|e| match e {
            SocialError::Api(text) => SocialError::OAuthExchangeFailed(text),
            other => other,
        })
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<PlatformIdentity, SocialError> {
        let resp = self
            .http
            .get(format!("{}/userinfo", API_BASE))
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let user: UserInfo = resp.json().await?;
        Ok(PlatformIdentity {
            platform_user_id: user.sub,
            display_name: format!("{} {}", user.given_name, user.family_name),
            page: None,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SocialError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
        .map_err(|e| match e {
            SocialError::Api(text) => SocialError::TokenRefreshFailed(text),
            other => other,
        })
    }

    async fn publish(
        &self,
        auth: &PublishAuth,
        content: &str,
        _media_url: Option<&str>,
    ) -> Result<String, SocialError> {
        let author_urn = format!("urn:li:person:{}", auth.platform_user_id);
        let body = serde_json::json!({
            "author": author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": content },
                    "shareMediaCategory": "NONE",
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
            }
        });

        let resp = self
            .http
            .post(format!("{}/ugcPosts", API_BASE))
            .header("Authorization", format!("Bearer {}", auth.access_token))
            .header("Content-Type", "application/json")
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let post_id = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(post_id)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    given_name: String,
    family_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_embeds_state_without_pkce() {
        let client = LinkedInClient::new("id", "secret", "https://app.test/auth/linkedin/callback");
        let url = client.authorize_url("the-state", None);
        assert!(url.starts_with("https://www.linkedin.com/oauth/v2/authorization?"));
        assert!(url.contains("state=the%2Dstate"));
        assert!(!url.contains("code_challenge"));
    }
}
