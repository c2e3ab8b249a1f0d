//! Twitter/X adapter - OAuth 2.0 with PKCE, API v2 publish

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{
    PlatformIdentity, PublishAuth, SocialClient, SocialError, TokenGrant, http_client,
    percent_encode,
};
use crate::models::Platform;

const API_BASE: &str = "https://api.x.com/2";
const OAUTH_BASE: &str = "https://x.com/i/oauth2";

const SCOPES: &str = "tweet.read tweet.write users.read offline.access";

pub struct TwitterClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: Client,
}

impl TwitterClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: http_client(),
        }
    }

    /// Basic auth header for the OAuth token endpoint
    fn basic_auth_header(&self) -> String {
        use base64::Engine;
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, SocialError> {
        let resp = self
            .http
            .post(format!("{}/token", OAUTH_BASE))
            .header("Authorization", self.basic_auth_header())
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
impl SocialClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn requires_pkce(&self) -> bool {
        true
    }

    fn authorize_url(&self, state: &str, pkce_challenge: Option<&str>) -> String {
        let challenge = pkce_challenge.unwrap_or_default();
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            OAUTH_BASE,
            percent_encode(&self.client_id),
            percent_encode(&self.redirect_uri),
            percent_encode(SCOPES),
            percent_encode(state),
            percent_encode(challenge),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, SocialError> {
        let verifier = pkce_verifier.ok_or_else(|| {
            SocialError::OAuthExchangeFailed("missing PKCE code verifier".to_string())
        })?;

        self.token_request(&[
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.redirect_uri),
            ("code_verifier", verifier),
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
            .get(format!("{}/users/me", API_BASE))
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let wrapper: UserResponse = resp.json().await?;
        Ok(PlatformIdentity {
            platform_user_id: wrapper.data.id,
            display_name: wrapper.data.username,
            page: None,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SocialError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
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
        let body = serde_json::json!({ "text": content });

        let resp = self
            .http
            .post(format!("{}/tweets", API_BASE))
            .header("Authorization", format!("Bearer {}", auth.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let wrapper: TweetResponseWrapper = resp.json().await?;
        Ok(wrapper.data.id)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: TwitterUser,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TwitterClient {
        TwitterClient::new("client-id", "client-secret", "https://app.test/auth/twitter/callback")
    }

    #[test]
    fn test_authorize_url_embeds_state_and_challenge() {
        let url = client().authorize_url("state%value", Some("challenge123"));
        assert!(url.starts_with("https://x.com/i/oauth2/authorize?"));
        assert!(url.contains("state=state%25value"));
        assert!(url.contains("code_challenge=challenge123"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=tweet%2Eread%20tweet%2Ewrite%20users%2Eread%20offline%2Eaccess"));
    }

    #[tokio::test]
    async fn test_exchange_without_verifier_fails_before_network() {
        let err = client().exchange_code("code", None).await.unwrap_err();
        assert!(matches!(err, SocialError::OAuthExchangeFailed(_)));
    }
}
