//! Facebook adapter - Graph API, posts as a Page
//!
//! The code exchange chains into the short-to-long-lived token swap, and the
//! same swap doubles as the refresh operation (long-lived tokens last about
//! 60 days and carry no refresh token).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{
    PageIdentity, PlatformIdentity, PublishAuth, SocialClient, SocialError, TokenGrant,
    http_client, percent_encode,
};
use crate::models::Platform;

pub(crate) const GRAPH_BASE: &str = "https://graph.facebook.com/v18.0";
const OAUTH_DIALOG: &str = "https://www.facebook.com/v18.0/dialog/oauth";

const SCOPES: &str = "pages_show_list,pages_read_engagement,pages_manage_posts";

pub struct FacebookClient {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    http: Client,
}

impl FacebookClient {
    pub fn new(app_id: &str, app_secret: &str, redirect_uri: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: http_client(),
        }
    }

    async fn get_token(&self, url: String) -> Result<TokenResponse, SocialError> {
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }
        Ok(resp.json().await?)
    }

    /// Swap a short-lived token for a ~60 day one
    pub(crate) async fn long_lived_token(
        http: &Client,
        app_id: &str,
        app_secret: &str,
        short_lived: &str,
    ) -> Result<TokenGrant, SocialError> {
        let url = format!(
            "{}/oauth/access_token?grant_type=fb_exchange_token&client_id={}&client_secret={}&fb_exchange_token={}",
            GRAPH_BASE,
            percent_encode(app_id),
            percent_encode(app_secret),
            percent_encode(short_lived),
        );

        let resp = http.get(url).send().await?;
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: token.expires_in,
        })
    }
}

#[async_trait]
impl SocialClient for FacebookClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn refreshes_with_access_token(&self) -> bool {
        true
    }

    fn authorize_url(&self, state: &str, _pkce_challenge: Option<&str>) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}",
            OAUTH_DIALOG,
            percent_encode(&self.app_id),
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
        let url = format!(
            "{}/oauth/access_token?client_id={}&client_secret={}&redirect_uri={}&code={}",
            GRAPH_BASE,
            percent_encode(&self.app_id),
            percent_encode(&self.app_secret),
            percent_encode(&self.redirect_uri),
            percent_encode(code),
        );

        let short_lived = self.get_token(url).await.map_err(|e| match e {
            SocialError::Api(text) => SocialError::OAuthExchangeFailed(text),
            other => other,
        })?;

        Self::long_lived_token(
            &self.http,
            &self.app_id,
            &self.app_secret,
            &short_lived.access_token,
        )
        .await
        .map_err(|e| match e {
            SocialError::Api(text) => SocialError::OAuthExchangeFailed(text),
            other => other,
        })
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<PlatformIdentity, SocialError> {
        let resp = self
            .http
            .get(format!(
                "{}/me?fields=id,name&access_token={}",
                GRAPH_BASE,
                percent_encode(access_token)
            ))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let user: FacebookUser = resp.json().await?;

        // Posting goes through a Page; discover the user's pages and keep the
        // first one (the original behavior - page choice is a UI concern)
        let pages_resp = self
            .http
            .get(format!(
                "{}/me/accounts?fields=id,name,access_token&access_token={}",
                GRAPH_BASE,
                percent_encode(access_token)
            ))
            .send()
            .await?;

        if !pages_resp.status().is_success() {
            let text = pages_resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let pages: PageList = pages_resp.json().await?;
        let page = pages.data.into_iter().next().map(|p| PageIdentity {
            id: p.id,
            name: p.name,
            access_token: p.access_token,
        });

        Ok(PlatformIdentity {
            platform_user_id: user.id,
            display_name: user.name,
            page,
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SocialError> {
        // `refresh_token` here is the current (still-valid-ish) access token
        Self::long_lived_token(&self.http, &self.app_id, &self.app_secret, refresh_token)
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
        media_url: Option<&str>,
    ) -> Result<String, SocialError> {
        let (page_id, page_token) = match (&auth.page_id, &auth.page_access_token) {
            (Some(id), Some(token)) => (id, token),
            _ => return Err(SocialError::MissingPageIdentity),
        };

        // Text goes to the feed; an image posts as a photo with a caption
        let (endpoint, body) = match media_url {
            Some(url) => (
                format!("{}/{}/photos", GRAPH_BASE, page_id),
                serde_json::json!({
                    "url": url,
                    "caption": content,
                    "access_token": page_token,
                }),
            ),
            None => (
                format!("{}/{}/feed", GRAPH_BASE, page_id),
                serde_json::json!({
                    "message": content,
                    "access_token": page_token,
                }),
            ),
        };

        let resp = self
            .http
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let created: CreatedObject = resp.json().await?;
        Ok(created.id)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PageList {
    #[serde(default)]
    data: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    id: String,
    name: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FacebookClient {
        FacebookClient::new("app-id", "app-secret", "https://app.test/auth/facebook/callback")
    }

    #[test]
    fn test_authorize_url_embeds_state() {
        let url = client().authorize_url("fb-state", None);
        assert!(url.starts_with("https://www.facebook.com/v18.0/dialog/oauth?"));
        assert!(url.contains("state=fb%2Dstate"));
        assert!(!url.contains("code_challenge"));
    }

    #[tokio::test]
    async fn test_publish_without_page_fails_before_network() {
        let auth = PublishAuth {
            access_token: "user-token".into(),
            platform_user_id: "fb-1".into(),
            page_id: None,
            page_access_token: None,
        };
        let err = client().publish(&auth, "hello", None).await.unwrap_err();
        assert!(matches!(err, SocialError::MissingPageIdentity));
    }
}
