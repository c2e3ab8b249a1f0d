//! Instagram adapter - Graph API via a Facebook app, business accounts only
//!
//! Publishing is two-phase: create a media container from the image URL, wait
//! for the container to finish processing, then publish it. The container
//! status is polled with a bounded retry budget; provider processing time is
//! not guaranteed, so budget exhaustion fails the attempt.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::facebook::{self, GRAPH_BASE};
use super::{
    PageIdentity, PlatformIdentity, PublishAuth, SocialClient, SocialError, TokenGrant,
    http_client, percent_encode,
};
use crate::models::Platform;

const OAUTH_DIALOG: &str = "https://www.facebook.com/v18.0/dialog/oauth";

const SCOPES: &str = "instagram_basic,instagram_content_publish,pages_show_list,pages_read_engagement";

/// Container status poll budget: 12 attempts, 5s apart (up to one minute)
const CONTAINER_POLL_ATTEMPTS: u32 = 12;
const CONTAINER_POLL_INTERVAL_SECS: u64 = 5;

pub struct InstagramClient {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    http: Client,
}

impl InstagramClient {
    pub fn new(app_id: &str, app_secret: &str, redirect_uri: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: http_client(),
        }
    }

    /// Create the media container that stages the image for publishing
    async fn create_container(
        &self,
        ig_account_id: &str,
        page_token: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<String, SocialError> {
        let url = format!(
            "{}/{}/media?image_url={}&caption={}&access_token={}",
            GRAPH_BASE,
            ig_account_id,
            percent_encode(image_url),
            percent_encode(caption),
            percent_encode(page_token),
        );

        let resp = self.http.post(url).send().await?;
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let created: CreatedObject = resp.json().await?;
        Ok(created.id)
    }

    /// Poll the container until processing finishes, within the retry budget
    async fn wait_for_container(
        &self,
        container_id: &str,
        page_token: &str,
    ) -> Result<(), SocialError> {
        for attempt in 1..=CONTAINER_POLL_ATTEMPTS {
            let url = format!(
                "{}/{}?fields=status_code&access_token={}",
                GRAPH_BASE,
                container_id,
                percent_encode(page_token),
            );

            let resp = self.http.get(url).send().await?;
            if !resp.status().is_success() {
                let text = resp.text().await?;
                return Err(SocialError::Api(text));
            }

            let status: ContainerStatus = resp.json().await?;
            match status.status_code.as_deref() {
                Some("FINISHED") => return Ok(()),
                Some("ERROR") => {
                    return Err(SocialError::Api(
                        "Instagram media container processing failed".to_string(),
                    ));
                }
                // IN_PROGRESS / PUBLISHED / absent: keep waiting
                _ => {
                    if attempt < CONTAINER_POLL_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_secs(
                            CONTAINER_POLL_INTERVAL_SECS,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(SocialError::Api(format!(
            "Instagram media container not ready after {} checks",
            CONTAINER_POLL_ATTEMPTS
        )))
    }
}

#[async_trait]
impl SocialClient for InstagramClient {
    fn platform(&self) -> Platform {
        Platform::Instagram
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

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::OAuthExchangeFailed(text));
        }
        let short_lived: ShortLivedToken = resp.json().await?;

        facebook::FacebookClient::long_lived_token(
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

    /// Walks the user's Facebook pages looking for a linked Instagram
    /// business account. Zero hits is its own failure, distinct from a
    /// provider error - the UI routes it to a dedicated help screen.
    async fn fetch_identity(&self, access_token: &str) -> Result<PlatformIdentity, SocialError> {
        let resp = self
            .http
            .get(format!(
                "{}/me/accounts?fields=id,name,access_token,instagram_business_account{{id,username}}&access_token={}",
                GRAPH_BASE,
                percent_encode(access_token)
            ))
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let pages: PageList = resp.json().await?;
        for page in pages.data {
            if let Some(ig) = page.instagram_business_account {
                return Ok(PlatformIdentity {
                    platform_user_id: ig.id,
                    display_name: ig.username,
                    page: Some(PageIdentity {
                        id: page.id,
                        name: page.name,
                        access_token: page.access_token,
                    }),
                });
            }
        }

        Err(SocialError::NoBusinessAccount)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, SocialError> {
        facebook::FacebookClient::long_lived_token(
            &self.http,
            &self.app_id,
            &self.app_secret,
            refresh_token,
        )
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
        // Instagram cannot publish text-only posts
        let image_url = media_url.ok_or(SocialError::MissingMedia)?;
        let page_token = auth
            .page_access_token
            .as_deref()
            .ok_or(SocialError::MissingPageIdentity)?;

        // auth.platform_user_id is the Instagram business account id
        let container_id = self
            .create_container(&auth.platform_user_id, page_token, image_url, content)
            .await?;

        self.wait_for_container(&container_id, page_token).await?;

        let url = format!(
            "{}/{}/media_publish?creation_id={}&access_token={}",
            GRAPH_BASE,
            auth.platform_user_id,
            percent_encode(&container_id),
            percent_encode(page_token),
        );

        let resp = self.http.post(url).send().await?;
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(SocialError::Api(text));
        }

        let created: CreatedObject = resp.json().await?;
        Ok(created.id)
    }
}

#[derive(Debug, Deserialize)]
struct ShortLivedToken {
    access_token: String,
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
    instagram_business_account: Option<BusinessAccount>,
}

#[derive(Debug, Deserialize)]
struct BusinessAccount {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    status_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> InstagramClient {
        InstagramClient::new("app-id", "app-secret", "https://app.test/auth/instagram/callback")
    }

    fn auth() -> PublishAuth {
        PublishAuth {
            access_token: "user-token".into(),
            platform_user_id: "ig-biz-1".into(),
            page_id: Some("page-1".into()),
            page_access_token: Some("page-token".into()),
        }
    }

    #[test]
    fn test_authorize_url_embeds_state() {
        let url = client().authorize_url("ig-state", None);
        assert!(url.contains("state=ig%2Dstate"));
        assert!(url.contains("instagram%5Fcontent%5Fpublish"));
    }

    #[tokio::test]
    async fn test_publish_without_media_fails_before_network() {
        let err = client().publish(&auth(), "caption", None).await.unwrap_err();
        assert!(matches!(err, SocialError::MissingMedia));
    }

    #[tokio::test]
    async fn test_publish_without_page_token_fails_before_network() {
        let mut a = auth();
        a.page_access_token = None;
        let err = client()
            .publish(&a, "caption", Some("https://img.test/a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::MissingPageIdentity));
    }
}
