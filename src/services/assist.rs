//! Content assistant glue
//!
//! Thin request/response client for the generation service (Gemini). The
//! provider's internal behavior is a black box; both operations are single
//! stateless POSTs.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::social::http_client;
use crate::models::Platform;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const TEXT_MODEL: &str = "gemini-2.0-flash";

/// What the composer is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistAction {
    Draft,
    Improve,
    Shorten,
    Expand,
    Hashtags,
}

/// A text-generation request from the composer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistRequest {
    #[serde(rename = "type")]
    pub action: AssistAction,
    pub tone: Option<String>,
    pub platform: Option<Platform>,
    pub current_text: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug)]
pub enum AssistError {
    Http(reqwest::Error),
    Api(String),
}

impl From<reqwest::Error> for AssistError {
    fn from(e: reqwest::Error) -> Self {
        AssistError::Http(e)
    }
}

impl std::fmt::Display for AssistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistError::Http(e) => write!(f, "HTTP error: {}", e),
            AssistError::Api(s) => write!(f, "Generation API error: {}", s),
        }
    }
}

impl std::error::Error for AssistError {}

#[derive(Clone)]
pub struct AssistClient {
    api_key: String,
    http: Client,
}

impl AssistClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: http_client(),
        }
    }

    /// Build the instruction for a composer action
    fn build_prompt(req: &AssistRequest) -> String {
        let platform = req
            .platform
            .map(|p| p.to_string())
            .unwrap_or_else(|| "social media".to_string());
        let tone = req.tone.as_deref().unwrap_or("engaging");
        let current = req.current_text.as_deref().unwrap_or("");

        match req.action {
            AssistAction::Draft => format!(
                "Write a {} post for {} about: {}. Keep it concise and ready to publish; return only the post text.",
                tone,
                platform,
                req.topic.as_deref().unwrap_or("the user's business"),
            ),
            AssistAction::Improve => format!(
                "Improve this {} post while keeping its meaning and a {} tone. Return only the post text.\n\n{}",
                platform, tone, current
            ),
            AssistAction::Shorten => format!(
                "Shorten this {} post while keeping its key message. Return only the post text.\n\n{}",
                platform, current
            ),
            AssistAction::Expand => format!(
                "Expand this {} post with more detail, keeping a {} tone. Return only the post text.\n\n{}",
                platform, tone, current
            ),
            AssistAction::Hashtags => format!(
                "Suggest 5 relevant hashtags for this {} post. Return only the hashtags, space-separated.\n\n{}",
                platform, current
            ),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, AssistError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_BASE, TEXT_MODEL, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(AssistError::Api(text));
        }

        let generated: GenerateContentResponse = resp.json().await?;
        generated
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AssistError::Api("empty generation response".to_string()))
    }

    /// generateText: produce post copy for a composer action
    pub async fn generate_text(&self, req: &AssistRequest) -> Result<String, AssistError> {
        self.generate(&Self::build_prompt(req)).await
    }

    /// generateImage: produce a detailed image brief for the given prompt.
    /// The provider glue returns a description; wiring an actual image model
    /// behind this call is a deployment concern, not a pipeline one.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, AssistError> {
        let brief = format!(
            "Create a detailed image description suitable for AI image generation \
             for a social media post. The image should be: {}. Describe the main \
             subject, composition, colors, lighting, style, and mood. Keep it \
             under 200 words.",
            prompt
        );
        self.generate(&brief).await
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_prompt_includes_platform_and_topic() {
        let req = AssistRequest {
            action: AssistAction::Draft,
            tone: Some("playful".into()),
            platform: Some(Platform::Instagram),
            current_text: None,
            topic: Some("our summer sale".into()),
        };
        let prompt = AssistClient::build_prompt(&req);
        assert!(prompt.contains("instagram"));
        assert!(prompt.contains("our summer sale"));
        assert!(prompt.contains("playful"));
    }

    #[test]
    fn test_hashtags_prompt_carries_current_text() {
        let req = AssistRequest {
            action: AssistAction::Hashtags,
            tone: None,
            platform: Some(Platform::Twitter),
            current_text: Some("Big launch today!".into()),
            topic: None,
        };
        let prompt = AssistClient::build_prompt(&req);
        assert!(prompt.contains("Big launch today!"));
        assert!(prompt.contains("hashtags"));
    }
}
