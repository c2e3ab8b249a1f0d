//! Content assistant endpoints (/assist/*)
//!
//! Thin glue over the generation service; no state on either side.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ApiError;
use crate::AppState;
use crate::services::assist::AssistRequest;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assist/text", post(generate_text))
        .route("/assist/image", post(generate_image))
}

#[derive(Serialize)]
struct GenerateTextResponse {
    content: String,
}

/// POST /assist/text - generate or rework post copy
async fn generate_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssistRequest>,
) -> Result<Json<GenerateTextResponse>, ApiError> {
    let content = state
        .assist
        .generate_text(&req)
        .await
        .log_500("Text generation error")?;

    Ok(Json(GenerateTextResponse { content }))
}

#[derive(Deserialize)]
struct GenerateImageRequest {
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageResponse {
    description: String,
    image_url: Option<String>,
}

/// POST /assist/image - produce an image brief for the prompt.
/// `imageUrl` stays empty until an image model is wired behind the client.
async fn generate_image(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("Missing prompt"));
    }

    let description = state
        .assist
        .generate_image(&req.prompt)
        .await
        .log_500("Image generation error")?;

    Ok(Json(GenerateImageResponse {
        description,
        image_url: None,
    }))
}
