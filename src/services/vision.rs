//! Google Vision 文字识别

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::ensure_success;
use crate::config::ProviderConfig;

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageAnnotation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAnnotation {
    #[serde(default)]
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    error: Option<AnnotationError>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct AnnotationError {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
}

impl VisionClient {
    pub fn new(http: reqwest::Client, config: Arc<ProviderConfig>) -> Self {
        Self { http, config }
    }

    /// 识别图片中的文字，未识别到时返回空字符串
    pub async fn detect_text(&self, image_base64: &str) -> Result<String> {
        let key = ProviderConfig::key(&self.config.vision_api_key)
            .ok_or_else(|| anyhow!("GOOGLE_VISION_API_KEY is not configured"))?;
        let url = format!(
            "{}/v1/images:annotate",
            self.config.vision_base_url.trim_end_matches('/')
        );

        let body = json!({
            "requests": [{
                "image": { "content": image_base64 },
                "features": [{ "type": "TEXT_DETECTION" }]
            }]
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .context("Google Vision request failed")?;
        let response = ensure_success(response, "Google Vision").await?;

        let parsed: AnnotateResponse = response
            .json()
            .await
            .context("Failed to parse Google Vision response")?;

        extract_text(parsed)
    }
}

fn extract_text(parsed: AnnotateResponse) -> Result<String> {
    let Some(annotation) = parsed.responses.into_iter().next() else {
        return Ok(String::new());
    };

    if let Some(error) = annotation.error {
        bail!("Google Vision API error: {}", error.message);
    }

    if let Some(full) = annotation.full_text_annotation {
        if !full.text.trim().is_empty() {
            return Ok(full.text);
        }
    }

    Ok(annotation
        .text_annotations
        .into_iter()
        .next()
        .map(|a| a.description)
        .unwrap_or_default())
}
