//! 图片文字识别

use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dispatch::{parse_json, required};
use super::{cleanup_pass, ApiError, AppState};
use crate::services::{LlmProvider, TextStatistics};
use crate::utils::{decode_base64_payload, encode_base64};

const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest {
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    image_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub success: bool,
    pub extracted_text: String,
    pub raw_text: String,
    pub image_type: String,
    pub statistics: TextStatistics,
    pub processing_steps: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

pub async fn extract_text(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OcrResponse>, ApiError> {
    let request: OcrRequest = parse_json(&body)?;
    let image_data = required(&request.image_data, "Image data is required")?;
    let image_type = request
        .image_type
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| data_url_mime(image_data))
        .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());

    let bytes =
        decode_base64_payload(image_data).map_err(|_| ApiError::bad_request("Invalid image data"))?;
    let mut steps = vec![format!("Decoded {} bytes of {}", bytes.len(), image_type)];

    let raw_text = state.providers.vision.detect_text(&encode_base64(&bytes)).await?;
    steps.push("Detected text with Google Vision".to_string());

    let extracted_text = if raw_text.trim().is_empty() {
        steps.push("No text found in image".to_string());
        String::new()
    } else {
        cleanup_pass(&state, LlmProvider::OpenAi, &raw_text, "a photo of a page", &mut steps).await
    };

    log::info!(
        "OCR extracted {} chars from {} image",
        extracted_text.len(),
        image_type
    );

    Ok(Json(OcrResponse {
        success: true,
        statistics: TextStatistics::from_text(&extracted_text),
        extracted_text,
        raw_text,
        image_type,
        processing_steps: steps,
        processed_at: Utc::now(),
    }))
}

/// 从 `data:image/png;base64,` 前缀中取 MIME 类型
fn data_url_mime(data: &str) -> Option<String> {
    let rest = data.strip_prefix("data:")?;
    let (meta, _) = rest.split_once(',')?;
    let mime = meta.split(';').next()?.trim();
    (!mime.is_empty()).then(|| mime.to_string())
}
