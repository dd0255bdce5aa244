//! PDF 文本提取

use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dispatch::{parse_json, required};
use super::{cleanup_pass, ApiError, AppState};
use crate::services::{LlmProvider, PdfExtractor, TextStatistics};
use crate::utils::decode_base64_payload;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PdfRequest {
    #[serde(default)]
    file_data: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    /// 小于等于 0 视为不限制
    #[serde(default)]
    max_pages: Option<i64>,
}

impl PdfRequest {
    fn page_limit(&self) -> Option<usize> {
        self.max_pages
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfStatistics {
    #[serde(flatten)]
    pub text: TextStatistics,
    pub page_count: usize,
    pub pages_processed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfResponse {
    pub success: bool,
    pub file_name: String,
    pub extracted_text: String,
    pub statistics: PdfStatistics,
    pub processing_steps: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

pub async fn extract_text(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PdfResponse>, ApiError> {
    let request: PdfRequest = parse_json(&body)?;
    let file_data = required(&request.file_data, "File data is required")?;
    let file_name = required(&request.file_name, "File name is required")?.to_string();

    let bytes =
        decode_base64_payload(file_data).map_err(|_| ApiError::bad_request("Invalid file data"))?;
    if !PdfExtractor::looks_like_pdf(&bytes) {
        return Err(ApiError::bad_request("File is not a PDF document"));
    }
    let mut steps = vec![format!("Decoded {} ({} bytes)", file_name, bytes.len())];

    let extraction = PdfExtractor::extract(bytes, request.page_limit()).await?;
    steps.push(format!(
        "Extracted text from {} of {} pages",
        extraction.pages_processed, extraction.page_count
    ));

    let extracted_text = if extraction.text.trim().is_empty() {
        steps.push("No text layer found".to_string());
        String::new()
    } else {
        cleanup_pass(&state, LlmProvider::Claude, &extraction.text, "a PDF document", &mut steps)
            .await
    };

    log::info!(
        "PDF {} extracted {} chars from {} pages",
        file_name,
        extracted_text.len(),
        extraction.pages_processed
    );

    Ok(Json(PdfResponse {
        success: true,
        file_name,
        statistics: PdfStatistics {
            text: TextStatistics::from_text(&extracted_text),
            page_count: extraction.page_count,
            pages_processed: extraction.pages_processed,
        },
        extracted_text,
        processing_steps: steps,
        processed_at: Utc::now(),
    }))
}
