// 服务模块
// 提供第三方服务调用、持久化与文本处理

pub mod challenge;
pub mod database;
pub mod llm;
pub mod pdf;
pub mod text;
pub mod vision;
pub mod youtube;

pub use challenge::{AnswerOutcome, AnswerSubmission, ChallengeError};
pub use database::DatabaseService;
pub use llm::{ChatMessage, InferenceRequest, InferenceResponse, LlmClient, LlmProvider, QuizPrompt};
pub use pdf::{PdfExtraction, PdfExtractor};
pub use text::TextStatistics;
pub use vision::VisionClient;
pub use youtube::{VideoMetadata, YouTubeClient};

use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::config::ProviderConfig;

/// 错误信息最多保留的字符数
const MAX_ERROR_BODY_CHARS: usize = 500;

/// 所有第三方客户端，共享一个 HTTP 连接池
#[derive(Clone)]
pub struct Providers {
    pub llm: LlmClient,
    pub vision: VisionClient,
    pub youtube: YouTubeClient,
    pub config: Arc<ProviderConfig>,
}

impl Providers {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("quiz-functions/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        let config = Arc::new(config);

        Ok(Self {
            llm: LlmClient::new(http.clone(), config.clone()),
            vision: VisionClient::new(http.clone(), config.clone()),
            youtube: YouTubeClient::new(http, config.clone()),
            config,
        })
    }

    /// 各第三方服务的密钥配置情况，启动时打印
    pub fn status_summary(&self) -> String {
        let status = |key: &Option<String>| {
            if ProviderConfig::key(key).is_some() {
                "configured"
            } else {
                "missing"
            }
        };
        format!(
            "openai={} claude={} vision={} youtube={}",
            status(&self.config.openai_api_key),
            status(&self.config.anthropic_api_key),
            status(&self.config.vision_api_key),
            status(&self.config.youtube_api_key)
        )
    }
}

/// 非 2xx 状态时读取错误体并返回错误
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    bail!("{} API error ({}): {}", provider, status, provider_error_message(&body));
}

/// 尽量取出 `error.message`，否则截断原始响应体
fn provider_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.pointer("/error"))
            .and_then(|v| v.as_str());
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
