//! 大模型推理服务
//! OpenAI Chat Completions 与 Claude Messages 两个后端，以及出题/整理相关的提示词工程

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::ensure_success;
use super::text::extract_json_block;
use crate::config::ProviderConfig;
use crate::models::{GeneratedContent, Mission, QuizQuestion};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 模型后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    OpenAi,
    Claude,
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OpenAI",
            LlmProvider::Claude => "Claude",
        }
    }
}

/// 聊天消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// 推理请求
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl InferenceRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, max_tokens: 2048, temperature: 0.7 }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// 推理响应
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub text: String,
    pub provider: LlmProvider,
    pub inference_time_ms: u64,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// 大模型客户端
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, config: Arc<ProviderConfig>) -> Self {
        Self { http, config }
    }

    pub fn is_configured(&self, provider: LlmProvider) -> bool {
        match provider {
            LlmProvider::OpenAi => self.config.has_openai(),
            LlmProvider::Claude => self.config.has_anthropic(),
        }
    }

    /// 内容生成优先用 Claude，未配置时退回 OpenAI
    pub fn preferred_provider(&self) -> Option<LlmProvider> {
        if self.config.has_anthropic() {
            Some(LlmProvider::Claude)
        } else if self.config.has_openai() {
            Some(LlmProvider::OpenAi)
        } else {
            None
        }
    }

    /// 推理补全（单次请求，不重试）
    pub async fn complete(
        &self,
        provider: LlmProvider,
        request: InferenceRequest,
    ) -> Result<InferenceResponse> {
        let start_time = Instant::now();
        let text = match provider {
            LlmProvider::OpenAi => self.openai_chat(&request).await?,
            LlmProvider::Claude => self.claude_messages(&request).await?,
        };

        let inference_time_ms = start_time.elapsed().as_millis() as u64;
        log::debug!(
            "{} completion finished in {}ms ({} chars)",
            provider.name(),
            inference_time_ms,
            text.len()
        );

        Ok(InferenceResponse { text, provider, inference_time_ms })
    }

    async fn openai_chat(&self, request: &InferenceRequest) -> Result<String> {
        let key = ProviderConfig::key(&self.config.openai_api_key)
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not configured"))?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.openai_base_url.trim_end_matches('/')
        );

        let body = OpenAiRequest {
            model: &self.config.openai_model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .context("OpenAI request failed")?;
        let response = ensure_success(response, "OpenAI").await?;

        let parsed: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("OpenAI returned an empty completion"))
    }

    async fn claude_messages(&self, request: &InferenceRequest) -> Result<String> {
        let key = ProviderConfig::key(&self.config.anthropic_api_key)
            .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY is not configured"))?;
        let url = format!(
            "{}/v1/messages",
            self.config.anthropic_base_url.trim_end_matches('/')
        );

        // Claude 的 system 提示词单独传
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let body = ClaudeRequest {
            model: &self.config.anthropic_model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: if system.is_empty() { None } else { Some(system.join("\n\n")) },
            messages: request.messages.iter().filter(|m| m.role != "system").collect(),
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("Claude request failed")?;
        let response = ensure_success(response, "Claude").await?;

        let parsed: ClaudeResponse = response
            .json()
            .await
            .context("Failed to parse Claude response")?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("Claude returned an empty message"))
    }
}

/// 出题与整理提示词
pub struct QuizPrompt;

impl QuizPrompt {
    pub fn system() -> ChatMessage {
        ChatMessage::system(
            "You are an expert teacher and exam designer for a mobile learning app. \
             Always answer with valid JSON when JSON is requested, and nothing else.",
        )
    }

    /// 每日测验出题
    pub fn daily_quiz(date: NaiveDate, count: usize) -> String {
        format!(
            r#"Create the daily quiz for {date}. Generate exactly {count} multiple-choice questions covering a mix of school subjects (Math, Science, History, Geography, Language, General Knowledge).

## Requirements:
1. Each question has exactly 4 options
2. `correct_answer` must be copied verbatim from `options`
3. Mix difficulties: roughly 40% easy, 40% medium, 20% hard
4. Keep each explanation to one or two sentences

## Output format (JSON):
{{
  "questions": [
    {{
      "question": "...",
      "options": ["...", "...", "...", "..."],
      "correct_answer": "...",
      "explanation": "...",
      "subject": "Math",
      "difficulty": "easy"
    }}
  ]
}}

Output only the JSON, no other text."#
        )
    }

    /// 根据任务素材生成学习内容
    pub fn mission_content(mission: &Mission) -> String {
        format!(
            r#"Turn the following study material into a learning mission.

## Title:
{}

## Description:
{}

## Material type:
{}

## Material:
{}

## Output format (JSON):
{{
  "summary": "A concise summary of the material (3-5 sentences)",
  "keyPoints": ["...", "..."],
  "questions": [
    {{
      "question": "...",
      "options": ["...", "...", "...", "..."],
      "correct_answer": "...",
      "explanation": "...",
      "subject": "...",
      "difficulty": "medium"
    }}
  ],
  "flashcards": [{{ "front": "...", "back": "..." }}]
}}

Generate 5 questions and 5 flashcards. `correct_answer` must be one of `options`.
Output only the JSON, no other text."#,
            mission.title,
            mission.description.as_deref().unwrap_or("-"),
            mission.content_type,
            mission.source_text
        )
    }

    /// OCR / PDF 文本整理
    pub fn clean_text(raw: &str, source: &str) -> String {
        format!(
            r#"The following text was extracted from {source} and may contain recognition errors, broken lines, page headers or stray symbols.

Fix obvious recognition errors, join broken lines into paragraphs and remove page artifacts. Do not summarize, translate or add content.
Return only the cleaned text.

## Extracted text:
{raw}"#
        )
    }

    /// 视频学科分类
    pub fn classify_subject(title: &str, description: &str) -> String {
        format!(
            r#"Classify this educational video into one study subject.

## Title:
{title}

## Description:
{description}

Answer with a single subject name such as Math, Science, History, Geography, Language, Programming, Art or General. Output only the subject."#
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionsPayload {
    Wrapped { questions: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// 解析模型返回的题目，丢弃不合格的题
pub fn parse_questions(reply: &str) -> Result<Vec<QuizQuestion>> {
    let json = extract_json_block(reply).ok_or_else(|| anyhow!("AI reply contained no JSON"))?;
    let payload: QuestionsPayload =
        serde_json::from_str(&json).context("AI reply was not a question list")?;
    let raw = match payload {
        QuestionsPayload::Wrapped { questions } => questions,
        QuestionsPayload::Bare(questions) => questions,
    };

    let mut questions = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<QuizQuestion>(value) {
            Ok(q) if q.is_well_formed() => questions.push(normalize_question(q)),
            Ok(_) => log::warn!("Dropping malformed AI question #{}", idx + 1),
            Err(e) => log::warn!("Dropping unparsable AI question #{}: {}", idx + 1, e),
        }
    }

    if questions.is_empty() {
        bail!("AI returned no usable questions");
    }
    Ok(questions)
}

fn normalize_question(mut q: QuizQuestion) -> QuizQuestion {
    q.question = q.question.trim().to_string();
    q.options = q.options.into_iter().map(|o| o.trim().to_string()).collect();
    q.correct_answer = q.correct_answer.trim().to_string();
    if q.points == 0 {
        q.points = q.difficulty.default_points();
    }
    q
}

/// 解析任务学习内容
pub fn parse_generated_content(reply: &str) -> Result<GeneratedContent> {
    let json = extract_json_block(reply).ok_or_else(|| anyhow!("AI reply contained no JSON"))?;
    let mut content: GeneratedContent =
        serde_json::from_str(&json).context("AI reply was not mission content")?;

    content.questions = content
        .questions
        .into_iter()
        .filter(QuizQuestion::is_well_formed)
        .map(normalize_question)
        .collect();

    if content.summary.trim().is_empty() && content.questions.is_empty() {
        bail!("AI returned empty mission content");
    }
    Ok(content)
}

/// 解析学科分类，只接受简短答案
pub fn parse_subject(reply: &str) -> Option<String> {
    let subject = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .trim_matches(|c: char| !c.is_alphanumeric() && c != ' ')
        .trim();

    if subject.is_empty() || subject.split_whitespace().count() > 3 {
        return None;
    }
    Some(subject.to_string())
}
