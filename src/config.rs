//! 服务配置
//! 命令行参数与环境变量二选一，密钥只从环境变量读取

use clap::{Args, Parser};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_VISION_BASE_URL: &str = "https://vision.googleapis.com";
pub const DEFAULT_YOUTUBE_BASE_URL: &str = "https://www.googleapis.com";

/// 请求体上限，base64 后的 PDF 可能较大
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Parser, Debug, Clone)]
#[command(name = "quiz-functions")]
#[command(about = "Backend functions for the quiz app: OCR, PDF, YouTube, AI missions and daily challenges")]
pub struct Config {
    /// Listen host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "data/quiz.db")]
    pub database_path: PathBuf,

    /// trace | debug | info | warn | error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    #[command(flatten)]
    pub providers: ProviderConfig,
}

/// 第三方服务配置
#[derive(Args, Debug, Clone)]
pub struct ProviderConfig {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = DEFAULT_ANTHROPIC_BASE_URL)]
    pub anthropic_base_url: String,

    #[arg(long, env = "ANTHROPIC_MODEL", default_value = "claude-3-5-haiku-latest")]
    pub anthropic_model: String,

    #[arg(long, env = "GOOGLE_VISION_API_KEY", hide_env_values = true)]
    pub vision_api_key: Option<String>,

    #[arg(long, env = "VISION_BASE_URL", default_value = DEFAULT_VISION_BASE_URL)]
    pub vision_base_url: String,

    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    #[arg(long, env = "YOUTUBE_BASE_URL", default_value = DEFAULT_YOUTUBE_BASE_URL)]
    pub youtube_base_url: String,

    /// Single-attempt timeout for every provider call
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            anthropic_api_key: None,
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            anthropic_model: "claude-3-5-haiku-latest".to_string(),
            vision_api_key: None,
            vision_base_url: DEFAULT_VISION_BASE_URL.to_string(),
            youtube_api_key: None,
            youtube_base_url: DEFAULT_YOUTUBE_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 空字符串视为未配置
    pub fn key(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn has_openai(&self) -> bool {
        Self::key(&self.openai_api_key).is_some()
    }

    pub fn has_anthropic(&self) -> bool {
        Self::key(&self.anthropic_api_key).is_some()
    }
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
