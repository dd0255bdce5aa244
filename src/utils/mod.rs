use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use std::path::Path;

/// 确保数据库文件所在目录存在
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir {}", parent.display()))?;
        }
    }
    Ok(())
}

/// 当前 UTC 日期
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// 解析 `YYYY-MM-DD`，缺省时取今天
pub fn parse_date_or_today(value: Option<&str>) -> Result<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", v)),
        None => Ok(today()),
    }
}

/// 解码 base64 负载，允许带 `data:<mime>;base64,` 前缀
pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>> {
    let trimmed = data.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((_, payload)) => payload,
            None => bail!("Malformed data URL"),
        },
        None => trimmed,
    };

    // 客户端有时会带换行
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        bail!("Payload is empty");
    }

    STANDARD.decode(compact.as_bytes()).context("Payload is not valid base64")
}

/// 重新编码为不带前缀的 base64
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
