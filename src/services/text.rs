//! 文本整理与统计
//! OCR / PDF / 模型输出的清洗、JSON 片段提取、字数与阅读时长

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// 阅读速度（词/分钟）
pub const WORDS_PER_MINUTE: usize = 200;

/// 文本统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextStatistics {
    pub word_count: usize,
    pub character_count: usize,
    pub line_count: usize,
    pub reading_time_minutes: usize,
}

impl TextStatistics {
    pub fn from_text(text: &str) -> Self {
        let word_count = word_count(text);
        Self {
            word_count,
            character_count: text.chars().count(),
            line_count: text.lines().filter(|l| !l.trim().is_empty()).count(),
            reading_time_minutes: reading_time_minutes(word_count),
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn reading_time_minutes(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE)
}

/// 清理提取文本：去掉行首尾空白，连续空行压成一个
pub fn normalize_extracted_text(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if lines.last().map(|l| !l.is_empty()).unwrap_or(false) {
                lines.push("");
            }
        } else {
            lines.push(line);
        }
    }
    lines.join("\n").trim().to_string()
}

fn fenced_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").expect("fenced block pattern")
    })
}

/// 从模型回复中取出 JSON 片段
///
/// 优先取 ```json 代码块，其次取第一个 `{`/`[` 到与之对应的最后一个括号。
pub fn extract_json_block(reply: &str) -> Option<String> {
    if let Some(cap) = fenced_block_pattern().captures(reply) {
        if let Some(body) = cap.get(1) {
            let body = body.as_str().trim();
            if !body.is_empty() {
                return Some(body.to_string());
            }
        }
    }

    let trimmed = reply.trim();
    let start = trimmed.find(['{', '['])?;
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].to_string())
}

/// 模型回复整体包在一个代码块里时取出块内文本，其余回复原样返回
///
/// 只去掉外层围栏，正文里的 `*`、编号列表等字符保持不变。
pub fn strip_code_fence(reply: &str) -> String {
    let mut events = Parser::new(reply.trim());
    if !matches!(
        events.next(),
        Some(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))))
    ) {
        return reply.to_string();
    }

    let mut body = String::new();
    for event in events.by_ref() {
        match event {
            Event::Text(text) => body.push_str(&text),
            Event::End(TagEnd::CodeBlock) => break,
            _ => return reply.to_string(),
        }
    }

    // 围栏之后还有内容，说明不是整段包裹
    if events.next().is_some() {
        return reply.to_string();
    }
    body
}
