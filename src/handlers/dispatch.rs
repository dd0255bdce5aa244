//! 请求体解析与 `action` 分发

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ApiError;

/// 带 `action` 的请求体，其余字段为该操作的参数
#[derive(Debug, Deserialize)]
pub struct ActionEnvelope {
    #[serde(default)]
    action: Option<Value>,
    #[serde(flatten)]
    params: Map<String, Value>,
}

impl ActionEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        parse_json(body)
    }

    /// 非字符串的 action 当作缺失
    pub fn action(&self) -> Option<&str> {
        self.action.as_ref().and_then(Value::as_str).map(str::trim)
    }

    pub fn params<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(Value::Object(self.params))
            .map_err(|e| ApiError::bad_request(format!("Invalid parameters: {}", e)))
    }
}

pub fn invalid_action() -> ApiError {
    ApiError::bad_request("Invalid action")
}

/// 解析 JSON 请求体，空请求体按 `{}` 处理
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

/// 必填字符串字段，去空白后不能为空
pub fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}
