use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Field name to the messages the remote API attached to it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("API error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success response by status and body text.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => ApiError::Auth(detail_or_body(body)),
            404 => ApiError::NotFound(detail_or_body(body)),
            400..=499 => {
                let fields = parse_field_errors(body);
                let message = if fields.is_empty() {
                    detail_or_body(body)
                } else {
                    fields
                        .iter()
                        .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                ApiError::Validation { message, fields }
            }
            code => ApiError::Server {
                status: code,
                message: detail_or_body(body),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

fn detail_or_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail").or_else(|| map.get("error")) {
            Some(Value::String(detail)) => detail.clone(),
            _ => body.to_string(),
        },
        _ => body.to_string(),
    }
}

// Accepts `{"field": ["msg", ...]}` and `{"field": "msg"}`; `detail` is not a field.
fn parse_field_errors(body: &str) -> FieldErrors {
    let mut fields = FieldErrors::new();
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return fields;
    };

    for (key, value) in map {
        if key == "detail" {
            continue;
        }
        let messages: Vec<String> = match value {
            Value::String(msg) => vec![msg],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(msg) => Some(msg),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        if !messages.is_empty() {
            fields.insert(key, messages);
        }
    }

    fields
}
