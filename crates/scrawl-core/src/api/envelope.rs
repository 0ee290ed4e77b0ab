//! Typed response envelopes.

use serde::Deserialize;

use super::transport::ApiResponse;
use crate::error::{Error, Result};

/// `{data: T} | {error, message}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Data { data: T },
    Failure(ErrorBody),
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Best human-readable message: `message` (string or list of strings),
    /// then `error`.
    pub fn message(&self) -> Option<String> {
        self.message
            .as_ref()
            .and_then(render_message)
            .or_else(|| self.error.as_ref().and_then(render_message))
    }
}

fn render_message(value: &serde_json::Value) -> Option<String> {
    let rendered = match value {
        serde_json::Value::String(text) => text.trim().to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(serde_json::Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        _ => return None,
    };
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

impl<T> Envelope<T> {
    pub fn into_result(self, status: u16) -> Result<T> {
        match self {
            Self::Data { data } => Ok(data),
            Self::Failure(body) => match body.message() {
                Some(message) if status == 401 => Err(Error::Auth(message)),
                Some(message) => Err(Error::Api { status, message }),
                None => Err(Error::MalformedResponse(format!(
                    "response carried neither data nor an error (HTTP {status})"
                ))),
            },
        }
    }
}

/// Decode a response whose success body is `{data: T}`.
pub(crate) fn decode_data<T>(response: ApiResponse) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if !response.is_success() {
        return Err(response.into_error());
    }
    let status = response.status;
    response.decode::<Envelope<T>>()?.into_result(status)
}
