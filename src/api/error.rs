use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::lifecycle::Cancellable;

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("Request cancelled")]
  Cancelled,

  #[error("Unauthorized - token may be missing or expired")]
  Unauthorized,

  #[error("Request rejected with status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
  Rejected {
    status: StatusCode,
    detail: Option<String>,
  },

  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Invalid response: {0}")]
  InvalidResponse(String),

  #[error("Invalid URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// FastAPI error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
  detail: serde_json::Value,
}

impl ApiError {
  /// Truncate a response body to avoid logging excessive data
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
      end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
  }

  /// Pull the backend's message out of an error body.
  ///
  /// `detail` is usually a string; validation errors carry a list of
  /// objects with a `msg` field.
  fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
      serde_json::Value::String(s) => Some(s),
      serde_json::Value::Array(items) => {
        let messages: Vec<&str> = items
          .iter()
          .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
          .collect();
        if messages.is_empty() {
          None
        } else {
          Some(messages.join("; "))
        }
      }
      _ => None,
    }
  }

  pub fn from_status(status: StatusCode, body: &str) -> Self {
    if status == StatusCode::UNAUTHORIZED {
      return ApiError::Unauthorized;
    }
    let detail = Self::extract_detail(body).or_else(|| {
      let trimmed = body.trim();
      (!trimmed.is_empty()).then(|| Self::truncate_body(trimmed))
    });
    ApiError::Rejected { status, detail }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, ApiError::Cancelled)
  }

  /// The backend-provided message, if the server sent one.
  pub fn detail(&self) -> Option<&str> {
    match self {
      ApiError::Rejected { detail, .. } => detail.as_deref(),
      _ => None,
    }
  }

  /// Message to show a user: the backend detail when present, `fallback` otherwise.
  pub fn user_message(&self, fallback: &str) -> String {
    self.detail().unwrap_or(fallback).to_string()
  }
}

impl Cancellable for ApiError {
  fn is_cancelled(&self) -> bool {
    ApiError::is_cancelled(self)
  }
}
