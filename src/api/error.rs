use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::core::constants::MISSING_KEY_MESSAGE;

/// Every way a remote request can fail. All variants are terminal for the
/// request that produced them; nothing is retried.
#[derive(Debug)]
pub enum ApiError {
    /// No API key in storage; no request was sent.
    MissingCredential,

    /// The request never produced an HTTP response.
    Network(reqwest::Error),

    /// The API answered with a non-success status.
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The response body was not the JSON we expected.
    Decode(serde_json::Error),

    /// A successful response that carried nothing usable.
    EmptyResult(&'static str),

    /// The local audio file could not be read.
    Audio {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Another call for the same action is still in flight.
    Busy(&'static str),
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Status {
            status,
            message: summarize_error_body(body),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingCredential => f.write_str(MISSING_KEY_MESSAGE),
            ApiError::Network(err) => write!(f, "Request failed: {err}"),
            ApiError::Status { status, message } => {
                write!(f, "API request failed with status {status}: {message}")
            }
            ApiError::Decode(err) => write!(f, "Unexpected API response: {err}"),
            ApiError::EmptyResult(what) => write!(f, "The API returned no {what}"),
            ApiError::Audio { path, source } => {
                write!(f, "Could not read audio file {}: {}", path.display(), source)
            }
            ApiError::Busy(action) => write!(f, "Another {action} request is already in progress"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApiError::Network(err) => Some(err),
            ApiError::Decode(err) => Some(err),
            ApiError::Audio { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err)
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// One-line description of an error body: the JSON `error.message` when
/// there is one, otherwise the trimmed body itself.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return summary;
            }
        }
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
