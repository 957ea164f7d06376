use std::path::PathBuf;

use reqwest::StatusCode;
use serde_json::Value;

/// Failures raised while talking to the Confluence REST API.
///
/// Every variant is terminal for the scope that issued the request; nothing
/// in this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed with HTTP {status}{}", describe_body(.body.as_ref()))]
    Http {
        url: String,
        status: StatusCode,
        body: Option<Value>,
    },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            Self::Decode { .. } | Self::InvalidUrl { .. } => None,
        }
    }

    /// Parsed JSON error body returned by the server, if any.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

fn describe_body(body: Option<&Value>) -> String {
    let Some(body) = body else {
        return String::new();
    };
    let message = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("title").or_else(|| first.get("detail")))
        .or_else(|| body.get("message"))
        .and_then(Value::as_str);
    match message {
        Some(message) => format!(": {message}"),
        None => format!(": {body}"),
    }
}

/// Problems detected while assembling run configuration, before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {var} must be set")]
    MissingCredential { var: &'static str },

    #[error("invalid account name {value:?} (expected a workspace host label such as `mycompany`)")]
    InvalidAccount { value: String },

    #[error("invalid site URL {value}: {message}")]
    InvalidUrl { value: String, message: String },

    #[error("invalid CONFLUENCE_HTTP_TIMEOUT_MS {value:?} (expected milliseconds, 0 for no timeout)")]
    InvalidTimeout { value: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}
