use serde::Deserialize;

/// Failure of a single REST exchange, surfaced once to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx response. Displays exactly the server-provided message.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timeout: {0}")]
    Timeout(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Validation(String),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("request cancelled")]
    Cancelled,
    #[error("directory is shut down")]
    Closed,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl ApiError {
    /// Build the error for a non-success response from its raw body. Uses the
    /// body's `error` field when present, `HTTP <status>` otherwise.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self::Status { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Timeout(value.to_string());
        }
        Self::Request(value.to_string())
    }
}

/// Errors raised by the event feed. None of them is fatal: the feed client
/// logs them and reconnects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("feed connection error: {0}")]
    Transport(String),
    #[error("malformed feed message: {0}")]
    Decode(String),
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
}

impl FeedError {
    pub fn connect<E: std::fmt::Display>(err: E) -> Self {
        Self::Connect(err.to_string())
    }

    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base url '{0}': expected an http:// or https:// origin")]
    InvalidBaseUrl(String),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
