use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    Payload,
    Transport,
    Http,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Configuration => "INVALID_CONFIG",
            Self::Payload => "INVALID_PAYLOAD",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Http => "HTTP_ERROR",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelError {
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("invalid notification payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("push connection failed: {message}")]
    Transport { message: String },

    #[error("unread summary request failed: {message}")]
    Http { message: String },
}

impl ChannelError {
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::InvalidPayload { .. } => ErrorKind::Payload,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::Http,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Transport and HTTP failures recover on their own (backoff or the next
    /// resync). Bad config and bad payloads never do.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Http)
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidPayload {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ChannelError::invalid_config("baseDelayMs", "must be > 0").code(),
            "INVALID_CONFIG"
        );
        assert_eq!(ChannelError::transport("refused").code(), "TRANSPORT_ERROR");
        assert_eq!(ChannelError::http("503").code(), "HTTP_ERROR");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ChannelError::transport("reset").is_retryable());
        assert!(ChannelError::http("timeout").is_retryable());
        assert!(!ChannelError::invalid_config("streamPath", "empty").is_retryable());

        let parse: ChannelError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert_eq!(parse.kind(), ErrorKind::Payload);
        assert!(!parse.is_retryable());
    }

    #[test]
    fn test_display() {
        let error = ChannelError::invalid_config("apiBaseUrl", "missing host");
        assert_eq!(
            error.to_string(),
            "invalid configuration for `apiBaseUrl`: missing host"
        );
    }
}
