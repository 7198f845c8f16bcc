use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::channel::ChannelState;
use crate::config::ChannelConfig;
use crate::error::ChannelError;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

typed_id!(ConnectionId, "conn");
typed_id!(TimerId, "timer");
typed_id!(SessionId, "session");

// --- Connection status ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Unread summary ---

/// Server-authoritative snapshot. Pushed frames and the summary endpoint
/// share this shape, and every arrival replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub unread_count: u64,
    #[serde(default)]
    pub latest: Option<Value>,
}

impl UnreadSummary {
    pub fn parse(raw: &str) -> Result<Self, ChannelError> {
        let summary: Self = serde_json::from_str(raw)?;
        summary.validate()?;
        Ok(summary)
    }

    pub fn validate(&self) -> Result<(), ChannelError> {
        match &self.latest {
            None | Some(Value::Object(_)) => Ok(()),
            Some(other) => Err(ChannelError::InvalidPayload {
                reason: format!("`latest` must be an object or null, got {other}"),
            }),
        }
    }
}

// --- Model ---

#[derive(Debug, Default)]
pub struct Model {
    pub config: ChannelConfig,
    pub channel: ChannelState,
}

impl Model {
    /// Fails with [`ChannelError::InvalidConfig`] if the config does not validate.
    pub fn with_config(config: ChannelConfig) -> Result<Self, ChannelError> {
        config.validate()?;
        let channel = ChannelState::new(&config);
        Ok(Self { config, channel })
    }
}

// --- View model ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub connection_status: ConnectionStatus,
    pub unread_count: u64,
    pub latest: Option<Value>,
    pub reconnect_attempts: u32,
    pub can_reconnect: bool,
}

impl From<&ChannelState> for ViewModel {
    fn from(channel: &ChannelState) -> Self {
        Self {
            connection_status: channel.status(),
            unread_count: channel.unread_count(),
            latest: channel.latest().cloned(),
            reconnect_attempts: channel.attempts(),
            can_reconnect: channel.is_authenticated()
                && matches!(
                    channel.status(),
                    ConnectionStatus::Disconnected | ConnectionStatus::Error
                ),
        }
    }
}
