use std::fmt;

use crate::capabilities::StreamSignal;
use crate::config::ChannelConfig;
use crate::model::{ConnectionId, SessionId, TimerId, UnreadSummary};

pub type SummaryResult = crux_http::Result<crux_http::Response<UnreadSummary>>;

#[derive(Default)]
pub enum Event {
    #[default]
    Noop,

    // --- from the shell ---
    Configure(ChannelConfig),
    AuthStateChanged {
        authenticated: bool,
    },
    Connect,
    Disconnect,
    Reconnect,
    RefreshNotifications,
    TokenRefreshed,

    // --- from capabilities ---
    Stream {
        connection: ConnectionId,
        signal: StreamSignal,
    },
    ReconnectTimerFired {
        timer: TimerId,
    },
    SummaryResponse {
        session: SessionId,
        result: Box<SummaryResult>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::AuthStateChanged { .. } => "auth_state_changed",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
            Self::RefreshNotifications => "refresh_notifications",
            Self::TokenRefreshed => "token_refreshed",
            Self::Stream { .. } => "stream",
            Self::ReconnectTimerFired { .. } => "reconnect_timer_fired",
            Self::SummaryResponse { .. } => "summary_response",
        }
    }

    /// Events the shell may send. The rest are produced by capabilities.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        !matches!(
            self,
            Self::Stream { .. } | Self::ReconnectTimerFired { .. } | Self::SummaryResponse { .. }
        )
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure(config) => f.debug_tuple("Configure").field(config).finish(),
            Self::AuthStateChanged { authenticated } => f
                .debug_struct("AuthStateChanged")
                .field("authenticated", authenticated)
                .finish(),
            Self::Stream { connection, signal } => f
                .debug_struct("Stream")
                .field("connection", connection)
                .field("signal", signal)
                .finish(),
            Self::ReconnectTimerFired { timer } => f
                .debug_struct("ReconnectTimerFired")
                .field("timer", timer)
                .finish(),
            // the http response type is opaque; its name is enough in logs
            other => f.write_str(other.name()),
        }
    }
}
