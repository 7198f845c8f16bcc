//! Connection lifecycle for the notification push channel.
//!
//! [`ChannelState::handle`] is a pure transition function: it consumes one
//! [`ChannelInput`], updates the state and returns the [`ChannelCommand`]s the
//! caller must carry out. It never touches a socket or a clock, so the whole
//! reconnect policy can be driven by hand in tests.
//!
//! Every connection and every reconnect timer gets a fresh id. Inputs that
//! name an id other than the live connection or the pending timer are stale
//! and dropped, which is what keeps a closed connection's late error from
//! starting a second reconnect cycle. Summary fetches are tagged the same
//! way with the [`SessionId`] of the sign-in that issued them.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::model::{ConnectionId, ConnectionStatus, SessionId, TimerId, UnreadSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(base_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_attempts,
        }
    }

    #[must_use]
    pub const fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_reconnect_attempts)
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `base * 2^attempt`, or `None` once the budget is spent.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Some(Duration::from_millis(ms))
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    Connect,
    Disconnect,
    /// Manual reconnect: resets the budget, then connects.
    Reconnect,
    AuthChanged {
        authenticated: bool,
    },
    RefreshRequested,
    TokenRefreshed,
    StreamOpened {
        connection: ConnectionId,
    },
    StreamMessage {
        connection: ConnectionId,
        data: String,
        event_id: Option<String>,
    },
    StreamFailed {
        connection: ConnectionId,
        reason: String,
    },
    TimerFired {
        timer: TimerId,
    },
    SummaryLoaded {
        session: SessionId,
        summary: UnreadSummary,
    },
    SummaryFailed {
        session: SessionId,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    OpenStream {
        connection: ConnectionId,
        last_event_id: Option<String>,
    },
    CloseStream {
        connection: ConnectionId,
    },
    ScheduleReconnect {
        timer: TimerId,
        delay: Duration,
    },
    CancelReconnect {
        timer: TimerId,
    },
    FetchSummary {
        session: SessionId,
    },
    Render,
}

#[derive(Debug, Clone)]
pub struct ChannelState {
    status: ConnectionStatus,
    summary: UnreadSummary,
    attempts: u32,
    authenticated: bool,
    session: SessionId,
    live: Option<ConnectionId>,
    pending_timer: Option<TimerId>,
    last_event_id: Option<String>,
    last_connection: ConnectionId,
    last_timer: TimerId,
    policy: ReconnectPolicy,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new(&ChannelConfig::default())
    }
}

impl ChannelState {
    #[must_use]
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            summary: UnreadSummary::default(),
            attempts: 0,
            authenticated: false,
            session: SessionId(0),
            live: None,
            pending_timer: None,
            last_event_id: None,
            last_connection: ConnectionId(0),
            last_timer: TimerId(0),
            policy: ReconnectPolicy::from_config(config),
        }
    }

    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub const fn unread_count(&self) -> u64 {
        self.summary.unread_count
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Value> {
        self.summary.latest.as_ref()
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Bumped on every sign-in and sign-out.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub const fn live_connection(&self) -> Option<ConnectionId> {
        self.live
    }

    #[must_use]
    pub const fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Takes effect from the next scheduled reconnect.
    pub fn set_policy(&mut self, policy: ReconnectPolicy) {
        self.policy = policy;
    }

    pub fn handle(&mut self, input: ChannelInput) -> Vec<ChannelCommand> {
        let mut commands = Vec::new();

        match input {
            ChannelInput::Connect => self.connect(&mut commands),

            ChannelInput::Disconnect => self.disconnect(&mut commands),

            ChannelInput::Reconnect => {
                self.attempts = 0;
                self.connect(&mut commands);
            }

            ChannelInput::AuthChanged { authenticated: true } => {
                if !self.authenticated {
                    self.authenticated = true;
                    self.session = self.session.next();
                    self.attempts = 0;
                    self.connect(&mut commands);
                }
            }

            ChannelInput::AuthChanged {
                authenticated: false,
            } => {
                if self.authenticated {
                    self.disconnect(&mut commands);
                    self.authenticated = false;
                    self.session = self.session.next();
                    self.summary = UnreadSummary::default();
                    self.last_event_id = None;
                }
            }

            ChannelInput::RefreshRequested => {
                if !self.authenticated {
                    debug!("refresh ignored while signed out");
                } else {
                    commands.push(self.fetch_summary());
                    if self.status == ConnectionStatus::Disconnected
                        && self.live.is_none()
                        && self.attempts < self.policy.max_attempts()
                    {
                        self.connect(&mut commands);
                    }
                }
            }

            ChannelInput::TokenRefreshed => {
                if self.authenticated {
                    self.attempts = 0;
                    commands.push(self.fetch_summary());
                    self.connect(&mut commands);
                }
            }

            ChannelInput::StreamOpened { connection } => {
                if self.is_stale(connection) {
                    debug!(%connection, "ignoring open from stale connection");
                } else {
                    info!(%connection, "notification stream connected");
                    self.status = ConnectionStatus::Connected;
                    self.attempts = 0;
                    commands.push(self.fetch_summary());
                    commands.push(ChannelCommand::Render);
                }
            }

            ChannelInput::StreamMessage {
                connection,
                data,
                event_id,
            } => {
                if self.is_stale(connection) {
                    debug!(%connection, "ignoring message from stale connection");
                } else {
                    match UnreadSummary::parse(&data) {
                        Ok(summary) => {
                            if event_id.is_some() {
                                self.last_event_id = event_id;
                            }
                            self.summary = summary;
                            commands.push(ChannelCommand::Render);
                        }
                        Err(e) => {
                            warn!(%connection, error = %e, "discarding notification frame");
                        }
                    }
                }
            }

            ChannelInput::StreamFailed { connection, reason } => {
                if self.is_stale(connection) {
                    debug!(%connection, %reason, "ignoring error from stale connection");
                } else {
                    self.fail(connection, &reason, &mut commands);
                }
            }

            ChannelInput::TimerFired { timer } => {
                if self.pending_timer == Some(timer) {
                    self.pending_timer = None;
                    self.connect(&mut commands);
                } else {
                    debug!(%timer, "ignoring cancelled reconnect timer");
                }
            }

            ChannelInput::SummaryLoaded { session, summary } => {
                if self.authenticated && session == self.session {
                    self.summary = summary;
                    commands.push(ChannelCommand::Render);
                } else {
                    debug!(
                        %session,
                        current = %self.session,
                        "dropping unread summary from another session"
                    );
                }
            }

            ChannelInput::SummaryFailed { session, reason } => {
                if session == self.session {
                    warn!(%reason, "unread summary fetch failed");
                } else {
                    debug!(%session, %reason, "ignoring summary failure from another session");
                }
            }
        }

        commands
    }

    const fn fetch_summary(&self) -> ChannelCommand {
        ChannelCommand::FetchSummary {
            session: self.session,
        }
    }

    fn is_stale(&self, connection: ConnectionId) -> bool {
        self.live != Some(connection)
    }

    fn connect(&mut self, commands: &mut Vec<ChannelCommand>) {
        if !self.authenticated {
            debug!("connect ignored while signed out");
            return;
        }

        self.cancel_timer(commands);
        if let Some(previous) = self.live.take() {
            commands.push(ChannelCommand::CloseStream {
                connection: previous,
            });
        }

        self.last_connection = self.last_connection.next();
        let connection = self.last_connection;
        self.live = Some(connection);
        self.status = ConnectionStatus::Connecting;

        info!(%connection, attempt = self.attempts, "opening notification stream");
        commands.push(ChannelCommand::OpenStream {
            connection,
            last_event_id: self.last_event_id.clone(),
        });
        commands.push(ChannelCommand::Render);
    }

    fn disconnect(&mut self, commands: &mut Vec<ChannelCommand>) {
        self.cancel_timer(commands);
        if let Some(connection) = self.live.take() {
            info!(%connection, "closing notification stream");
            commands.push(ChannelCommand::CloseStream { connection });
        }
        self.status = ConnectionStatus::Disconnected;
        self.attempts = 0;
        commands.push(ChannelCommand::Render);
    }

    fn fail(&mut self, connection: ConnectionId, reason: &str, commands: &mut Vec<ChannelCommand>) {
        self.live = None;
        commands.push(ChannelCommand::CloseStream { connection });

        match self.policy.delay_for(self.attempts) {
            Some(delay) => {
                self.cancel_timer(commands);
                self.status = ConnectionStatus::Disconnected;
                self.attempts += 1;
                self.last_timer = self.last_timer.next();
                let timer = self.last_timer;
                self.pending_timer = Some(timer);

                info!(
                    %connection,
                    %reason,
                    attempt = self.attempts,
                    delay_ms = millis(delay),
                    "notification stream dropped, reconnect scheduled"
                );
                commands.push(ChannelCommand::ScheduleReconnect { timer, delay });
            }
            None => {
                self.status = ConnectionStatus::Error;
                warn!(
                    %connection,
                    %reason,
                    attempts = self.attempts,
                    "notification stream failed, giving up until reconnect"
                );
            }
        }

        commands.push(ChannelCommand::Render);
    }

    fn cancel_timer(&mut self, commands: &mut Vec<ChannelCommand>) {
        if let Some(timer) = self.pending_timer.take() {
            commands.push(ChannelCommand::CancelReconnect { timer });
        }
    }
}
