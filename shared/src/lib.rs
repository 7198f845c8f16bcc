// lib.rs - Notification channel core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capabilities;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod sse;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use channel::{ChannelCommand, ChannelInput, ChannelState, ReconnectPolicy};
pub use config::ChannelConfig;
pub use error::{ChannelError, ErrorKind};
pub use event::Event;
pub use model::{
    ConnectionId, ConnectionStatus, Model, SessionId, TimerId, UnreadSummary, ViewModel,
};

pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const MAX_RECONNECT_ATTEMPTS_LIMIT: u32 = 16;

pub mod app {
    use std::collections::VecDeque;

    use tracing::{debug, info, warn};

    use super::*;
    use crate::capabilities::StreamSignal;
    use crate::event::SummaryResult;

    #[derive(Default)]
    pub struct App;

    impl App {
        fn to_input(event: Event, model: &mut Model) -> Option<ChannelInput> {
            let input = match event {
                Event::Noop => return None,

                Event::Configure(config) => {
                    match config.validate() {
                        Ok(()) => {
                            info!(base_url = %config.api_base_url, "notification channel configured");
                            model.channel.set_policy(ReconnectPolicy::from_config(&config));
                            model.config = config;
                        }
                        Err(e) => warn!(error = %e, "rejecting notification channel config"),
                    }
                    return None;
                }

                Event::AuthStateChanged { authenticated } => {
                    ChannelInput::AuthChanged { authenticated }
                }
                Event::Connect => ChannelInput::Connect,
                Event::Disconnect => ChannelInput::Disconnect,
                Event::Reconnect => ChannelInput::Reconnect,
                Event::RefreshNotifications => ChannelInput::RefreshRequested,
                Event::TokenRefreshed => ChannelInput::TokenRefreshed,

                Event::Stream { connection, signal } => match signal {
                    StreamSignal::Opened => ChannelInput::StreamOpened { connection },
                    StreamSignal::Message { data, event_id } => ChannelInput::StreamMessage {
                        connection,
                        data,
                        event_id,
                    },
                    StreamSignal::Failed(error) => ChannelInput::StreamFailed {
                        connection,
                        reason: error.to_string(),
                    },
                },

                Event::ReconnectTimerFired { timer } => ChannelInput::TimerFired { timer },

                Event::SummaryResponse { session, result } => {
                    Self::summary_input(session, *result)
                }
            };

            Some(input)
        }

        fn summary_input(session: SessionId, result: SummaryResult) -> ChannelInput {
            let summary = result
                .map_err(|e| ChannelError::http(e.to_string()))
                .and_then(|mut response| {
                    response
                        .take_body()
                        .ok_or_else(|| ChannelError::http("empty response body"))
                })
                .and_then(|summary| summary.validate().map(|()| summary));

            match summary {
                Ok(summary) => ChannelInput::SummaryLoaded { session, summary },
                Err(e) => ChannelInput::SummaryFailed {
                    session,
                    reason: e.to_string(),
                },
            }
        }

        fn fetch_summary(
            model: &Model,
            session: SessionId,
            caps: &Capabilities,
        ) -> Result<(), ChannelError> {
            let url = model.config.summary_url()?;
            caps.http
                .get(url.as_str())
                .expect_json::<UnreadSummary>()
                .send(move |result| Event::SummaryResponse {
                    session,
                    result: Box::new(result),
                });
            Ok(())
        }

        /// Carries out commands, feeding local failures back into the state
        /// machine so it never waits on a request that was never sent.
        fn execute(commands: Vec<ChannelCommand>, model: &mut Model, caps: &Capabilities) {
            let mut queue = VecDeque::from(commands);
            let mut render = false;

            while let Some(command) = queue.pop_front() {
                match command {
                    ChannelCommand::OpenStream {
                        connection,
                        last_event_id,
                    } => match model.config.stream_url() {
                        Ok(url) => caps.stream.open(
                            connection,
                            url.into(),
                            model.config.with_credentials,
                            last_event_id,
                            |connection, signal| Event::Stream { connection, signal },
                        ),
                        Err(e) => queue.extend(model.channel.handle(ChannelInput::StreamFailed {
                            connection,
                            reason: e.to_string(),
                        })),
                    },

                    ChannelCommand::CloseStream { connection } => caps.stream.close(connection),

                    ChannelCommand::ScheduleReconnect { timer, delay } => {
                        caps.timer
                            .start(timer, delay, |timer| Event::ReconnectTimerFired { timer });
                    }

                    ChannelCommand::CancelReconnect { timer } => caps.timer.cancel(timer),

                    ChannelCommand::FetchSummary { session } => {
                        if let Err(e) = Self::fetch_summary(model, session, caps) {
                            queue.extend(model.channel.handle(ChannelInput::SummaryFailed {
                                session,
                                reason: e.to_string(),
                            }));
                        }
                    }

                    ChannelCommand::Render => render = true,
                }
            }

            if render {
                caps.render.render();
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(event = event.name(), external = event.is_external(), "update");

            let Some(input) = Self::to_input(event, model) else {
                return;
            };

            let commands = model.channel.handle(input);
            Self::execute(commands, model, caps);
        }

        fn view(&self, model: &Model) -> ViewModel {
            ViewModel::from(&model.channel)
        }
    }
}
