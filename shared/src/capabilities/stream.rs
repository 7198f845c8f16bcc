use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChannelError;
use crate::model::ConnectionId;
use crate::sse::SseDecoder;

/// Requests to the shell's push-connection primitive (EventSource on the
/// web, an HTTP client streaming `text/event-stream` elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum StreamOperation {
    Open {
        connection: ConnectionId,
        url: String,
        with_credentials: bool,
        #[serde(default)]
        last_event_id: Option<String>,
    },
    Close {
        connection: ConnectionId,
    },
}

impl StreamOperation {
    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        match self {
            Self::Open { connection, .. } | Self::Close { connection } => *connection,
        }
    }
}

/// What the shell reports back for an `Open`, any number of times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum StreamOutput {
    Opened,
    Chunk(Vec<u8>),
    Error { message: String },
    Closed,
}

impl Operation for StreamOperation {
    type Output = StreamOutput;
}

/// Decoded lifecycle signal handed to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Opened,
    Message {
        data: String,
        event_id: Option<String>,
    },
    Failed(ChannelError),
}

pub struct EventStream<E> {
    context: CapabilityContext<StreamOperation, E>,
}

impl<Ev> Capability<Ev> for EventStream<Ev> {
    type Operation = StreamOperation;
    type MappedSelf<MappedEv> = EventStream<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        EventStream::new(self.context.map_event(f))
    }
}

impl<E> EventStream<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<StreamOperation, E>) -> Self {
        Self { context }
    }

    /// Opens a stream and keeps forwarding its signals until the shell
    /// reports an error or the server closes it. Either ends the stream.
    pub fn open<F>(
        &self,
        connection: ConnectionId,
        url: String,
        with_credentials: bool,
        last_event_id: Option<String>,
        make_event: F,
    ) where
        F: Fn(ConnectionId, StreamSignal) -> E + Send + Sync + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let mut outputs = context.stream_from_shell(StreamOperation::Open {
                connection,
                url,
                with_credentials,
                last_event_id,
            });
            let mut decoder = SseDecoder::new();

            while let Some(output) = outputs.next().await {
                match output {
                    StreamOutput::Opened => {
                        context.update_app(make_event(connection, StreamSignal::Opened));
                    }
                    StreamOutput::Chunk(bytes) => {
                        let frames = match decoder.feed(&bytes) {
                            Ok(frames) => frames,
                            Err(error) => {
                                context.update_app(make_event(
                                    connection,
                                    StreamSignal::Failed(error),
                                ));
                                break;
                            }
                        };
                        for frame in frames {
                            if frame.is_message() {
                                context.update_app(make_event(
                                    connection,
                                    StreamSignal::Message {
                                        data: frame.data,
                                        event_id: frame.id,
                                    },
                                ));
                            } else {
                                debug!(%connection, event = %frame.event, "skipping non-message frame");
                            }
                        }
                    }
                    StreamOutput::Error { message } => {
                        context.update_app(make_event(
                            connection,
                            StreamSignal::Failed(ChannelError::transport(message)),
                        ));
                        break;
                    }
                    StreamOutput::Closed => {
                        context.update_app(make_event(
                            connection,
                            StreamSignal::Failed(ChannelError::transport("closed by server")),
                        ));
                        break;
                    }
                }
            }
        });
    }

    pub fn close(&self, connection: ConnectionId) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context
                .notify_shell(StreamOperation::Close { connection })
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serialization() {
        let op = StreamOperation::Open {
            connection: ConnectionId(3),
            url: "https://console.example.com/api/notifications/stream".into(),
            with_credentials: true,
            last_event_id: None,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "Open");
        assert_eq!(json["data"]["connection"], 3);

        let back: StreamOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
        assert_eq!(back.connection(), ConnectionId(3));
    }

    #[test]
    fn test_output_from_shell_json() {
        let output: StreamOutput =
            serde_json::from_str(r#"{"type":"Error","data":{"message":"ECONNREFUSED"}}"#).unwrap();
        assert_eq!(
            output,
            StreamOutput::Error {
                message: "ECONNREFUSED".into()
            }
        );

        let output: StreamOutput = serde_json::from_str(r#"{"type":"Opened"}"#).unwrap();
        assert_eq!(output, StreamOutput::Opened);
    }
}
