mod stream;
mod timer;

pub use self::stream::{EventStream, StreamOperation, StreamOutput, StreamSignal};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// Render and Http come straight from Crux; only the push stream and the
// reconnect timer need custom shell protocols.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;
// the derived `Effect` plumbing names the app type `App`
use crate::App;

// Field types must stay generic over `Event`; the derive names each `Effect`
// variant after the capability type (`Effect::EventStream`, `Effect::Timer`).
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub stream: EventStream<Event>,
    pub timer: Timer<Event>,
}
