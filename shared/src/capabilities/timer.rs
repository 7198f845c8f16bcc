use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::channel::millis;
use crate::model::TimerId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "data")]
pub enum TimerOperation {
    Start { id: TimerId, delay_ms: u64 },
    Cancel { id: TimerId },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum TimerOutput {
    Fired { id: TimerId },
    Cancelled { id: TimerId },
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

pub struct Timer<E> {
    context: CapabilityContext<TimerOperation, E>,
}

impl<Ev> Capability<Ev> for Timer<Ev> {
    type Operation = TimerOperation;
    type MappedSelf<MappedEv> = Timer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Timer::new(self.context.map_event(f))
    }
}

impl<E> Timer<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, E>) -> Self {
        Self { context }
    }

    pub fn start<F>(&self, id: TimerId, delay: Duration, make_event: F)
    where
        F: FnOnce(TimerId) -> E + Send + 'static,
    {
        let delay_ms = millis(delay);
        let context = self.context.clone();
        self.context.spawn(async move {
            match context
                .request_from_shell(TimerOperation::Start { id, delay_ms })
                .await
            {
                TimerOutput::Fired { id } => context.update_app(make_event(id)),
                TimerOutput::Cancelled { id } => debug!(timer = %id, "timer cancelled by shell"),
            }
        });
    }

    pub fn cancel(&self, id: TimerId) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(TimerOperation::Cancel { id }).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serialization() {
        let op = TimerOperation::Start {
            id: TimerId(2),
            delay_ms: 4000,
        };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"op":"Start","data":{"id":2,"delay_ms":4000}}"#);
        let back: TimerOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
