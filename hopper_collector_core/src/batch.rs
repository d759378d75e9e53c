use std::fmt;

use tracing::{info, warn};

use hopper_bus::Message;

use crate::sink::{BatchSink, SinkError};

/// Why a flush was initiated.
///
/// The trigger selects log context only; outcome handling is identical for
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    SizeLimitReached,
    TimeoutElapsed,
    SourceClosed,
    CancellationRequested,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trigger = match self {
            FlushTrigger::SizeLimitReached => "size limit reached",
            FlushTrigger::TimeoutElapsed => "timeout elapsed",
            FlushTrigger::SourceClosed => "source closed",
            FlushTrigger::CancellationRequested => "cancellation requested",
        };
        f.write_str(trigger)
    }
}

/// Buffers messages until the dispatcher decides to flush.
///
/// The accumulator never closes a batch on its own: the capacity only
/// preallocates, and exceeding it is the dispatcher's cue to call
/// [`BatchAccumulator::flush`].
pub struct BatchAccumulator {
    messages: Vec<Message>,
    capacity: usize,
}

impl BatchAccumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Post the open batch to the sink and resolve acknowledgments.
    ///
    /// An empty batch is a no-op: the sink is not called. On sink success
    /// every ackable message is acked, on failure nacked; an individual
    /// ack/nack error is logged and does not change the flush outcome.
    /// Buffers are reset in every case: a failed batch is never retried
    /// here, redelivery is the bus's responsibility via nack.
    pub async fn flush(
        &mut self,
        sink: &dyn BatchSink,
        trigger: FlushTrigger,
    ) -> Result<(), SinkError> {
        if self.messages.is_empty() {
            return Ok(());
        }

        let messages = std::mem::replace(&mut self.messages, Vec::with_capacity(self.capacity));
        let payloads = messages
            .iter()
            .map(|message| message.payload().clone())
            .collect::<Vec<_>>();

        let result = sink.post(&payloads).await;

        match &result {
            Ok(()) => {
                info!(count = messages.len(), %trigger, "batch posted");
                for message in &messages {
                    if let Some(acker) = message.acker() {
                        if let Err(error) = acker.ack().await {
                            warn!(%error, "failed to ack message");
                        }
                    }
                }
            }
            Err(error) => {
                warn!(count = messages.len(), %trigger, %error, "failed to post batch, nacking");
                for message in &messages {
                    if let Some(acker) = message.acker() {
                        if let Err(error) = acker.nack().await {
                            warn!(%error, "failed to nack message");
                        }
                    }
                }
            }
        }

        result
    }
}
