use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Positive/negative acknowledgment of a single delivery.
///
/// Both operations are idempotent by contract: the broker ignores
/// acknowledgments for deliveries it no longer tracks, so calling either
/// twice cannot corrupt broker state.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// Mark the delivery as processed.
    async fn ack(&self) -> Result<()>;

    /// Return the delivery to the broker for redelivery.
    async fn nack(&self) -> Result<()>;
}

/// A message handed to a subscriber.
///
/// The payload is an opaque byte sequence. Messages from a manual-ack
/// subscription carry an [`Acknowledge`] handle; at-most-once messages do
/// not, and consumers must check capability presence rather than assume it.
#[derive(Clone)]
pub struct Message {
    payload: Bytes,
    acker: Option<Arc<dyn Acknowledge>>,
}

impl Message {
    /// Create a message without acknowledgment capability.
    pub fn plain(payload: Bytes) -> Self {
        Self {
            payload,
            acker: None,
        }
    }

    /// Create a message with an acknowledgment handle.
    pub fn with_acker(payload: Bytes, acker: Arc<dyn Acknowledge>) -> Self {
        Self {
            payload,
            acker: Some(acker),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The acknowledgment handle, if the subscription supports it.
    pub fn acker(&self) -> Option<&dyn Acknowledge> {
        self.acker.as_deref()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("payload", &format!("<{} bytes>", self.payload.len()))
            .field("ackable", &self.acker.is_some())
            .finish()
    }
}
