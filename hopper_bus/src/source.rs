use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    broker::{BusClient, SubscriptionMode},
    error::Result,
    message::Message,
};

/// Pull side of the bus: a subscription yields an ordered sequence of
/// messages for a topic.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Start listening on a topic.
    ///
    /// The returned channel is owned exclusively by the caller; it closes
    /// when the broker stops, which is the consumer's source-closed signal.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Message>>;
}

/// Push side of the bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send a payload to a topic.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;
}

/// A [`MessageSource`] backed by the in-process broker.
///
/// The two constructors select the subscription variant: plain messages
/// carry no acknowledgment capability, manual-ack messages must be acked or
/// nacked by the consumer.
#[derive(Clone)]
pub struct BusSource {
    client: BusClient,
    mode: SubscriptionMode,
}

impl BusSource {
    /// Source with at-most-once semantics.
    pub fn plain(client: BusClient) -> Self {
        Self {
            client,
            mode: SubscriptionMode::AtMostOnce,
        }
    }

    /// Source whose messages carry ack/nack handles.
    pub fn manual_ack(client: BusClient) -> Self {
        Self {
            client,
            mode: SubscriptionMode::ManualAck,
        }
    }
}

#[async_trait]
impl MessageSource for BusSource {
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Message>> {
        self.client.subscribe(topic, self.mode).await
    }
}

#[async_trait]
impl Publisher for BusClient {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        BusClient::publish(self, topic, payload).await
    }
}
