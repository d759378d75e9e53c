use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tokio_util::{
    sync::CancellationToken,
    time::{DelayQueue, delay_queue},
};
use tracing::{debug, warn};

use crate::{
    error::{BrokerClosedSnafu, Result, SubscribeReplyClosedSnafu},
    message::{Acknowledge, Message},
};

type SubscriptionId = u64;
type DeliveryTag = u64;

/// How deliveries on a subscription are accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// A message is gone once handed to the subscriber channel; deliveries
    /// to a lagging subscriber are dropped.
    AtMostOnce,
    /// Every delivery must be acked or nacked. Unacknowledged deliveries are
    /// redelivered once the ack wait elapses.
    ManualAck,
}

/// Broker tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct BrokerOptions {
    /// How long a manual-ack delivery may stay unacknowledged before the
    /// broker redelivers it.
    pub ack_wait: Duration,
    /// Deliveries per message before it is dropped.
    pub max_deliver: u32,
    /// Capacity of each subscription channel.
    pub subscription_capacity: usize,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            ack_wait: Duration::from_secs(30),
            max_deliver: 5,
            subscription_capacity: 64,
        }
    }
}

enum BrokerCommand {
    Publish {
        topic: String,
        payload: Bytes,
    },
    Subscribe {
        topic: String,
        mode: SubscriptionMode,
        reply: oneshot::Sender<mpsc::Receiver<Message>>,
    },
    Ack {
        subscription: SubscriptionId,
        tag: DeliveryTag,
    },
    Nack {
        subscription: SubscriptionId,
        tag: DeliveryTag,
    },
}

/// The message broker.
///
/// All topic and subscription state is owned by the broker task; the only
/// way to mutate it is a broker command, so mutations are serialized by the
/// command channel rather than a lock.
pub struct Broker {
    tx: mpsc::Sender<BrokerCommand>,
    rx: mpsc::Receiver<BrokerCommand>,
    options: BrokerOptions,
}

/// Handle used to talk to a running [`Broker`].
#[derive(Clone)]
pub struct BusClient {
    tx: mpsc::Sender<BrokerCommand>,
}

pub async fn run_broker(broker: Broker, ct: CancellationToken) {
    broker.run(ct).await
}

impl Broker {
    pub fn new(options: BrokerOptions) -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self { tx, rx, options }
    }

    pub fn client(&self) -> BusClient {
        BusClient {
            tx: self.tx.clone(),
        }
    }

    async fn run(mut self, ct: CancellationToken) {
        let mut timers = DelayQueue::new();
        let mut state = BrokerState::new(self.options, self.tx.clone());

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    debug!("broker cancelled");
                    break;
                }
                expired = timers.next(), if !timers.is_empty() => {
                    let Some(entry) = expired else {
                        continue;
                    };

                    state.redeliver_expired(entry.into_inner(), &mut timers);
                }
                command = self.rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };

                    state.handle(command, &mut timers);
                }
            }
        }
    }
}

impl BusClient {
    /// Send a payload to a topic.
    pub async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.tx
            .send(BrokerCommand::Publish {
                topic: topic.to_string(),
                payload,
            })
            .await
            .or_else(|_| BrokerClosedSnafu {}.fail())
    }

    /// Open a subscription on a topic.
    ///
    /// The returned channel is owned exclusively by the caller and closes
    /// when the broker stops.
    pub async fn subscribe(
        &self,
        topic: &str,
        mode: SubscriptionMode,
    ) -> Result<mpsc::Receiver<Message>> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(BrokerCommand::Subscribe {
                topic: topic.to_string(),
                mode,
                reply,
            })
            .await
            .or_else(|_| BrokerClosedSnafu {}.fail())?;

        rx.await.or_else(|_| SubscribeReplyClosedSnafu {}.fail())
    }
}

struct BrokerState {
    options: BrokerOptions,
    commands: mpsc::Sender<BrokerCommand>,
    /// Map from topic to the subscriptions listening on it.
    topics: HashMap<String, Vec<SubscriptionId>>,
    subscriptions: HashMap<SubscriptionId, SubscriptionState>,
    next_subscription: SubscriptionId,
    next_tag: DeliveryTag,
}

struct SubscriptionState {
    topic: String,
    mode: SubscriptionMode,
    tx: mpsc::Sender<Message>,
    /// Deliveries waiting for an ack or nack.
    pending: HashMap<DeliveryTag, PendingDelivery>,
}

struct PendingDelivery {
    payload: Bytes,
    deliveries: u32,
    timer_key: delay_queue::Key,
}

impl BrokerState {
    fn new(options: BrokerOptions, commands: mpsc::Sender<BrokerCommand>) -> Self {
        Self {
            options,
            commands,
            topics: HashMap::new(),
            subscriptions: HashMap::new(),
            next_subscription: 0,
            next_tag: 0,
        }
    }

    fn handle(
        &mut self,
        command: BrokerCommand,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        match command {
            BrokerCommand::Publish { topic, payload } => self.publish(&topic, payload, timers),
            BrokerCommand::Subscribe { topic, mode, reply } => {
                let rx = self.subscribe(topic, mode);
                let _ = reply.send(rx);
            }
            BrokerCommand::Ack { subscription, tag } => self.ack(subscription, tag, timers),
            BrokerCommand::Nack { subscription, tag } => self.nack(subscription, tag, timers),
        }
    }

    fn subscribe(&mut self, topic: String, mode: SubscriptionMode) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.options.subscription_capacity);
        let id = self.next_subscription;
        self.next_subscription += 1;

        self.subscriptions.insert(
            id,
            SubscriptionState {
                topic: topic.clone(),
                mode,
                tx,
                pending: HashMap::new(),
            },
        );
        self.topics.entry(topic).or_default().push(id);

        debug!(subscription = id, mode = ?mode, "subscription created");
        rx
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let ids = match self.topics.get(topic) {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => {
                debug!(topic, "no subscribers, dropping message");
                return;
            }
        };

        for id in ids {
            self.deliver(id, payload.clone(), timers);
        }
    }

    fn deliver(
        &mut self,
        id: SubscriptionId,
        payload: Bytes,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            return;
        };

        match subscription.mode {
            SubscriptionMode::AtMostOnce => {
                match subscription.tx.try_send(Message::plain(payload)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(subscription = id, "subscriber lagging, dropping message");
                    }
                    Err(TrySendError::Closed(_)) => self.remove_subscription(id, timers),
                }
            }
            SubscriptionMode::ManualAck => {
                let tag = self.next_tag;
                self.next_tag += 1;

                let timer_key = timers.insert((id, tag), self.options.ack_wait);
                subscription.pending.insert(
                    tag,
                    PendingDelivery {
                        payload,
                        deliveries: 1,
                        timer_key,
                    },
                );

                self.try_send_tracked(id, tag, timers);
            }
        }
    }

    /// Hand a pending delivery to its subscriber.
    ///
    /// A full subscriber channel leaves the delivery pending; the ack-wait
    /// timer picks it up again.
    fn try_send_tracked(
        &mut self,
        id: SubscriptionId,
        tag: DeliveryTag,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let acker = Arc::new(BusAcknowledger {
            commands: self.commands.clone(),
            subscription: id,
            tag,
        });

        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            return;
        };
        let Some(delivery) = subscription.pending.get(&tag) else {
            return;
        };

        let message = Message::with_acker(delivery.payload.clone(), acker);
        match subscription.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(subscription = id, tag, "subscriber lagging, delivery stays pending");
            }
            Err(TrySendError::Closed(_)) => self.remove_subscription(id, timers),
        }
    }

    fn ack(
        &mut self,
        id: SubscriptionId,
        tag: DeliveryTag,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            debug!(subscription = id, tag, "ack for unknown subscription");
            return;
        };

        // Unknown tags are ignored, so acknowledging twice is harmless.
        if let Some(delivery) = subscription.pending.remove(&tag) {
            timers.try_remove(&delivery.timer_key);
        }
    }

    fn nack(
        &mut self,
        id: SubscriptionId,
        tag: DeliveryTag,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            return;
        };
        let Some(delivery) = subscription.pending.get(&tag) else {
            return;
        };

        timers.try_remove(&delivery.timer_key);
        self.redeliver(id, tag, timers);
    }

    fn redeliver_expired(
        &mut self,
        (id, tag): (SubscriptionId, DeliveryTag),
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        debug!(subscription = id, tag, "ack wait elapsed, redelivering");
        self.redeliver(id, tag, timers);
    }

    /// Redelivery shared by nack and ack-wait expiry.
    fn redeliver(
        &mut self,
        id: SubscriptionId,
        tag: DeliveryTag,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let max_deliver = self.options.max_deliver;
        let ack_wait = self.options.ack_wait;

        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            return;
        };
        let Some(delivery) = subscription.pending.get_mut(&tag) else {
            return;
        };

        if delivery.deliveries >= max_deliver {
            warn!(
                subscription = id,
                tag,
                deliveries = delivery.deliveries,
                "delivery limit reached, dropping message"
            );
            subscription.pending.remove(&tag);
            return;
        }

        delivery.deliveries += 1;
        delivery.timer_key = timers.insert((id, tag), ack_wait);

        self.try_send_tracked(id, tag, timers);
    }

    fn remove_subscription(
        &mut self,
        id: SubscriptionId,
        timers: &mut DelayQueue<(SubscriptionId, DeliveryTag)>,
    ) {
        let Some(subscription) = self.subscriptions.remove(&id) else {
            return;
        };

        for delivery in subscription.pending.values() {
            timers.try_remove(&delivery.timer_key);
        }

        if let Some(ids) = self.topics.get_mut(&subscription.topic) {
            ids.retain(|sub_id| *sub_id != id);
        }

        debug!(subscription = id, "subscription closed");
    }
}

struct BusAcknowledger {
    commands: mpsc::Sender<BrokerCommand>,
    subscription: SubscriptionId,
    tag: DeliveryTag,
}

#[async_trait]
impl Acknowledge for BusAcknowledger {
    async fn ack(&self) -> Result<()> {
        self.commands
            .send(BrokerCommand::Ack {
                subscription: self.subscription,
                tag: self.tag,
            })
            .await
            .or_else(|_| BrokerClosedSnafu {}.fail())
    }

    async fn nack(&self) -> Result<()> {
        self.commands
            .send(BrokerCommand::Nack {
                subscription: self.subscription,
                tag: self.tag,
            })
            .await
            .or_else(|_| BrokerClosedSnafu {}.fail())
    }
}
