//! In-process message bus.
//!
//! A single broker task owns every topic and subscription; producers and
//! consumers talk to it through a cloneable [`BusClient`]. Subscriptions come
//! in two variants: at-most-once delivery, and manual-ack delivery with
//! broker-side redelivery of unacknowledged messages.

pub mod broker;
pub mod error;
pub mod message;
pub mod source;

pub use broker::{Broker, BrokerOptions, BusClient, SubscriptionMode, run_broker};
pub use error::{BusError, Result};
pub use message::{Acknowledge, Message};
pub use source::{BusSource, MessageSource, Publisher};
