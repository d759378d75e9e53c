//! Batching and acknowledgment engine for the collector worker.
//!
//! Messages pulled from a bus subscription are buffered into bounded batches
//! and posted to a [`BatchSink`] as a unit. The sink outcome of a batch
//! decides the acknowledgment of every message in it: success acks, failure
//! nacks, and the bus's redelivery takes it from there.

pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod sink;

pub use batch::{BatchAccumulator, FlushTrigger};
pub use dispatcher::{BatchDispatcher, DispatcherOptions};
pub use error::{DispatcherError, Result};
pub use sink::{BatchSink, LogSink, SinkError};
