use snafu::Snafu;

use hopper_bus::BusError;

use crate::sink::SinkError;

/// Dispatcher error types.
///
/// Only subscription setup and the terminal flush propagate out of the run
/// loop; every other error is absorbed and logged where it occurs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DispatcherError {
    /// Subscribing to the topic failed at startup.
    #[snafu(display("failed to subscribe to topic {topic}"))]
    Subscribe { topic: String, source: BusError },
    /// The final flush before shutdown failed.
    #[snafu(display("final batch flush failed"))]
    FinalFlush { source: SinkError },
}

pub type Result<T, E = DispatcherError> = std::result::Result<T, E>;
