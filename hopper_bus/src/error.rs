use snafu::Snafu;

/// Bus error types.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum BusError {
    /// The broker task is no longer running.
    #[snafu(display("broker closed"))]
    BrokerClosed,
    /// The broker dropped the reply to a subscribe request.
    #[snafu(display("subscribe reply channel closed"))]
    SubscribeReplyClosed,
}

pub type Result<T, E = BusError> = std::result::Result<T, E>;
