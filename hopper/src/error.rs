use std::net::AddrParseError;

use snafu::Snafu;

use hopper_collector_core::DispatcherError;
use hopper_push_client::PushError;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Invalid server address"))]
    InvalidServerAddress { source: AddrParseError },
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },
    #[snafu(display("Dispatcher error"))]
    Dispatcher { source: DispatcherError },
    #[snafu(display("Push client error"))]
    PushClient { source: PushError },
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("JSON parse error"))]
    JsonParse { source: serde_json::Error },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
