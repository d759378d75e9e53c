use snafu::Snafu;

/// Collector HTTP error types.
///
/// The message associated with an error is returned to the client, for this
/// reason it should contain information that is useful to the producer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HttpCollectorError {
    /// The request body was rejected.
    #[snafu(display("bad request: {message}"))]
    BadRequest { message: String },
}

pub type Result<T, E = HttpCollectorError> = std::result::Result<T, E>;
