use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use snafu::Snafu;
use tracing::debug;

/// Sink error types.
///
/// A failed batch is never retried by the caller, so the message mostly
/// documents why the batch's messages were nacked.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The sink rejected the batch.
    #[snafu(display("sink rejected batch: {message}"))]
    Rejected { message: String },
    /// The sink could not be reached.
    #[snafu(display("sink unavailable: {message}"))]
    Unavailable { message: String },
}

/// Push side of the pipeline: records a batch of payloads as a single call
/// resolving to a single outcome. Partial acceptance is not part of the
/// contract.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn post(&self, payloads: &[Bytes]) -> Result<(), SinkError>;
}

/// Stand-in bulk ingester that logs every payload.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl BatchSink for LogSink {
    async fn post(&self, payloads: &[Bytes]) -> Result<(), SinkError> {
        for payload in payloads {
            debug!(payload = %String::from_utf8_lossy(payload), "posting payload");
            // Simulated ingest latency.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Ok(())
    }
}
