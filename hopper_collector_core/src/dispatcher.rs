use std::{sync::Arc, time::Duration};

use snafu::ResultExt;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use hopper_bus::MessageSource;

use crate::{
    batch::{BatchAccumulator, FlushTrigger},
    error::{FinalFlushSnafu, Result, SubscribeSnafu},
    sink::BatchSink,
};

/// Configuration consumed by the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Topic to subscribe to.
    pub topic: String,
    /// Messages per batch before a forced flush.
    pub batch_size: usize,
    /// Longest an incomplete batch may sit unflushed.
    pub batch_timeout: Duration,
}

/// Drives the accumulator against the subscription, a periodic timer, and a
/// cancellation signal.
///
/// One dispatcher owns one subscription. Flushes are awaited inline, so no
/// two flushes ever overlap and batches reach the sink in arrival order.
pub struct BatchDispatcher {
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn BatchSink>,
    options: DispatcherOptions,
}

impl BatchDispatcher {
    pub fn new(
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn BatchSink>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            source,
            sink,
            options,
        }
    }

    /// Run until the source closes or the token is cancelled.
    ///
    /// Subscription setup failure is fatal and returned immediately. The
    /// terminal flush runs before returning and its error, if any, becomes
    /// the run result; every mid-loop flush error is logged and absorbed.
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let mut rx = self
            .source
            .subscribe(&self.options.topic)
            .await
            .context(SubscribeSnafu {
                topic: self.options.topic.clone(),
            })?;

        let mut batch = BatchAccumulator::with_capacity(self.options.batch_size);
        let mut ticker = interval_at(
            Instant::now() + self.options.batch_timeout,
            self.options.batch_timeout,
        );

        info!(topic = %self.options.topic, "batch dispatcher started, waiting for messages");

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    info!("shutdown signal received, flushing final batch");
                    return batch
                        .flush(self.sink.as_ref(), FlushTrigger::CancellationRequested)
                        .await
                        .context(FinalFlushSnafu {});
                }
                maybe_message = rx.recv() => {
                    let Some(message) = maybe_message else {
                        info!("message channel closed, flushing final batch");
                        return batch
                            .flush(self.sink.as_ref(), FlushTrigger::SourceClosed)
                            .await
                            .context(FinalFlushSnafu {});
                    };

                    batch.push(message);

                    if batch.len() >= self.options.batch_size {
                        if let Err(error) = batch
                            .flush(self.sink.as_ref(), FlushTrigger::SizeLimitReached)
                            .await
                        {
                            error!(%error, "failed to post batch");
                        }
                        // A fresh timeout window starts after a burst flush.
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    if batch.is_empty() {
                        continue;
                    }

                    if let Err(error) = batch
                        .flush(self.sink.as_ref(), FlushTrigger::TimeoutElapsed)
                        .await
                    {
                        error!(%error, "failed to post batch");
                    }
                }
            }
        }
    }
}
