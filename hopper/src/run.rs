use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Args;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use hopper_bus::{Broker, BrokerOptions, BusClient, BusSource, run_broker};
use hopper_collector_core::{BatchDispatcher, DispatcherOptions, LogSink};
use hopper_collector_http::HttpCollector;

use crate::error::{DispatcherSnafu, InvalidServerAddressSnafu, IoSnafu, Result};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The address of the HTTP ingress server.
    #[arg(long, default_value = "127.0.0.1:7780", env = "HOPPER_HTTP_ADDRESS")]
    http_address: String,
    /// Topic events flow through.
    #[arg(long, default_value = "events", env = "HOPPER_TOPIC")]
    topic: String,
    /// Messages per batch before a forced flush.
    #[arg(long, default_value_t = 10, env = "HOPPER_BATCH_SIZE")]
    batch_size: usize,
    /// Seconds an incomplete batch may sit before a timeout flush.
    #[arg(long, default_value_t = 5, env = "HOPPER_BATCH_TIMEOUT_SECS")]
    batch_timeout_secs: u64,
    /// Consume the topic without per-message acknowledgment.
    #[arg(long)]
    at_most_once: bool,
}

impl RunArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let http_address = self
            .http_address
            .parse::<SocketAddr>()
            .context(InvalidServerAddressSnafu {})?;

        println!("Starting hopper collector");
        println!("HTTP ingress listening on {}", http_address);
        println!(
            "Consuming topic {:?} with batch size {} and timeout {}s",
            self.topic, self.batch_size, self.batch_timeout_secs
        );

        let broker = Broker::new(BrokerOptions::default());
        let client = broker.client();

        let source = if self.at_most_once {
            BusSource::plain(client.clone())
        } else {
            BusSource::manual_ack(client.clone())
        };

        let dispatcher = BatchDispatcher::new(
            Arc::new(source),
            Arc::new(LogSink),
            DispatcherOptions {
                topic: self.topic.clone(),
                batch_size: self.batch_size,
                batch_timeout: Duration::from_secs(self.batch_timeout_secs),
            },
        );

        // Bind before spawning anything so address errors fail the command
        // instead of a background task.
        let listener = tokio::net::TcpListener::bind(&http_address)
            .await
            .context(IoSnafu {})?;

        let broker_task = tokio::spawn(run_broker(broker, ct.clone()));
        let ingress_task = tokio::spawn(run_ingress(client, self.topic, listener, ct.clone()));

        // The dispatcher runs in the foreground: its final flush must
        // complete before teardown.
        let result = dispatcher.run(ct.clone()).await.context(DispatcherSnafu {});

        ct.cancel();
        if let Ok(Err(error)) = ingress_task.await {
            warn!(%error, "HTTP ingress exited with error");
        }
        let _ = broker_task.await;

        result
    }
}

async fn run_ingress(
    publisher: BusClient,
    topic: String,
    listener: tokio::net::TcpListener,
    ct: CancellationToken,
) -> Result<()> {
    let collector = HttpCollector::new(Arc::new(publisher), topic);
    let app = collector.into_router();

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        ct.cancelled().await;
    });

    server.await.context(IoSnafu {})
}
