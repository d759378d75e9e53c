use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use common::RecordingSink;
use hopper_bus::{Broker, BrokerOptions, BusSource, run_broker};
use hopper_collector_core::{BatchDispatcher, DispatcherOptions};

mod common;

#[tokio::test]
async fn events_flow_from_bus_to_sink_and_are_acked() {
    tokio::time::pause();

    let broker = Broker::new(BrokerOptions::default());
    let client = broker.client();
    let ct = CancellationToken::new();
    tokio::spawn(run_broker(broker, ct.clone()));

    let sink = Arc::new(RecordingSink::default());
    let dispatcher = BatchDispatcher::new(
        Arc::new(BusSource::manual_ack(client.clone())),
        sink.clone(),
        DispatcherOptions {
            topic: "events".to_string(),
            batch_size: 10,
            batch_timeout: Duration::from_secs(5),
        },
    );
    let run = tokio::spawn(dispatcher.run(ct.clone()));

    for i in 0..3 {
        client
            .publish("events", Bytes::from(format!("{{\"seq\":{i}}}")))
            .await
            .expect("publish");
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    tokio::time::advance(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(vec![3], sink.batch_sizes());

    // All three deliveries were acked by the flush: running past the ack
    // wait must not produce a redelivery, so nothing new reaches the sink.
    tokio::time::advance(Duration::from_secs(31)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    tokio::time::advance(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(vec![3], sink.batch_sizes());

    ct.cancel();
    run.await.expect("join").expect("run");
}
