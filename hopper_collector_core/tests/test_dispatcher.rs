use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use common::{ChannelSource, FailingSource, RecordingSink, ackable_message};
use hopper_collector_core::{BatchDispatcher, DispatcherError, DispatcherOptions};

mod common;

fn options() -> DispatcherOptions {
    DispatcherOptions {
        topic: "events".to_string(),
        batch_size: 10,
        batch_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn size_limit_flushes_then_final_flush_on_close() {
    tokio::time::pause();

    let (tx, source) = ChannelSource::new();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = BatchDispatcher::new(Arc::new(source), sink.clone(), options());

    let run = tokio::spawn(dispatcher.run(CancellationToken::new()));

    let mut ackers = Vec::new();
    for i in 0..23 {
        let (message, acker) = ackable_message(&format!("{{\"seq\":{i}}}"));
        tx.send(message).await.expect("send");
        ackers.push(acker);
    }
    drop(tx);

    run.await.expect("join").expect("run");

    // Two size-triggered flushes of 10, one source-closed flush of 3.
    assert_eq!(vec![10, 10, 3], sink.batch_sizes());
    for acker in &ackers {
        assert_eq!(1, acker.acks.load(Ordering::SeqCst));
        assert_eq!(0, acker.nacks.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn timeout_flushes_partial_batch_once() {
    tokio::time::pause();

    let (tx, source) = ChannelSource::new();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = BatchDispatcher::new(Arc::new(source), sink.clone(), options());

    let ct = CancellationToken::new();
    let run = tokio::spawn(dispatcher.run(ct.clone()));

    for i in 0..3 {
        let (message, _acker) = ackable_message(&format!("{{\"seq\":{i}}}"));
        tx.send(message).await.expect("send");
    }

    // Let the dispatcher drain the channel before the window elapses.
    tokio::time::sleep(Duration::from_millis(10)).await;
    tokio::time::advance(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(vec![3], sink.batch_sizes());

    // A tick over an empty accumulator flushes nothing.
    tokio::time::advance(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(vec![3], sink.batch_sizes());

    ct.cancel();
    run.await.expect("join").expect("run");

    // The cancellation flush found an empty batch: no extra sink call.
    assert_eq!(vec![3], sink.batch_sizes());
}

#[tokio::test]
async fn cancellation_flushes_buffered_messages() {
    tokio::time::pause();

    let (tx, source) = ChannelSource::new();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = BatchDispatcher::new(Arc::new(source), sink.clone(), options());

    let ct = CancellationToken::new();
    let run = tokio::spawn(dispatcher.run(ct.clone()));

    let mut ackers = Vec::new();
    for i in 0..5 {
        let (message, acker) = ackable_message(&format!("{{\"seq\":{i}}}"));
        tx.send(message).await.expect("send");
        ackers.push(acker);
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    ct.cancel();

    run.await.expect("join").expect("run");

    assert_eq!(vec![5], sink.batch_sizes());
    for acker in &ackers {
        assert_eq!(1, acker.acks.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn subscription_setup_failure_is_fatal() {
    let dispatcher = BatchDispatcher::new(
        Arc::new(FailingSource),
        Arc::new(RecordingSink::default()),
        options(),
    );

    let err = dispatcher
        .run(CancellationToken::new())
        .await
        .expect_err("subscribe must fail");
    assert!(matches!(err, DispatcherError::Subscribe { .. }));
}

#[tokio::test]
async fn failing_sink_nacks_and_propagates_on_final_flush() {
    tokio::time::pause();

    let (tx, source) = ChannelSource::new();
    let sink = Arc::new(RecordingSink::failing());
    let dispatcher = BatchDispatcher::new(Arc::new(source), sink.clone(), options());

    let run = tokio::spawn(dispatcher.run(CancellationToken::new()));

    let mut ackers = Vec::new();
    for i in 0..3 {
        let (message, acker) = ackable_message(&format!("{{\"seq\":{i}}}"));
        tx.send(message).await.expect("send");
        ackers.push(acker);
    }
    drop(tx);

    let err = run.await.expect("join").expect_err("final flush must fail");
    assert!(matches!(err, DispatcherError::FinalFlush { .. }));

    assert_eq!(vec![3], sink.batch_sizes());
    for acker in &ackers {
        assert_eq!(0, acker.acks.load(Ordering::SeqCst));
        assert_eq!(1, acker.nacks.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn mid_loop_sink_failures_do_not_stop_the_loop() {
    tokio::time::pause();

    let (tx, source) = ChannelSource::new();
    let sink = Arc::new(RecordingSink::failing());
    let dispatcher = BatchDispatcher::new(
        Arc::new(source),
        sink.clone(),
        DispatcherOptions {
            batch_size: 2,
            ..options()
        },
    );

    let run = tokio::spawn(dispatcher.run(CancellationToken::new()));

    let mut ackers = Vec::new();
    for i in 0..4 {
        let (message, acker) = ackable_message(&format!("{{\"seq\":{i}}}"));
        tx.send(message).await.expect("send");
        ackers.push(acker);
    }
    drop(tx);

    // Both size-triggered flushes fail and are absorbed; the terminal flush
    // sees an empty batch, so the run itself succeeds.
    run.await.expect("join").expect("run");

    assert_eq!(vec![2, 2], sink.batch_sizes());
    for acker in &ackers {
        assert_eq!(1, acker.nacks.load(Ordering::SeqCst));
    }
}
