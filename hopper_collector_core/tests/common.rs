use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use hopper_bus::{Acknowledge, BusError, Message, MessageSource};
use hopper_collector_core::{BatchSink, SinkError};

/// Source over a pre-opened channel; `subscribe` hands the receiver out once.
pub struct ChannelSource {
    rx: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(64);
        (
            tx,
            Self {
                rx: Mutex::new(Some(rx)),
            },
        )
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn subscribe(&self, _topic: &str) -> Result<mpsc::Receiver<Message>, BusError> {
        Ok(self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe called twice"))
    }
}

/// Source whose setup always fails.
pub struct FailingSource;

#[async_trait]
impl MessageSource for FailingSource {
    async fn subscribe(&self, _topic: &str) -> Result<mpsc::Receiver<Message>, BusError> {
        Err(BusError::BrokerClosed)
    }
}

/// Sink recording the size of every posted batch, optionally failing.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<usize>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn post(&self, payloads: &[Bytes]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(payloads.len());
        if self.fail {
            return Err(SinkError::Rejected {
                message: "sink rejected".to_string(),
            });
        }
        Ok(())
    }
}

/// Acknowledgment handle counting ack and nack calls.
#[derive(Default)]
pub struct CountingAcker {
    pub acks: AtomicUsize,
    pub nacks: AtomicUsize,
}

#[async_trait]
impl Acknowledge for CountingAcker {
    async fn ack(&self) -> Result<(), BusError> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self) -> Result<(), BusError> {
        self.nacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn ackable_message(payload: &str) -> (Message, Arc<CountingAcker>) {
    let acker = Arc::new(CountingAcker::default());
    let message = Message::with_acker(Bytes::copy_from_slice(payload.as_bytes()), acker.clone());
    (message, acker)
}
