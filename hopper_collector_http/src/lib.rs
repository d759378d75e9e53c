//! HTTP ingress for the collector.
//!
//! This crate provides the server producers talk to.
//!
//! The server is built using axum and provides a `/v1/events` endpoint for
//! event ingestion; accepted payloads are republished to the bus topic
//! without waiting for publish confirmation.

pub mod error;
pub mod ingest;
pub mod types;

// Re-export the main types for easier importing
pub use error::{HttpCollectorError, Result};
pub use types::{ErrorResponse, IngestResponse};

use std::sync::Arc;

use axum::{Router, routing::post};
use hopper_bus::Publisher;

use crate::ingest::ingest_handler;

/// HTTP collector server that receives events via HTTP POST requests.
pub struct HttpCollector {
    state: HttpCollectorState,
}

#[derive(Clone)]
pub struct HttpCollectorState {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl HttpCollector {
    /// Create a new collector republishing received events to the given topic.
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        let state = HttpCollectorState {
            publisher,
            topic: topic.into(),
        };

        Self { state }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/v1/events", post(ingest_handler))
            .with_state(self.state)
    }
}
