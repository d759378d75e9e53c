//! HTTP client for sending events to the collector.

use reqwest::StatusCode;
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use hopper_collector_http::ErrorResponse;

/// A client for sending events to the collector over HTTP.
#[derive(Debug, Clone)]
pub struct EventClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Snafu)]
pub enum PushError {
    #[snafu(display("Request error"))]
    Request { source: reqwest::Error },
    #[snafu(display("Response error: status={status}, message={message}"))]
    Response { status: StatusCode, message: String },
}

pub type Result<T, E = PushError> = std::result::Result<T, E>;

impl EventClient {
    /// Create a new event client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Send a single event to the collector.
    ///
    /// Acceptance means the collector took the event, not that it was
    /// delivered downstream.
    pub async fn send(&self, event: &Value) -> Result<()> {
        let url = format!("{}/v1/events", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .context(RequestSnafu {})?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response
            .json::<ErrorResponse>()
            .await
            .context(RequestSnafu {})?;

        Err(PushError::Response {
            status,
            message: body.message,
        })
    }
}
