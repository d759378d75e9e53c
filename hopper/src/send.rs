use clap::Args;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use hopper_push_client::EventClient;

use crate::error::{CliError, IoSnafu, JsonParseSnafu, PushClientSnafu, Result};

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Base URL of the collector.
    #[arg(long, default_value = "http://127.0.0.1:7780", env = "HOPPER_URL")]
    url: String,
    /// Events to send: JSON objects, or @file_path for a file containing one
    /// JSON object per line.
    events: Vec<String>,
}

impl SendArgs {
    pub async fn run(self, _ct: CancellationToken) -> Result<()> {
        if self.events.is_empty() {
            return Err(CliError::InvalidArgument {
                name: "events",
                message: "at least one event is required".to_string(),
            });
        }

        let client = EventClient::new(self.url.clone());

        for event in self.parse_events()? {
            client.send(&event).await.context(PushClientSnafu {})?;
            println!("Accepted: {event}");
        }

        Ok(())
    }

    fn parse_events(&self) -> Result<Vec<serde_json::Value>> {
        let mut events = Vec::new();

        for arg in &self.events {
            if let Some(file_path) = arg.strip_prefix('@') {
                let content = std::fs::read_to_string(file_path).context(IoSnafu {})?;
                for line in content.lines().filter(|line| !line.trim().is_empty()) {
                    events.push(serde_json::from_str(line).context(JsonParseSnafu {})?);
                }
            } else {
                events.push(serde_json::from_str(arg).context(JsonParseSnafu {})?);
            }
        }

        Ok(events)
    }
}
