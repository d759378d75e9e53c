//! Request and response types for the event ingestion endpoint.

use serde::{Deserialize, Serialize};

/// Response payload for accepted events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestResponse {
    pub status: String,
}

impl IngestResponse {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

/// Response payload for errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub message: String,
}
