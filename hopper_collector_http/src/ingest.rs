use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::warn;

use crate::HttpCollectorState;
use crate::error::{HttpCollectorError, Result};
use crate::types::{ErrorResponse, IngestResponse};

/// Handler for the /v1/events endpoint.
pub async fn ingest_handler(
    State(state): State<HttpCollectorState>,
    body: Bytes,
) -> impl IntoResponse {
    match process_ingest_request(&state, body) {
        Ok(response) => (StatusCode::ACCEPTED, Json(response)).into_response(),
        Err(err) => map_error_to_response(err),
    }
}

/// Validate the event and hand it to the bus.
///
/// The publish is a fire-and-forget work item: the task is detached, its
/// result discarded except for a warn log, and the response goes out before
/// the payload reaches the bus. Producers that need delivery guarantees do
/// not get them here.
fn process_ingest_request(state: &HttpCollectorState, body: Bytes) -> Result<IngestResponse> {
    validate_event(&body)?;

    let publisher = state.publisher.clone();
    let topic = state.topic.clone();
    tokio::spawn(async move {
        if let Err(error) = publisher.publish(&topic, body).await {
            warn!(%error, topic = %topic, "failed to publish event");
        }
    });

    Ok(IngestResponse::accepted())
}

/// An event is a single JSON object. The received bytes are republished
/// verbatim, so validation parses but never re-serializes.
fn validate_event(body: &[u8]) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|err| HttpCollectorError::BadRequest {
            message: format!("invalid JSON body: {err}"),
        })?;

    if !value.is_object() {
        return Err(HttpCollectorError::BadRequest {
            message: "event must be a JSON object".to_string(),
        });
    }

    Ok(())
}

fn map_error_to_response(error: HttpCollectorError) -> Response {
    let status_code = match error {
        HttpCollectorError::BadRequest { .. } => StatusCode::BAD_REQUEST,
    };

    let response = Json(ErrorResponse {
        message: error.to_string(),
    });

    (status_code, response).into_response()
}
