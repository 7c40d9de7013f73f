//! Translation of handler outcomes into response envelopes.
//!
//! | Outcome | Response |
//! |---------|----------|
//! | `Ok(HandlerResponse)` | its code and body, under the request id |
//! | `Err` holding a [`PipeError`] | the error's code and body, unchanged |
//! | any other `Err` | `500 { "message": "Internal server error" }` |
//! | panic | `500 { "message": "Internal server error" }` |
//!
//! Unstructured failures are logged locally with full detail. Nothing of
//! them is transmitted.

use std::any::Any;

use tracing::{debug, error};

use crate::handler::HandlerResult;
use peerpipe_core::{PipeError, PipeResponse};

/// Builds the response for a completed handler invocation.
pub fn map_outcome(id: &str, outcome: HandlerResult) -> PipeResponse {
    match outcome {
        Ok(response) => response.into_response(id),
        Err(err) => map_error(id, err),
    }
}

/// Builds the response for a failed handler invocation.
pub fn map_error(id: &str, err: anyhow::Error) -> PipeResponse {
    match err.downcast::<PipeError>() {
        Ok(pipe_err) => {
            debug!(request_id = %id, code = %pipe_err.code, "Handler answered with a pipe error");
            pipe_err.into_response(id)
        }
        Err(err) => {
            error!(request_id = %id, error = ?err, "Route handler failed");
            PipeResponse::internal_error(id)
        }
    }
}

/// Builds the response for a handler that panicked.
pub fn map_panic(id: &str, payload: Box<dyn Any + Send>) -> PipeResponse {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    error!(request_id = %id, panic = %message, "Route handler panicked");
    PipeResponse::internal_error(id)
}
