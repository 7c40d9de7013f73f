//! Handler system for the peerpipe framework.
//!
//! A route handler is any async function (or closure) that takes the
//! [`PipeRequest`] and returns something implementing [`IntoHandlerResult`]:
//!
//! ```rust,ignore
//! use peerpipe_framework::prelude::*;
//!
//! // No return value: answers `{ code: 200 }`
//! async fn ping(_req: PipeRequest) {}
//!
//! // A response with a body
//! async fn get_offer(req: PipeRequest) -> HandlerResponse {
//!     HandlerResponse::ok(json!({ "id": req.path_param("id") }))
//! }
//!
//! // Structured errors travel to the requester unchanged
//! async fn delete_offer(req: PipeRequest) -> Result<(), PipeError> {
//!     Err(PipeError::not_authorized("only the owner may delete offers"))
//! }
//!
//! // Any other error becomes an opaque 500
//! async fn load(req: PipeRequest) -> anyhow::Result<HandlerResponse> {
//!     let data = std::fs::read_to_string("offers.json")?;
//!     Ok(HandlerResponse::ok(serde_json::from_str(&data)?))
//! }
//! ```
//!
//! Synchronous functions are wrapped with [`sync_handler`].

use std::future::{Future, Ready, ready};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use peerpipe_core::{HandlerResponse, PipeError, PipeRequest};

/// The outcome of a handler invocation.
///
/// `Err` holds either a [`PipeError`], which is answered as-is, or any other
/// error, which is answered with a generic 500.
pub type HandlerResult = anyhow::Result<HandlerResponse>;

// ============================================================================
// IntoHandlerResult
// ============================================================================

/// Values a route handler may return.
pub trait IntoHandlerResult: Send {
    /// Converts the value into a handler outcome.
    fn into_handler_result(self) -> HandlerResult;
}

/// No return value answers with the default `{ code: 200 }`.
impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(HandlerResponse::default())
    }
}

impl IntoHandlerResult for HandlerResponse {
    fn into_handler_result(self) -> HandlerResult {
        Ok(self)
    }
}

/// `None` answers with the default `{ code: 200 }`.
impl IntoHandlerResult for Option<HandlerResponse> {
    fn into_handler_result(self) -> HandlerResult {
        Ok(self.unwrap_or_default())
    }
}

/// A bare JSON value is sent as the body of a 200 response.
impl IntoHandlerResult for Value {
    fn into_handler_result(self) -> HandlerResult {
        Ok(HandlerResponse::ok(self))
    }
}

impl IntoHandlerResult for PipeError {
    fn into_handler_result(self) -> HandlerResult {
        Err(self.into())
    }
}

impl<T, E> IntoHandlerResult for Result<T, E>
where
    T: IntoHandlerResult,
    E: Into<anyhow::Error> + Send,
{
    fn into_handler_result(self) -> HandlerResult {
        match self {
            Ok(t) => t.into_handler_result(),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// A type-erased route handler.
///
/// Implemented for every `Fn(PipeRequest) -> impl Future` whose output
/// implements [`IntoHandlerResult`].
pub trait Handler: Send + Sync + 'static {
    /// Invokes the handler.
    fn call(&self, request: PipeRequest) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandlerResult,
{
    fn call(&self, request: PipeRequest) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(request);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// Boxes a handler.
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

/// Adapts a synchronous function into a route handler.
///
/// ```rust,ignore
/// pipe.get("/health", sync_handler(|_req| json!({ "status": "up" })))?;
/// ```
pub fn sync_handler<F, R>(f: F) -> impl Fn(PipeRequest) -> Ready<R> + Send + Sync + 'static
where
    F: Fn(PipeRequest) -> R + Send + Sync + 'static,
    R: IntoHandlerResult + 'static,
{
    move |request| ready(f(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerpipe_core::{Method, ResponseCode};
    use serde_json::json;

    fn request() -> PipeRequest {
        PipeRequest::new("r1", Method::Get, "/x")
    }

    #[tokio::test]
    async fn test_unit_handler_defaults_to_ok() {
        let handler = into_handler(|_req: PipeRequest| async {});
        let res = handler.call(request()).await.unwrap();
        assert_eq!(res, HandlerResponse::default());
    }

    #[tokio::test]
    async fn test_result_handler_propagates_pipe_error() {
        let handler = into_handler(|_req: PipeRequest| async {
            Err::<HandlerResponse, _>(PipeError::not_found("gone"))
        });
        let err = handler.call(request()).await.unwrap_err();
        let pipe_err = err.downcast::<PipeError>().unwrap();
        assert_eq!(pipe_err.code, ResponseCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_handler() {
        let handler = into_handler(sync_handler(|req: PipeRequest| json!({ "path": req.path })));
        let res = handler.call(request()).await.unwrap();
        assert_eq!(res.body, Some(json!({ "path": "/x" })));
    }

    #[tokio::test]
    async fn test_option_handler() {
        let handler = into_handler(|_req: PipeRequest| async {
            Some(HandlerResponse::with_code(ResponseCode(202)))
        });
        let res = handler.call(request()).await.unwrap();
        assert_eq!(res.code, ResponseCode(202));
    }
}
