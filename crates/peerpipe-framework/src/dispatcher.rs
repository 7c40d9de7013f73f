//! Inbound request dispatcher.
//!
//! The [`Dispatcher`] consumes the transport's inbound message stream and
//! turns each message into exactly one response (or none):
//!
//! ```text
//! RECEIVED ─┬─ sent by self ─────────────────────────────▶ DROPPED
//!           ├─ not a request envelope ───────────────────▶ DROPPED (logged)
//!           ├─ route found ──▶ handler ──▶ error mapper ─▶ RESPONDED
//!           └─ no route ─────────────────────────────────▶ 404 RESPONDED
//! ```
//!
//! Each message is handled on its own task. The listener moves on to the
//! next message without waiting, so responses to different requests may go
//! out in any order. A failing or panicking handler only affects its own
//! request.
//!
//! # Tower Service Integration
//!
//! `Dispatcher` implements `tower::Service<PipeRequest>` for the routing
//! step, so middleware can be applied to it:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(64)
//!     .service(pipe.dispatcher());
//! ```

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{Instrument, debug, debug_span, info, trace, warn};

use crate::error_mapper::{map_outcome, map_panic};
use crate::router::{RouteMatch, SharedRouter};
use peerpipe_core::{
    BoxedTransport, Identity, InboundMessage, MessageStream, PipeRequest, PipeResponse,
    TransportResult,
};

/// Routes inbound requests to handlers and sends back their responses.
///
/// Cloning is cheap; all clones share the same router and transport.
#[derive(Clone)]
pub struct Dispatcher {
    router: SharedRouter,
    transport: BoxedTransport,
    identity: Identity,
}

impl Dispatcher {
    /// Creates a dispatcher over a shared router.
    pub fn new(router: SharedRouter, transport: BoxedTransport, identity: Identity) -> Self {
        Self {
            router,
            transport,
            identity,
        }
    }

    /// Consumes inbound messages until the stream ends or `shutdown` fires.
    pub async fn run(self, mut messages: MessageStream, shutdown: CancellationToken) {
        info!(identity = %self.identity, "Pipe listener started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = messages.next() => match next {
                    Some(message) => {
                        let dispatcher = self.clone();
                        tokio::spawn(async move {
                            dispatcher.handle_message(message).await;
                        });
                    }
                    None => {
                        warn!(identity = %self.identity, "Inbound message stream ended");
                        break;
                    }
                },
            }
        }

        info!(identity = %self.identity, "Pipe listener stopped");
    }

    /// Handles one inbound message end to end.
    ///
    /// Returns the response that was sent, or `None` if the message was dropped.
    pub async fn handle_message(&self, message: InboundMessage) -> Option<PipeResponse> {
        if self.identity.is_self(&message.sender) {
            trace!("Dropping self-authored message");
            return None;
        }

        let request = match PipeRequest::decode(&message.content, &message.sender) {
            Ok(request) => request,
            Err(e) => {
                // Response envelopes for our own outbound calls land here too.
                debug!(peer = %message.sender, error = %e, "Dropping message that is not a request");
                return None;
            }
        };

        let span = debug_span!(
            "dispatch",
            request_id = %request.id,
            peer = %message.sender,
            method = %request.method,
            path = %request.path,
        );

        async {
            let response = self.process(request).await;
            debug!(code = %response.code, "Sending response");
            if let Err(e) = self.reply(&message.sender, &response).await {
                warn!(error = %e, "Failed to deliver response");
            }
            Some(response)
        }
        .instrument(span)
        .await
    }

    /// Routes a decoded, normalized request and produces its response.
    ///
    /// The response always carries the request's id.
    pub async fn process(&self, mut request: PipeRequest) -> PipeResponse {
        let found = self.router.read().find(request.method, &request.path);

        match found {
            RouteMatch::Found {
                handler,
                path_params,
                pattern,
            } => {
                trace!(pattern = %pattern, "Route matched");
                request.path_params = path_params;
                let id = request.id.clone();

                let outcome = AssertUnwindSafe(async move { handler.call(request).await })
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(result) => map_outcome(&id, result),
                    Err(payload) => map_panic(&id, payload),
                }
            }
            RouteMatch::NotFound => {
                debug!("No route matched");
                PipeResponse::not_found(&request.id, request.method, &request.path)
            }
        }
    }

    async fn reply(&self, peer: &str, response: &PipeResponse) -> TransportResult<()> {
        let payload = match response.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Handler body cannot be encoded, answering 500");
                PipeResponse::internal_error(&response.id)
                    .encode()
                    .unwrap_or_default()
            }
        };
        let channel = self.transport.open_channel(peer).await?;
        channel.send(&payload).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("identity", &self.identity)
            .field("routes", &self.router.read().len())
            .finish()
    }
}

impl Service<PipeRequest> for Dispatcher {
    type Response = PipeResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PipeRequest) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.process(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use peerpipe_core::{HandlerResponse, Method, PipeError, ResponseCode, Transport};
    use peerpipe_transport::{MemoryHub, MemoryTransport};
    use serde_json::json;
    use tokio::time::timeout;
    use tower::ServiceExt;

    use crate::router::Router;

    async fn endpoint(hub: &MemoryHub, id: &str) -> Arc<MemoryTransport> {
        let t = Arc::new(hub.endpoint(id));
        t.init().await.unwrap();
        t
    }

    async fn dispatcher_with(router: Router) -> (MemoryHub, Dispatcher) {
        let hub = MemoryHub::new();
        let server = endpoint(&hub, "server").await;
        let dispatcher = Dispatcher::new(router.into_shared(), server, Identity::new("server"));
        (hub, dispatcher)
    }

    fn offers_router() -> Router {
        let mut router = Router::new();
        router
            .get("/offers/:id", |req: PipeRequest| async move {
                HandlerResponse::ok(json!({ "id": req.path_param("id") }))
            })
            .unwrap();
        router
    }

    #[tokio::test]
    async fn test_offer_lookup_scenario() {
        let (_hub, dispatcher) = dispatcher_with(offers_router()).await;
        let msg = InboundMessage::new("client", r#"{"id":"abc","method":"GET","path":"/offers/42"}"#);

        let res = dispatcher.handle_message(msg).await.unwrap();
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            json!({"id": "abc", "code": 200, "body": {"id": "42"}})
        );
    }

    #[tokio::test]
    async fn test_unknown_route_scenario() {
        let (_hub, dispatcher) = dispatcher_with(offers_router()).await;
        let msg = InboundMessage::new("client", r#"{"id":"xyz","method":"POST","path":"/unknown"}"#);

        let res = dispatcher.handle_message(msg).await.unwrap();
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            json!({"id": "xyz", "code": 404, "body": {"message": "POST /unknown is not found"}})
        );
    }

    #[tokio::test]
    async fn test_method_miss_on_first_match_is_not_found() {
        let mut router = offers_router();
        router
            .post("/offers/new", |_req: PipeRequest| async {
                HandlerResponse::with_code(ResponseCode(201))
            })
            .unwrap();
        let (_hub, dispatcher) = dispatcher_with(router).await;

        let res = dispatcher
            .process(PipeRequest::new("p1", Method::Post, "/offers/new"))
            .await;
        assert_eq!(res.code, ResponseCode::NOT_FOUND);
        assert_eq!(
            res.body,
            Some(json!({"message": "POST /offers/new is not found"}))
        );
    }

    #[tokio::test]
    async fn test_handler_runs_once_and_response_is_delivered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut router = Router::new();
        router
            .put("/jobs/:id", move |req: PipeRequest| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    json!({ "requester": req.requester, "body": req.body })
                }
            })
            .unwrap();

        let (hub, dispatcher) = dispatcher_with(router).await;
        let client = endpoint(&hub, "client").await;
        let mut replies = client.open_channel("server").await.unwrap().subscribe().await.unwrap();

        let msg = InboundMessage::new(
            "client",
            r#"{"id":"j1","method":"PUT","path":"jobs/9","body":{"n":1},"requester":"spoofed"}"#,
        );
        dispatcher.handle_message(msg).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let delivered = timeout(Duration::from_secs(1), replies.next()).await.unwrap().unwrap();
        assert_eq!(delivered.sender, "server");
        let res = PipeResponse::decode(&delivered.content).unwrap();
        assert_eq!(res.id, "j1");
        assert_eq!(res.body, Some(json!({ "requester": "client", "body": {"n": 1} })));
    }

    #[tokio::test]
    async fn test_self_authored_and_malformed_messages_are_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut router = Router::new();
        router
            .get("/ping", move |_req: PipeRequest| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .unwrap();
        let (_hub, dispatcher) = dispatcher_with(router).await;

        let own = InboundMessage::new("server", r#"{"id":"1","method":"GET","path":"/ping"}"#);
        assert!(dispatcher.handle_message(own).await.is_none());

        let garbage = InboundMessage::new("client", "{not json");
        assert!(dispatcher.handle_message(garbage).await.is_none());

        let reply = InboundMessage::new("client", r#"{"id":"1","code":200}"#);
        assert!(dispatcher.handle_message(reply).await.is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_cannot_change_response_id() {
        let mut router = Router::new();
        router
            .get("/x", |_req: PipeRequest| async {
                Err::<(), _>(PipeError::not_authorized("no"))
            })
            .unwrap();
        let (_hub, dispatcher) = dispatcher_with(router).await;

        let res = dispatcher.process(PipeRequest::new("real", Method::Get, "/x")).await;
        assert_eq!(res.id, "real");
        assert_eq!(res.code, ResponseCode::NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn test_panicking_handler_answers_500() {
        let mut router = Router::new();
        router
            .get("/boom", |_req: PipeRequest| async {
                if true {
                    panic!("handler exploded");
                }
            })
            .unwrap();
        let (_hub, dispatcher) = dispatcher_with(router).await;

        let res = dispatcher.process(PipeRequest::new("b1", Method::Get, "/boom")).await;
        assert_eq!(res, PipeResponse::internal_error("b1"));
    }

    #[tokio::test]
    async fn test_unstructured_error_answers_500() {
        let mut router = Router::new();
        router
            .get("/fail", |_req: PipeRequest| async {
                Err::<(), _>(anyhow::anyhow!("connection string postgres://secret"))
            })
            .unwrap();
        let (_hub, dispatcher) = dispatcher_with(router).await;

        let res = dispatcher.process(PipeRequest::new("f1", Method::Get, "/fail")).await;
        assert_eq!(res.code, ResponseCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body, Some(json!({"message": "Internal server error"})));
    }

    #[tokio::test]
    async fn test_as_tower_service() {
        let (_hub, dispatcher) = dispatcher_with(offers_router()).await;
        let res = dispatcher
            .oneshot(PipeRequest::new("t1", Method::Get, "/offers/5"))
            .await
            .unwrap();
        assert_eq!(res.body, Some(json!({"id": "5"})));
    }

    #[tokio::test]
    async fn test_slow_handler_does_not_block_listener() {
        let mut router = Router::new();
        router
            .get("/slow", |_req: PipeRequest| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .unwrap();
        router
            .get("/fast", |_req: PipeRequest| async { json!("fast") })
            .unwrap();

        let hub = MemoryHub::new();
        let server = endpoint(&hub, "server").await;
        let client = endpoint(&hub, "client").await;
        let dispatcher = Dispatcher::new(router.into_shared(), server.clone(), Identity::new("server"));
        let shutdown = CancellationToken::new();
        let inbound = server.subscribe().await.unwrap();
        let listener = tokio::spawn(dispatcher.run(inbound, shutdown.clone()));

        let channel = client.open_channel("server").await.unwrap();
        let mut replies = channel.subscribe().await.unwrap();
        channel
            .send(r#"{"id":"s","method":"GET","path":"/slow"}"#)
            .await
            .unwrap();
        channel
            .send(r#"{"id":"f","method":"GET","path":"/fast"}"#)
            .await
            .unwrap();

        let res = loop {
            let msg = timeout(Duration::from_secs(5), replies.next()).await.unwrap().unwrap();
            if msg.sender == "server" {
                break PipeResponse::decode(&msg.content).unwrap();
            }
        };
        assert_eq!(res.id, "f");

        shutdown.cancel();
        listener.await.unwrap();
    }
}
