//! The pipe session.
//!
//! A [`Pipe`] bundles one transport endpoint, its routes, the inbound
//! listener and the outbound correlator:
//!
//! ```rust,ignore
//! let pipe = Pipe::new(transport, PipeConfig::new(Identity::new("0xprovider")));
//! pipe.init().await?;
//!
//! pipe.get("/offers/:id", |req: PipeRequest| async move {
//!     HandlerResponse::ok(json!({ "id": req.path_param("id") }))
//! })?;
//! pipe.start().await?;
//!
//! let res = pipe.send("0xclient", SendRequest::get("/status")).await?;
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Created ──init()──▶ Initialized ──close()──▶ Closed
//!                       │    ▲
//!               start() │    │ stop()
//!                       ▼    │
//!                      listening
//! ```
//!
//! Routes may be registered in any state. A route added while listening
//! applies to every message handled after it was added.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::correlator::{Correlator, DEFAULT_GRACE_PERIOD, DEFAULT_TIMEOUT};
use crate::dispatcher::Dispatcher;
use crate::error::{RouteError, SendResult, SessionError, SessionResult};
use crate::handler::IntoHandlerResult;
use crate::router::{Router, SharedRouter};
use peerpipe_core::{BoxedTransport, Identity, Method, PipeRequest, PipeResponse, SendRequest};

/// Settings for one pipe session.
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// This endpoint's identity, used to drop self-authored messages.
    pub identity: Identity,
    /// Reply timeout for requests that carry none.
    pub default_timeout: Duration,
    /// Delay between subscribing to a conversation and transmitting.
    pub grace_period: Duration,
}

impl PipeConfig {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            default_timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Initialized,
    Closed,
}

struct Listener {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// A request/response session over one transport endpoint.
pub struct Pipe {
    transport: BoxedTransport,
    router: SharedRouter,
    config: PipeConfig,
    state: Mutex<State>,
    listener: tokio::sync::Mutex<Option<Listener>>,
}

impl Pipe {
    /// Creates a session. Nothing touches the transport until [`Pipe::init`].
    pub fn new(transport: BoxedTransport, config: PipeConfig) -> Self {
        Self {
            transport,
            router: Router::new().into_shared(),
            config,
            state: Mutex::new(State::Created),
            listener: tokio::sync::Mutex::new(None),
        }
    }

    /// Prepares the transport. Calling it again is a no-op.
    pub async fn init(&self) -> SessionResult<()> {
        match *self.state.lock() {
            State::Closed => return Err(SessionError::Closed),
            State::Initialized => return Ok(()),
            State::Created => {}
        }

        self.transport.init().await?;

        let mut state = self.state.lock();
        if *state == State::Closed {
            return Err(SessionError::Closed);
        }
        *state = State::Initialized;
        info!(identity = %self.config.identity, "Pipe initialized");
        Ok(())
    }

    fn ensure_initialized(&self) -> SessionResult<()> {
        match *self.state.lock() {
            State::Created => Err(SessionError::NotInitialized),
            State::Initialized => Ok(()),
            State::Closed => Err(SessionError::Closed),
        }
    }

    /// Registers `handler` for `method` on `pattern`.
    pub fn route<F, Fut, R>(&self, method: Method, pattern: &str, handler: F) -> Result<&Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.router.write().route(method, pattern, handler)?;
        debug!(%method, pattern, "Route registered");
        Ok(self)
    }

    pub fn get<F, Fut, R>(&self, pattern: &str, handler: F) -> Result<&Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post<F, Fut, R>(&self, pattern: &str, handler: F) -> Result<&Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put<F, Fut, R>(&self, pattern: &str, handler: F) -> Result<&Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Put, pattern, handler)
    }

    pub fn patch<F, Fut, R>(&self, pattern: &str, handler: F) -> Result<&Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Patch, pattern, handler)
    }

    pub fn delete<F, Fut, R>(&self, pattern: &str, handler: F) -> Result<&Self, RouteError>
    where
        F: Fn(PipeRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandlerResult,
    {
        self.route(Method::Delete, pattern, handler)
    }

    /// Starts the inbound listener. Does nothing if it is already running.
    pub async fn start(&self) -> SessionResult<()> {
        self.ensure_initialized()?;

        let mut listener = self.listener.lock().await;
        if let Some(running) = listener.as_ref()
            && !running.task.is_finished()
        {
            debug!("Pipe listener already running");
            return Ok(());
        }

        let messages = self.transport.subscribe().await?;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.dispatcher().run(messages, shutdown.clone()));
        *listener = Some(Listener { shutdown, task });
        Ok(())
    }

    /// Returns true while the inbound listener is running.
    pub async fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .await
            .as_ref()
            .is_some_and(|l| !l.task.is_finished())
    }

    /// Stops the inbound listener. Handlers already running are not interrupted.
    pub async fn stop(&self) {
        let Some(listener) = self.listener.lock().await.take() else {
            return;
        };
        listener.shutdown.cancel();
        if let Err(e) = listener.task.await {
            warn!(error = %e, "Pipe listener task failed");
        }
    }

    /// Sends a request to `target` and waits for its response.
    ///
    /// Every response code resolves the call. Fails if the pipe is not
    /// initialized, the transport fails, or no reply arrives in time.
    pub async fn send(&self, target: &str, request: SendRequest) -> SendResult<PipeResponse> {
        self.ensure_initialized()?;
        self.correlator().send(target, request).await
    }

    /// Stops the listener and closes the transport. Calling it again is a no-op.
    pub async fn close(&self) -> SessionResult<()> {
        {
            let mut state = self.state.lock();
            if *state == State::Closed {
                return Ok(());
            }
            *state = State::Closed;
        }

        self.stop().await;
        self.transport.close().await?;
        info!(identity = %self.config.identity, "Pipe closed");
        Ok(())
    }

    /// Returns a dispatcher over this session's routes.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.router.clone(),
            self.transport.clone(),
            self.config.identity.clone(),
        )
    }

    /// Returns a correlator configured with this session's settings.
    pub fn correlator(&self) -> Correlator {
        Correlator::new(self.transport.clone(), self.config.identity.clone())
            .with_default_timeout(self.config.default_timeout)
            .with_grace_period(self.config.grace_period)
    }

    pub fn router(&self) -> &SharedRouter {
        &self.router
    }

    pub fn identity(&self) -> &Identity {
        &self.config.identity
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("routes", &self.router.read().len())
            .finish()
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.shutdown.cancel();
        }
    }
}
