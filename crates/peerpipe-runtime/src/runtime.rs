//! Process-level orchestration of one pipe session.
//!
//! ```rust,ignore
//! use peerpipe_runtime::PipeRuntime;
//!
//! let runtime = PipeRuntime::builder()
//!     .config_file("config/peerpipe.toml")
//!     .transport(transport)
//!     .build()?;
//!
//! runtime.pipe().get("/status", |_req| async { json!({ "up": true }) })?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use crate::config::{ConfigLoader, PeerpipeConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use peerpipe_core::BoxedTransport;
use peerpipe_framework::Pipe;

/// Owns one configured [`Pipe`] and drives it for the life of the process.
pub struct PipeRuntime {
    config: PeerpipeConfig,
    pipe: Arc<Pipe>,
}

impl PipeRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration but does not touch logging.
    pub fn from_config(config: PeerpipeConfig, transport: BoxedTransport) -> RuntimeResult<Self> {
        validate_config(&config)?;
        let pipe = Arc::new(Pipe::new(transport, config.pipe.to_pipe_config()));
        Ok(Self { config, pipe })
    }

    pub fn config(&self) -> &PeerpipeConfig {
        &self.config
    }

    /// The managed session. Register routes and send requests through it.
    pub fn pipe(&self) -> &Arc<Pipe> {
        &self.pipe
    }

    /// Initializes the session and starts listening.
    pub async fn start(&self) -> RuntimeResult<()> {
        self.pipe.init().await?;
        self.pipe.start().await?;
        info!(identity = %self.pipe.identity(), "Peerpipe runtime started");
        Ok(())
    }

    /// Closes the session.
    pub async fn stop(&self) -> RuntimeResult<()> {
        self.pipe.close().await?;
        info!("Peerpipe runtime stopped");
        Ok(())
    }

    /// Runs until Ctrl+C (or SIGTERM on unix), then closes the session.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Press Ctrl+C to stop");
        let waited = wait_for_shutdown().await;
        self.stop().await?;
        waited
    }

    /// Runs until `shutdown` completes, then closes the session.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }
}

impl std::fmt::Debug for PipeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeRuntime")
            .field("config", &self.config)
            .field("pipe", &self.pipe)
            .finish()
    }
}

async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    res = signal::ctrl_c() => {
                        res?;
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return Ok(());
            }
            Err(e) => warn!(error = %e, "Cannot register SIGTERM handler, waiting for Ctrl+C only"),
        }
    }

    signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");
    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`PipeRuntime`].
///
/// Loads configuration through [`ConfigLoader`], installs logging from it
/// and validates it before building the session.
pub struct RuntimeBuilder {
    config_file: Option<PathBuf>,
    profile: Option<String>,
    identity: Option<String>,
    config: Option<PeerpipeConfig>,
    transport: Option<BoxedTransport>,
    init_logging: bool,
    load_env: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_file: None,
            profile: None,
            identity: None,
            config: None,
            transport: None,
            init_logging: true,
            load_env: true,
        }
    }

    /// Loads this file instead of searching for `peerpipe.toml`.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Overrides `pipe.identity` from every other source.
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Uses this configuration and skips loading.
    pub fn config(mut self, config: PeerpipeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Ignores `PEERPIPE_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    pub fn build(self) -> RuntimeResult<PipeRuntime> {
        let transport = self.transport.ok_or(RuntimeError::MissingTransport)?;

        let mut config = match self.config {
            Some(config) => config,
            None => {
                let mut loader = ConfigLoader::new();
                if let Some(profile) = &self.profile {
                    loader = loader.profile(profile);
                }
                if let Some(path) = &self.config_file {
                    loader = loader.file(path);
                }
                if !self.load_env {
                    loader = loader.without_env();
                }
                loader.load()?
            }
        };
        if let Some(identity) = self.identity {
            config.pipe.identity = identity;
        }

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        PipeRuntime::from_config(config, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use peerpipe_core::{ResponseCode, SendRequest};
    use peerpipe_framework::{Pipe, PipeConfig};
    use peerpipe_transport::MemoryHub;
    use serde_json::json;

    use crate::config::ConfigError;

    #[test]
    fn test_build_requires_transport() {
        let result = PipeRuntime::builder().without_logging().build();
        assert!(matches!(result, Err(RuntimeError::MissingTransport)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let hub = MemoryHub::new();
        let result = PipeRuntime::builder()
            .config(PeerpipeConfig::default())
            .transport(Arc::new(hub.endpoint("svc")))
            .without_logging()
            .build();
        assert!(matches!(
            result,
            Err(RuntimeError::Config(ConfigError::MissingField { .. }))
        ));
    }

    #[tokio::test]
    async fn test_runtime_serves_until_shutdown() {
        let hub = MemoryHub::new();
        let mut config = PeerpipeConfig::default();
        config.pipe.grace_ms = 10;

        let runtime = PipeRuntime::builder()
            .config(config)
            .identity("svc")
            .transport(Arc::new(hub.endpoint("svc")))
            .without_logging()
            .build()
            .unwrap();
        runtime
            .pipe()
            .get("/status", |_req| async { json!({ "up": true }) })
            .unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = Arc::clone(runtime.pipe());
        let serving = tokio::spawn(async move {
            runtime
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let client = Pipe::new(
            Arc::new(hub.endpoint("client")),
            PipeConfig::new(peerpipe_core::Identity::new("client"))
                .grace_period(Duration::from_millis(10))
                .default_timeout(Duration::from_secs(2)),
        );
        client.init().await.unwrap();

        // The listener may still be starting; retry until it answers.
        let mut answered = None;
        for _ in 0..5 {
            if let Ok(res) = client.send("svc", SendRequest::get("/status")).await {
                answered = Some(res);
                break;
            }
        }
        let res = answered.unwrap();
        assert_eq!(res.code, ResponseCode::OK);
        assert_eq!(res.body, Some(json!({ "up": true })));

        stop_tx.send(()).unwrap();
        serving.await.unwrap().unwrap();
        assert!(!server.is_listening().await);
    }
}
