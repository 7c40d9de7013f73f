//! Echo Service Example
//!
//! A provider and a client exchanging requests through peerpipe over an
//! in-process [`MemoryHub`]. The provider runs under a [`PipeRuntime`]; the
//! client is a bare [`Pipe`].
//!
//! # Routes
//!
//! ```text
//! GET    /ping          -> { "pong": true }
//! POST   /echo          -> the request body
//! GET    /offers/:id    -> { "id": ..., "title": ... } or 404
//! POST   /offers        -> 201, body validated
//! DELETE /offers/:id    -> 401 unless the requester owns the offer
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-service -- --log-level debug
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use peerpipe::prelude::*;
use peerpipe::runtime::config::LogLevel;
use serde::Deserialize;
use tracing::{info, warn};

use crate::store::OfferStore;

const PROVIDER: &str = "0xprovider";
const CLIENT: &str = "0xclient";

#[derive(Debug, Parser)]
#[command(name = "echo-service", about = "peerpipe request/response demo")]
struct Args {
    /// Log level for the whole demo.
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Reply timeout used by the client, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,

    /// Delay between subscribing and transmitting, in milliseconds.
    #[arg(long, default_value_t = 100)]
    grace_ms: u64,

    /// Optional configuration file for the provider.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

// ============================================================================
// Offer Store
// ============================================================================

mod store {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    #[derive(Debug, Clone)]
    pub struct Offer {
        pub title: String,
        pub owner: String,
    }

    #[derive(Debug, Default)]
    pub struct OfferStore {
        offers: RwLock<HashMap<String, Offer>>,
    }

    impl OfferStore {
        pub async fn get(&self, id: &str) -> Option<Offer> {
            self.offers.read().await.get(id).cloned()
        }

        pub async fn insert(&self, offer: Offer) -> String {
            let mut offers = self.offers.write().await;
            let id = (offers.len() + 1).to_string();
            offers.insert(id.clone(), offer);
            id
        }

        pub async fn remove(&self, id: &str) -> Option<Offer> {
            self.offers.write().await.remove(id)
        }
    }
}

// ============================================================================
// Handler Functions
// ============================================================================

#[derive(Debug, Deserialize)]
struct NewOffer {
    title: String,
}

impl Validate for NewOffer {
    fn validate(&self) -> Vec<ValidationIssue> {
        if self.title.trim().is_empty() {
            vec![ValidationIssue::new(["title"], "must not be blank")]
        } else {
            Vec::new()
        }
    }
}

fn register_routes(pipe: &Pipe, store: Arc<OfferStore>) -> Result<()> {
    pipe.get("/ping", sync_handler(|_req| json!({ "pong": true })))?;

    pipe.post("/echo", |req: PipeRequest| async move {
        HandlerResponse::ok(req.body.unwrap_or_default())
    })?;

    let offers = Arc::clone(&store);
    pipe.get("/offers/:id", move |req: PipeRequest| {
        let offers = Arc::clone(&offers);
        async move {
            let id = req.path_param("id").unwrap_or_default();
            match offers.get(id).await {
                Some(offer) => Ok(HandlerResponse::ok(json!({ "id": id, "title": offer.title }))),
                None => Err(PipeError::not_found(format!("offer {id} does not exist"))),
            }
        }
    })?;

    let offers = Arc::clone(&store);
    pipe.post("/offers", move |req: PipeRequest| {
        let offers = Arc::clone(&offers);
        async move {
            let new: NewOffer = parse_validated_body(&req)?;
            let id = offers
                .insert(store::Offer {
                    title: new.title,
                    owner: req.requester.clone(),
                })
                .await;
            Ok::<_, PipeError>(HandlerResponse::with_code(ResponseCode(201)).body(json!({ "id": id })))
        }
    })?;

    let offers = store;
    pipe.delete("/offers/:id", move |req: PipeRequest| {
        let offers = Arc::clone(&offers);
        async move {
            let id = req.path_param("id").unwrap_or_default();
            let Some(offer) = offers.get(id).await else {
                return Err(PipeError::not_found(format!("offer {id} does not exist")));
            };
            if offer.owner != req.requester {
                return Err(PipeError::not_authorized("only the owner may delete an offer"));
            }
            offers.remove(id).await;
            Ok(())
        }
    })?;

    Ok(())
}

// ============================================================================
// Client Walkthrough
// ============================================================================

async fn call(client: &Pipe, request: SendRequest) {
    let label = format!("{} {}", request.method, request.path);
    match client.send(PROVIDER, request).await {
        Ok(res) => info!(
            request = %label,
            code = %res.code,
            body = %res.body.unwrap_or_default(),
            "Response"
        ),
        Err(e) => warn!(request = %label, error = %e, "Request failed"),
    }
}

async fn walkthrough(client: &Pipe) {
    call(client, SendRequest::get("/ping")).await;
    call(client, SendRequest::post("/echo").body(json!({ "hello": "peer" }))).await;
    call(client, SendRequest::post("/offers").body(json!({ "title": "  " }))).await;
    call(client, SendRequest::post("/offers").body(json!({ "title": "Road bike" }))).await;
    call(client, SendRequest::get("/offers/1?fields=title")).await;
    call(client, SendRequest::get("/offers/99")).await;
    call(client, SendRequest::delete("/offers/1")).await;
    call(client, SendRequest::patch("/unknown")).await;

    // Nobody listens under this identity, so this one times out.
    let started = tokio::time::Instant::now();
    match client
        .send("0xnobody", SendRequest::get("/ping").timeout(Duration::from_millis(500)))
        .await
    {
        Ok(res) => warn!(code = %res.code, "Unexpected reply"),
        Err(e) => info!(error = %e, elapsed = ?started.elapsed(), "Timed out as expected"),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let hub = MemoryHub::new();

    let mut builder = PipeRuntime::builder()
        .identity(PROVIDER)
        .transport(Arc::new(hub.endpoint(PROVIDER)));
    builder = match &args.config {
        Some(path) => builder.config_file(path),
        None => {
            let mut config = PeerpipeConfig::default();
            config.logging.level = args.log_level;
            config.pipe.grace_ms = args.grace_ms;
            builder.config(config)
        }
    };
    let runtime = builder.build()?;

    register_routes(runtime.pipe(), Arc::new(OfferStore::default()))?;

    let client = Pipe::new(
        Arc::new(hub.endpoint(CLIENT)),
        PipeConfig::new(Identity::new(CLIENT))
            .default_timeout(Duration::from_millis(args.timeout_ms))
            .grace_period(Duration::from_millis(args.grace_ms)),
    );
    client.init().await?;

    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let walk = tokio::spawn(async move {
        walkthrough(&client).await;
        if let Err(e) = client.close().await {
            warn!(error = %e, "Failed to close client");
        }
        let _ = done_tx.send(());
    });

    runtime
        .run_until(async {
            let _ = done_rx.await;
        })
        .await?;
    walk.await?;

    Ok(())
}
