use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use outdial::call::SessionLimits;
use outdial::http::{create_router, AppState};
use outdial::storage::{FsBucket, ObjectStorage};
use outdial::store::JsonlStore;
use outdial::telephony::NatsMediaPlatform;
use outdial::{Config, RuleSet, SessionContext};

#[derive(Debug, Parser)]
#[command(name = "outdial", about = "Outbound call orchestration service")]
struct Args {
    /// Config file basename (without extension), e.g. config/outdial
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    info!("outdial v{}", env!("CARGO_PKG_VERSION"));
    info!("NATS endpoint: {}", cfg.telephony.nats_url);
    info!(
        "HTTP server will bind to {}:{}",
        cfg.service.bind, cfg.service.port
    );
    if cfg.telephony.trunk_id.is_empty() {
        warn!("no SIP trunk configured; outbound dials will fail fast");
    }

    let platform = Arc::new(
        NatsMediaPlatform::connect(&cfg.telephony.nats_url, cfg.telephony.trunk_id.clone())
            .await?,
    );
    let store = Arc::new(JsonlStore::open(cfg.store.path.clone()).await?);
    let storage: Option<Arc<dyn ObjectStorage>> = cfg
        .recording
        .bucket_path
        .as_ref()
        .map(|root| Arc::new(FsBucket::new(root.clone())) as Arc<dyn ObjectStorage>);
    let rules = match &cfg.classifier.rules_path {
        Some(path) => Arc::new(RuleSet::from_path(path)?),
        None => Arc::new(RuleSet::builtin()),
    };

    let ctx = SessionContext {
        platform,
        store,
        storage,
        rules,
        recording: cfg.recording.to_recording_config(),
        artifacts: cfg.artifacts.clone(),
        limits: SessionLimits {
            max_call: Duration::from_secs(cfg.telephony.max_call_secs),
            teardown_grace: Duration::from_secs(cfg.telephony.teardown_grace_secs),
        },
    };
    let state = AppState::new(ctx);
    let registry = state.registry.clone();

    let addr = format!("{}:{}", cfg.service.bind, cfg.service.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {e}");
            }
        })
        .await?;

    // End whatever is still in flight so dispositions and recordings are
    // finalized before the process exits.
    let active = registry.drain().await;
    if !active.is_empty() {
        info!("ending {} active call(s) before shutdown", active.len());
        for session in &active {
            session.end().await;
        }
        for session in &active {
            session.wait().await;
        }
    }

    info!("shutdown complete");
    Ok(())
}
