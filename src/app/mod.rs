use crate::api::{ApiServer, ApiState};
use crate::bus::{ack_channel, HttpBus, MessageBus};
use crate::config::Config;
use crate::ledger::{SqliteLedger, TaskLedger};
use crate::orchestrator::{
    AckConsumer, AckRouter, CleanupCoordinator, MeetingLifecycle, TaskDispatcher,
};
use crate::storage::{ArtifactStore, SqliteArtifactStore, VolumeSet};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrator components wired against the configured stores.
pub struct Components {
    pub router: Arc<AckRouter>,
    pub cleanup: Arc<CleanupCoordinator>,
    pub lifecycle: Arc<MeetingLifecycle>,
}

pub fn build_components(config: &Config) -> Result<Components> {
    let timeout = config.ledger.request_timeout();

    let ledger_path = config.ledger.resolved_path()?;
    let ledger: Arc<dyn TaskLedger> = Arc::new(
        SqliteLedger::open(&ledger_path, config.ledger.scan_batch_size)
            .and_then(|ledger| ledger.with_busy_timeout(timeout))
            .with_context(|| format!("Failed to open ledger at {:?}", ledger_path))?,
    );
    info!("Ledger: {:?}", ledger_path);

    let documents_path = config.storage.resolved_documents_path()?;
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(
        SqliteArtifactStore::open(&documents_path)
            .with_context(|| format!("Failed to open documents at {:?}", documents_path))?,
    );

    if config.bus.endpoints.is_empty() {
        warn!("No worker endpoints configured, every dispatch will fail");
    }
    let bus: Arc<dyn MessageBus> = Arc::new(
        HttpBus::new(config.bus.endpoints.clone(), config.bus.publish_timeout())
            .context("Failed to build worker HTTP client")?,
    );

    let dispatcher = Arc::new(
        TaskDispatcher::new(ledger.clone(), bus, config.bus.queues.clone(), timeout)
            .with_publish_timeout(config.bus.publish_timeout()),
    );
    let cleanup = Arc::new(CleanupCoordinator::new(
        ledger.clone(),
        artifacts,
        config.storage.collections.clone(),
        VolumeSet::new(config.storage.volumes.clone()),
        timeout,
    ));
    let router = Arc::new(
        AckRouter::new(
            ledger.clone(),
            dispatcher.clone(),
            cleanup.clone(),
            config.storage.report_volume.clone(),
            timeout,
        )
        .with_report_verification(config.storage.verify_report_artifact),
    );
    let lifecycle = Arc::new(
        MeetingLifecycle::new(ledger.clone(), dispatcher, router.clone(), timeout)
            .context("Failed to build meeting lifecycle")?,
    );

    Ok(Components {
        router,
        cleanup,
        lifecycle,
    })
}

pub async fn run_service() -> Result<()> {
    info!("Starting meeting orchestrator");

    let config = Config::load()?;
    let components = build_components(&config)?;

    let (acks, receiver) = ack_channel(config.bus.ack_buffer);
    let consumer = Arc::new(AckConsumer::new(
        components.router.clone(),
        config.bus.ack_mode,
    ));
    let consumers = consumer.spawn(receiver, config.bus.consumers);
    info!(
        "{} ack consumer(s) running in {:?} mode",
        consumers.len(),
        config.bus.ack_mode
    );

    let api_server = ApiServer::new(
        ApiState {
            lifecycle: components.lifecycle.clone(),
            acks,
        },
        &config.api,
    );

    info!("Meeting orchestrator is ready!");

    if let Err(e) = api_server.start().await {
        error!("API server failed: {}", e);
        return Err(e);
    }

    Ok(())
}
