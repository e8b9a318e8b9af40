use crate::error::RuntimeError;
use engine_config::EntityCatalog;
use engine_processing::producer::{LoadCoordinator, LoadReport};
use model::{core::identifiers::EntityName, requests::load::LoadRequest};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Triggers an incremental load for every configured entity at its own
/// frequency. The first run of each entity starts immediately.
pub struct IncrementalScheduler {
    coordinator: Arc<LoadCoordinator>,
    catalog: Arc<EntityCatalog>,
}

impl IncrementalScheduler {
    pub fn new(coordinator: Arc<LoadCoordinator>, catalog: Arc<EntityCatalog>) -> Self {
        IncrementalScheduler {
            coordinator,
            catalog,
        }
    }

    /// One incremental load per entity, in catalog order.
    pub async fn run_once(&self) -> Vec<LoadReport> {
        let mut reports = Vec::with_capacity(self.catalog.len());
        for entity in self.catalog.entities() {
            if let Some(report) = trigger(&self.coordinator, entity).await {
                reports.push(report);
            }
        }
        reports
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RuntimeError> {
        let mut loops = JoinSet::new();

        for settings in self.catalog.settings() {
            let entity = settings.entity_name();
            let every = settings.frequency().max(Duration::from_secs(1));
            let coordinator = Arc::clone(&self.coordinator);
            let cancel = cancel.clone();

            info!(entity = %entity, every_secs = every.as_secs(), "Scheduling incremental load");

            loops.spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            trigger(&coordinator, &entity).await;
                        }
                    }
                }
            });
        }

        while let Some(joined) = loops.join_next().await {
            joined?;
        }
        info!("Incremental scheduler stopped");
        Ok(())
    }
}

async fn trigger(coordinator: &LoadCoordinator, entity: &EntityName) -> Option<LoadReport> {
    match coordinator.run(&LoadRequest::incremental(entity.as_str())).await {
        Ok(report) => {
            if !report.is_success() {
                warn!(
                    entity = %entity,
                    "Incremental load finished with failures; the next run retries from the stored watermark"
                );
            }
            Some(report)
        }
        Err(err) => {
            error!(entity = %entity, error = %err, "Incremental load failed");
            None
        }
    }
}
