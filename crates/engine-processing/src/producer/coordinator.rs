use crate::{
    error::LoadError,
    producer::components::{
        batcher::Batches,
        dispatcher::{BatchDispatcher, MAX_BATCH_SIZE},
    },
};
use chrono::{DateTime, Utc};
use engine_config::EntityCatalog;
use engine_core::state::{TenantDirectory, WatermarkStore};
use model::{
    core::{identifiers::{ClientCode, EntityName}, time::iso_millis},
    requests::{load::LoadRequest, window::LoadType},
    settings::entity::EntitySettings,
    tenants::{Tenant, TenantFilter},
};
use planner::{PlanError, plan, plan::initial_days};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened for one tenant during a coordinator run.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantOutcome {
    /// Every batch was accepted. `watermark` is the new incremental
    /// watermark, if one was stored.
    Dispatched {
        windows: usize,
        batches: usize,
        watermark: Option<DateTime<Utc>>,
    },
    /// The watermark already reaches now; no window to send.
    UpToDate,
    /// At least one batch was not fully accepted.
    DispatchFailed {
        windows: usize,
        batches: usize,
        failed_batches: usize,
    },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantReport {
    pub client_code: ClientCode,
    pub outcome: TenantOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub entity: EntityName,
    pub load_type: LoadType,
    pub tenants: Vec<TenantReport>,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.tenants.iter().all(|t| {
            matches!(
                t.outcome,
                TenantOutcome::Dispatched { .. } | TenantOutcome::UpToDate
            )
        })
    }

    pub fn dispatched_windows(&self) -> usize {
        self.tenants
            .iter()
            .map(|t| match t.outcome {
                TenantOutcome::Dispatched { windows, .. } => windows,
                _ => 0,
            })
            .sum()
    }
}

/// Producer side: plans windows per tenant, dispatches them and advances
/// incremental watermarks on confirmed success. Tenants run one at a time.
pub struct LoadCoordinator {
    tenants: Arc<dyn TenantDirectory>,
    watermarks: Arc<dyn WatermarkStore>,
    catalog: Arc<EntityCatalog>,
    dispatcher: BatchDispatcher,
}

impl LoadCoordinator {
    pub fn new(
        tenants: Arc<dyn TenantDirectory>,
        watermarks: Arc<dyn WatermarkStore>,
        catalog: Arc<EntityCatalog>,
        dispatcher: BatchDispatcher,
    ) -> Self {
        Self {
            tenants,
            watermarks,
            catalog,
            dispatcher,
        }
    }

    pub async fn run(&self, request: &LoadRequest) -> Result<LoadReport, LoadError> {
        self.run_at(request, Utc::now()).await
    }

    /// Same as [`run`](Self::run) with an explicit planning clock.
    pub async fn run_at(
        &self,
        request: &LoadRequest,
        now: DateTime<Utc>,
    ) -> Result<LoadReport, LoadError> {
        request.validate()?;
        let load_type = LoadType::from_flag(request.incremental);
        if load_type == LoadType::Initial {
            // Request-level problems abort before any tenant is touched.
            initial_days(request, now)?;
        }

        let entity = request.entity_name();
        let settings = self.catalog.get(&entity);
        let filter = request
            .client_code()
            .map(TenantFilter::code)
            .unwrap_or_else(TenantFilter::all);
        let tenants = self.tenants.list(&filter).await?;

        info!(
            entity = %entity,
            load_type = %load_type,
            tenants = tenants.len(),
            "Starting load"
        );

        let mut reports = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let outcome = match load_type {
                LoadType::Incremental => {
                    self.run_incremental(&tenant, request, &entity, settings, now)
                        .await
                }
                LoadType::Initial => self.run_initial(&tenant, request, &entity, now).await,
            };
            reports.push(TenantReport {
                client_code: tenant.code,
                outcome,
            });
        }

        Ok(LoadReport {
            entity,
            load_type,
            tenants: reports,
        })
    }

    async fn run_incremental(
        &self,
        tenant: &Tenant,
        request: &LoadRequest,
        entity: &EntityName,
        settings: Option<&EntitySettings>,
        now: DateTime<Utc>,
    ) -> TenantOutcome {
        let client = &tenant.code;
        let watermark = tenant.watermark(entity);

        let window = match plan(request, watermark, settings, now) {
            Ok(mut windows) => match windows.next() {
                Some(window) => window,
                None => return TenantOutcome::UpToDate,
            },
            Err(err) => return failed(client, entity, err),
        };

        if !self
            .dispatcher
            .dispatch(client, std::slice::from_ref(&window))
            .await
        {
            error!(
                client_code = %client,
                entity = %entity,
                "[{client} - {entity}] Failed to trigger Sync - {} - From {} To {}",
                LoadType::Incremental.label(),
                iso_millis(&window.from),
                iso_millis(&window.to)
            );
            return TenantOutcome::DispatchFailed {
                windows: 1,
                batches: 1,
                failed_batches: 1,
            };
        }

        match self.watermarks.advance(client, entity, window.to).await {
            Ok(advanced) => {
                if !advanced {
                    warn!(client_code = %client, entity = %entity, to = %iso_millis(&window.to), "Watermark was already ahead");
                }
                info!(
                    client_code = %client,
                    entity = %entity,
                    from = %iso_millis(&window.from),
                    to = %iso_millis(&window.to),
                    "Incremental window dispatched"
                );
                TenantOutcome::Dispatched {
                    windows: 1,
                    batches: 1,
                    watermark: Some(window.to),
                }
            }
            Err(err) => {
                error!(client_code = %client, entity = %entity, error = %err, "Failed to store watermark");
                TenantOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn run_initial(
        &self,
        tenant: &Tenant,
        request: &LoadRequest,
        entity: &EntityName,
        now: DateTime<Utc>,
    ) -> TenantOutcome {
        let client = &tenant.code;
        let windows = match plan(request, None, None, now) {
            Ok(windows) => windows,
            Err(err) => return failed(client, entity, err),
        };

        let total = windows.len();
        let (mut batches, mut failed_batches) = (0, 0);
        for batch in Batches::new(windows, MAX_BATCH_SIZE) {
            batches += 1;
            if self.dispatcher.dispatch(client, &batch).await {
                continue;
            }
            failed_batches += 1;
            if let (Some(first), Some(last)) = (batch.first(), batch.last()) {
                error!(
                    client_code = %client,
                    entity = %entity,
                    "[{client} - {entity}] Failed to trigger Sync - {} - From {} To {}",
                    LoadType::Initial.label(),
                    iso_millis(&first.from),
                    iso_millis(&last.to)
                );
            }
        }

        if failed_batches > 0 {
            return TenantOutcome::DispatchFailed {
                windows: total,
                batches,
                failed_batches,
            };
        }

        info!(client_code = %client, entity = %entity, windows = total, batches, "Initial load dispatched");
        TenantOutcome::Dispatched {
            windows: total,
            batches,
            watermark: None,
        }
    }
}

fn failed(client: &ClientCode, entity: &EntityName, err: PlanError) -> TenantOutcome {
    error!(client_code = %client, entity = %entity, error = %err, "Failed to plan windows");
    TenantOutcome::Failed {
        reason: err.to_string(),
    }
}
