use crate::{
    error::PlanError,
    window::{DailyWindows, Windows},
};
use chrono::{DateTime, NaiveDate, Utc};
use model::{
    core::time::one_day,
    requests::{
        ValidationError,
        load::LoadRequest,
        window::{LoadType, WindowMessage},
    },
    settings::entity::EntitySettings,
};
use tracing::debug;

/// Turns a load request into the ordered windows to sync for one tenant.
///
/// Pure function of its inputs: calling it again with the same arguments
/// yields the same sequence.
///
/// Incremental requests yield one window, except when the tenant is caught
/// up (watermark at or after `now`): then the sequence is empty and the
/// coordinator reports the tenant as up to date.
pub fn plan(
    request: &LoadRequest,
    watermark: Option<DateTime<Utc>>,
    settings: Option<&EntitySettings>,
    now: DateTime<Utc>,
) -> Result<Windows, PlanError> {
    if request.incremental {
        plan_incremental(request, watermark, settings, now)
    } else {
        plan_initial(request, now)
    }
}

/// Calendar days `[first, last]` an initial load covers.
///
/// Fails when `from` is missing or lands after the effective `to`.
pub fn initial_days(request: &LoadRequest, now: DateTime<Utc>) -> Result<(NaiveDate, NaiveDate), PlanError> {
    let from = request
        .from
        .ok_or(ValidationError::MissingField("from"))?;
    let to = request.to.unwrap_or(now);

    let (first, last) = (from.date_naive(), to.date_naive());
    if first > last {
        return Err(ValidationError::InvalidField {
            field: "from",
            reason: format!("{first} is after {last}"),
        }
        .into());
    }

    Ok((first, last))
}

fn plan_incremental(
    request: &LoadRequest,
    watermark: Option<DateTime<Utc>>,
    settings: Option<&EntitySettings>,
    now: DateTime<Utc>,
) -> Result<Windows, PlanError> {
    let entity = request.entity_name();

    let from = watermark
        .or_else(|| settings.and_then(|s| s.initial_load_date))
        .ok_or_else(|| PlanError::MissingInitialLoadDate {
            entity: entity.to_string(),
        })?;

    if from >= now {
        debug!(entity = %entity, from = %from, now = %now, "Watermark is not behind now; nothing to sync");
        return Ok(Windows::empty());
    }

    let to = (from + one_day()).min(now);

    Ok(Windows::single(WindowMessage::new(
        &entity,
        LoadType::Incremental,
        from,
        to,
    )))
}

fn plan_initial(request: &LoadRequest, now: DateTime<Utc>) -> Result<Windows, PlanError> {
    let (first, last) = initial_days(request, now)?;

    let days = DailyWindows::new(request.entity_name(), first, last)
        .with_limits(request.limit, request.max_size_mb);

    Ok(Windows::daily(days))
}
