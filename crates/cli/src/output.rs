use crate::error::CliError;
use engine_core::state::DeadLetter;
use engine_processing::{
    consumer::{DumpReport, DumpStatus},
    producer::{LoadReport, TenantOutcome},
};
use engine_runtime::PoolStats;
use model::{core::time::iso_millis, requests::window::WindowMessage, tenants::Tenant};

pub fn print_load_report(report: &LoadReport) {
    println!("Load '{}' ({}):", report.entity, report.load_type);
    for tenant in &report.tenants {
        let outcome = match &tenant.outcome {
            TenantOutcome::Dispatched {
                windows,
                batches,
                watermark,
            } => match watermark {
                Some(w) => format!("dispatched {windows} window(s) in {batches} batch(es), watermark {}", iso_millis(w)),
                None => format!("dispatched {windows} window(s) in {batches} batch(es)"),
            },
            TenantOutcome::UpToDate => "up to date".to_string(),
            TenantOutcome::DispatchFailed {
                windows,
                batches,
                failed_batches,
            } => format!("{failed_batches} of {batches} batch(es) failed ({windows} window(s))"),
            TenantOutcome::Failed { reason } => format!("failed: {reason}"),
        };
        println!("  {:<16} {}", tenant.client_code.as_str(), outcome);
    }
}

pub fn print_pool_stats(stats: &PoolStats) {
    println!(
        "Consumed: {} completed, {} dropped, {} redelivered, {} dead-lettered",
        stats.completed, stats.dropped, stats.redelivered, stats.dead_lettered
    );
}

pub fn print_dump_report(report: &DumpReport) {
    match &report.status {
        DumpStatus::Completed => {
            println!(
                "Dumped {} record(s) for '{}' into {} part(s):",
                report.records,
                report.client_code,
                report.parts.len()
            );
            for part in &report.parts {
                println!(
                    "  {} ({} bytes raw, {} bytes compressed)",
                    part.key, part.raw_bytes, part.compressed_bytes
                );
            }
        }
        DumpStatus::Dropped { reason } => println!("Message dropped: {reason}"),
    }
}

pub fn print_windows(client: &str, windows: &[WindowMessage]) -> Result<(), CliError> {
    println!("{client}: {} window(s)", windows.len());
    for window in windows {
        println!("  {}", serde_json::to_string(window)?);
    }
    Ok(())
}

pub fn print_tenants(tenants: &[Tenant], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(tenants)?);
        return Ok(());
    }

    println!("{:<16} {:<10} {}", "Tenant", "Status", "Watermarks");
    println!("-----------------------------------------------");
    for tenant in tenants {
        let status = if tenant.is_active() { "active" } else { "inactive" };
        let watermarks = tenant
            .client_watermarks()
            .map(|w| format!("{}={}", w.entity, iso_millis(&w.last_incremental_load_date)))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<16} {:<10} {}", tenant.code.as_str(), status, watermarks);
    }
    Ok(())
}

pub fn print_dead_letters(letters: &[DeadLetter], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(letters)?);
        return Ok(());
    }

    if letters.is_empty() {
        println!("No dead letters");
        return Ok(());
    }
    for letter in letters {
        println!(
            "{} [{}] {} after {} deliveries: {}",
            iso_millis(&letter.failed_at),
            letter.client_code,
            letter.message_id,
            letter.receive_count,
            letter.error
        );
        println!("    {}", letter.body);
    }
    Ok(())
}
