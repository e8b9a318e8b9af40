use crate::{
    commands::{Commands, TenantCommand},
    context::{AppContext, load_config, open_state},
    error::CliError,
    shutdown::{ExitCode, cancel_on_signal},
};
use chrono::Utc;
use clap::Parser;
use engine_core::state::{DeadLetterStore, TenantDirectory};
use model::{
    core::identifiers::ClientCode,
    requests::window::WindowMessage,
    tenants::{Tenant, TenantFilter, TenantStatus},
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod context;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "lakesync",
    version,
    about = "Syncs tenant entities into a partitioned data lake of gzip NDJSON parts"
)]
struct Cli {
    #[arg(long, global = true, help = "Configuration file (defaults to ./lakesync.json)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Extra environment variables in .env format")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(cli.config.as_deref(), cli.env_file.as_deref())?;

    match cli.command {
        Commands::Load { request } => {
            let request = request.to_request()?;
            let ctx = AppContext::build(config).await?;

            let (report, stats) = ctx
                .pool
                .consume_during(ctx.coordinator.run(&request))
                .await?;
            let report = report?;
            output::print_load_report(&report);
            output::print_pool_stats(&stats);

            if report.is_success() && stats.dead_lettered == 0 {
                Ok(ExitCode::Success)
            } else {
                Ok(ExitCode::PartialFailure)
            }
        }
        Commands::Consume {
            client_code,
            message,
        } => {
            let body: serde_json::Value = serde_json::from_str(&message)?;
            let ctx = AppContext::build(config).await?;
            let report = ctx
                .engine
                .handle(&ClientCode::from(client_code), body)
                .await?;
            output::print_dump_report(&report);
            Ok(ExitCode::Success)
        }
        Commands::Serve => {
            let ctx = AppContext::build(config).await?;
            let token = CancellationToken::new();
            cancel_on_signal(token.clone());

            info!(
                entities = ctx.catalog.len(),
                queue = %ctx.queue.name(),
                "Serving incremental schedules"
            );
            let scheduler = ctx.scheduler();
            let (_, stats) = tokio::try_join!(scheduler.run(token.clone()), ctx.pool.run(token))?;
            output::print_pool_stats(&stats);
            Ok(ExitCode::ShutdownRequested)
        }
        Commands::Plan { request } => {
            let request = request.to_request()?;
            let catalog = config.catalog();
            let state = open_state(&config)?;

            let entity = request.entity_name();
            let filter = request
                .client_code()
                .map(TenantFilter::code)
                .unwrap_or_else(TenantFilter::all);
            let now = Utc::now();

            for tenant in TenantDirectory::list(&state, &filter).await? {
                let watermark = tenant.watermark(&entity);
                let windows: Vec<WindowMessage> =
                    planner::plan(&request, watermark, catalog.get(&entity), now)?.collect();
                output::print_windows(tenant.code.as_str(), &windows)?;
            }
            Ok(ExitCode::Success)
        }
        Commands::Tenant { command } => {
            let state = open_state(&config)?;
            match command {
                TenantCommand::Add { code, inactive } => {
                    let mut tenant = Tenant::active(&code);
                    if inactive {
                        tenant.status = TenantStatus::Inactive;
                    }
                    state.upsert_tenant(&tenant).await?;
                    info!(client_code = %tenant.code, active = !inactive, "Tenant saved");
                }
                TenantCommand::List { json } => {
                    output::print_tenants(&state.all_tenants().await?, json)?;
                }
            }
            Ok(ExitCode::Success)
        }
        Commands::DeadLetters { json } => {
            let state = open_state(&config)?;
            let letters = DeadLetterStore::list(&state).await?;
            output::print_dead_letters(&letters, json)?;
            Ok(ExitCode::Success)
        }
        Commands::TestConn { url } => {
            let url = url
                .or_else(|| config.source.postgres.as_ref().map(|pg| pg.url.clone()))
                .ok_or(CliError::NoSource)?;
            conn::ping_postgres(&url).await?;
            Ok(ExitCode::Success)
        }
    }
}
