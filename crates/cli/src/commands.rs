use crate::error::CliError;
use clap::{Args, Subcommand};
use model::requests::load::LoadRequest;
use serde_json::{Map, Value};

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and dispatch one load, then dump every dispatched window
    Load {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Dump a single window message for one tenant
    Consume {
        #[arg(long, help = "Tenant the window belongs to")]
        client_code: String,

        #[arg(long, help = "Window message as JSON")]
        message: String,
    },
    /// Run the incremental schedules and the consumer pool until interrupted
    Serve,
    /// Print the windows a load would dispatch, without dispatching them
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// List messages that failed on every delivery
    DeadLetters {
        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
    /// Check that the configured Postgres source answers
    TestConn {
        #[arg(long, help = "Connection URL; defaults to source.postgres.url")]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TenantCommand {
    Add {
        #[arg(long)]
        code: String,

        #[arg(long, help = "Register the tenant as inactive")]
        inactive: bool,
    },
    List {
        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
}

/// A load request, either as a raw JSON payload or spelled out as flags.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    #[arg(long, conflicts_with_all = ["entity", "incremental", "from", "to", "limit", "max_size_mb", "client_code"])]
    pub request: Option<String>,

    #[arg(long)]
    pub entity: Option<String>,

    #[arg(long)]
    pub incremental: bool,

    #[arg(long, help = "Start of an initial load (date or RFC 3339)")]
    pub from: Option<String>,

    #[arg(long, help = "End of an initial load; defaults to now")]
    pub to: Option<String>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long = "max-size-mb")]
    pub max_size_mb: Option<u32>,

    #[arg(long, help = "Restrict the load to one tenant")]
    pub client_code: Option<String>,
}

impl RequestArgs {
    /// Builds the request the same way a queued trigger payload is parsed.
    pub fn to_request(&self) -> Result<LoadRequest, CliError> {
        let value = match &self.request {
            Some(raw) => serde_json::from_str(raw)?,
            None => {
                let entity = self.entity.clone().ok_or(CliError::MissingEntity)?;
                let mut body = Map::new();
                body.insert("entity".into(), Value::from(entity));
                body.insert("incremental".into(), Value::from(self.incremental));
                if let Some(from) = &self.from {
                    body.insert("from".into(), Value::from(from.as_str()));
                }
                if let Some(to) = &self.to {
                    body.insert("to".into(), Value::from(to.as_str()));
                }
                if let Some(limit) = self.limit {
                    body.insert("limit".into(), Value::from(limit));
                }
                if let Some(max) = self.max_size_mb {
                    body.insert("maxSizeMB".into(), Value::from(max));
                }
                if let Some(code) = &self.client_code {
                    body.insert("clientCode".into(), Value::from(code.as_str()));
                }
                Value::Object(body)
            }
        };
        Ok(LoadRequest::from_value(value)?)
    }
}
