use crate::error::CliError;
use connectors::PgRepository;
use tracing::{error, info};

/// Connects to the Postgres source and runs `SELECT 1`.
pub async fn ping_postgres(url: &str) -> Result<(), CliError> {
    let host = redact(url);
    info!("Pinging Postgres at '{host}'");

    let client = PgRepository::connect(url).await.map_err(|e| {
        error!("Postgres connection to '{host}' failed: {e}");
        e
    })?;

    let row = client.query_one("SELECT 1", &[]).await.map_err(|e| {
        error!("Postgres ping query on '{host}' failed: {e}");
        CliError::Postgres(e)
    })?;

    let val: i32 = row.get(0);
    if val != 1 {
        let msg = format!("Postgres ping to '{host}' returned unexpected result: {val}");
        error!("{msg}");
        return Err(CliError::Unexpected(msg));
    }

    info!("Postgres ping to '{host}' succeeded");
    Ok(())
}

/// Drops the credentials of a connection URL before it is logged.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}://***{}", &url[..scheme], &url[at..]),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hides_credentials() {
        assert_eq!(
            redact("postgres://user:secret@db:5432/app"),
            "postgres://***@db:5432/app"
        );
        assert_eq!(redact("postgres://db/app"), "postgres://db/app");
    }
}
