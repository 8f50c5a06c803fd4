use std::env;

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// sqlx logs every statement at info; keep it quiet unless asked for.
const QUIET_DEPENDENCIES: &str = "sqlx=warn";

/// Builds filter directives: `RUST_LOG` is taken verbatim, otherwise
/// `LOG_LEVEL` sets the job's level with database chatter held at warn.
fn directives(rust_log: Option<String>, log_level: Option<String>) -> String {
    if let Some(rust_log) = rust_log.filter(|value| !value.trim().is_empty()) {
        return rust_log;
    }
    let level = log_level
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    format!("{level},{QUIET_DEPENDENCIES}")
}

pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directives(
        env::var("RUST_LOG").ok(),
        env::var("LOG_LEVEL").ok(),
    ))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
