use anyhow::Result;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Logs go to stderr next to the progress bar. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    debug!("logging initialized");
    Ok(())
}
