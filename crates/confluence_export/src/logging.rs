use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Initialize stderr logging. `RUST_LOG` wins over the `--verbose` default.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "info,confluence_export=debug,confluence_export_core=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))?;

    Ok(())
}
