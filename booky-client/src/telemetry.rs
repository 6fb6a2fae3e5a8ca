//! Logging setup for the CLI.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

pub const LOG_ENV: &str = "BOOKY_LOG";

/// Filter from `BOOKY_LOG`, then `RUST_LOG`, else `warn` (`debug` for our
/// crates when `verbose`).
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            if verbose {
                EnvFilter::new("booky_client=debug,booky_query=debug,warn")
            } else {
                EnvFilter::new("warn")
            }
        })
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_logging(format: LogFormat, verbose: bool) -> Result<(), String> {
    let registry = tracing_subscriber::registry().with(env_filter(verbose));
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Json => registry.with(fmt.json()).try_init(),
        LogFormat::Text => registry.with(fmt.with_target(false)).try_init(),
    };
    result.map_err(|e| format!("Failed to init subscriber: {}", e))?;

    tracing::debug!(?format, "Logging initialized");
    Ok(())
}
