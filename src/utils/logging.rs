use tracing_subscriber::{EnvFilter, fmt};

use crate::utils::consts::{LOG_LEVEL, VERBOSE_LOG_LEVEL};

/// Stdout may carry samples or payload, so logs go to stderr.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { VERBOSE_LOG_LEVEL } else { LOG_LEVEL };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (duplex demo, tests) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();
}
