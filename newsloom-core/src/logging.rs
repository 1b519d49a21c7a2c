//! Logging infrastructure
//!
//! Structured tracing initialization shared by binaries and tests.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging
///
/// Filter resolution order: explicit `filter` argument, then the
/// `NEWSLOOM_LOG` environment variable, then `info`. Safe to call once
/// per process; returns an error if a global subscriber is already set.
pub fn init_logging(filter: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = match filter {
        Some(f) => EnvFilter::try_new(f)?,
        None => EnvFilter::try_from_env("NEWSLOOM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}
