//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use super::config::{LogFormat, LoggingConfig};

/// Build the level filter: `RUST_LOG` wins, the configured level otherwise.
fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|e| {
            eprintln!("invalid log level '{}': {e}; falling back to 'info'", cfg.level);
            EnvFilter::new("info")
        })
}

/// Install the global subscriber. Calling it twice keeps the first subscriber.
pub fn init_logging(cfg: &LoggingConfig) {
    let filter = build_filter(cfg);
    let registry = Registry::default().with(filter);

    let result = match cfg.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    if let Err(e) = result {
        // Already initialised (tests, embedding hosts); keep the existing subscriber.
        tracing::debug!(error = %e, "Global tracing subscriber already set");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_without_rust_log() {
        let cfg = LoggingConfig {
            level: "collector_core=debug".to_owned(),
            format: LogFormat::Json,
        };
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(&cfg);
            assert!(filter.to_string().contains("collector_core=debug"));
        });
    }

    #[test]
    fn init_twice_does_not_panic() {
        let cfg = LoggingConfig::default();
        init_logging(&cfg);
        init_logging(&cfg);
    }
}
