//! Tracing subscriber setup

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use kv_resolver_config::ObservabilityConfig;

/// Install the global subscriber writing to stderr. `RUST_LOG` overrides
/// the configured level.
///
/// Fails when a global subscriber is already set.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        format!(
            "kv_resolver={level},kv_resolver_core={level},kv_resolver_persistence={level},kv_resolver_config={level},kvr={level}"
        )
        .into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).boxed()
    };
    subscriber.with(fmt_layer).try_init()
}
