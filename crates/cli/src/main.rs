//! `kvr`: command line access to a key/value resolver
//!
//! Settings come from `{config-dir}/default.*`, `{config-dir}/{env}.*` and
//! `KV_RESOLVER__*` environment variables.

mod cli;
mod commands;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

use cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env = cli.env.clone().or_else(|| std::env::var("KVR_ENV").ok());

    let settings = kv_resolver_config::load_settings_from(&cli.config_dir, env.as_deref())
        .with_context(|| format!("Failed to load settings from {}", cli.config_dir.display()))?;
    kv_resolver::init_tracing(&settings.observability).context("Failed to initialize tracing")?;

    tracing::debug!(
        config_dir = %cli.config_dir.display(),
        env = env.as_deref().unwrap_or("default"),
        "Settings loaded"
    );

    let resolver = Arc::new(
        kv_resolver::from_settings(&settings).context("Failed to create resolver")?,
    );
    let registration = resolver.register();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = commands::run(&resolver, cli.command, &mut out);

    kv_resolver::registry().deregister(&registration);
    result
}
