//! vecfuse CLI: collection management plus dense, lexical and fused search.
//!
//! Settings come from `packages/conf/settings.yaml` merged with
//! `<config home>/vecfuse/settings.yaml`. Override the config home with `--conf <dir>`.
//!
//! Logging: set `RUST_LOG=vecfuse=debug` (or `warn`, `info`) to see logs on stderr.
//! Command output is JSON on stdout.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vecfuse_vector::{load_runtime_settings, set_config_home_override};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    // RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "vecfuse=debug,vecfuse_vector=debug"
        } else {
            "vecfuse=info,vecfuse_vector=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let runtime_settings = load_runtime_settings();
    commands::run(cli.command, &runtime_settings).await
}
