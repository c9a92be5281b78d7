// watchguard - main.rs
// Bootstrap: parse CLI, load layered config, install tracing, dispatch.

use clap::Parser;
use std::process::exit;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use watchguard::cli::{dispatch, Cli};
use watchguard::config_loader::load_config;

fn init_tracing(default_filter: &str) {
    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing("info");
            tracing::error!("failed to load config: {e}");
            exit(1);
        }
    };

    init_tracing(&config.logging.filter);
    tracing::debug!(?config, "config loaded");

    if let Err(e) = dispatch(cli, config) {
        tracing::error!("{e:#}");
        exit(1);
    }
}
