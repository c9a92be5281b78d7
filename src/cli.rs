use crate::app_state::AppState;
use crate::config_loader::WatchConfig;
use crate::input_validator::InputValidator;
use crate::intervention_policy::InterventionPolicy;
use crate::session_recorder::split_keywords;
use crate::session_store::{SessionStore, SqliteSessionStore};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level CLI interface for watchguard
#[derive(Parser)]
#[command(
    name = "watchguard",
    version,
    about = "Viewing-session intervention service"
)]
pub struct Cli {
    /// Path to the TOML config file (defaults to watchguard.toml or $WATCHGUARD_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API (intervention endpoint and health checks)
    Serve {
        /// Host/IP to bind, overrides server.host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate a session metrics file and print its risk assessment (offline)
    Score {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print recent records for a user as JSON lines, newest first
    History {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub fn dispatch(cli: Cli, config: WatchConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port),
        Commands::Score { file } => score(&file),
        Commands::History { user_id, limit } => history(&config, &user_id, limit),
    }
}

fn serve(mut config: WatchConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")?;

    rt.block_on(async move {
        let state = Arc::new(AppState::from_config(&config)?);
        let app = crate::web::build_app(state, &config.server.cors_origins)?;

        let socket_addr: std::net::SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid bind address {addr}"))?;
        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!("HTTP server listening on http://{addr}");
        axum::serve(listener, app).await.context("server error")?;
        Ok::<(), anyhow::Error>(())
    })
}

fn score(file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let metrics = match InputValidator::new().validate_session(&raw) {
        Ok(metrics) => metrics,
        Err(failure) => {
            for error in &failure.detail {
                let location = error
                    .loc
                    .iter()
                    .map(|part| match part {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                eprintln!("{location}: {} ({})", error.msg, error.kind);
            }
            bail!("{} validation error(s) in {}", failure.detail.len(), file.display());
        }
    };

    let assessment = InterventionPolicy::assess(&metrics);
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

fn history(config: &WatchConfig, user_id: &str, limit: usize) -> anyhow::Result<()> {
    let path = &config.storage.database_path;
    if !path.exists() {
        bail!("no session database at {}", path.display());
    }
    let store = SqliteSessionStore::open(path)?;

    for record in store.recent_for_user(user_id, limit)? {
        let keywords = split_keywords(&record.entry.content_type_keywords);
        let mut line = serde_json::to_value(&record)?;
        if let Some(object) = line.as_object_mut() {
            object.insert("content_type_keywords".to_string(), keywords.into());
        }
        println!("{line}");
    }
    Ok(())
}
