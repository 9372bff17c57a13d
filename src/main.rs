#![forbid(unsafe_code)]

//! `cellbook` — notebook cell execution server binary.
//!
//! Bootstraps configuration and tracing, opens the sessions named on the
//! command line, and serves the WebSocket transport until interrupted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cellbook::channel::EventBus;
use cellbook::exec::Orchestrator;
use cellbook::models::{Cell, Session};
use cellbook::registry::ProcessRegistry;
use cellbook::secrets::SecretsProvider;
use cellbook::store::{SessionStore, MANIFEST_FILENAME};
use cellbook::{AppError, GlobalConfig, Result};

/// Extensions recognized as code cells when opening a session directory.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts"];

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "cellbook", about = "Notebook cell execution server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured transport port.
    #[arg(long)]
    port: Option<u16>,

    /// Session directories to open at startup.
    #[arg(long = "open")]
    open: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("cellbook server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = GlobalConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    let config = Arc::new(config);
    info!("configuration loaded");

    let secrets = match &config.secrets_path {
        Some(path) => SecretsProvider::load(path)?,
        None => SecretsProvider::empty(),
    };

    let store = SessionStore::new();
    let registry = ProcessRegistry::new();
    let bus = EventBus::new();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&config),
        store.clone(),
        registry,
        bus,
        Arc::new(secrets),
    ));

    for dir in &args.open {
        let session = open_session(dir)?;
        info!(session_id = session.id, topic = session.topic(), dir = %dir.display(), "session opened");
        store.add_session(session).await?;
    }

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_ct.cancel();
        }
    });

    cellbook::ws::serve(orchestrator, config.http_port, ct).await?;
    info!("cellbook shut down");
    Ok(())
}

/// Open a session from an existing directory: one code cell per script file,
/// plus a manifest cell when a package manifest is present.
fn open_session(dir: &Path) -> Result<Session> {
    let dir = dir
        .canonicalize()
        .map_err(|err| AppError::Config(format!("invalid session dir {}: {err}", dir.display())))?;

    let mut names: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let mut cells = Vec::new();
    for name in names {
        let path = dir.join(&name);
        if name == MANIFEST_FILENAME {
            cells.push(Cell::new_manifest(std::fs::read_to_string(&path)?));
        } else if Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
        {
            cells.push(Cell::new_code(name, std::fs::read_to_string(&path)?));
        }
    }

    Ok(Session::new(dir, cells))
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match format {
        LogFormat::Text => fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
    };
    result.map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}
