//! keepalive-server binary.
//!
//! ```text
//!   Client ──TCP──▶ listener ──▶ session task ──▶ TimeoutReader worker
//!                                   │                    │ (blocking source)
//!                                   │◀── bytes / timeout ┘
//!                                   ├──▶ request reader ──▶ handler
//!                                   └──▶ response writer ──▶ same TCP connection
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use keepalive_server::config::{
    load_config, validate_config, ConfigError, ConfigWatcher, ServerConfig,
};
use keepalive_server::http::{HttpServer, Request, Response};
use keepalive_server::lifecycle::{signals, Shutdown};
use keepalive_server::net::Listener;
use keepalive_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "keepalive-server")]
#[command(about = "HTTP/1.1 keep-alive server with per-read timeouts", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override timeouts.read_timeout_ms.
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

fn resolve_config(cli: &Cli) -> Result<ServerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(ms) = cli.read_timeout_ms {
        config.timeouts.read_timeout_ms = ms;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn hello(request: &Request) -> Response {
    Response::ok(format!("{} {}\n", request.method, request.path()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("keepalive-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        read_timeout_ms = config.timeouts.read_timeout_ms,
        idle_timeout_ms = config.timeouts.idle_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(Arc::clone(&shutdown));

    let server = HttpServer::new(config, hello);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
