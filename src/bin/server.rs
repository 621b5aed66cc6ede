use clap::Parser;
use litedb::{Config, Server};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to the append-only file
    #[arg(short, long)]
    aof: Option<String>,

    /// Run memory-only, without reading or writing an AOF
    #[arg(long, conflicts_with = "aof")]
    no_aof: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config file first, command-line flags on top
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(aof) = args.aof {
        config.aof_path = aof;
    }
    if args.no_aof {
        config.aof_enabled = false;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    // Initialize tracing
    let log_level = if args.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("litedb={},litedb_server={}", log_level, log_level))
        .init();

    info!(
        "Starting litedb v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr()
    );
    if config.aof_enabled {
        info!(
            "AOF at {} (flush every {} ms)",
            config.aof_path, config.aof_flush_interval_ms
        );
    }

    let mut server = Server::new(config)?;

    // Setup signal handlers for graceful shutdown
    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, shutting down gracefully...");
        shutdown.shutdown();
    })?;

    // Run the server
    if let Err(e) = server.run() {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
