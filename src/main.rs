use arduino_serial_mcp::config::ConfigLoader;
use arduino_serial_mcp::mcp::McpServer;
use arduino_serial_mcp::{
    logging, ConnectionRegistry, PortDirectory, RegistryConfig, SystemPortDirectory,
    SystemPortOpener, ToolDispatcher,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "MCP server bridging LLM agents to Arduino boards over serial.",
    long_about = "Speaks MCP on stdin/stdout and exposes tools to list serial ports, connect to a board, read its recent output lines, send it commands and disconnect. Logs go to stderr."
)]
struct Args {
    /// Configuration file. Defaults to ARDUINO_MCP_CONFIG, ./arduino-mcp.toml, then the platform config dir.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "arduino_serial_mcp=trace". Overrides RUST_LOG and the config file.
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print the available serial ports as JSON and exit.
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    logging::init_tracing(&loader.config().logging, args.log_level.as_deref())?;
    if let Some(path) = &loader.config_path {
        info!(path = %path.display(), "loaded configuration");
    }
    let config = loader.into_config();

    let directory: Arc<dyn PortDirectory> = Arc::new(SystemPortDirectory);
    if args.list_ports {
        let ports = directory.list()?;
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    let registry = Arc::new(ConnectionRegistry::new(
        Arc::new(SystemPortOpener),
        RegistryConfig::from(&config),
    ));
    let server = McpServer::new(ToolDispatcher::new(Arc::clone(&registry), directory));

    info!(version = env!("CARGO_PKG_VERSION"), "Arduino serial MCP server ready on stdio");

    tokio::select! {
        result = server.serve_stdio() => result?,
        _ = shutdown_signal() => {},
    }

    // Joining reader threads blocks, so release off the async workers.
    let closed = tokio::task::spawn_blocking(move || registry.disconnect_all()).await?;
    info!(closed, "shut down");
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}
