//! CoordKV Server Binary
//!
//! Serves an in-memory engine over the line protocol.

use std::sync::Arc;

use clap::Parser;
use coordkv::network::Server;
use coordkv::scheduler::CallbackExecutor;
use coordkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// CoordKV Server
#[derive(Parser, Debug)]
#[command(name = "coordkv-server")]
#[command(about = "In-memory coordination-service emulator")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4001")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// Write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,

    /// Longest accepted request line in bytes
    #[arg(long, default_value = "65536")]
    max_request_bytes: usize,
}

/// Build config from args
fn config_from_args(args: &Args) -> Config {
    Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .max_request_bytes(args.max_request_bytes)
        .build()
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,coordkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("CoordKV Server v{}", coordkv::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = config_from_args(&args);

    let executor = match CallbackExecutor::start(&config.executor_thread_name) {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            tracing::error!("Failed to start callback executor: {}", e);
            std::process::exit(1);
        }
    };

    let engine = Engine::new(executor.clone());
    tracing::info!("Engine initialized successfully");

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    executor.shutdown();
    tracing::info!("Server stopped");
}
