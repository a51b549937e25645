//! Main entry point for the coordinator server.
//!
//! This binary loads a TOML configuration, builds a [`Coordinator`] wired to
//! live per-chain EVM implementations, and serves the HTTP/WebSocket API
//! described in spec section 6 until interrupted.

use clap::Parser;
use coordinator_config::Config;
use coordinator_core::CoordinatorBuilder;
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Command-line arguments for the coordinator service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file.
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error).
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the coordinator service.
///
/// This function:
/// 1. Parses command-line arguments.
/// 2. Initializes logging infrastructure.
/// 3. Loads configuration from file.
/// 4. Builds the coordinator with live chain implementations.
/// 5. Serves the HTTP/WebSocket API until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("started coordinator");

	let config = Config::from_file(args.config.to_str().unwrap())?;
	let http_port = config.http_port;
	tracing::info!(chains = config.chains.len(), "loaded configuration");

	let coordinator = CoordinatorBuilder::new(config).build()?;
	let coordinator = Arc::new(coordinator);
	tracing::info!("loaded coordinator engine");

	let shutdown = tokio::signal::ctrl_c();
	let server_task = server::start_server(http_port, coordinator);

	tokio::select! {
		result = server_task => {
			tracing::info!("server finished");
			result?;
		}
		_ = shutdown => {
			tracing::info!("received shutdown signal");
		}
	}

	tracing::info!("stopped coordinator");
	Ok(())
}
