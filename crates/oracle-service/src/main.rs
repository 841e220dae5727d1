use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oracle_config::{Config, ConfigLoader};
use oracle_core::{CoreError, OracleEngine};
use oracle_storage::implementations::{memory::MemoryStorageSchema, sqlite::SqliteStorageSchema};
use oracle_types::{ConfigSchema, OperationResult};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod factory;
mod scheduler;

#[derive(Parser)]
#[command(name = "oracle-updater")]
#[command(about = "Turn-based price oracle updater", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	/// Overrides `replica.log_level`. RUST_LOG takes precedence over both.
	#[arg(long)]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the API server and the scheduled jobs
	Start,
	/// Validate the configuration file
	Validate,
	/// Print the feed and contract prices
	Prices,
	/// Record one price sample
	Sample,
	/// Run one update cycle
	Update,
	/// Delete samples older than the staleness window
	Prune,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	// Initialize tracing
	let log_level = cli
		.log_level
		.clone()
		.unwrap_or_else(|| config.replica.log_level.clone());
	setup_tracing(&log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(config).await,
		Some(Commands::Validate) => validate_config(&cli.config, &config),
		Some(Commands::Prices) => {
			run_once(config, |engine| async move { engine.current_prices().await }).await
		}
		Some(Commands::Sample) => {
			run_once(config, |engine| async move { engine.record_sample().await }).await
		}
		Some(Commands::Update) => {
			run_once(config, |engine| async move {
				engine.evaluate_and_maybe_update().await
			})
			.await
		}
		Some(Commands::Prune) => {
			run_once(config, |engine| async move { engine.prune_old_samples().await }).await
		}
	}
}

async fn build_engine(config: Config) -> Result<Arc<OracleEngine>> {
	let engine = factory::engine_builder(config)
		.build()
		.context("Failed to build oracle engine")?;
	engine
		.initialize()
		.await
		.context("Failed to initialize turn registry")?;
	Ok(Arc::new(engine))
}

async fn start_service(config: Config) -> Result<()> {
	info!("Starting oracle updater");
	info!("Replica: {}", config.replica.name);
	info!("Rotation: {:?}", config.turns.replicas);

	let engine = build_engine(config.clone()).await?;
	info!("Wallet address: {}", engine.wallet_address());

	let mut handles = Vec::new();

	if config.api.enabled {
		let api_engine = engine.clone();
		let host = config.api.host.clone();
		let port = config.api.port;
		handles.push(tokio::spawn(async move {
			if let Err(e) = api::start_http_server(api_engine, host, port).await {
				error!("HTTP server failed: {:#}", e);
			}
		}));
	}

	if config.schedule.enabled {
		handles.extend(scheduler::spawn(engine.clone(), &config.schedule));
	}

	info!("Oracle updater started successfully");

	// Wait for shutdown signal
	setup_shutdown_signal().await;

	info!("Shutdown signal received, stopping services...");

	for handle in handles {
		handle.abort();
	}

	info!("Oracle updater stopped");
	Ok(())
}

fn validate_config(path: &Path, config: &Config) -> Result<()> {
	info!("Validating configuration file: {:?}", path);

	let backend = config.storage.backend.as_str();
	let schema: Box<dyn ConfigSchema> = match backend {
		"sqlite" => Box::new(SqliteStorageSchema),
		"memory" => Box::new(MemoryStorageSchema),
		other => anyhow::bail!("Unknown storage backend: {}", other),
	};
	schema
		.validate(&config.storage.config)
		.with_context(|| format!("Invalid [storage.config] for backend {}", backend))?;

	info!("Configuration is valid");
	info!("  Replica: {}", config.replica.name);
	info!("  Rotation: {:?}", config.turns.replicas);
	info!("  Chain: {} ({})", config.chain.chain_id, config.chain.rpc_url);
	info!("  Contract: {}", config.chain.contract_address);
	info!("  Storage: {}", backend);
	match &config.funding.url {
		Some(url) => info!("  Funding: {}", url),
		None => info!("  Funding: disabled"),
	}

	Ok(())
}

/// Runs a single operation and prints its result as JSON.
async fn run_once<F, Fut>(config: Config, operation: F) -> Result<()>
where
	F: FnOnce(Arc<OracleEngine>) -> Fut,
	Fut: Future<Output = Result<OperationResult, CoreError>>,
{
	let engine = build_engine(config).await?;

	match operation(engine.clone()).await {
		Ok(result) => print_result(&result),
		Err(e) => {
			print_result(&engine.error_result(&e))?;
			Err(e).context("Operation failed")
		}
	}
}

fn print_result(result: &OperationResult) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(result)?);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to install Ctrl+C handler: {}", e);
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
				error!("Failed to install signal handler: {}", e);
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
}
