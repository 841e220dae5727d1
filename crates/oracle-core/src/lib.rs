//! Update engine for the price oracle.
//!
//! [`OracleEngine`] ties the feed, chain, storage and funding services
//! together and exposes the four operations of a replica: reading current
//! prices, recording a sample, running one update cycle and pruning old
//! samples. Each returns an [`OperationResult`] whose message carries the
//! replica name and the time of the call. [`OracleBuilder`] assembles an
//! engine from configuration and backend factories.

use chrono::{DateTime, Utc};
use oracle_account::implementations::funding::NoopFunding;
use oracle_account::{
	AccountError, AccountInterface, AccountService, FundingInterface, FundingService,
};
use oracle_chain::{ChainError, ChainInterface, ChainService};
use oracle_config::{AccountConfig, ChainConfig, Config, FeedConfig, FundingConfig};
use oracle_feed::{FeedError, FeedInterface, FeedService};
use oracle_storage::{StorageError, StorageService};
use oracle_types::{Address, OperationResult, TurnState, STATUS_INTERNAL_ERROR};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod sampling;
pub mod snapshot;
pub mod turn;

#[cfg(test)]
mod test_support;

pub use clock::{FixedClock, SystemClock, TimeSource};
pub use coordinator::{CoordinatorSettings, UpdateCoordinator};
pub use error::CoreError;

pub struct OracleEngine {
	config: Config,
	storage: StorageService,
	chain: ChainService,
	feed: FeedService,
	account: AccountService,
	clock: Arc<dyn TimeSource>,
	coordinator: UpdateCoordinator,
	/// Held for the whole update cycle so scheduled and on-demand runs never
	/// overlap within this replica.
	update_lock: Mutex<()>,
}

impl OracleEngine {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn replica(&self) -> &str {
		&self.config.replica.name
	}

	pub fn wallet_address(&self) -> Address {
		self.account.address()
	}

	/// Seeds the shared turn record if no replica has done so yet.
	pub async fn initialize(&self) -> Result<TurnState, CoreError> {
		let state = self
			.storage
			.initialize_turns(&self.config.turns.replicas)
			.await?;
		info!(
			replica = %self.replica(),
			wallet = %self.wallet_address(),
			current = state.current_replica().unwrap_or("?"),
			replicas = state.total_count(),
			"Turn registry ready"
		);
		Ok(state)
	}

	pub async fn current_prices(&self) -> Result<OperationResult, CoreError> {
		let snapshot = snapshot::current_prices(&self.feed, &self.chain).await?;
		Ok(OperationResult::ok(self.prefixed("current prices")).with_data(to_data(&snapshot)?))
	}

	pub async fn record_sample(&self) -> Result<OperationResult, CoreError> {
		let sample = sampling::record_sample(&self.feed, &self.storage, self.clock.as_ref()).await?;
		let message = format!(
			"price {} observed at {} successfully created",
			sample.price, sample.observed_at
		);
		Ok(OperationResult::ok(self.prefixed(&message)).with_data(to_data(&sample)?))
	}

	pub async fn evaluate_and_maybe_update(&self) -> Result<OperationResult, CoreError> {
		let _cycle = self.update_lock.lock().await;

		let decision = self.coordinator.evaluate_and_maybe_update().await?;
		let message = decision.describe(self.config.replica.deviation_tolerance);
		Ok(OperationResult::new(decision.status(), self.prefixed(&message))
			.with_data(to_data(&decision)?))
	}

	pub async fn prune_old_samples(&self) -> Result<OperationResult, CoreError> {
		let deleted = sampling::prune_old_samples(
			&self.storage,
			self.clock.as_ref(),
			self.config.replica.stale_window_secs,
		)
		.await?;

		let message = if deleted < 1 {
			"all prices are still fresh, none deleted.".to_string()
		} else {
			format!("successfully deleted {} old price(s)", deleted)
		};
		Ok(OperationResult::ok(self.prefixed(&message))
			.with_data(serde_json::json!({ "deleted": deleted })))
	}

	pub async fn advance_turn(&self) -> Result<TurnState, CoreError> {
		turn::advance_turn(&self.storage).await
	}

	/// Result reported for a cycle that failed with `err`.
	pub fn error_result(&self, err: &CoreError) -> OperationResult {
		error!(replica = %self.replica(), error = %err, "Operation failed");
		OperationResult::new(STATUS_INTERNAL_ERROR, self.prefixed(&err.to_string()))
	}

	/// Formats `message` as `[<replica> @ HH:MM:SS]: message`, in UTC.
	fn prefixed(&self, message: &str) -> String {
		let time = i64::try_from(self.clock.now())
			.ok()
			.and_then(|secs| DateTime::from_timestamp(secs, 0))
			.unwrap_or_else(Utc::now);
		format!(
			"[{} @ {}]: {}",
			self.replica(),
			time.format("%H:%M:%S"),
			message
		)
	}
}

fn to_data<T: Serialize>(value: &T) -> Result<serde_json::Value, CoreError> {
	serde_json::to_value(value).map_err(|e| CoreError::Conversion(e.to_string()))
}

type StorageFactory =
	Box<dyn Fn(&toml::Value) -> Result<StorageService, StorageError> + Send + Sync>;
type AccountFactory = Box<
	dyn Fn(&AccountConfig, u64) -> Result<Box<dyn AccountInterface>, AccountError> + Send + Sync,
>;
type ChainFactory = Box<
	dyn Fn(&ChainConfig, &AccountService) -> Result<Box<dyn ChainInterface>, ChainError>
		+ Send
		+ Sync,
>;
type FeedFactory =
	Box<dyn Fn(&FeedConfig) -> Result<Box<dyn FeedInterface>, FeedError> + Send + Sync>;
type FundingFactory = Box<
	dyn Fn(&FundingConfig) -> Result<Box<dyn FundingInterface>, AccountError> + Send + Sync,
>;

pub struct OracleBuilder {
	config: Config,
	storage_factories: HashMap<String, StorageFactory>,
	account_factory: Option<AccountFactory>,
	chain_factory: Option<ChainFactory>,
	feed_factory: Option<FeedFactory>,
	funding_factory: Option<FundingFactory>,
	clock: Option<Arc<dyn TimeSource>>,
}

impl OracleBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factories: HashMap::new(),
			account_factory: None,
			chain_factory: None,
			feed_factory: None,
			funding_factory: None,
			clock: None,
		}
	}

	/// Registers a storage backend under the name used by `storage.backend`.
	pub fn with_storage_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<StorageService, StorageError> + Send + Sync + 'static,
	{
		self.storage_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_account_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&AccountConfig, u64) -> Result<Box<dyn AccountInterface>, AccountError>
			+ Send
			+ Sync
			+ 'static,
	{
		self.account_factory = Some(Box::new(factory));
		self
	}

	pub fn with_chain_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&ChainConfig, &AccountService) -> Result<Box<dyn ChainInterface>, ChainError>
			+ Send
			+ Sync
			+ 'static,
	{
		self.chain_factory = Some(Box::new(factory));
		self
	}

	pub fn with_feed_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&FeedConfig) -> Result<Box<dyn FeedInterface>, FeedError> + Send + Sync + 'static,
	{
		self.feed_factory = Some(Box::new(factory));
		self
	}

	/// Without a funding factory low balances are not reported anywhere.
	pub fn with_funding_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&FundingConfig) -> Result<Box<dyn FundingInterface>, AccountError>
			+ Send
			+ Sync
			+ 'static,
	{
		self.funding_factory = Some(Box::new(factory));
		self
	}

	/// Defaults to [`SystemClock`].
	pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn build(self) -> Result<OracleEngine, CoreError> {
		let config = self.config;

		let backend = &config.storage.backend;
		let storage_factory = self.storage_factories.get(backend).ok_or_else(|| {
			CoreError::Config(format!("Unknown storage backend: {}", backend))
		})?;
		let storage = storage_factory(&config.storage.config)?;

		let account_factory = self
			.account_factory
			.ok_or_else(|| CoreError::Config("Account factory not provided".into()))?;
		let account = AccountService::new(account_factory(&config.account, config.chain.chain_id)?);

		let chain_factory = self
			.chain_factory
			.ok_or_else(|| CoreError::Config("Chain factory not provided".into()))?;
		let chain = ChainService::new(Arc::from(chain_factory(&config.chain, &account)?));

		let feed_factory = self
			.feed_factory
			.ok_or_else(|| CoreError::Config("Feed factory not provided".into()))?;
		let feed = FeedService::new(Arc::from(feed_factory(&config.feed)?));

		let notifier: Arc<dyn FundingInterface> = match self.funding_factory {
			Some(factory) => Arc::from(factory(&config.funding)?),
			None => Arc::new(NoopFunding),
		};
		let funding = FundingService::new(notifier);

		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

		let coordinator = UpdateCoordinator::new(
			CoordinatorSettings::from(&config.replica),
			account.address(),
			storage.clone(),
			chain.clone(),
			funding,
			clock.clone(),
		);

		Ok(OracleEngine {
			config,
			storage,
			chain,
			feed,
			account,
			clock,
			coordinator,
			update_lock: Mutex::new(()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::MockChain;
	use oracle_account::implementations::local::create_account;
	use oracle_config::ConfigLoader;
	use oracle_feed::implementations::fixed::StaticFeed;
	use oracle_storage::implementations::memory::create_storage;
	use rust_decimal::Decimal;

	const NOW: u64 = 10_000;

	fn config(replica: &str, backend: &str) -> Config {
		let content = format!(
			r#"
[replica]
name = "{replica}"

[feed]
url = "https://prices.example.com/simple/price"

[chain]
rpc_url = "http://localhost:8545"
chain_id = 31337
contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

[account]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[storage]
backend = "{backend}"

[turns]
replicas = ["a", "b"]
"#
		);
		ConfigLoader::new()
			.with_env_prefix("ORACLE_CORE_TEST_")
			.parse(&content)
			.unwrap()
	}

	fn builder(config: Config, clock: Arc<FixedClock>) -> OracleBuilder {
		OracleBuilder::new(config)
			.with_storage_factory("memory", create_storage)
			.with_account_factory(|account, chain_id| {
				create_account(&account.private_key, chain_id)
			})
			.with_chain_factory(|_, _| Ok(Box::new(MockChain::stale(NOW)) as Box<dyn ChainInterface>))
			.with_feed_factory(|_| {
				Ok(Box::new(StaticFeed::new(Decimal::from(2400))) as Box<dyn FeedInterface>)
			})
			.with_clock(clock)
	}

	fn engine(replica: &str) -> (OracleEngine, Arc<FixedClock>) {
		let clock = Arc::new(FixedClock::new(NOW));
		let engine = builder(config(replica, "memory"), clock.clone())
			.build()
			.unwrap();
		(engine, clock)
	}

	#[tokio::test]
	async fn test_not_my_turn_message() {
		let (engine, _) = engine("b");
		engine.initialize().await.unwrap();

		let result = engine.evaluate_and_maybe_update().await.unwrap();
		assert_eq!(result.status, 200);
		assert_eq!(result.message, "[b @ 02:46:40]: not my turn yet.");
		assert_eq!(result.data.unwrap()["decision"], "not_my_turn");
	}

	#[tokio::test]
	async fn test_update_cycle_without_samples() {
		let (engine, _) = engine("a");
		engine.initialize().await.unwrap();

		let result = engine.evaluate_and_maybe_update().await.unwrap();
		assert_eq!(result.status, 404);
		assert!(result
			.message
			.ends_with("insufficient data on db, could not calculate avg price"));
	}

	#[tokio::test]
	async fn test_sample_then_update_off_band() {
		let (engine, _) = engine("a");
		engine.initialize().await.unwrap();

		let recorded = engine.record_sample().await.unwrap();
		assert_eq!(recorded.status, 200);
		assert_eq!(recorded.data.unwrap()["observed_at"], NOW);

		// Feed reports 2400 against a contract price of 100
		let result = engine.evaluate_and_maybe_update().await.unwrap();
		let data = result.data.unwrap();
		assert_eq!(data["decision"], "updated");
		assert!(result
			.message
			.contains("successfully created transaction: 0x4242"));
		assert_eq!(engine.advance_turn().await.unwrap().current_index, 0);
	}

	#[tokio::test]
	async fn test_prune_messages() {
		let (engine, clock) = engine("a");
		engine.record_sample().await.unwrap();
		clock.advance(1_000);

		let result = engine.prune_old_samples().await.unwrap();
		assert_eq!(
			result.message,
			"[a @ 03:03:20]: successfully deleted 1 old price(s)"
		);

		let result = engine.prune_old_samples().await.unwrap();
		assert!(result
			.message
			.ends_with("all prices are still fresh, none deleted."));
		assert_eq!(result.data.unwrap()["deleted"], 0);
	}

	#[tokio::test]
	async fn test_current_prices_is_stable() {
		let (engine, _) = engine("a");

		let first = engine.current_prices().await.unwrap();
		let second = engine.current_prices().await.unwrap();
		assert_eq!(first, second);
		assert_eq!(first.message, "[a @ 02:46:40]: current prices");
	}

	#[tokio::test]
	async fn test_error_result() {
		let (engine, _) = engine("a");
		// No turn record was seeded
		let err = engine.evaluate_and_maybe_update().await.unwrap_err();

		let result = engine.error_result(&err);
		assert_eq!(result.status, 500);
		assert!(result.message.starts_with("[a @ 02:46:40]: "));
	}

	#[test]
	fn test_unknown_backend() {
		let clock = Arc::new(FixedClock::new(NOW));
		let result = builder(config("a", "redis"), clock).build();
		assert!(matches!(result, Err(CoreError::Config(_))));
	}

	#[test]
	fn test_missing_factory() {
		let result = OracleBuilder::new(config("a", "memory"))
			.with_storage_factory("memory", create_storage)
			.build();
		assert!(matches!(result, Err(CoreError::Config(msg)) if msg.contains("Account")));
	}
}
