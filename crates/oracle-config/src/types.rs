//! Configuration sections for the oracle updater.

use oracle_types::{Address, SecretString};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level configuration, one file per replica.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub replica: ReplicaConfig,
	pub feed: FeedConfig,
	pub chain: ChainConfig,
	pub account: AccountConfig,
	#[serde(default)]
	pub storage: StorageConfig,
	pub turns: TurnsConfig,
	#[serde(default)]
	pub funding: FundingConfig,
	#[serde(default)]
	pub api: ApiConfig,
	#[serde(default)]
	pub schedule: ScheduleConfig,
}

/// Identity of this replica and the thresholds of the update pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
	/// Name of this replica in the rotation.
	pub name: String,
	/// Minimum age of the on-chain price before it may be replaced. Also the
	/// averaging and retention window for samples.
	#[serde(default = "default_stale_window_secs")]
	pub stale_window_secs: u64,
	/// Relative deviation below which no update is sent (0.02 = 2%).
	#[serde(default = "default_deviation_tolerance")]
	pub deviation_tolerance: Decimal,
	/// Wallet balance, in native units, below which the turn is passed on.
	#[serde(default = "default_min_balance")]
	pub min_balance: Decimal,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

/// Reference price source.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
	pub url: String,
	/// Top-level key of the JSON response.
	#[serde(default = "default_asset")]
	pub asset: String,
	/// Nested key holding the price.
	#[serde(default = "default_quote")]
	pub quote: String,
	#[serde(default = "default_feed_timeout_secs")]
	pub timeout_secs: u64,
	/// Fixed price reported instead of querying `url`. For dev chains.
	#[serde(default)]
	pub static_price: Option<Decimal>,
}

/// Chain endpoint and oracle contract.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
	pub rpc_url: String,
	pub chain_id: u64,
	pub contract_address: Address,
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Fixed legacy gas price. When absent the node's gas price is used.
	#[serde(default)]
	pub gas_price_gwei: Option<u64>,
	#[serde(default = "default_receipt_timeout_secs")]
	pub receipt_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
	pub private_key: SecretString,
}

/// Backend holding samples and the turn record.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	#[serde(default = "default_storage_backend")]
	pub backend: String,
	/// Backend-specific table, validated by the backend's schema.
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: default_storage_backend(),
			config: empty_table(),
		}
	}
}

/// Rotation order of the fleet, used to seed the turn record.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnsConfig {
	pub replicas: Vec<String>,
}

/// Optional top-up service notified when the wallet runs low.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingConfig {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default = "default_funding_timeout_secs")]
	pub timeout_secs: u64,
}

impl Default for FundingConfig {
	fn default() -> Self {
		Self {
			url: None,
			timeout_secs: default_funding_timeout_secs(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_host(),
			port: default_port(),
		}
	}
}

/// Cadence of the three periodic jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_sample_interval_secs")]
	pub sample_interval_secs: u64,
	#[serde(default = "default_update_interval_secs")]
	pub update_interval_secs: u64,
	#[serde(default = "default_prune_interval_secs")]
	pub prune_interval_secs: u64,
}

impl Default for ScheduleConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			sample_interval_secs: default_sample_interval_secs(),
			update_interval_secs: default_update_interval_secs(),
			prune_interval_secs: default_prune_interval_secs(),
		}
	}
}

fn default_stale_window_secs() -> u64 {
	900
}

fn default_deviation_tolerance() -> Decimal {
	Decimal::new(2, 2)
}

fn default_min_balance() -> Decimal {
	Decimal::new(1, 3)
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_asset() -> String {
	"ethereum".to_string()
}

fn default_quote() -> String {
	"usd".to_string()
}

fn default_feed_timeout_secs() -> u64 {
	10
}

fn default_confirmations() -> u64 {
	1
}

fn default_receipt_timeout_secs() -> u64 {
	120
}

fn default_storage_backend() -> String {
	"sqlite".to_string()
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

fn default_funding_timeout_secs() -> u64 {
	5
}

fn default_true() -> bool {
	true
}

fn default_host() -> String {
	"0.0.0.0".to_string()
}

fn default_port() -> u16 {
	3000
}

fn default_sample_interval_secs() -> u64 {
	60
}

fn default_update_interval_secs() -> u64 {
	60
}

fn default_prune_interval_secs() -> u64 {
	300
}
