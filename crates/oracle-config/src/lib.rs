//! Configuration loading for the oracle updater.
//!
//! A replica is configured from a single TOML file. `${VAR}` references are
//! substituted from the environment before parsing, selected settings can
//! then be overridden with prefixed environment variables, and the result is
//! validated before it is handed to the service.

use oracle_types::validate_replicas;
use regex::Regex;
use rust_decimal::Decimal;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ORACLE_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		let content = match tokio::fs::read_to_string(file_path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(file_path.clone()));
			}
			Err(e) => return Err(e.into()),
		};

		self.parse(&content)
	}

	/// Runs substitution, parsing, overrides and validation on raw TOML.
	pub fn parse(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted_content = self.substitute_env_vars(content)?;

		let mut config: Config = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let re = Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(format!("Invalid substitution pattern: {}", e)))?;

		let mut result = content.to_string();
		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn env_var(&self, name: &str) -> Option<String> {
		env::var(format!("{}{}", self.env_prefix, name)).ok()
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Some(name) = self.env_var("REPLICA_NAME") {
			debug!("Overriding replica name from environment");
			config.replica.name = name;
		}

		if let Some(log_level) = self.env_var("LOG_LEVEL") {
			config.replica.log_level = log_level;
		}

		if let Some(key) = self.env_var("PRIVATE_KEY") {
			debug!("Overriding private key from environment");
			config.account.private_key = oracle_types::SecretString::new(key);
		}

		if let Some(url) = self.env_var("RPC_URL") {
			debug!("Overriding RPC URL from environment");
			config.chain.rpc_url = url;
		}

		if let Some(url) = self.env_var("FEED_URL") {
			debug!("Overriding feed URL from environment");
			config.feed.url = url;
		}

		if let Some(port) = self.env_var("HTTP_PORT") {
			config.api.port = port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		Ok(())
	}
}

/// Checks cross-field constraints that serde cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

	if config.replica.name.trim().is_empty() {
		return invalid("replica.name must not be empty".to_string());
	}

	validate_replicas(&config.turns.replicas)
		.map_err(|e| ConfigError::ValidationError(format!("turns: {}", e)))?;

	if !config.turns.replicas.contains(&config.replica.name) {
		return invalid(format!(
			"Replica '{}' is not part of turns.replicas",
			config.replica.name
		));
	}

	if config.replica.stale_window_secs == 0 {
		return invalid("replica.stale_window_secs must be greater than 0".to_string());
	}

	let tolerance = config.replica.deviation_tolerance;
	if tolerance <= Decimal::ZERO || tolerance >= Decimal::ONE {
		return invalid(format!(
			"replica.deviation_tolerance must be between 0 and 1, got {}",
			tolerance
		));
	}

	if config.replica.min_balance.is_sign_negative() {
		return invalid("replica.min_balance must not be negative".to_string());
	}

	check_http_url("feed.url", &config.feed.url)?;
	if let Some(price) = config.feed.static_price {
		if price.is_sign_negative() {
			return invalid("feed.static_price must not be negative".to_string());
		}
	}
	check_http_url("chain.rpc_url", &config.chain.rpc_url)?;
	if let Some(url) = &config.funding.url {
		check_http_url("funding.url", url)?;
	}

	if config.chain.chain_id == 0 {
		return invalid("chain.chain_id must be at least 1".to_string());
	}

	check_private_key(config.account.private_key.expose())?;

	let schedule = &config.schedule;
	if schedule.sample_interval_secs == 0
		|| schedule.update_interval_secs == 0
		|| schedule.prune_interval_secs == 0
	{
		return invalid("schedule intervals must be greater than 0".to_string());
	}

	Ok(())
}

fn check_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
	if url.starts_with("http://") || url.starts_with("https://") {
		Ok(())
	} else {
		Err(ConfigError::ValidationError(format!(
			"{} must start with http:// or https://",
			field
		)))
	}
}

fn check_private_key(key: &str) -> Result<(), ConfigError> {
	let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);

	if key_without_prefix.len() != 64 {
		return Err(ConfigError::ValidationError(
			"Private key must be 64 hex characters (32 bytes)".to_string(),
		));
	}

	if hex::decode(key_without_prefix).is_err() {
		return Err(ConfigError::ValidationError(
			"Private key must be valid hexadecimal".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::str::FromStr;

	const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	fn base_toml(private_key: &str) -> String {
		format!(
			r#"
[replica]
name = "replica-a"

[feed]
url = "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd"

[chain]
rpc_url = "http://localhost:8545"
chain_id = 42
contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

[account]
private_key = "{}"

[turns]
replicas = ["replica-a", "replica-b"]
"#,
			private_key
		)
	}

	fn loader() -> ConfigLoader {
		ConfigLoader::new().with_env_prefix("ORACLE_CFG_TEST_UNSET_")
	}

	#[test]
	fn test_defaults_applied() {
		let config = loader().parse(&base_toml(KEY)).unwrap();
		assert_eq!(config.replica.stale_window_secs, 900);
		assert_eq!(
			config.replica.deviation_tolerance,
			Decimal::from_str("0.02").unwrap()
		);
		assert_eq!(config.replica.min_balance, Decimal::from_str("0.001").unwrap());
		assert_eq!(config.storage.backend, "sqlite");
		assert_eq!(config.api.port, 3000);
		assert_eq!(config.schedule.prune_interval_secs, 300);
		assert!(config.funding.url.is_none());
		assert_eq!(config.feed.asset, "ethereum");
	}

	#[test]
	fn test_env_substitution() {
		env::set_var("ORACLE_CFG_TEST_KEY_SUBST", KEY);
		let config = loader()
			.parse(&base_toml("${ORACLE_CFG_TEST_KEY_SUBST}"))
			.unwrap();
		assert_eq!(config.account.private_key.expose(), KEY);
	}

	#[test]
	fn test_missing_env_var_fails() {
		let result = loader().parse(&base_toml("${ORACLE_CFG_TEST_NEVER_SET}"));
		assert!(matches!(result, Err(ConfigError::EnvVarNotFound(v)) if v == "ORACLE_CFG_TEST_NEVER_SET"));
	}

	#[test]
	fn test_env_overrides() {
		env::set_var("ORACLE_CFG_TEST_OVR_REPLICA_NAME", "replica-b");
		env::set_var("ORACLE_CFG_TEST_OVR_HTTP_PORT", "8081");
		let config = ConfigLoader::new()
			.with_env_prefix("ORACLE_CFG_TEST_OVR_")
			.parse(&base_toml(KEY))
			.unwrap();
		assert_eq!(config.replica.name, "replica-b");
		assert_eq!(config.api.port, 8081);
	}

	#[test]
	fn test_replica_must_be_in_rotation() {
		let toml = base_toml(KEY).replace("name = \"replica-a\"", "name = \"replica-z\"");
		assert!(matches!(
			loader().parse(&toml),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn test_rejects_bad_private_key() {
		assert!(matches!(
			loader().parse(&base_toml("0x1234")),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn test_rejects_out_of_range_tolerance() {
		let toml = base_toml(KEY).replace(
			"name = \"replica-a\"",
			"name = \"replica-a\"\ndeviation_tolerance = \"1.5\"",
		);
		assert!(loader().parse(&toml).is_err());
	}

	#[test]
	fn test_private_key_not_in_debug_output() {
		let config = loader().parse(&base_toml(KEY)).unwrap();
		let debug = format!("{:?}", config);
		assert!(!debug.contains(&KEY[2..]));
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(base_toml(KEY).as_bytes()).unwrap();

		let config = loader().with_file(file.path()).load().await.unwrap();
		assert_eq!(config.replica.name, "replica-a");
		assert_eq!(config.chain.chain_id, 42);
	}

	#[tokio::test]
	async fn test_load_missing_file() {
		let result = loader().with_file("/nonexistent/oracle.toml").load().await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
	}
}
