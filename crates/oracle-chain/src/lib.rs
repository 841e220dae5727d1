//! Access to the on-chain price oracle.
//!
//! [`ChainInterface`] covers the handful of calls the update pipeline needs:
//! reading the published price and its timestamp, reading the replica's
//! balance, and estimating and submitting `setEthPrice`.

use alloy::primitives::utils::format_ether;
use alloy::primitives::U256;
use async_trait::async_trait;
use oracle_types::{Address, TransactionHash};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Contract error: {0}")]
	Contract(String),
	#[error("Conversion error: {0}")]
	Conversion(String),
	#[error("Signing error: {0}")]
	Signing(String),
}

#[async_trait]
pub trait ChainInterface: Send + Sync {
	/// Price currently published by the contract.
	async fn last_price(&self) -> Result<Decimal, ChainError>;

	/// Unix timestamp of the last successful update.
	async fn last_set_at(&self) -> Result<u64, ChainError>;

	/// Native balance of `address`, in whole units (ether, not wei).
	async fn wallet_balance(&self, address: Address) -> Result<Decimal, ChainError>;

	async fn estimate_update_gas(&self, price: Decimal, from: Address) -> Result<u64, ChainError>;

	/// Signs and broadcasts `setEthPrice(price)` and waits for acceptance.
	async fn submit_price_update(
		&self,
		price: Decimal,
		gas: u64,
	) -> Result<TransactionHash, ChainError>;
}

#[derive(Clone)]
pub struct ChainService {
	client: Arc<dyn ChainInterface>,
}

impl ChainService {
	pub fn new(client: Arc<dyn ChainInterface>) -> Self {
		Self { client }
	}

	pub async fn last_price(&self) -> Result<Decimal, ChainError> {
		self.client.last_price().await
	}

	pub async fn last_set_at(&self) -> Result<u64, ChainError> {
		self.client.last_set_at().await
	}

	pub async fn wallet_balance(&self, address: Address) -> Result<Decimal, ChainError> {
		self.client.wallet_balance(address).await
	}

	/// Estimates gas for the update, then submits it with that limit.
	pub async fn update_price(
		&self,
		price: Decimal,
		from: Address,
	) -> Result<TransactionHash, ChainError> {
		let gas = self.client.estimate_update_gas(price, from).await?;
		debug!(%price, gas, "Estimated gas for price update");

		let tx_hash = self.client.submit_price_update(price, gas).await?;
		info!(%price, tx_hash = %tx_hash.truncated(), "Price update accepted");
		Ok(tx_hash)
	}
}

/// Converts a non-negative integral price to a contract argument.
pub fn price_to_u256(price: Decimal) -> Result<U256, ChainError> {
	if price.is_sign_negative() {
		return Err(ChainError::Conversion(format!(
			"Price must not be negative: {}",
			price
		)));
	}
	if !price.fract().is_zero() {
		return Err(ChainError::Conversion(format!(
			"Price must be an integer: {}",
			price
		)));
	}

	price
		.to_u128()
		.map(U256::from)
		.ok_or_else(|| ChainError::Conversion(format!("Price out of range: {}", price)))
}

/// Converts a contract integer to a decimal price.
pub fn u256_to_decimal(value: U256) -> Result<Decimal, ChainError> {
	Decimal::from_str(&value.to_string())
		.map_err(|e| ChainError::Conversion(format!("Value {} does not fit: {}", value, e)))
}

/// Converts a wei amount to whole native units.
pub fn wei_to_native(wei: U256) -> Result<Decimal, ChainError> {
	let ether = format_ether(wei);
	Decimal::from_str(&ether)
		.map(|d| d.normalize())
		.map_err(|e| ChainError::Conversion(format!("Balance {} does not fit: {}", ether, e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	#[test]
	fn test_price_to_u256() {
		assert_eq!(price_to_u256(Decimal::from(1850)).unwrap(), U256::from(1850u64));
		assert_eq!(price_to_u256(Decimal::ZERO).unwrap(), U256::ZERO);
		assert!(matches!(
			price_to_u256(Decimal::new(18505, 1)),
			Err(ChainError::Conversion(_))
		));
		assert!(matches!(
			price_to_u256(Decimal::from(-1)),
			Err(ChainError::Conversion(_))
		));
	}

	#[test]
	fn test_u256_to_decimal() {
		assert_eq!(
			u256_to_decimal(U256::from(2400u64)).unwrap(),
			Decimal::from(2400)
		);
		assert!(u256_to_decimal(U256::MAX).is_err());
	}

	#[test]
	fn test_wei_to_native() {
		let one_milli = U256::from(1_000_000_000_000_000u64);
		assert_eq!(wei_to_native(one_milli).unwrap(), Decimal::new(1, 3));
		assert_eq!(wei_to_native(U256::ZERO).unwrap(), Decimal::ZERO);
	}

	struct RecordingChain {
		submitted: Mutex<Vec<(Decimal, u64)>>,
	}

	#[async_trait]
	impl ChainInterface for RecordingChain {
		async fn last_price(&self) -> Result<Decimal, ChainError> {
			Ok(Decimal::from(100))
		}

		async fn last_set_at(&self) -> Result<u64, ChainError> {
			Ok(42)
		}

		async fn wallet_balance(&self, _address: Address) -> Result<Decimal, ChainError> {
			Ok(Decimal::ONE)
		}

		async fn estimate_update_gas(
			&self,
			_price: Decimal,
			_from: Address,
		) -> Result<u64, ChainError> {
			Ok(31_000)
		}

		async fn submit_price_update(
			&self,
			price: Decimal,
			gas: u64,
		) -> Result<TransactionHash, ChainError> {
			self.submitted.lock().unwrap().push((price, gas));
			Ok(TransactionHash(vec![0x11; 32]))
		}
	}

	#[tokio::test]
	async fn test_update_uses_estimated_gas() {
		let chain = Arc::new(RecordingChain {
			submitted: Mutex::new(Vec::new()),
		});
		let service = ChainService::new(chain.clone());

		let hash = service
			.update_price(Decimal::from(110), Address::ZERO)
			.await
			.unwrap();

		assert_eq!(hash, TransactionHash(vec![0x11; 32]));
		assert_eq!(
			chain.submitted.lock().unwrap().as_slice(),
			&[(Decimal::from(110), 31_000)]
		);
	}
}
