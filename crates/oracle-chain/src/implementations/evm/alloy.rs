//! Alloy-based client for the price oracle contract.
//!
//! Reads go through the `sol!` generated bindings; updates are signed by the
//! wallet attached to the provider and awaited until the configured number of
//! confirmations is reached.

use crate::{price_to_u256, u256_to_decimal, wei_to_native, ChainError, ChainInterface};
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use oracle_types::{Address, TransactionHash};
use rust_decimal::Decimal;
use std::time::Duration;

sol! {
	#[sol(rpc)]
	contract PriceOracle {
		function getPrice() external view returns (uint256);
		function getLastSetTimestamp() external view returns (uint256);
		function setEthPrice(uint256 price) external;
	}
}

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// How update transactions are priced and awaited.
#[derive(Debug, Clone)]
pub struct SubmissionPolicy {
	/// Fixed legacy gas price in gwei. `None` uses the node's gas price.
	pub gas_price_gwei: Option<u64>,
	pub confirmations: u64,
	pub receipt_timeout: Duration,
}

impl Default for SubmissionPolicy {
	fn default() -> Self {
		Self {
			gas_price_gwei: None,
			confirmations: 1,
			receipt_timeout: Duration::from_secs(120),
		}
	}
}

pub struct AlloyOracle {
	provider: DynProvider,
	contract: PriceOracle::PriceOracleInstance<DynProvider>,
	policy: SubmissionPolicy,
}

impl AlloyOracle {
	/// Connects to `rpc_url` with `wallet` attached for signing.
	///
	/// The HTTP transport is lazy; no request is made until the first call.
	pub fn new(
		rpc_url: &str,
		contract_address: Address,
		wallet: EthereumWallet,
		policy: SubmissionPolicy,
	) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::Network(format!("Invalid RPC URL: {}", e)))?;

		let provider = ProviderBuilder::new()
			.wallet(wallet)
			.connect_http(url)
			.erased();
		let contract = PriceOracle::new(contract_address, provider.clone());

		Ok(Self {
			provider,
			contract,
			policy,
		})
	}

	async fn gas_price(&self) -> Result<u128, ChainError> {
		match self.policy.gas_price_gwei {
			Some(gwei) => Ok(u128::from(gwei) * WEI_PER_GWEI),
			None => self
				.provider
				.get_gas_price()
				.await
				.map_err(|e| ChainError::Network(format!("Failed to get gas price: {}", e))),
		}
	}
}

#[async_trait]
impl ChainInterface for AlloyOracle {
	async fn last_price(&self) -> Result<Decimal, ChainError> {
		let price = self
			.contract
			.getPrice()
			.call()
			.await
			.map_err(|e| ChainError::Contract(format!("getPrice failed: {}", e)))?;

		u256_to_decimal(price)
	}

	async fn last_set_at(&self) -> Result<u64, ChainError> {
		let timestamp = self
			.contract
			.getLastSetTimestamp()
			.call()
			.await
			.map_err(|e| ChainError::Contract(format!("getLastSetTimestamp failed: {}", e)))?;

		u64::try_from(timestamp)
			.map_err(|_| ChainError::Conversion(format!("Timestamp out of range: {}", timestamp)))
	}

	async fn wallet_balance(&self, address: Address) -> Result<Decimal, ChainError> {
		let wei = self
			.provider
			.get_balance(address)
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get balance: {}", e)))?;

		wei_to_native(wei)
	}

	async fn estimate_update_gas(&self, price: Decimal, from: Address) -> Result<u64, ChainError> {
		self.contract
			.setEthPrice(price_to_u256(price)?)
			.from(from)
			.estimate_gas()
			.await
			.map_err(|e| ChainError::Contract(format!("Gas estimation failed: {}", e)))
	}

	async fn submit_price_update(
		&self,
		price: Decimal,
		gas: u64,
	) -> Result<TransactionHash, ChainError> {
		let gas_price = self.gas_price().await?;

		// The provider's wallet fills nonce and chain id and signs
		let pending = self
			.contract
			.setEthPrice(price_to_u256(price)?)
			.gas(gas)
			.gas_price(gas_price)
			.send()
			.await
			.map_err(|e| ChainError::Signing(format!("Failed to send transaction: {}", e)))?;

		let tx_hash = TransactionHash::from(*pending.tx_hash());
		tracing::info!(
			tx_hash = %tx_hash.truncated(),
			confirmations = self.policy.confirmations,
			"Submitted price update, waiting for receipt"
		);

		let receipt = pending
			.with_required_confirmations(self.policy.confirmations)
			.with_timeout(Some(self.policy.receipt_timeout))
			.get_receipt()
			.await
			.map_err(|e| ChainError::Network(format!("Failed to get receipt: {}", e)))?;

		if !receipt.status() {
			return Err(ChainError::Contract(format!(
				"Transaction {} reverted",
				tx_hash
			)));
		}

		Ok(tx_hash)
	}
}
