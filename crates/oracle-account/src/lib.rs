//! Replica wallet and wallet top-up requests.
//!
//! [`AccountInterface`] is the signing boundary: the private key goes in once
//! at startup and only an address and an alloy wallet come out.
//! [`FundingInterface`] asks an external service to top the wallet up; the
//! request is best-effort and never fails the caller.

use alloy::network::EthereumWallet;
use async_trait::async_trait;
use oracle_types::Address;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Re-export implementations
pub mod implementations {
	pub mod funding;
	pub mod local;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Funding request failed: {0}")]
	Funding(String),
}

/// Holder of the replica's signing key.
pub trait AccountInterface: Send + Sync {
	/// Address funded for, and sending, update transactions.
	fn address(&self) -> Address;

	/// Wallet handed to the chain provider for transaction signing.
	fn wallet(&self) -> EthereumWallet;
}

pub struct AccountService {
	provider: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(provider: Box<dyn AccountInterface>) -> Self {
		Self { provider }
	}

	pub fn address(&self) -> Address {
		self.provider.address()
	}

	pub fn wallet(&self) -> EthereumWallet {
		self.provider.wallet()
	}
}

/// External service able to top up a wallet.
#[async_trait]
pub trait FundingInterface: Send + Sync {
	async fn request_funds(&self, address: Address) -> Result<(), AccountError>;
}

/// Dispatches funding requests without blocking the caller.
#[derive(Clone)]
pub struct FundingService {
	notifier: Arc<dyn FundingInterface>,
}

impl FundingService {
	pub fn new(notifier: Arc<dyn FundingInterface>) -> Self {
		Self { notifier }
	}

	/// Sends a funding request on a detached task. Failures are logged and
	/// dropped; the returned handle only exists so callers may await it.
	pub fn request_detached(&self, address: Address) -> JoinHandle<()> {
		let notifier = self.notifier.clone();
		tokio::spawn(async move {
			match notifier.request_funds(address).await {
				Ok(()) => info!(%address, "Requested wallet top-up"),
				Err(e) => warn!(%address, error = %e, "Wallet top-up request failed"),
			}
		})
	}
}
