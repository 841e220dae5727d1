//! Local private key wallet using Alloy's signer.

use crate::{AccountError, AccountInterface};
use alloy::network::EthereumWallet;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use oracle_types::{Address, SecretString};

/// Wallet backed by a private key held in process memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a new LocalWallet from a hex-encoded private key.
	///
	/// The private key may be given with or without the 0x prefix.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key
			.expose()
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

		Ok(Self { signer })
	}

	/// Binds signatures to a chain (EIP-155).
	pub fn with_chain_id(mut self, chain_id: u64) -> Self {
		self.signer.set_chain_id(Some(chain_id));
		self
	}
}

impl AccountInterface for LocalWallet {
	fn address(&self) -> Address {
		self.signer.address()
	}

	fn wallet(&self) -> EthereumWallet {
		EthereumWallet::from(self.signer.clone())
	}
}

/// Factory function to create a local wallet for the given chain.
pub fn create_account(
	private_key: &SecretString,
	chain_id: u64,
) -> Result<Box<dyn AccountInterface>, AccountError> {
	Ok(Box::new(LocalWallet::new(private_key)?.with_chain_id(chain_id)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::network::{Ethereum, NetworkWallet};

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[test]
	fn test_address_from_key() {
		let wallet = LocalWallet::new(&SecretString::new(KEY)).unwrap();
		let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
		assert_eq!(wallet.address(), expected);

		let eth_wallet = wallet.wallet();
		assert_eq!(
			NetworkWallet::<Ethereum>::default_signer_address(&eth_wallet),
			expected
		);
	}

	#[test]
	fn test_key_without_prefix() {
		let wallet = LocalWallet::new(&SecretString::new(&KEY[2..])).unwrap();
		assert_eq!(
			wallet.address(),
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
				.parse::<Address>()
				.unwrap()
		);
	}

	#[test]
	fn test_invalid_key() {
		assert!(matches!(
			LocalWallet::new(&SecretString::new("not-a-key")),
			Err(AccountError::InvalidKey(_))
		));
	}
}
