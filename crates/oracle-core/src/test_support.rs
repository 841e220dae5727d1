//! Hand-written doubles shared by the unit tests.

use crate::coordinator::CoordinatorSettings;
use async_trait::async_trait;
use oracle_account::{AccountError, FundingInterface};
use oracle_chain::{ChainError, ChainInterface};
use oracle_types::{Address, TransactionHash};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub const UPDATE_HASH: [u8; 32] = [0x42; 32];

pub fn settings(replica: &str) -> CoordinatorSettings {
	CoordinatorSettings {
		replica: replica.to_string(),
		stale_window_secs: 900,
		deviation_tolerance: Decimal::new(2, 2),
		min_balance: Decimal::new(1, 3),
	}
}

pub struct MockChain {
	pub last_price: Decimal,
	pub last_set_at: u64,
	pub balance: Decimal,
	pub fail_submit: bool,
	submitted: Mutex<Vec<Decimal>>,
}

impl MockChain {
	/// Contract at 100, last updated well outside the window, funded wallet.
	pub fn stale(now: u64) -> Self {
		Self {
			last_price: Decimal::from(100),
			last_set_at: now - 1_000,
			balance: Decimal::ONE,
			fail_submit: false,
			submitted: Mutex::new(Vec::new()),
		}
	}

	pub fn submitted(&self) -> Vec<Decimal> {
		self.submitted.lock().unwrap().clone()
	}
}

#[async_trait]
impl ChainInterface for MockChain {
	async fn last_price(&self) -> Result<Decimal, ChainError> {
		Ok(self.last_price)
	}

	async fn last_set_at(&self) -> Result<u64, ChainError> {
		Ok(self.last_set_at)
	}

	async fn wallet_balance(&self, _address: Address) -> Result<Decimal, ChainError> {
		Ok(self.balance)
	}

	async fn estimate_update_gas(&self, _price: Decimal, _from: Address) -> Result<u64, ChainError> {
		Ok(30_000)
	}

	async fn submit_price_update(
		&self,
		price: Decimal,
		_gas: u64,
	) -> Result<TransactionHash, ChainError> {
		if self.fail_submit {
			return Err(ChainError::Network("connection reset".to_string()));
		}
		self.submitted.lock().unwrap().push(price);
		Ok(TransactionHash(UPDATE_HASH.to_vec()))
	}
}

pub struct RecordingFunding {
	fail: bool,
	calls: AtomicUsize,
	called: Notify,
}

impl RecordingFunding {
	pub fn new(fail: bool) -> Self {
		Self {
			fail,
			calls: AtomicUsize::new(0),
			called: Notify::new(),
		}
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Waits until the detached funding task has run.
	pub async fn wait_for_call(&self, timeout: Duration) -> bool {
		if self.calls.load(Ordering::SeqCst) > 0 {
			return true;
		}
		tokio::time::timeout(timeout, self.called.notified())
			.await
			.is_ok()
	}
}

#[async_trait]
impl FundingInterface for RecordingFunding {
	async fn request_funds(&self, _address: Address) -> Result<(), AccountError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.called.notify_one();
		if self.fail {
			Err(AccountError::Funding("service unavailable".to_string()))
		} else {
			Ok(())
		}
	}
}
