//! The per-cycle update pipeline.
//!
//! Each call walks the same six checks in order and stops at the first one
//! that decides the outcome:
//!
//! 1. is it this replica's turn,
//! 2. is the on-chain price old enough to replace,
//! 3. can the wallet pay for a transaction,
//! 4. are there samples to average,
//! 5. has the average moved outside the tolerance band,
//! 6. submit the new price.
//!
//! Branches 3, 5 and 6 pass the turn on, always after the step that
//! justifies it. Any I/O failure aborts the cycle with an error and leaves the
//! turn where it was unless the rotation already happened.

use crate::clock::TimeSource;
use crate::turn::rotate_from;
use crate::CoreError;
use oracle_account::FundingService;
use oracle_chain::ChainService;
use oracle_config::ReplicaConfig;
use oracle_storage::StorageService;
use oracle_types::{Address, TurnState, UpdateDecision};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Thresholds evaluated by the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
	pub replica: String,
	pub stale_window_secs: u64,
	pub deviation_tolerance: Decimal,
	pub min_balance: Decimal,
}

impl From<&ReplicaConfig> for CoordinatorSettings {
	fn from(config: &ReplicaConfig) -> Self {
		Self {
			replica: config.name.clone(),
			stale_window_secs: config.stale_window_secs,
			deviation_tolerance: config.deviation_tolerance,
			min_balance: config.min_balance,
		}
	}
}

pub struct UpdateCoordinator {
	settings: CoordinatorSettings,
	wallet: Address,
	storage: StorageService,
	chain: ChainService,
	funding: FundingService,
	clock: Arc<dyn TimeSource>,
}

impl UpdateCoordinator {
	pub fn new(
		settings: CoordinatorSettings,
		wallet: Address,
		storage: StorageService,
		chain: ChainService,
		funding: FundingService,
		clock: Arc<dyn TimeSource>,
	) -> Self {
		Self {
			settings,
			wallet,
			storage,
			chain,
			funding,
			clock,
		}
	}

	#[instrument(skip(self), fields(replica = %self.settings.replica))]
	pub async fn evaluate_and_maybe_update(&self) -> Result<UpdateDecision, CoreError> {
		let turn = self.storage.read_turn().await?;
		if !turn.is_turn_of(&self.settings.replica) {
			let current = turn.current_replica().ok_or_else(|| {
				CoreError::InvalidTurnState(format!(
					"index {} outside rotation of {}",
					turn.current_index,
					turn.total_count()
				))
			})?;
			return Ok(self.decided(UpdateDecision::NotMyTurn {
				current: current.to_string(),
			}));
		}

		let last_set_at = self.chain.last_set_at().await?;
		let now = self.clock.now();
		if let Some(remaining_secs) = self.remaining_wait(now, last_set_at) {
			return Ok(self.decided(UpdateDecision::TooRecent { remaining_secs }));
		}

		let balance = self.chain.wallet_balance(self.wallet).await?;
		if balance < self.settings.min_balance {
			self.rotate(&turn).await?;
			self.funding.request_detached(self.wallet);
			return Ok(self.decided(UpdateDecision::InsufficientFunds { balance }));
		}

		let since = now.saturating_sub(self.settings.stale_window_secs);
		let Some(mean) = self.storage.average_since(since).await? else {
			return Ok(self.decided(UpdateDecision::InsufficientData));
		};

		let average = mean.floor();
		let contract_price = self.chain.last_price().await?;
		if within_band(average, contract_price, self.settings.deviation_tolerance)? {
			self.rotate(&turn).await?;
			return Ok(self.decided(UpdateDecision::WithinTolerance {
				average,
				contract_price,
			}));
		}

		let tx_hash = self.chain.update_price(average, self.wallet).await?;
		self.rotate(&turn).await?;
		Ok(self.decided(UpdateDecision::Updated {
			price: average,
			tx_hash,
		}))
	}

	/// Seconds left before the contract may be updated again, if any.
	fn remaining_wait(&self, now: u64, last_set_at: u64) -> Option<u64> {
		let window = i128::from(self.settings.stale_window_secs);
		let elapsed = i128::from(now) - i128::from(last_set_at);
		if elapsed < window {
			u64::try_from(window - elapsed).ok()
		} else {
			None
		}
	}

	async fn rotate(&self, observed: &TurnState) -> Result<(), CoreError> {
		rotate_from(&self.storage, observed).await?;
		Ok(())
	}

	fn decided(&self, decision: UpdateDecision) -> UpdateDecision {
		match &decision {
			UpdateDecision::InsufficientFunds { balance } => warn!(
				decision = decision.kind(),
				%balance,
				wallet = %self.wallet,
				"Wallet balance below minimum, passing turn"
			),
			UpdateDecision::Updated { price, tx_hash } => info!(
				decision = decision.kind(),
				%price,
				tx_hash = %tx_hash.truncated(),
				"Contract price updated"
			),
			_ => info!(decision = decision.kind(), "Update cycle finished"),
		}
		decision
	}
}

/// Whether `average` lies strictly inside `last * (1 ± tolerance)`.
fn within_band(average: Decimal, last: Decimal, tolerance: Decimal) -> Result<bool, CoreError> {
	let bound = |factor: Decimal| {
		last.checked_mul(factor)
			.ok_or_else(|| CoreError::Conversion(format!("Tolerance band overflows at {}", last)))
	};
	let lower = bound(Decimal::ONE - tolerance)?;
	let upper = bound(Decimal::ONE + tolerance)?;
	Ok(lower < average && average < upper)
}
