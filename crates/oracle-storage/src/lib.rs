//! Storage for price samples and the shared turn record.
//!
//! Two narrow interfaces are defined here: [`SampleStoreInterface`] for the
//! timestamped samples a replica averages over, and [`TurnRegistryInterface`]
//! for the singleton rotation record shared by the whole fleet. Backends live
//! under [`implementations`]; [`StorageService`] is the typed entry point used
//! by the rest of the system.

use async_trait::async_trait;
use oracle_types::{PriceSample, TurnState};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod sqlite;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// The requested record does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// A stored value could not be encoded or decoded.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The backend failed to execute the operation.
	#[error("Backend error: {0}")]
	Backend(String),
	/// A stored record violates its invariants.
	#[error("Invalid state: {0}")]
	InvalidState(String),
	/// The backend configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Append/query/prune access to price samples.
#[async_trait]
pub trait SampleStoreInterface: Send + Sync {
	/// Persists a new sample.
	async fn insert(&self, sample: &PriceSample) -> Result<(), StorageError>;

	/// Arithmetic mean of every sample with `observed_at > since`, or `None`
	/// when there is no such sample.
	async fn average_since(&self, since: u64) -> Result<Option<Decimal>, StorageError>;

	/// Deletes every sample with `observed_at < before` and returns how many
	/// were removed.
	async fn delete_older_than(&self, before: u64) -> Result<u64, StorageError>;

	/// Number of stored samples.
	async fn count(&self) -> Result<u64, StorageError>;
}

/// Access to the singleton turn record.
///
/// No lock is held between [`read`](Self::read) and
/// [`advance`](Self::advance); `advance` is an optimistic conditional write.
#[async_trait]
pub trait TurnRegistryInterface: Send + Sync {
	/// Creates the record with `current_index = 0` if none exists yet and
	/// returns whatever is stored afterwards.
	async fn initialize(&self, replicas: &[String]) -> Result<TurnState, StorageError>;

	/// Reads the current record.
	async fn read(&self) -> Result<TurnState, StorageError>;

	/// Sets `current_index` to `next` only if it still equals `expected`.
	/// Returns whether the write was applied.
	async fn advance(&self, expected: usize, next: usize) -> Result<bool, StorageError>;
}

/// Typed storage entry point combining a sample store and a turn registry.
#[derive(Clone)]
pub struct StorageService {
	samples: Arc<dyn SampleStoreInterface>,
	turns: Arc<dyn TurnRegistryInterface>,
}

impl StorageService {
	pub fn new(
		samples: Arc<dyn SampleStoreInterface>,
		turns: Arc<dyn TurnRegistryInterface>,
	) -> Self {
		Self { samples, turns }
	}

	/// Uses a single backend for both samples and turns.
	pub fn from_backend<B>(backend: Arc<B>) -> Self
	where
		B: SampleStoreInterface + TurnRegistryInterface + 'static,
	{
		Self {
			samples: backend.clone(),
			turns: backend,
		}
	}

	pub async fn insert_sample(&self, sample: &PriceSample) -> Result<(), StorageError> {
		self.samples.insert(sample).await
	}

	pub async fn average_since(&self, since: u64) -> Result<Option<Decimal>, StorageError> {
		self.samples.average_since(since).await
	}

	pub async fn delete_older_than(&self, before: u64) -> Result<u64, StorageError> {
		self.samples.delete_older_than(before).await
	}

	pub async fn sample_count(&self) -> Result<u64, StorageError> {
		self.samples.count().await
	}

	/// Seeds the turn record, warning when the stored rotation differs from
	/// the configured one.
	pub async fn initialize_turns(&self, replicas: &[String]) -> Result<TurnState, StorageError> {
		let state = self.turns.initialize(replicas).await?;
		if state.replicas != replicas {
			warn!(
				stored = ?state.replicas,
				configured = ?replicas,
				"Stored rotation differs from configuration, keeping stored record"
			);
		}
		Ok(state)
	}

	pub async fn read_turn(&self) -> Result<TurnState, StorageError> {
		self.turns.read().await
	}

	/// Passes the turn on from `state`, the value read earlier this cycle.
	///
	/// Returns `false` when another writer advanced the record first.
	pub async fn advance_turn(&self, state: &TurnState) -> Result<bool, StorageError> {
		let next = state.next_index();
		let applied = self.turns.advance(state.current_index, next).await?;
		debug!(
			from = state.current_index,
			to = next,
			applied,
			"Turn advance attempted"
		);
		Ok(applied)
	}
}

/// Mean of a list of prices. `None` when the list is empty.
pub(crate) fn mean(prices: &[Decimal]) -> Result<Option<Decimal>, StorageError> {
	if prices.is_empty() {
		return Ok(None);
	}

	let mut sum = Decimal::ZERO;
	for price in prices {
		sum = sum
			.checked_add(*price)
			.ok_or_else(|| StorageError::Backend("Overflow while summing prices".to_string()))?;
	}

	sum.checked_div(Decimal::from(prices.len() as u64))
		.map(Some)
		.ok_or_else(|| StorageError::Backend("Overflow while averaging prices".to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;

	#[test]
	fn test_mean() {
		assert_eq!(mean(&[]).unwrap(), None);
		let prices = [Decimal::from(100), Decimal::from(110), Decimal::from(120)];
		assert_eq!(mean(&prices).unwrap(), Some(Decimal::from(110)));
	}

	#[tokio::test]
	async fn test_advance_turn_uses_read_index() {
		let storage = StorageService::from_backend(Arc::new(MemoryStorage::new()));
		let replicas = vec!["a".to_string(), "b".to_string()];
		let state = storage.initialize_turns(&replicas).await.unwrap();

		assert!(storage.advance_turn(&state).await.unwrap());
		// Same stale read again: the record moved on, so the write is rejected
		assert!(!storage.advance_turn(&state).await.unwrap());
		assert_eq!(storage.read_turn().await.unwrap().current_index, 1);
	}
}
