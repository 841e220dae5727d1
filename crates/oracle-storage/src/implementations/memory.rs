//! In-memory storage backend.
//!
//! State lives only as long as the process and is not shared between
//! replicas. Useful for single-replica development and for tests.

use crate::{mean, SampleStoreInterface, StorageError, StorageService, TurnRegistryInterface};
use async_trait::async_trait;
use oracle_types::{ConfigSchema, PriceSample, Schema, TurnState, ValidationError};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local samples and turn record.
#[derive(Default)]
pub struct MemoryStorage {
	samples: RwLock<Vec<PriceSample>>,
	turn: RwLock<Option<TurnState>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl SampleStoreInterface for MemoryStorage {
	async fn insert(&self, sample: &PriceSample) -> Result<(), StorageError> {
		self.samples.write().await.push(sample.clone());
		Ok(())
	}

	async fn average_since(&self, since: u64) -> Result<Option<Decimal>, StorageError> {
		let prices: Vec<Decimal> = self
			.samples
			.read()
			.await
			.iter()
			.filter(|s| s.observed_at > since)
			.map(|s| s.price)
			.collect();
		mean(&prices)
	}

	async fn delete_older_than(&self, before: u64) -> Result<u64, StorageError> {
		let mut samples = self.samples.write().await;
		let initial = samples.len();
		samples.retain(|s| s.observed_at >= before);
		Ok((initial - samples.len()) as u64)
	}

	async fn count(&self) -> Result<u64, StorageError> {
		Ok(self.samples.read().await.len() as u64)
	}
}

#[async_trait]
impl TurnRegistryInterface for MemoryStorage {
	async fn initialize(&self, replicas: &[String]) -> Result<TurnState, StorageError> {
		let mut turn = self.turn.write().await;
		if let Some(existing) = turn.as_ref() {
			return Ok(existing.clone());
		}

		let state = TurnState::new(replicas.to_vec(), 0)
			.map_err(|e| StorageError::InvalidState(e.to_string()))?;
		*turn = Some(state.clone());
		Ok(state)
	}

	async fn read(&self) -> Result<TurnState, StorageError> {
		self.turn
			.read()
			.await
			.clone()
			.ok_or_else(|| StorageError::NotFound("turn state".to_string()))
	}

	async fn advance(&self, expected: usize, next: usize) -> Result<bool, StorageError> {
		let mut turn = self.turn.write().await;
		let state = turn
			.as_mut()
			.ok_or_else(|| StorageError::NotFound("turn state".to_string()))?;

		if next >= state.total_count() {
			return Err(StorageError::InvalidState(format!(
				"Index {} is out of range for {} replicas",
				next,
				state.total_count()
			)));
		}

		if state.current_index != expected {
			return Ok(false);
		}

		state.current_index = next;
		Ok(true)
	}
}

/// Configuration schema for MemoryStorage. It takes no options.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create an in-memory storage backend.
pub fn create_storage(config: &toml::Value) -> Result<StorageService, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	Ok(StorageService::from_backend(Arc::new(MemoryStorage::new())))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample(price: i64, observed_at: u64) -> PriceSample {
		PriceSample::new(Decimal::from(price), observed_at)
	}

	#[tokio::test]
	async fn test_average_is_strictly_after_since() {
		let storage = MemoryStorage::new();
		storage.insert(&sample(50, 100)).await.unwrap();
		storage.insert(&sample(100, 101)).await.unwrap();
		storage.insert(&sample(200, 102)).await.unwrap();

		assert_eq!(
			storage.average_since(100).await.unwrap(),
			Some(Decimal::from(150))
		);
		assert_eq!(storage.average_since(102).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_delete_keeps_boundary() {
		let storage = MemoryStorage::new();
		for t in [10, 19, 20, 21] {
			storage.insert(&sample(1, t)).await.unwrap();
		}

		assert_eq!(storage.delete_older_than(20).await.unwrap(), 2);
		assert_eq!(storage.count().await.unwrap(), 2);
		assert_eq!(storage.delete_older_than(20).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_initialize_is_insert_or_ignore() {
		let storage = MemoryStorage::new();
		let first = vec!["a".to_string(), "b".to_string()];
		let second = vec!["x".to_string()];

		storage.initialize(&first).await.unwrap();
		storage.advance(0, 1).await.unwrap();

		let state = storage.initialize(&second).await.unwrap();
		assert_eq!(state.replicas, first);
		assert_eq!(state.current_index, 1);
	}

	#[tokio::test]
	async fn test_read_before_initialize() {
		let storage = MemoryStorage::new();
		assert!(matches!(
			storage.read().await,
			Err(StorageError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_conditional_advance() {
		let storage = MemoryStorage::new();
		storage
			.initialize(&["a".to_string(), "b".to_string(), "c".to_string()])
			.await
			.unwrap();

		assert!(storage.advance(0, 1).await.unwrap());
		assert!(!storage.advance(0, 1).await.unwrap());
		assert!(storage.advance(1, 2).await.unwrap());
		assert!(storage.advance(5, 9).await.is_err());
		assert_eq!(storage.read().await.unwrap().current_index, 2);
	}
}
