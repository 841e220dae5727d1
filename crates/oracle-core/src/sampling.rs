//! Periodic price sampling and retention.

use crate::clock::TimeSource;
use crate::CoreError;
use oracle_feed::FeedService;
use oracle_storage::StorageService;
use oracle_types::PriceSample;

/// Fetches the reference price and stores it as a sample taken now.
pub async fn record_sample(
	feed: &FeedService,
	storage: &StorageService,
	clock: &dyn TimeSource,
) -> Result<PriceSample, CoreError> {
	let price = feed.reference_price().await?;
	let sample = PriceSample::new(price, clock.now());
	storage.insert_sample(&sample).await?;

	tracing::debug!(%price, observed_at = sample.observed_at, "Recorded price sample");
	Ok(sample)
}

/// Deletes samples older than `retention_secs` and returns how many went.
///
/// Samples observed exactly at the cutoff are kept.
pub async fn prune_old_samples(
	storage: &StorageService,
	clock: &dyn TimeSource,
	retention_secs: u64,
) -> Result<u64, CoreError> {
	let cutoff = clock.now().saturating_sub(retention_secs);
	let deleted = storage.delete_older_than(cutoff).await?;

	tracing::debug!(cutoff, deleted, "Pruned old price samples");
	Ok(deleted)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::FixedClock;
	use oracle_feed::implementations::fixed::StaticFeed;
	use oracle_storage::implementations::memory::MemoryStorage;
	use rust_decimal::Decimal;
	use std::sync::Arc;

	#[tokio::test]
	async fn test_record_sample_uses_clock() {
		let storage = StorageService::from_backend(Arc::new(MemoryStorage::new()));
		let feed = FeedService::new(Arc::new(StaticFeed::new(Decimal::new(18505, 1))));
		let clock = FixedClock::new(5_000);

		let sample = record_sample(&feed, &storage, &clock).await.unwrap();
		assert_eq!(sample, PriceSample::new(Decimal::new(18505, 1), 5_000));
		assert_eq!(storage.sample_count().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_prune_keeps_boundary() {
		let storage = StorageService::from_backend(Arc::new(MemoryStorage::new()));
		for observed_at in [50, 99, 100, 101, 1_000] {
			storage
				.insert_sample(&PriceSample::new(Decimal::from(10), observed_at))
				.await
				.unwrap();
		}
		let clock = FixedClock::new(1_000);

		// cutoff is 100: only 50 and 99 are strictly older
		assert_eq!(prune_old_samples(&storage, &clock, 900).await.unwrap(), 2);
		assert_eq!(storage.sample_count().await.unwrap(), 3);
		assert_eq!(prune_old_samples(&storage, &clock, 900).await.unwrap(), 0);
	}
}
