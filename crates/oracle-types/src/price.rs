//! Price samples and read-only price snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single observation of the reference price.
///
/// Samples are immutable once stored and are pruned when they fall out of
/// the retention window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
	/// Reference price reported by the feed.
	pub price: Decimal,
	/// Unix timestamp (seconds) at which the price was observed.
	pub observed_at: u64,
}

impl PriceSample {
	pub fn new(price: Decimal, observed_at: u64) -> Self {
		Self { price, observed_at }
	}
}

/// Feed and contract prices side by side, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
	pub feed_price: Decimal,
	pub contract_price: Decimal,
}
