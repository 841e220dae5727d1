//! Feed that reports a configured price.

use crate::{FeedError, FeedInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::RwLock;

/// Returns whatever price was last set. Useful for local runs against a dev
/// chain without an external price API.
pub struct StaticFeed {
	price: RwLock<Decimal>,
}

impl StaticFeed {
	pub fn new(price: Decimal) -> Self {
		Self {
			price: RwLock::new(price),
		}
	}

	pub fn set_price(&self, price: Decimal) {
		if let Ok(mut current) = self.price.write() {
			*current = price;
		}
	}
}

#[async_trait]
impl FeedInterface for StaticFeed {
	async fn reference_price(&self) -> Result<Decimal, FeedError> {
		self.price
			.read()
			.map(|price| *price)
			.map_err(|_| FeedError::Network("Static price lock poisoned".to_string()))
	}
}
