//! Reference price sources.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod http;
	pub mod fixed;
}

#[derive(Debug, Error)]
pub enum FeedError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Parse error: {0}")]
	Parse(String),
	#[error("Missing price at {0}")]
	MissingPrice(String),
}

#[async_trait]
pub trait FeedInterface: Send + Sync {
	/// Current reference price of the tracked asset.
	async fn reference_price(&self) -> Result<Decimal, FeedError>;
}

#[derive(Clone)]
pub struct FeedService {
	source: Arc<dyn FeedInterface>,
}

impl FeedService {
	pub fn new(source: Arc<dyn FeedInterface>) -> Self {
		Self { source }
	}

	pub async fn reference_price(&self) -> Result<Decimal, FeedError> {
		let price = self.source.reference_price().await?;
		tracing::debug!(%price, "Fetched reference price");
		Ok(price)
	}
}
