use crate::CoreError;
use oracle_chain::ChainService;
use oracle_feed::FeedService;
use oracle_types::PriceSnapshot;

/// Reads the reference price and the published contract price.
pub async fn current_prices(
	feed: &FeedService,
	chain: &ChainService,
) -> Result<PriceSnapshot, CoreError> {
	let contract_price = chain.last_price().await?;
	let feed_price = feed.reference_price().await?;

	Ok(PriceSnapshot {
		feed_price,
		contract_price,
	})
}
