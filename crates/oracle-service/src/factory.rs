//! Concrete backends registered with the engine builder.

use oracle_account::implementations::funding::create_funding;
use oracle_account::implementations::local::create_account;
use oracle_chain::implementations::evm::alloy::{AlloyOracle, SubmissionPolicy};
use oracle_chain::ChainInterface;
use oracle_config::{Config, FeedConfig};
use oracle_core::OracleBuilder;
use oracle_feed::implementations::fixed::StaticFeed;
use oracle_feed::implementations::http::HttpFeed;
use oracle_feed::{FeedError, FeedInterface};
use oracle_storage::implementations::{memory, sqlite};
use std::time::Duration;

pub fn engine_builder(config: Config) -> OracleBuilder {
	OracleBuilder::new(config)
		.with_storage_factory("memory", memory::create_storage)
		.with_storage_factory("sqlite", sqlite::create_storage)
		.with_account_factory(|account, chain_id| create_account(&account.private_key, chain_id))
		.with_chain_factory(|chain, account| {
			let policy = SubmissionPolicy {
				gas_price_gwei: chain.gas_price_gwei,
				confirmations: chain.confirmations,
				receipt_timeout: Duration::from_secs(chain.receipt_timeout_secs),
			};
			let oracle = AlloyOracle::new(
				&chain.rpc_url,
				chain.contract_address,
				account.wallet(),
				policy,
			)?;
			Ok(Box::new(oracle) as Box<dyn ChainInterface>)
		})
		.with_feed_factory(create_feed)
		.with_funding_factory(|funding| {
			create_funding(
				funding.url.as_deref(),
				Duration::from_secs(funding.timeout_secs),
			)
		})
}

fn create_feed(feed: &FeedConfig) -> Result<Box<dyn FeedInterface>, FeedError> {
	match feed.static_price {
		Some(price) => {
			tracing::warn!(%price, "Using a static reference price");
			Ok(Box::new(StaticFeed::new(price)))
		}
		None => Ok(Box::new(HttpFeed::new(
			&feed.url,
			&feed.asset,
			&feed.quote,
			Duration::from_secs(feed.timeout_secs),
		)?)),
	}
}
