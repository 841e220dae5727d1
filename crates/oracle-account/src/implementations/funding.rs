//! Funding notifiers.

use crate::{AccountError, FundingInterface};
use async_trait::async_trait;
use oracle_types::Address;
use serde_json::json;
use std::time::Duration;

/// Posts `{"walletAddress": "0x..."}` to a funding endpoint.
pub struct HttpFunding {
	client: reqwest::Client,
	url: String,
}

impl HttpFunding {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AccountError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| AccountError::Funding(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			url: url.into(),
		})
	}
}

#[async_trait]
impl FundingInterface for HttpFunding {
	async fn request_funds(&self, address: Address) -> Result<(), AccountError> {
		self.client
			.post(&self.url)
			.json(&json!({ "walletAddress": address.to_string() }))
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(|e| AccountError::Funding(e.to_string()))?;

		Ok(())
	}
}

/// Used when no funding endpoint is configured.
pub struct NoopFunding;

#[async_trait]
impl FundingInterface for NoopFunding {
	async fn request_funds(&self, address: Address) -> Result<(), AccountError> {
		tracing::debug!(%address, "No funding endpoint configured, skipping top-up");
		Ok(())
	}
}

/// Builds the notifier for an optional endpoint.
pub fn create_funding(
	url: Option<&str>,
	timeout: Duration,
) -> Result<Box<dyn FundingInterface>, AccountError> {
	match url {
		Some(url) => Ok(Box::new(HttpFunding::new(url, timeout)?)),
		None => Ok(Box::new(NoopFunding)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_noop_funding_succeeds() {
		let funding = create_funding(None, Duration::from_secs(1)).unwrap();
		assert!(funding.request_funds(Address::ZERO).await.is_ok());
	}

	#[tokio::test]
	async fn test_unreachable_endpoint_reports_error() {
		// Port 9 (discard) on localhost is closed in test environments
		let funding =
			create_funding(Some("http://127.0.0.1:9/fund"), Duration::from_millis(500)).unwrap();
		assert!(matches!(
			funding.request_funds(Address::ZERO).await,
			Err(AccountError::Funding(_))
		));
	}
}
