//! JSON price endpoint of the `{ "<asset>": { "<quote>": <price> } }` shape.
//!
//! This is the layout returned by CoinGecko's `simple/price` endpoint.

use crate::{FeedError, FeedInterface};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

pub struct HttpFeed {
	client: reqwest::Client,
	url: String,
	asset: String,
	quote: String,
}

impl HttpFeed {
	pub fn new(
		url: impl Into<String>,
		asset: impl Into<String>,
		quote: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, FeedError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| FeedError::Network(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			url: url.into(),
			asset: asset.into(),
			quote: quote.into(),
		})
	}

	fn extract_price(&self, body: &Value) -> Result<Decimal, FeedError> {
		let path = format!("{}.{}", self.asset, self.quote);
		let value = body
			.get(&self.asset)
			.and_then(|asset| asset.get(&self.quote))
			.ok_or_else(|| FeedError::MissingPrice(path.clone()))?;

		parse_price(value).ok_or_else(|| {
			FeedError::Parse(format!("Value at {} is not a price: {}", path, value))
		})
	}
}

/// Accepts JSON numbers (including exponent form) and numeric strings.
fn parse_price(value: &Value) -> Option<Decimal> {
	let text = match value {
		Value::Number(n) => n.to_string(),
		Value::String(s) => s.trim().to_string(),
		_ => return None,
	};

	Decimal::from_str(&text)
		.or_else(|_| Decimal::from_scientific(&text))
		.ok()
}

#[async_trait]
impl FeedInterface for HttpFeed {
	async fn reference_price(&self) -> Result<Decimal, FeedError> {
		let body: Value = self
			.client
			.get(&self.url)
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(|e| FeedError::Network(e.to_string()))?
			.json()
			.await
			.map_err(|e| FeedError::Parse(format!("Invalid JSON response: {}", e)))?;

		self.extract_price(&body)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn feed() -> HttpFeed {
		HttpFeed::new(
			"http://127.0.0.1:9/price",
			"ethereum",
			"usd",
			Duration::from_secs(1),
		)
		.unwrap()
	}

	#[test]
	fn test_extract_numeric_price() {
		let price = feed()
			.extract_price(&json!({ "ethereum": { "usd": 1850.25 } }))
			.unwrap();
		assert_eq!(price, Decimal::new(185025, 2));
	}

	#[test]
	fn test_extract_string_price() {
		let price = feed()
			.extract_price(&json!({ "ethereum": { "usd": " 2400 " } }))
			.unwrap();
		assert_eq!(price, Decimal::from(2400));
	}

	#[test]
	fn test_missing_price() {
		let result = feed().extract_price(&json!({ "bitcoin": { "usd": 1 } }));
		assert!(matches!(result, Err(FeedError::MissingPrice(path)) if path == "ethereum.usd"));
	}

	#[test]
	fn test_non_numeric_price() {
		let result = feed().extract_price(&json!({ "ethereum": { "usd": true } }));
		assert!(matches!(result, Err(FeedError::Parse(_))));
	}

	#[test]
	fn test_parse_exponent_form() {
		assert_eq!(parse_price(&json!(1.5e3)), Some(Decimal::from(1500)));
		assert_eq!(parse_price(&json!("1e2")), Some(Decimal::from(100)));
	}

	#[tokio::test]
	async fn test_unreachable_endpoint() {
		assert!(matches!(
			feed().reference_price().await,
			Err(FeedError::Network(_))
		));
	}
}
