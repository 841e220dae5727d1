//! Per-cycle decisions and the uniform result returned by every operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TransactionHash;

/// Status used for handled outcomes, including no-ops.
pub const STATUS_OK: u16 = 200;
/// Status used when there are no samples to average.
pub const STATUS_NOT_FOUND: u16 = 404;
/// Status used when a cycle fails with an unexpected error.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Which branch of the update pipeline fired this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum UpdateDecision {
	/// Another replica holds the turn.
	NotMyTurn { current: String },
	/// The contract was updated less than a staleness window ago.
	TooRecent { remaining_secs: u64 },
	/// The wallet cannot pay for a transaction; the turn was passed on.
	InsufficientFunds { balance: Decimal },
	/// No samples inside the averaging window.
	InsufficientData,
	/// The average is within tolerance of the contract price.
	WithinTolerance {
		average: Decimal,
		contract_price: Decimal,
	},
	/// A price update was submitted.
	Updated {
		price: Decimal,
		tx_hash: TransactionHash,
	},
}

impl UpdateDecision {
	pub fn status(&self) -> u16 {
		match self {
			UpdateDecision::InsufficientData => STATUS_NOT_FOUND,
			_ => STATUS_OK,
		}
	}

	/// Stable name of the branch, used as a log field.
	pub fn kind(&self) -> &'static str {
		match self {
			UpdateDecision::NotMyTurn { .. } => "not_my_turn",
			UpdateDecision::TooRecent { .. } => "too_recent",
			UpdateDecision::InsufficientFunds { .. } => "insufficient_funds",
			UpdateDecision::InsufficientData => "insufficient_data",
			UpdateDecision::WithinTolerance { .. } => "within_tolerance",
			UpdateDecision::Updated { .. } => "updated",
		}
	}

	/// Human-readable description of the outcome.
	pub fn describe(&self, tolerance: Decimal) -> String {
		match self {
			UpdateDecision::NotMyTurn { .. } => "not my turn yet.".to_string(),
			UpdateDecision::TooRecent { remaining_secs } => format!(
				"recently updated.. next call will be possible in {} seconds",
				remaining_secs
			),
			UpdateDecision::InsufficientFunds { .. } => {
				"not enough funds, changing order..".to_string()
			}
			UpdateDecision::InsufficientData => {
				"insufficient data on db, could not calculate avg price".to_string()
			}
			UpdateDecision::WithinTolerance { .. } => format!(
				"average price has not changed more than {}% of the current contract price",
				(tolerance * Decimal::ONE_HUNDRED).normalize()
			),
			UpdateDecision::Updated { tx_hash, .. } => {
				format!("successfully created transaction: {}", tx_hash)
			}
		}
	}
}

/// Result shape shared by the exposed operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
	pub status: u16,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
}

impl OperationResult {
	pub fn new(status: u16, message: impl Into<String>) -> Self {
		Self {
			status,
			message: message.into(),
			data: None,
		}
	}

	pub fn ok(message: impl Into<String>) -> Self {
		Self::new(STATUS_OK, message)
	}

	pub fn with_data(mut self, data: serde_json::Value) -> Self {
		self.data = Some(data);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_status_codes() {
		assert_eq!(UpdateDecision::InsufficientData.status(), STATUS_NOT_FOUND);
		assert_eq!(
			UpdateDecision::TooRecent { remaining_secs: 5 }.status(),
			STATUS_OK
		);
		assert_eq!(
			UpdateDecision::NotMyTurn {
				current: "b".into()
			}
			.status(),
			STATUS_OK
		);
	}

	#[test]
	fn test_describe_tolerance_percentage() {
		let decision = UpdateDecision::WithinTolerance {
			average: Decimal::from(100),
			contract_price: Decimal::from(100),
		};
		let message = decision.describe(Decimal::from_str("0.02").unwrap());
		assert!(message.contains("more than 2%"));
	}

	#[test]
	fn test_operation_result_omits_empty_data() {
		let json = serde_json::to_value(OperationResult::ok("done")).unwrap();
		assert_eq!(json, serde_json::json!({ "status": 200, "message": "done" }));
	}
}
