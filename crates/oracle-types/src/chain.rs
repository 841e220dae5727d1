//! On-chain state and transaction identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Blockchain transaction hash representation.
///
/// Stores the hash as raw bytes; rendered and serialized as `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHash(pub Vec<u8>);

impl TransactionHash {
	/// Short form used in log lines.
	pub fn truncated(&self) -> String {
		let hash_str = hex_string(&self.0);
		if hash_str.len() <= 10 {
			hash_str
		} else {
			format!("{}..", &hash_str[..10])
		}
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&hex_string(&self.0))
	}
}

impl From<alloy::primitives::B256> for TransactionHash {
	fn from(hash: alloy::primitives::B256) -> Self {
		TransactionHash(hash.0.to_vec())
	}
}

impl Serialize for TransactionHash {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&hex_string(&self.0))
	}
}

impl<'de> Deserialize<'de> for TransactionHash {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let text = String::deserialize(deserializer)?;
		let digits = text.strip_prefix("0x").unwrap_or(&text);
		hex::decode(digits)
			.map(TransactionHash)
			.map_err(serde::de::Error::custom)
	}
}

fn hex_string(bytes: &[u8]) -> String {
	format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_and_truncate() {
		let hash = TransactionHash(vec![0xab; 32]);
		assert_eq!(hash.to_string(), format!("0x{}", "ab".repeat(32)));
		assert_eq!(hash.truncated(), "0xabababab..");
	}

	#[test]
	fn test_serializes_as_hex() {
		let hash = TransactionHash(vec![0x01, 0xff]);
		let json = serde_json::to_string(&hash).unwrap();
		assert_eq!(json, "\"0x01ff\"");
		assert_eq!(serde_json::from_str::<TransactionHash>(&json).unwrap(), hash);
	}
}
