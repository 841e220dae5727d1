//! Rotation state shared by every replica of the fleet.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ValidationError;

/// Singleton record naming whose turn it is to update the oracle.
///
/// `replicas` is the rotation order. `current_index` always points at a
/// valid position; use [`TurnState::new`] to build one from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
	pub replicas: Vec<String>,
	pub current_index: usize,
}

impl TurnState {
	/// Builds a turn state, rejecting empty or duplicated rotations and
	/// out-of-range indices.
	pub fn new(replicas: Vec<String>, current_index: usize) -> Result<Self, ValidationError> {
		validate_replicas(&replicas)?;

		if current_index >= replicas.len() {
			return Err(ValidationError::InvalidValue {
				field: "current_index".to_string(),
				message: format!(
					"Index {} is out of range for {} replicas",
					current_index,
					replicas.len()
				),
			});
		}

		Ok(Self {
			replicas,
			current_index,
		})
	}

	pub fn total_count(&self) -> usize {
		self.replicas.len()
	}

	/// Identity of the replica holding the turn.
	pub fn current_replica(&self) -> Option<&str> {
		self.replicas.get(self.current_index).map(String::as_str)
	}

	pub fn is_turn_of(&self, replica: &str) -> bool {
		self.current_replica() == Some(replica)
	}

	/// Index of the replica that holds the turn after this one.
	pub fn next_index(&self) -> usize {
		if self.replicas.is_empty() {
			return 0;
		}
		(self.current_index + 1) % self.replicas.len()
	}
}

/// Checks that a rotation list is non-empty and free of duplicates.
pub fn validate_replicas(replicas: &[String]) -> Result<(), ValidationError> {
	if replicas.is_empty() {
		return Err(ValidationError::InvalidValue {
			field: "replicas".to_string(),
			message: "At least one replica is required".to_string(),
		});
	}

	let mut seen = HashSet::new();
	for replica in replicas {
		if replica.trim().is_empty() {
			return Err(ValidationError::InvalidValue {
				field: "replicas".to_string(),
				message: "Replica names must not be empty".to_string(),
			});
		}
		if !seen.insert(replica.as_str()) {
			return Err(ValidationError::InvalidValue {
				field: "replicas".to_string(),
				message: format!("Duplicate replica '{}'", replica),
			});
		}
	}

	Ok(())
}
