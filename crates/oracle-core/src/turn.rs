//! Rotation of the shared turn record.

use crate::CoreError;
use oracle_storage::StorageService;
use oracle_types::TurnState;
use tracing::{info, warn};

/// Passes the turn on from `observed` with a conditional write.
///
/// A lost race is not an error: it means another replica already rotated
/// the record. Returns whether this call applied the write.
pub(crate) async fn rotate_from(
	storage: &StorageService,
	observed: &TurnState,
) -> Result<bool, CoreError> {
	let applied = storage.advance_turn(observed).await?;
	if applied {
		info!(
			from = observed.current_index,
			to = observed.next_index(),
			"Changed turn"
		);
	} else {
		warn!(
			expected = observed.current_index,
			"Turn was already advanced by another replica"
		);
	}
	Ok(applied)
}

/// Reads the turn record, advances it by one position and returns the
/// stored record afterwards.
pub async fn advance_turn(storage: &StorageService) -> Result<TurnState, CoreError> {
	let observed = storage.read_turn().await?;
	rotate_from(storage, &observed).await?;
	Ok(storage.read_turn().await?)
}
