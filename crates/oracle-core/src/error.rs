use oracle_account::AccountError;
use oracle_chain::ChainError;
use oracle_feed::FeedError;
use oracle_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),

	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),

	#[error("Feed error: {0}")]
	Feed(#[from] FeedError),

	#[error("Account error: {0}")]
	Account(#[from] AccountError),

	#[error("Invalid turn state: {0}")]
	InvalidTurnState(String),

	#[error("Conversion error: {0}")]
	Conversion(String),

	#[error("Configuration error: {0}")]
	Config(String),
}
