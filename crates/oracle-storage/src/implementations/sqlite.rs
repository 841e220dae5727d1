//! SQLite storage backend.
//!
//! Samples and the turn record live in one database file. Replicas on the
//! same host can share the file; WAL mode and a busy timeout let concurrent
//! writers wait instead of failing. The schema version is kept in
//! `PRAGMA user_version`.

use crate::{mean, SampleStoreInterface, StorageError, StorageService, TurnRegistryInterface};
use async_trait::async_trait;
use oracle_types::{ConfigSchema, Field, FieldType, PriceSample, Schema, TurnState, ValidationError};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

const SCHEMA_VERSION: u32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS price_samples (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    price       TEXT NOT NULL,
    observed_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_price_samples_observed_at ON price_samples (observed_at);

CREATE TABLE IF NOT EXISTS turn_state (
    id            INTEGER PRIMARY KEY CHECK (id = 0),
    replicas      TEXT NOT NULL,
    current_index INTEGER NOT NULL
);
";

const DEFAULT_BUSY_TIMEOUT_MS: i64 = 5_000;

/// SQLite-backed samples and turn record.
///
/// Every statement runs on the blocking thread pool, so a writer waiting on
/// `busy_timeout` never stalls an async worker. The mutex is only taken
/// inside those blocking tasks.
pub struct SqliteStorage {
	conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
	/// Opens or creates the database at `path` and applies the schema.
	pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StorageError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let conn = Connection::open(path).map_err(backend)?;
		conn.busy_timeout(busy_timeout).map_err(backend)?;
		conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
			.map_err(backend)?;
		migrate(&conn)?;

		info!(path = %path.display(), "Opened sqlite storage");
		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	/// Opens a private in-memory database.
	pub fn open_in_memory() -> Result<Self, StorageError> {
		let conn = Connection::open_in_memory().map_err(backend)?;
		migrate(&conn)?;
		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
	where
		F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
		T: Send + 'static,
	{
		let conn = self.conn.clone();
		tokio::task::spawn_blocking(move || {
			let conn = conn.lock().map_err(|_| {
				StorageError::Backend("sqlite connection lock poisoned".to_string())
			})?;
			f(&conn)
		})
		.await
		.map_err(|e| StorageError::Backend(format!("sqlite task failed: {}", e)))?
	}
}

fn backend(e: rusqlite::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

fn migrate(conn: &Connection) -> Result<(), StorageError> {
	let current_version: u32 = conn
		.pragma_query_value(None, "user_version", |row| row.get(0))
		.map_err(backend)?;

	if current_version > SCHEMA_VERSION {
		return Err(StorageError::InvalidState(format!(
			"Database version {} is newer than supported {}",
			current_version, SCHEMA_VERSION
		)));
	}

	if current_version < SCHEMA_VERSION {
		info!("Initializing storage schema v{}", SCHEMA_VERSION);
		conn.execute_batch(SCHEMA_V1).map_err(backend)?;
		conn.pragma_update(None, "user_version", SCHEMA_VERSION)
			.map_err(backend)?;
	}

	Ok(())
}

fn read_turn(conn: &Connection) -> Result<Option<TurnState>, StorageError> {
	let row = conn
		.query_row(
			"SELECT replicas, current_index FROM turn_state WHERE id = 0",
			[],
			|row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
		)
		.optional()
		.map_err(backend)?;

	let Some((replicas_json, current_index)) = row else {
		return Ok(None);
	};

	let replicas: Vec<String> = serde_json::from_str(&replicas_json)
		.map_err(|e| StorageError::Serialization(e.to_string()))?;
	let current_index = usize::try_from(current_index)
		.map_err(|_| StorageError::InvalidState(format!("Negative turn index {}", current_index)))?;

	TurnState::new(replicas, current_index)
		.map(Some)
		.map_err(|e| StorageError::InvalidState(e.to_string()))
}

#[async_trait]
impl SampleStoreInterface for SqliteStorage {
	async fn insert(&self, sample: &PriceSample) -> Result<(), StorageError> {
		let price = sample.price.to_string();
		let observed_at = sample.observed_at as i64;
		self.with_conn(move |conn| {
			conn.execute(
				"INSERT INTO price_samples (price, observed_at) VALUES (?1, ?2)",
				params![price, observed_at],
			)
			.map_err(backend)?;
			Ok(())
		})
		.await
	}

	async fn average_since(&self, since: u64) -> Result<Option<Decimal>, StorageError> {
		let prices = self.with_conn(move |conn| {
			let mut stmt = conn
				.prepare("SELECT price FROM price_samples WHERE observed_at > ?1")
				.map_err(backend)?;

			let raw = stmt
				.query_map([since as i64], |row| row.get::<_, String>(0))
				.map_err(backend)?
				.collect::<Result<Vec<_>, _>>()
				.map_err(backend)?;

			raw.iter()
				.map(|p| {
					Decimal::from_str(p).map_err(|e| {
						StorageError::Serialization(format!("Invalid stored price '{}': {}", p, e))
					})
				})
				.collect::<Result<Vec<_>, _>>()
		})
		.await?;

		mean(&prices)
	}

	async fn delete_older_than(&self, before: u64) -> Result<u64, StorageError> {
		self.with_conn(move |conn| {
			let deleted = conn
				.execute(
					"DELETE FROM price_samples WHERE observed_at < ?1",
					[before as i64],
				)
				.map_err(backend)?;
			Ok(deleted as u64)
		})
		.await
	}

	async fn count(&self) -> Result<u64, StorageError> {
		self.with_conn(|conn| {
			let count: i64 = conn
				.query_row("SELECT COUNT(*) FROM price_samples", [], |row| row.get(0))
				.map_err(backend)?;
			Ok(count as u64)
		})
		.await
	}
}

#[async_trait]
impl TurnRegistryInterface for SqliteStorage {
	async fn initialize(&self, replicas: &[String]) -> Result<TurnState, StorageError> {
		let seed = TurnState::new(replicas.to_vec(), 0)
			.map_err(|e| StorageError::InvalidState(e.to_string()))?;
		let replicas_json = serde_json::to_string(&seed.replicas)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;

		self.with_conn(move |conn| {
			conn.execute(
				"INSERT OR IGNORE INTO turn_state (id, replicas, current_index) VALUES (0, ?1, 0)",
				[replicas_json],
			)
			.map_err(backend)?;

			read_turn(conn)?.ok_or_else(|| StorageError::NotFound("turn state".to_string()))
		})
		.await
	}

	async fn read(&self) -> Result<TurnState, StorageError> {
		self.with_conn(|conn| {
			read_turn(conn)?.ok_or_else(|| StorageError::NotFound("turn state".to_string()))
		})
		.await
	}

	async fn advance(&self, expected: usize, next: usize) -> Result<bool, StorageError> {
		self.with_conn(move |conn| {
			let state =
				read_turn(conn)?.ok_or_else(|| StorageError::NotFound("turn state".to_string()))?;
			if next >= state.total_count() {
				return Err(StorageError::InvalidState(format!(
					"Index {} is out of range for {} replicas",
					next,
					state.total_count()
				)));
			}

			let updated = conn
				.execute(
					"UPDATE turn_state SET current_index = ?1 WHERE id = 0 AND current_index = ?2",
					[next as i64, expected as i64],
				)
				.map_err(backend)?;
			Ok(updated == 1)
		})
		.await
	}
}

/// Configuration schema for SqliteStorage.
pub struct SqliteStorageSchema;

impl ConfigSchema for SqliteStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("Database path must not be empty".to_string()),
				}
			})],
			// Optional fields
			vec![Field::new(
				"busy_timeout_ms",
				FieldType::Integer {
					min: Some(0),
					max: Some(60_000),
				},
			)],
		);

		schema.validate(config)
	}
}

/// Factory function to create a sqlite storage backend from configuration.
///
/// Configuration parameters:
/// - `path`: database file (required)
/// - `busy_timeout_ms`: how long a writer waits on a locked database (default: 5000)
pub fn create_storage(config: &toml::Value) -> Result<StorageService, StorageError> {
	SqliteStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.map(PathBuf::from)
		.ok_or_else(|| StorageError::Configuration("path is required".to_string()))?;

	let busy_timeout_ms = config
		.get("busy_timeout_ms")
		.and_then(|v| v.as_integer())
		.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

	let storage = SqliteStorage::open(&path, Duration::from_millis(busy_timeout_ms as u64))?;
	Ok(StorageService::from_backend(Arc::new(storage)))
}
