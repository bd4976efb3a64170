use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
	#[error("row not found: {0}")]
	NotFound(String),

	#[error("optimistic concurrency check failed: {0}")]
	ConcurrencyConflict(String),

	#[error(transparent)]
	Database(#[from] sqlx::Error),

	#[error(transparent)]
	Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StoreError> for bounty_primitives::CoreError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(msg) => bounty_primitives::CoreError::NotFound(msg),
			StoreError::ConcurrencyConflict(msg) => bounty_primitives::CoreError::Transient(msg),
			StoreError::Database(e) => bounty_primitives::CoreError::Transient(e.to_string()),
			StoreError::Migration(e) => bounty_primitives::CoreError::Transient(e.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, StoreError>;
