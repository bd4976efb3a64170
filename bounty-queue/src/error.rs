use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
	#[error("job not found: {0}")]
	NotFound(String),

	#[error(transparent)]
	Database(#[from] sqlx::Error),

	#[error(transparent)]
	Migration(#[from] sqlx::migrate::MigrateError),

	#[error("job payload did not deserialize as the expected type: {0}")]
	BadPayload(#[from] serde_json::Error),
}

impl From<QueueError> for bounty_primitives::CoreError {
	fn from(err: QueueError) -> Self {
		match err {
			QueueError::NotFound(msg) => bounty_primitives::CoreError::NotFound(msg),
			QueueError::Database(e) => bounty_primitives::CoreError::Transient(e.to_string()),
			QueueError::Migration(e) => bounty_primitives::CoreError::Transient(e.to_string()),
			QueueError::BadPayload(e) => bounty_primitives::CoreError::Validation(e.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, QueueError>;
