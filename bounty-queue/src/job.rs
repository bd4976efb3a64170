use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "queue_job_state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
	Pending,
	Running,
	Done,
	Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
	pub id: i64,
	pub queue_name: String,
	pub job_id: String,
	pub payload: serde_json::Value,
	pub state: JobState,
	pub attempts: u32,
	pub max_attempts: u32,
	pub run_at: DateTime<Utc>,
	pub locked_by: Option<String>,
	pub locked_at: Option<DateTime<Utc>>,
}

impl Job {
	/// Deserializes `payload` as `T`; the error maps to
	/// `QueueError::BadPayload`, a permanent (non-retried) failure since a
	/// malformed payload will never successfully deserialize on retry.
	pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> crate::error::Result<T> {
		Ok(serde_json::from_value(self.payload.clone())?)
	}
}

/// Options accepted by [`crate::Queue::enqueue`].
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
	pub max_attempts: u32,
	pub delay: Option<chrono::Duration>,
}

impl Default for EnqueueOptions {
	fn default() -> Self {
		Self { max_attempts: 3, delay: None }
	}
}
