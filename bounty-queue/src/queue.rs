use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use crate::{
	error::{QueueError, Result},
	job::{EnqueueOptions, Job, JobState},
};

#[derive(sqlx::FromRow)]
struct JobRow {
	id: i64,
	queue_name: String,
	job_id: String,
	payload: serde_json::Value,
	state: JobState,
	attempts: i32,
	max_attempts: i32,
	run_at: chrono::DateTime<chrono::Utc>,
	locked_by: Option<String>,
	locked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<JobRow> for Job {
	fn from(row: JobRow) -> Self {
		Job {
			id: row.id,
			queue_name: row.queue_name,
			job_id: row.job_id,
			payload: row.payload,
			state: row.state,
			attempts: row.attempts as u32,
			max_attempts: row.max_attempts as u32,
			run_at: row.run_at,
			locked_by: row.locked_by,
			locked_at: row.locked_at,
		}
	}
}

/// A durable, Postgres-backed named job queue. `enqueue` is idempotent by
/// `(queue_name, job_id)`; `claim` uses `FOR UPDATE SKIP LOCKED` so many
/// pollers can share one queue without double-processing a row.
#[derive(Clone)]
pub struct Queue {
	pool: PgPool,
}

impl Queue {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn migrate(&self) -> Result<()> {
		sqlx::migrate!("./migrations").run(&self.pool).await?;
		Ok(())
	}

	/// Persists a new job unless `(queue_name, job_id)` already exists, in
	/// which case this is a silent no-op - the idempotent-enqueue guarantee
	/// is a single `INSERT ... ON CONFLICT DO NOTHING` rather than a
	/// check-then-insert race.
	pub async fn enqueue(
		&self,
		queue_name: &str,
		job_id: &str,
		payload: &serde_json::Value,
		opts: EnqueueOptions,
	) -> Result<()> {
		let run_at = Utc::now() + opts.delay.unwrap_or_else(chrono::Duration::zero);
		sqlx::query(
			"INSERT INTO queue_jobs (queue_name, job_id, payload, state, attempts, max_attempts, run_at) \
			 VALUES ($1, $2, $3, 'PENDING', 0, $4, $5) \
			 ON CONFLICT (queue_name, job_id) DO NOTHING",
		)
		.bind(queue_name)
		.bind(job_id)
		.bind(payload)
		.bind(opts.max_attempts as i32)
		.bind(run_at)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Claims at most one runnable job for `queue_name`, marking it RUNNING
	/// and locked by `worker_id`.
	pub async fn claim(&self, queue_name: &str, worker_id: &str) -> Result<Option<Job>> {
		let row = sqlx::query_as::<_, JobRow>(
			"UPDATE queue_jobs SET state = 'RUNNING', locked_by = $2, locked_at = now() \
			 WHERE id = ( \
			   SELECT id FROM queue_jobs \
			   WHERE queue_name = $1 AND state = 'PENDING' AND run_at <= now() \
			   ORDER BY run_at \
			   FOR UPDATE SKIP LOCKED \
			   LIMIT 1 \
			 ) \
			 RETURNING *",
		)
		.bind(queue_name)
		.bind(worker_id)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(Into::into))
	}

	pub async fn complete(&self, id: i64) -> Result<()> {
		sqlx::query("UPDATE queue_jobs SET state = 'DONE', locked_by = NULL, locked_at = NULL WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Schedules a retry at `run_at`, incrementing `attempts`. The caller
	/// (the poller) is the one who decided, via `CoreError::is_transient`,
	/// that this job deserves another attempt rather than
	/// [`fail_terminal`](Self::fail_terminal).
	pub async fn fail_retry(&self, id: i64, run_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
		sqlx::query(
			"UPDATE queue_jobs SET state = 'PENDING', attempts = attempts + 1, run_at = $2, \
			 locked_by = NULL, locked_at = NULL WHERE id = $1",
		)
		.bind(id)
		.bind(run_at)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn fail_terminal(&self, id: i64) -> Result<()> {
		sqlx::query(
			"UPDATE queue_jobs SET state = 'FAILED', locked_by = NULL, locked_at = NULL WHERE id = $1",
		)
		.bind(id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn get(&self, queue_name: &str, job_id: &str) -> Result<Job> {
		sqlx::query_as::<_, JobRow>("SELECT * FROM queue_jobs WHERE queue_name = $1 AND job_id = $2")
			.bind(queue_name)
			.bind(job_id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| QueueError::NotFound(format!("{queue_name}/{job_id}")))
	}

	pub async fn remove(&self, queue_name: &str, job_id: &str) -> Result<()> {
		sqlx::query("DELETE FROM queue_jobs WHERE queue_name = $1 AND job_id = $2")
			.bind(queue_name)
			.bind(job_id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn list_failed(&self, queue_name: &str) -> Result<Vec<Job>> {
		let rows = sqlx::query_as::<_, JobRow>(
			"SELECT * FROM queue_jobs WHERE queue_name = $1 AND state = 'FAILED' ORDER BY run_at",
		)
		.bind(queue_name)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}
}

/// How long a poller sleeps between empty `claim` calls when there is no
/// runnable job - avoids a hot loop hammering Postgres.
pub const EMPTY_POLL_INTERVAL: Duration = Duration::from_millis(250);
