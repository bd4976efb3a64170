use bounty_primitives::{
	ids::{ProtocolId, ScanId},
	scan::{Scan, ScanState, ToolStatus},
};
use sqlx::PgPool;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct ScanRow {
	id: ScanId,
	protocol_id: ProtocolId,
	state: ScanState,
	current_step: String,
	target_branch: Option<String>,
	target_commit: Option<String>,
	retry_count: i32,
	tool_status: Option<ToolStatus>,
	started_at: Option<chrono::DateTime<chrono::Utc>>,
	completed_at: Option<chrono::DateTime<chrono::Utc>>,
	error_code: Option<String>,
	error_message: Option<String>,
}

impl From<ScanRow> for Scan {
	fn from(row: ScanRow) -> Self {
		Scan {
			id: row.id,
			protocol_id: row.protocol_id,
			state: row.state,
			current_step: row.current_step,
			target_branch: row.target_branch,
			target_commit: row.target_commit,
			retry_count: row.retry_count as u32,
			tool_status: row.tool_status,
			started_at: row.started_at,
			completed_at: row.completed_at,
			error_code: row.error_code,
			error_message: row.error_message,
		}
	}
}

#[derive(Clone)]
pub struct ScanRepository {
	pool: PgPool,
}

impl ScanRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: ScanId) -> Result<Scan> {
		sqlx::query_as::<_, ScanRow>("SELECT * FROM scans WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("scan {id}")))
	}

	pub async fn list_by_protocol(&self, protocol_id: ProtocolId) -> Result<Vec<Scan>> {
		let rows = sqlx::query_as::<_, ScanRow>(
			"SELECT * FROM scans WHERE protocol_id = $1 ORDER BY started_at DESC NULLS LAST",
		)
		.bind(protocol_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn insert(&self, scan: &Scan) -> Result<()> {
		sqlx::query(
			"INSERT INTO scans (id, protocol_id, state, current_step, target_branch, target_commit, \
			 retry_count, tool_status, started_at, completed_at, error_code, error_message) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
		)
		.bind(scan.id)
		.bind(scan.protocol_id)
		.bind(scan.state)
		.bind(&scan.current_step)
		.bind(&scan.target_branch)
		.bind(&scan.target_commit)
		.bind(scan.retry_count as i32)
		.bind(scan.tool_status)
		.bind(scan.started_at)
		.bind(scan.completed_at)
		.bind(&scan.error_code)
		.bind(&scan.error_message)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Transitions to the next step, updating `started_at`/`completed_at`
	/// consistently with `ScanState::is_terminal`.
	pub async fn advance(
		&self,
		id: ScanId,
		state: ScanState,
		current_step: &str,
		error: Option<(&str, &str)>,
	) -> Result<()> {
		let now = chrono::Utc::now();
		let (started_at, completed_at) = match state {
			ScanState::Running => (Some(now), None),
			s if s.is_terminal() => (None, Some(now)),
			_ => (None, None),
		};
		sqlx::query(
			"UPDATE scans SET state = $2, current_step = $3, \
			 started_at = COALESCE($4, started_at), completed_at = COALESCE($5, completed_at), \
			 error_code = $6, error_message = $7 WHERE id = $1",
		)
		.bind(id)
		.bind(state)
		.bind(current_step)
		.bind(started_at)
		.bind(completed_at)
		.bind(error.map(|e| e.0))
		.bind(error.map(|e| e.1))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn set_tool_status(&self, id: ScanId, tool_status: ToolStatus) -> Result<()> {
		sqlx::query("UPDATE scans SET tool_status = $2 WHERE id = $1")
			.bind(id)
			.bind(tool_status)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn increment_retry(&self, id: ScanId) -> Result<()> {
		sqlx::query("UPDATE scans SET retry_count = retry_count + 1 WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}
