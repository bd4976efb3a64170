use bounty_primitives::{
	fee_request::{FeeRequest, FeeRequestStatus, FeeRequestType},
	ids::{FeeRequestId, ProtocolId},
	Wei,
};
use sqlx::PgPool;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct FeeRequestRow {
	id: FeeRequestId,
	request_type: FeeRequestType,
	requester_address: String,
	amount: Wei,
	status: FeeRequestStatus,
	tx_hash: Option<String>,
	fingerprint: Option<String>,
	protocol_id: Option<ProtocolId>,
	expires_at: chrono::DateTime<chrono::Utc>,
	completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<FeeRequestRow> for FeeRequest {
	fn from(row: FeeRequestRow) -> Self {
		FeeRequest {
			id: row.id,
			request_type: row.request_type,
			requester_address: row.requester_address,
			amount: row.amount,
			status: row.status,
			tx_hash: row.tx_hash,
			fingerprint: row.fingerprint,
			protocol_id: row.protocol_id,
			expires_at: row.expires_at,
			completed_at: row.completed_at,
		}
	}
}

#[derive(Clone)]
pub struct FeeRequestRepository {
	pool: PgPool,
}

impl FeeRequestRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: FeeRequestId) -> Result<FeeRequest> {
		sqlx::query_as::<_, FeeRequestRow>("SELECT * FROM fee_requests WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("fee request {id}")))
	}

	/// Finds a still-pending, unexpired request with the same fingerprint so
	/// a retried client gets back the original 402 challenge instead of a
	/// fresh one.
	pub async fn find_active_by_fingerprint(&self, fingerprint: &str) -> Result<Option<FeeRequest>> {
		Ok(sqlx::query_as::<_, FeeRequestRow>(
			"SELECT * FROM fee_requests WHERE fingerprint = $1 AND status = 'PENDING' \
			 AND expires_at > now() ORDER BY expires_at DESC LIMIT 1",
		)
		.bind(fingerprint)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into))
	}

	/// The most recent COMPLETED request with `fingerprint`, completed no
	/// earlier than `since` - the retry-window bypass for a repeated
	/// registration payload.
	pub async fn find_recent_completed_by_fingerprint(
		&self,
		fingerprint: &str,
		since: chrono::DateTime<chrono::Utc>,
	) -> Result<Option<FeeRequest>> {
		Ok(sqlx::query_as::<_, FeeRequestRow>(
			"SELECT * FROM fee_requests WHERE fingerprint = $1 AND status = 'COMPLETED' \
			 AND completed_at >= $2 ORDER BY completed_at DESC LIMIT 1",
		)
		.bind(fingerprint)
		.bind(since)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into))
	}

	pub async fn insert(&self, request: &FeeRequest) -> Result<()> {
		sqlx::query(
			"INSERT INTO fee_requests (id, request_type, requester_address, amount, status, tx_hash, \
			 fingerprint, protocol_id, expires_at, completed_at) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
		)
		.bind(request.id)
		.bind(request.request_type)
		.bind(&request.requester_address)
		.bind(request.amount)
		.bind(request.status)
		.bind(&request.tx_hash)
		.bind(&request.fingerprint)
		.bind(request.protocol_id)
		.bind(request.expires_at)
		.bind(request.completed_at)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn mark_completed(&self, id: FeeRequestId, tx_hash: &str) -> Result<()> {
		sqlx::query(
			"UPDATE fee_requests SET status = 'COMPLETED', tx_hash = $2, completed_at = now() \
			 WHERE id = $1 AND status = 'PENDING'",
		)
		.bind(id)
		.bind(tx_hash)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn expire_due(&self) -> Result<u64> {
		let result = sqlx::query(
			"UPDATE fee_requests SET status = 'EXPIRED' WHERE status = 'PENDING' AND expires_at <= now()",
		)
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected())
	}
}
