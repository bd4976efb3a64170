use bounty_primitives::{
	ids::ProtocolId,
	protocol::{Protocol, ProtocolStatus},
	Wei,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{Result, StoreError};

/// Column-shaped mirror of `Protocol`. On-chain ids and risk score are
/// stored as `i64`/`i32` since Postgres has no unsigned integer type; the
/// conversion back to the domain type happens once, here, rather than at
/// every call site.
#[derive(sqlx::FromRow)]
struct ProtocolRow {
	id: ProtocolId,
	owner_id: String,
	owner_address: String,
	source_url: String,
	branch: String,
	contract_path: String,
	contract_name: String,
	status: ProtocolStatus,
	on_chain_id: Option<i64>,
	total_bounty_pool: Wei,
	available_bounty: Wei,
	paid_bounty: Wei,
	risk_score: Option<i32>,
	error_message: Option<String>,
	created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProtocolRow> for Protocol {
	fn from(row: ProtocolRow) -> Self {
		Protocol {
			id: row.id,
			owner_id: row.owner_id,
			owner_address: row.owner_address,
			source_url: row.source_url,
			branch: row.branch,
			contract_path: row.contract_path,
			contract_name: row.contract_name,
			status: row.status,
			on_chain_id: row.on_chain_id.map(|v| v as u64),
			total_bounty_pool: row.total_bounty_pool,
			available_bounty: row.available_bounty,
			paid_bounty: row.paid_bounty,
			risk_score: row.risk_score.map(|v| v as u8),
			error_message: row.error_message,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone)]
pub struct ProtocolRepository {
	pool: PgPool,
}

impl ProtocolRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: ProtocolId) -> Result<Protocol> {
		sqlx::query_as::<_, ProtocolRow>("SELECT * FROM protocols WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("protocol {id}")))
	}

	pub async fn get_by_source_url(&self, source_url: &str) -> Result<Option<Protocol>> {
		Ok(sqlx::query_as::<_, ProtocolRow>("SELECT * FROM protocols WHERE source_url = $1")
			.bind(source_url)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into))
	}

	pub async fn list(&self, status: Option<ProtocolStatus>) -> Result<Vec<Protocol>> {
		let rows = match status {
			Some(status) => {
				sqlx::query_as::<_, ProtocolRow>(
					"SELECT * FROM protocols WHERE status = $1 ORDER BY created_at DESC",
				)
				.bind(status)
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query_as::<_, ProtocolRow>("SELECT * FROM protocols ORDER BY created_at DESC")
					.fetch_all(&self.pool)
					.await?
			}
		};
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn insert(&self, protocol: &Protocol) -> Result<()> {
		sqlx::query(
			"INSERT INTO protocols (id, owner_id, owner_address, source_url, branch, contract_path, \
			 contract_name, status, on_chain_id, total_bounty_pool, available_bounty, paid_bounty, \
			 risk_score, error_message, created_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
		)
		.bind(protocol.id)
		.bind(&protocol.owner_id)
		.bind(&protocol.owner_address)
		.bind(&protocol.source_url)
		.bind(&protocol.branch)
		.bind(&protocol.contract_path)
		.bind(&protocol.contract_name)
		.bind(protocol.status)
		.bind(protocol.on_chain_id.map(|v| v as i64))
		.bind(protocol.total_bounty_pool)
		.bind(protocol.available_bounty)
		.bind(protocol.paid_bounty)
		.bind(protocol.risk_score.map(|v| v as i32))
		.bind(&protocol.error_message)
		.bind(protocol.created_at)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn set_status(&self, id: ProtocolId, status: ProtocolStatus) -> Result<()> {
		sqlx::query("UPDATE protocols SET status = $2 WHERE id = $1")
			.bind(id)
			.bind(status)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// A pipeline step failure moves the protocol back to PENDING with the
	/// error captured, the same "terminal-ish state + errorMessage" shape
	/// `ScanRepository::advance` already gives scans.
	pub async fn reset_to_pending_with_error(&self, id: ProtocolId, error_message: &str) -> Result<()> {
		sqlx::query("UPDATE protocols SET status = 'PENDING', error_message = $2 WHERE id = $1")
			.bind(id)
			.bind(error_message)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn set_on_chain_id(&self, id: ProtocolId, on_chain_id: u64) -> Result<()> {
		sqlx::query("UPDATE protocols SET on_chain_id = $2, status = 'REGISTERED' WHERE id = $1")
			.bind(id)
			.bind(on_chain_id as i64)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn set_risk_score(&self, id: ProtocolId, risk_score: u8) -> Result<()> {
		sqlx::query("UPDATE protocols SET risk_score = $2 WHERE id = $1")
			.bind(id)
			.bind(risk_score as i32)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Atomically reserves `amount` out of `availableBounty`, failing with
	/// `ConcurrencyConflict` if the balance has since dropped below it - the
	/// compare-and-set the Payment pipeline relies on instead of a
	/// read-modify-write race.
	pub async fn reserve_bounty(
		&self,
		tx: &mut Transaction<'_, Postgres>,
		id: ProtocolId,
		amount: Wei,
	) -> Result<()> {
		let result = sqlx::query(
			"UPDATE protocols SET available_bounty = available_bounty - $2, paid_bounty = paid_bounty + $2 \
			 WHERE id = $1 AND available_bounty >= $2",
		)
		.bind(id)
		.bind(amount)
		.execute(&mut **tx)
		.await?;
		if result.rows_affected() == 0 {
			return Err(StoreError::ConcurrencyConflict(format!(
				"protocol {id} has insufficient available bounty for {amount}"
			)));
		}
		Ok(())
	}
}
