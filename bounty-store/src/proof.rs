use bounty_primitives::{
	ids::{FindingId, ProofId, ScanId},
	proof::{Proof, ProofStatus},
};
use sqlx::PgPool;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct ProofRow {
	id: ProofId,
	finding_id: FindingId,
	scan_id: ScanId,
	encrypted_payload: Vec<u8>,
	encryption_key_id: String,
	researcher_signature: String,
	status: ProofStatus,
	submitted_at: chrono::DateTime<chrono::Utc>,
	validated_at: Option<chrono::DateTime<chrono::Utc>>,
	on_chain_validation_id: Option<i64>,
	on_chain_tx_hash: Option<String>,
}

impl From<ProofRow> for Proof {
	fn from(row: ProofRow) -> Self {
		Proof {
			id: row.id,
			finding_id: row.finding_id,
			scan_id: row.scan_id,
			encrypted_payload: row.encrypted_payload,
			encryption_key_id: row.encryption_key_id,
			researcher_signature: row.researcher_signature,
			status: row.status,
			submitted_at: row.submitted_at,
			validated_at: row.validated_at,
			on_chain_validation_id: row.on_chain_validation_id.map(|v| v as u64),
			on_chain_tx_hash: row.on_chain_tx_hash,
		}
	}
}

#[derive(Clone)]
pub struct ProofRepository {
	pool: PgPool,
}

impl ProofRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: ProofId) -> Result<Proof> {
		sqlx::query_as::<_, ProofRow>("SELECT * FROM proofs WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("proof {id}")))
	}

	/// Most recent proof submitted for a finding. A finding may accumulate
	/// more than one REJECTED/FAILED proof across retries before one is
	/// CONFIRMED, so this is used only where "the proof that confirmed this
	/// finding" is what's wanted (e.g. the Payment pipeline resolving the
	/// on-chain validation id to release a bounty against).
	pub async fn get_by_finding(&self, finding_id: FindingId) -> Result<Proof> {
		sqlx::query_as::<_, ProofRow>(
			"SELECT * FROM proofs WHERE finding_id = $1 ORDER BY submitted_at DESC LIMIT 1",
		)
		.bind(finding_id)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into)
		.ok_or_else(|| StoreError::NotFound(format!("proof for finding {finding_id}")))
	}

	pub async fn insert(&self, proof: &Proof) -> Result<()> {
		sqlx::query(
			"INSERT INTO proofs (id, finding_id, scan_id, encrypted_payload, encryption_key_id, \
			 researcher_signature, status, submitted_at, validated_at, on_chain_validation_id, \
			 on_chain_tx_hash) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
		)
		.bind(proof.id)
		.bind(proof.finding_id)
		.bind(proof.scan_id)
		.bind(&proof.encrypted_payload)
		.bind(&proof.encryption_key_id)
		.bind(&proof.researcher_signature)
		.bind(proof.status)
		.bind(proof.submitted_at)
		.bind(proof.validated_at)
		.bind(proof.on_chain_validation_id.map(|v| v as i64))
		.bind(&proof.on_chain_tx_hash)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Enforces the no-back-transitions rule at the data layer, not just in
	/// `ProofStatus::can_transition_to` - a row whose current status
	/// doesn't match `from` is left untouched and the caller sees zero rows
	/// affected as a signal to re-read and retry.
	pub async fn transition(&self, id: ProofId, from: ProofStatus, to: ProofStatus) -> Result<bool> {
		if !from.can_transition_to(to) {
			return Ok(false);
		}
		let result = sqlx::query(
			"UPDATE proofs SET status = $3, validated_at = CASE WHEN $3 != 'VALIDATING' THEN now() \
			 ELSE validated_at END WHERE id = $1 AND status = $2",
		)
		.bind(id)
		.bind(from)
		.bind(to)
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() == 1)
	}

	pub async fn record_on_chain(&self, id: ProofId, validation_id: u64, tx_hash: &str) -> Result<()> {
		sqlx::query(
			"UPDATE proofs SET on_chain_validation_id = $2, on_chain_tx_hash = $3 WHERE id = $1",
		)
		.bind(id)
		.bind(validation_id as i64)
		.bind(tx_hash)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Proofs currently in `status`, for the Validations API's `getActive`
	/// (status = VALIDATING).
	pub async fn list_by_status(&self, status: ProofStatus) -> Result<Vec<Proof>> {
		let rows = sqlx::query_as::<_, ProofRow>("SELECT * FROM proofs WHERE status = $1 ORDER BY submitted_at DESC")
			.bind(status)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// Proofs stuck in SUBMITTED/VALIDATING past `threshold_secs`, for the
	/// stuck-proof sweeper.
	pub async fn list_stale(&self, threshold_secs: i64) -> Result<Vec<Proof>> {
		let rows = sqlx::query_as::<_, ProofRow>(
			"SELECT * FROM proofs WHERE status IN ('SUBMITTED', 'VALIDATING') \
			 AND submitted_at < now() - ($1 || ' seconds')::interval",
		)
		.bind(threshold_secs.to_string())
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}
}
