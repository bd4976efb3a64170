use bounty_primitives::{
	ids::{AgentIdentityId, ProofId, ProtocolId, ScanId, ValidationId},
	validation::{Validation, ValidationOutcome},
};
use sqlx::PgPool;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct ValidationRow {
	id: ValidationId,
	proof_id: ProofId,
	scan_id: ScanId,
	protocol_id: ProtocolId,
	validator_agent_id: AgentIdentityId,
	result: ValidationOutcome,
	execution_log: String,
	state_changes: Option<serde_json::Value>,
	transaction_hash: Option<String>,
	gas_used: Option<i64>,
	failure_reason: Option<String>,
}

impl From<ValidationRow> for Validation {
	fn from(row: ValidationRow) -> Self {
		Validation {
			id: row.id,
			proof_id: row.proof_id,
			scan_id: row.scan_id,
			protocol_id: row.protocol_id,
			validator_agent_id: row.validator_agent_id,
			result: row.result,
			execution_log: row.execution_log,
			state_changes: row.state_changes,
			transaction_hash: row.transaction_hash,
			gas_used: row.gas_used.map(|v| v as u64),
			failure_reason: row.failure_reason,
		}
	}
}

#[derive(Clone)]
pub struct ValidationRepository {
	pool: PgPool,
}

impl ValidationRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: ValidationId) -> Result<Validation> {
		sqlx::query_as::<_, ValidationRow>("SELECT * FROM validations WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("validation {id}")))
	}

	pub async fn get_by_proof(&self, proof_id: ProofId) -> Result<Option<Validation>> {
		Ok(sqlx::query_as::<_, ValidationRow>("SELECT * FROM validations WHERE proof_id = $1")
			.bind(proof_id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into))
	}

	pub async fn insert(&self, validation: &Validation) -> Result<()> {
		sqlx::query(
			"INSERT INTO validations (id, proof_id, scan_id, protocol_id, validator_agent_id, result, \
			 execution_log, state_changes, transaction_hash, gas_used, failure_reason) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
		)
		.bind(validation.id)
		.bind(validation.proof_id)
		.bind(validation.scan_id)
		.bind(validation.protocol_id)
		.bind(validation.validator_agent_id)
		.bind(validation.result)
		.bind(&validation.execution_log)
		.bind(&validation.state_changes)
		.bind(&validation.transaction_hash)
		.bind(validation.gas_used.map(|v| v as i64))
		.bind(&validation.failure_reason)
		.execute(&self.pool)
		.await?;
		Ok(())
	}
}
