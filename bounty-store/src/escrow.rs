use bounty_primitives::{
	ids::AgentIdentityId,
	escrow::{Escrow, EscrowTransaction, EscrowTransactionKind},
	Wei,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct EscrowRow {
	agent_identity_id: AgentIdentityId,
	balance: Wei,
	total_deposited: Wei,
	total_deducted: Wei,
}

impl From<EscrowRow> for Escrow {
	fn from(row: EscrowRow) -> Self {
		Escrow {
			agent_identity_id: row.agent_identity_id,
			balance: row.balance,
			total_deposited: row.total_deposited,
			total_deducted: row.total_deducted,
		}
	}
}

#[derive(Clone)]
pub struct EscrowRepository {
	pool: PgPool,
}

impl EscrowRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, agent_identity_id: AgentIdentityId) -> Result<Escrow> {
		sqlx::query_as::<_, EscrowRow>("SELECT * FROM escrows WHERE agent_identity_id = $1")
			.bind(agent_identity_id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("escrow {agent_identity_id}")))
	}

	pub async fn ensure_row(&self, agent_identity_id: AgentIdentityId) -> Result<()> {
		sqlx::query(
			"INSERT INTO escrows (agent_identity_id, balance, total_deposited, total_deducted) \
			 VALUES ($1, 0, 0, 0) ON CONFLICT (agent_identity_id) DO NOTHING",
		)
		.bind(agent_identity_id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn deposit(
		&self,
		tx: &mut Transaction<'_, Postgres>,
		agent_identity_id: AgentIdentityId,
		amount: Wei,
	) -> Result<()> {
		sqlx::query(
			"UPDATE escrows SET balance = balance + $2, total_deposited = total_deposited + $2 \
			 WHERE agent_identity_id = $1",
		)
		.bind(agent_identity_id)
		.bind(amount)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}

	/// Compare-and-set deduction, mirroring `ProtocolRepository::reserve_bounty`:
	/// a submission fee can never push a balance negative.
	pub async fn deduct(
		&self,
		tx: &mut Transaction<'_, Postgres>,
		agent_identity_id: AgentIdentityId,
		amount: Wei,
	) -> Result<()> {
		let result = sqlx::query(
			"UPDATE escrows SET balance = balance - $2, total_deducted = total_deducted + $2 \
			 WHERE agent_identity_id = $1 AND balance >= $2",
		)
		.bind(agent_identity_id)
		.bind(amount)
		.execute(&mut **tx)
		.await?;
		if result.rows_affected() == 0 {
			return Err(StoreError::ConcurrencyConflict(format!(
				"escrow {agent_identity_id} has insufficient balance for {amount}"
			)));
		}
		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct EscrowTransactionRow {
	id: Uuid,
	escrow_id: AgentIdentityId,
	kind: EscrowTransactionKind,
	amount: Wei,
	tx_hash: Option<String>,
	created_at: chrono::DateTime<chrono::Utc>,
}

impl From<EscrowTransactionRow> for EscrowTransaction {
	fn from(row: EscrowTransactionRow) -> Self {
		EscrowTransaction {
			id: row.id,
			escrow_id: row.escrow_id,
			kind: row.kind,
			amount: row.amount,
			tx_hash: row.tx_hash,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone)]
pub struct EscrowTransactionRepository {
	pool: PgPool,
}

impl EscrowTransactionRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn list_for_escrow(&self, escrow_id: AgentIdentityId) -> Result<Vec<EscrowTransaction>> {
		let rows = sqlx::query_as::<_, EscrowTransactionRow>(
			"SELECT * FROM escrow_transactions WHERE escrow_id = $1 ORDER BY created_at DESC",
		)
		.bind(escrow_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>, record: &EscrowTransaction) -> Result<()> {
		sqlx::query(
			"INSERT INTO escrow_transactions (id, escrow_id, kind, amount, tx_hash, created_at) \
			 VALUES ($1,$2,$3,$4,$5,$6)",
		)
		.bind(record.id)
		.bind(record.escrow_id)
		.bind(record.kind)
		.bind(record.amount)
		.bind(&record.tx_hash)
		.bind(record.created_at)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}
}
