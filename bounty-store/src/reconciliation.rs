use bounty_primitives::{
	ids::{PaymentId, ReconciliationId},
	reconciliation::{PaymentReconciliation, ReconciliationStatus},
	Wei,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct ReconciliationRow {
	id: ReconciliationId,
	payment_id: Option<PaymentId>,
	on_chain_bounty_id: i64,
	tx_hash: String,
	log_index: i64,
	amount: Wei,
	status: ReconciliationStatus,
	discovered_at: chrono::DateTime<chrono::Utc>,
	resolved_at: Option<chrono::DateTime<chrono::Utc>>,
	notes: Option<String>,
}

impl From<ReconciliationRow> for PaymentReconciliation {
	fn from(row: ReconciliationRow) -> Self {
		PaymentReconciliation {
			id: row.id,
			payment_id: row.payment_id,
			on_chain_bounty_id: row.on_chain_bounty_id as u64,
			tx_hash: row.tx_hash,
			log_index: row.log_index as u64,
			amount: row.amount,
			status: row.status,
			discovered_at: row.discovered_at,
			resolved_at: row.resolved_at,
			notes: row.notes,
		}
	}
}

#[derive(Clone)]
pub struct ReconciliationRepository {
	pool: PgPool,
}

impl ReconciliationRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: ReconciliationId) -> Result<PaymentReconciliation> {
		sqlx::query_as::<_, ReconciliationRow>("SELECT * FROM payment_reconciliations WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("reconciliation {id}")))
	}

	pub async fn list_by_status(&self, status: ReconciliationStatus) -> Result<Vec<PaymentReconciliation>> {
		let rows = sqlx::query_as::<_, ReconciliationRow>(
			"SELECT * FROM payment_reconciliations WHERE status = $1 ORDER BY discovered_at",
		)
		.bind(status)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn insert(&self, record: &PaymentReconciliation) -> Result<()> {
		sqlx::query(
			"INSERT INTO payment_reconciliations (id, payment_id, on_chain_bounty_id, tx_hash, \
			 log_index, amount, status, discovered_at, resolved_at, notes) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
		)
		.bind(record.id)
		.bind(record.payment_id)
		.bind(record.on_chain_bounty_id as i64)
		.bind(&record.tx_hash)
		.bind(record.log_index as i64)
		.bind(record.amount)
		.bind(record.status)
		.bind(record.discovered_at)
		.bind(record.resolved_at)
		.bind(&record.notes)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Variant of [`insert`](Self::insert) for callers already inside a
	/// transaction, e.g. the reconciler's "record row + advance checkpoint"
	/// write.
	pub async fn insert_tx(&self, tx: &mut Transaction<'_, Postgres>, record: &PaymentReconciliation) -> Result<()> {
		sqlx::query(
			"INSERT INTO payment_reconciliations (id, payment_id, on_chain_bounty_id, tx_hash, \
			 log_index, amount, status, discovered_at, resolved_at, notes) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
		)
		.bind(record.id)
		.bind(record.payment_id)
		.bind(record.on_chain_bounty_id as i64)
		.bind(&record.tx_hash)
		.bind(record.log_index as i64)
		.bind(record.amount)
		.bind(record.status)
		.bind(record.discovered_at)
		.bind(record.resolved_at)
		.bind(&record.notes)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}

	/// The on-chain event stream is the only writer that ever dedups on
	/// `(tx_hash, log_index)`; a duplicate notification becomes a no-op.
	pub async fn exists_for_log(&self, tx_hash: &str, log_index: u64) -> Result<bool> {
		let row: Option<(i32,)> = sqlx::query_as(
			"SELECT 1 FROM payment_reconciliations WHERE tx_hash = $1 AND log_index = $2",
		)
		.bind(tx_hash)
		.bind(log_index as i64)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.is_some())
	}

	/// Re-classifies an UNCONFIRMED row the sweeper has watched for longer
	/// than the escalation threshold without ever seeing a matching on-chain
	/// log. Distinct from [`resolve`](Self::resolve): this is still an open
	/// finding, just a more urgent one.
	pub async fn escalate_to_missing_payment(&self, id: ReconciliationId, notes: &str) -> Result<()> {
		sqlx::query("UPDATE payment_reconciliations SET status = 'MISSING_PAYMENT', notes = $2 WHERE id = $1")
			.bind(id)
			.bind(notes)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Orphaned/missing-payment records are never auto-resolved; this is
	/// only ever called from the manual-resolution admin path. Prefer
	/// [`Repositories::resolve_reconciliation`], which also marks the linked
	/// payment reconciled in the same transaction when there is one.
	pub async fn resolve(&self, id: ReconciliationId, notes: &str) -> Result<()> {
		sqlx::query(
			"UPDATE payment_reconciliations SET status = 'RESOLVED', resolved_at = now(), notes = $2 \
			 WHERE id = $1",
		)
		.bind(id)
		.bind(notes)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Variant of [`resolve`](Self::resolve) for callers already inside a
	/// transaction, e.g. the composite "resolve + mark payment reconciled"
	/// write.
	pub async fn resolve_tx(&self, tx: &mut Transaction<'_, Postgres>, id: ReconciliationId, notes: &str) -> Result<()> {
		sqlx::query(
			"UPDATE payment_reconciliations SET status = 'RESOLVED', resolved_at = now(), notes = $2 \
			 WHERE id = $1",
		)
		.bind(id)
		.bind(notes)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}
}
