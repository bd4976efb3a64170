use bounty_primitives::{
	ids::PaymentId,
	payment::{Payment, PaymentStatus},
	Wei,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct PaymentRow {
	id: PaymentId,
	vulnerability_id: String,
	researcher_address: String,
	amount: Wei,
	currency: String,
	status: PaymentStatus,
	tx_hash: Option<String>,
	on_chain_bounty_id: Option<i64>,
	failure_reason: Option<String>,
	retry_count: i32,
	reconciled: bool,
	reconciled_at: Option<chrono::DateTime<chrono::Utc>>,
	queued_at: chrono::DateTime<chrono::Utc>,
	processed_at: Option<chrono::DateTime<chrono::Utc>>,
	paid_at: Option<chrono::DateTime<chrono::Utc>>,
	admin_override: bool,
}

impl From<PaymentRow> for Payment {
	fn from(row: PaymentRow) -> Self {
		Payment {
			id: row.id,
			vulnerability_id: row.vulnerability_id,
			researcher_address: row.researcher_address,
			amount: row.amount,
			currency: row.currency,
			status: row.status,
			tx_hash: row.tx_hash,
			on_chain_bounty_id: row.on_chain_bounty_id.map(|v| v as u64),
			failure_reason: row.failure_reason,
			retry_count: row.retry_count as u32,
			reconciled: row.reconciled,
			reconciled_at: row.reconciled_at,
			queued_at: row.queued_at,
			processed_at: row.processed_at,
			paid_at: row.paid_at,
			admin_override: row.admin_override,
		}
	}
}

#[derive(Clone)]
pub struct PaymentRepository {
	pool: PgPool,
}

impl PaymentRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: PaymentId) -> Result<Payment> {
		sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("payment {id}")))
	}

	pub async fn get_by_on_chain_bounty_id(&self, on_chain_bounty_id: u64) -> Result<Option<Payment>> {
		Ok(sqlx::query_as::<_, PaymentRow>(
			"SELECT * FROM payments WHERE on_chain_bounty_id = $1",
		)
		.bind(on_chain_bounty_id as i64)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into))
	}

	/// Scoped listing for the Payments API surface.
	pub async fn list(&self, status: Option<PaymentStatus>, researcher_address: Option<&str>) -> Result<Vec<Payment>> {
		let rows = sqlx::query_as::<_, PaymentRow>(
			"SELECT * FROM payments WHERE ($1::payment_status IS NULL OR status = $1) \
			 AND ($2::text IS NULL OR researcher_address = $2) ORDER BY queued_at DESC",
		)
		.bind(status)
		.bind(researcher_address)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// Top researcher addresses by COMPLETED earnings since `since`, for the
	/// leaderboard.
	pub async fn leaderboard(&self, since: chrono::DateTime<chrono::Utc>, limit: u32) -> Result<Vec<(String, Wei)>> {
		let rows: Vec<(String, Wei)> = sqlx::query_as(
			"SELECT researcher_address, SUM(amount) FROM payments WHERE status = 'COMPLETED' \
			 AND paid_at >= $1 GROUP BY researcher_address ORDER BY SUM(amount) DESC LIMIT $2",
		)
		.bind(since)
		.bind(limit as i64)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	pub async fn insert(&self, payment: &Payment) -> Result<()> {
		sqlx::query(
			"INSERT INTO payments (id, vulnerability_id, researcher_address, amount, currency, status, \
			 tx_hash, on_chain_bounty_id, failure_reason, retry_count, reconciled, reconciled_at, \
			 queued_at, processed_at, paid_at, admin_override) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
		)
		.bind(payment.id)
		.bind(&payment.vulnerability_id)
		.bind(&payment.researcher_address)
		.bind(payment.amount)
		.bind(&payment.currency)
		.bind(payment.status)
		.bind(&payment.tx_hash)
		.bind(payment.on_chain_bounty_id.map(|v| v as i64))
		.bind(&payment.failure_reason)
		.bind(payment.retry_count as i32)
		.bind(payment.reconciled)
		.bind(payment.reconciled_at)
		.bind(payment.queued_at)
		.bind(payment.processed_at)
		.bind(payment.paid_at)
		.bind(payment.admin_override)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Variant of [`insert`](Self::insert) for callers already inside a
	/// transaction, e.g. the reserve-bounty-then-create-payment write.
	pub async fn insert_tx(&self, tx: &mut Transaction<'_, Postgres>, payment: &Payment) -> Result<()> {
		sqlx::query(
			"INSERT INTO payments (id, vulnerability_id, researcher_address, amount, currency, status, \
			 tx_hash, on_chain_bounty_id, failure_reason, retry_count, reconciled, reconciled_at, \
			 queued_at, processed_at, paid_at, admin_override) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
		)
		.bind(payment.id)
		.bind(&payment.vulnerability_id)
		.bind(&payment.researcher_address)
		.bind(payment.amount)
		.bind(&payment.currency)
		.bind(payment.status)
		.bind(&payment.tx_hash)
		.bind(payment.on_chain_bounty_id.map(|v| v as i64))
		.bind(&payment.failure_reason)
		.bind(payment.retry_count as i32)
		.bind(payment.reconciled)
		.bind(payment.reconciled_at)
		.bind(payment.queued_at)
		.bind(payment.processed_at)
		.bind(payment.paid_at)
		.bind(payment.admin_override)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}

	pub async fn mark_failed(&self, id: PaymentId, reason: &str) -> Result<()> {
		sqlx::query(
			"UPDATE payments SET status = 'FAILED', failure_reason = $2, processed_at = now() WHERE id = $1",
		)
		.bind(id)
		.bind(reason)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn increment_retry(&self, id: PaymentId) -> Result<()> {
		sqlx::query("UPDATE payments SET retry_count = retry_count + 1 WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn mark_completed(
		&self,
		id: PaymentId,
		tx_hash: &str,
		on_chain_bounty_id: u64,
	) -> Result<()> {
		sqlx::query(
			"UPDATE payments SET status = 'COMPLETED', tx_hash = $2, on_chain_bounty_id = $3, \
			 paid_at = now(), processed_at = now() WHERE id = $1",
		)
		.bind(id)
		.bind(tx_hash)
		.bind(on_chain_bounty_id as i64)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Marks a payment reconciled against an observed on-chain event,
	/// without overwriting `tx_hash` if it already disagrees (the
	/// reconciler records a discrepancy in that case instead).
	pub async fn mark_reconciled(
		&self,
		id: PaymentId,
		paid_at: chrono::DateTime<chrono::Utc>,
		tx_hash_if_unset: &str,
	) -> Result<()> {
		sqlx::query(
			"UPDATE payments SET status = 'COMPLETED', reconciled = true, reconciled_at = now(), \
			 paid_at = $2, tx_hash = COALESCE(tx_hash, $3) WHERE id = $1",
		)
		.bind(id)
		.bind(paid_at)
		.bind(tx_hash_if_unset)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Variant of [`mark_reconciled`](Self::mark_reconciled) for the
	/// reconciler's clean-match path, which writes the reconciliation row and
	/// this update in the same transaction.
	pub async fn mark_reconciled_tx(
		&self,
		tx: &mut Transaction<'_, Postgres>,
		id: PaymentId,
		paid_at: chrono::DateTime<chrono::Utc>,
		tx_hash_if_unset: &str,
	) -> Result<()> {
		sqlx::query(
			"UPDATE payments SET status = 'COMPLETED', reconciled = true, reconciled_at = now(), \
			 paid_at = $2, tx_hash = COALESCE(tx_hash, $3) WHERE id = $1",
		)
		.bind(id)
		.bind(paid_at)
		.bind(tx_hash_if_unset)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}

	/// Flips `reconciled`/`reconciled_at` alone, for a payment that was
	/// already COMPLETED by the payment pipeline (with its own `paid_at`/
	/// `tx_hash`) and is only now being vouched for by a manually-resolved
	/// UNCONFIRMED/MISSING_PAYMENT finding.
	pub async fn mark_reconciled_flag_only_tx(&self, tx: &mut Transaction<'_, Postgres>, id: PaymentId) -> Result<()> {
		sqlx::query("UPDATE payments SET reconciled = true, reconciled_at = now() WHERE id = $1")
			.bind(id)
			.execute(&mut **tx)
			.await?;
		Ok(())
	}

	/// Completed payments not yet reconciled, older than `threshold_secs`,
	/// for the UNCONFIRMED sweeper.
	pub async fn list_unreconciled_older_than(&self, threshold_secs: i64) -> Result<Vec<Payment>> {
		let rows = sqlx::query_as::<_, PaymentRow>(
			"SELECT * FROM payments WHERE status = 'COMPLETED' AND reconciled = false \
			 AND paid_at < now() - ($1 || ' seconds')::interval",
		)
		.bind(threshold_secs.to_string())
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// FAILED payments whose `failure_reason` starts with `prefix`, for the
	/// amount-repair function to find the ones it put there itself.
	pub async fn list_failed_with_reason_prefix(&self, prefix: &str) -> Result<Vec<Payment>> {
		let rows = sqlx::query_as::<_, PaymentRow>(
			"SELECT * FROM payments WHERE status = 'FAILED' AND failure_reason LIKE $1",
		)
		.bind(format!("{prefix}%"))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// Re-arms a payment the repair tool has re-priced: clears the stale
	/// failure and hands it back to `PENDING` so the re-enqueued job runs it
	/// through the normal pipeline again.
	pub async fn repair_amount(&self, id: PaymentId, amount: Wei) -> Result<()> {
		sqlx::query(
			"UPDATE payments SET amount = $2, status = 'PENDING', failure_reason = NULL, \
			 retry_count = 0 WHERE id = $1",
		)
		.bind(id)
		.bind(amount)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Re-arms a FAILED payment for the `retryFailed` API without touching
	/// `amount` - unlike [`repair_amount`](Self::repair_amount) this is for
	/// failures that were never an amount mismatch (e.g. a transient chain
	/// error that exhausted the queue's retry budget).
	pub async fn reset_for_retry(&self, id: PaymentId) -> Result<()> {
		sqlx::query(
			"UPDATE payments SET status = 'PENDING', failure_reason = NULL, retry_count = 0 WHERE id = $1",
		)
		.bind(id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn earnings_for_address(
		&self,
		address: &str,
		since: chrono::DateTime<chrono::Utc>,
	) -> Result<Wei> {
		let total: Option<Wei> = sqlx::query_scalar(
			"SELECT SUM(amount) FROM payments WHERE researcher_address = $1 AND status = 'COMPLETED' \
			 AND paid_at >= $2",
		)
		.bind(address)
		.bind(since)
		.fetch_one(&self.pool)
		.await?;
		Ok(total.unwrap_or(Wei::ZERO))
	}
}
