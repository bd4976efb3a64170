use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::PaymentId, ids::ReconciliationId, money::Wei};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reconciliation_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
	Orphaned,
	AmountMismatch,
	Discrepancy,
	MissingPayment,
	Unconfirmed,
	Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReconciliation {
	pub id: ReconciliationId,
	pub payment_id: Option<PaymentId>,
	pub on_chain_bounty_id: u64,
	pub tx_hash: String,
	pub log_index: u64,
	pub amount: Wei,
	pub status: ReconciliationStatus,
	pub discovered_at: DateTime<Utc>,
	pub resolved_at: Option<DateTime<Utc>>,
	pub notes: Option<String>,
}
