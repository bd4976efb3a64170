use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::PaymentId, money::Wei};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
	pub id: PaymentId,
	pub vulnerability_id: String,
	pub researcher_address: String,
	pub amount: Wei,
	pub currency: String,
	pub status: PaymentStatus,
	pub tx_hash: Option<String>,
	pub on_chain_bounty_id: Option<u64>,
	pub failure_reason: Option<String>,
	pub retry_count: u32,
	pub reconciled: bool,
	pub reconciled_at: Option<DateTime<Utc>>,
	pub queued_at: DateTime<Utc>,
	pub processed_at: Option<DateTime<Utc>>,
	pub paid_at: Option<DateTime<Utc>>,
	/// Set by `propose_manual`; gates the confirmed-validation check in the
	/// payment pipeline per the Open Question decision in DESIGN.md.
	pub admin_override: bool,
}
