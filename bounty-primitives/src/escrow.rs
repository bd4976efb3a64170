use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::AgentIdentityId, money::Wei};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "escrow_tx_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowTransactionKind {
	Deposit,
	SubmissionFee,
	Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
	pub agent_identity_id: AgentIdentityId,
	pub balance: Wei,
	pub total_deposited: Wei,
	pub total_deducted: Wei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
	pub id: uuid::Uuid,
	pub escrow_id: AgentIdentityId,
	pub kind: EscrowTransactionKind,
	pub amount: Wei,
	pub tx_hash: Option<String>,
	pub created_at: DateTime<Utc>,
}
