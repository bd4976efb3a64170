use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::ProtocolId, money::Wei};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "protocol_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolStatus {
	Pending,
	Registered,
	Active,
	Paused,
	Deactivated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protocol {
	pub id: ProtocolId,
	pub owner_id: String,
	pub owner_address: String,
	pub source_url: String,
	pub branch: String,
	pub contract_path: String,
	pub contract_name: String,
	pub status: ProtocolStatus,
	pub on_chain_id: Option<u64>,
	pub total_bounty_pool: Wei,
	pub available_bounty: Wei,
	pub paid_bounty: Wei,
	pub risk_score: Option<u8>,
	pub error_message: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Input payload for a protocol registration request, prior to any
/// persistence. `Crypto::fingerprint` is computed over these same fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRegistrationInput {
	pub owner_address: String,
	pub source_url: String,
	pub branch: String,
	pub contract_path: String,
	pub contract_name: String,
}
