use serde::{Deserialize, Serialize};

use crate::ids::{AgentIdentityId, ProofId, ProtocolId, ScanId, ValidationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "validation_result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
	True,
	False,
	Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
	pub id: ValidationId,
	pub proof_id: ProofId,
	pub scan_id: ScanId,
	pub protocol_id: ProtocolId,
	pub validator_agent_id: AgentIdentityId,
	pub result: ValidationOutcome,
	pub execution_log: String,
	pub state_changes: Option<serde_json::Value>,
	pub transaction_hash: Option<String>,
	pub gas_used: Option<u64>,
	pub failure_reason: Option<String>,
}
