use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FindingId, ProofId, ScanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proof_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
	Submitted,
	Validating,
	Confirmed,
	Rejected,
	Failed,
}

impl ProofStatus {
	/// The only transitions allowed by the data model: no back-transitions.
	pub fn can_transition_to(self, next: ProofStatus) -> bool {
		use ProofStatus::*;
		matches!(
			(self, next),
			(Submitted, Validating)
				| (Validating, Confirmed)
				| (Validating, Rejected)
				| (Validating, Failed)
		)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
	pub id: ProofId,
	pub finding_id: FindingId,
	pub scan_id: ScanId,
	pub encrypted_payload: Vec<u8>,
	pub encryption_key_id: String,
	pub researcher_signature: String,
	pub status: ProofStatus,
	pub submitted_at: DateTime<Utc>,
	pub validated_at: Option<DateTime<Utc>>,
	pub on_chain_validation_id: Option<u64>,
	pub on_chain_tx_hash: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_back_transitions() {
		assert!(ProofStatus::Submitted.can_transition_to(ProofStatus::Validating));
		assert!(!ProofStatus::Confirmed.can_transition_to(ProofStatus::Validating));
		assert!(!ProofStatus::Rejected.can_transition_to(ProofStatus::Confirmed));
	}
}
