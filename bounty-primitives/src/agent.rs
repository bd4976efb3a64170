use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentIdentityId, FindingId, ValidationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "agent_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentType {
	Researcher,
	Validator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
	pub id: AgentIdentityId,
	pub wallet_address: String,
	pub agent_type: AgentType,
	pub active: bool,
	pub on_chain_token_id: Option<u64>,
	pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentReputation {
	pub agent_identity_id: AgentIdentityId,
	pub confirmed_count: u32,
	pub rejected_count: u32,
	pub inconclusive_count: u32,
	pub total_submissions: u32,
	pub score: f64,
	pub last_updated: DateTime<Utc>,
}

impl AgentReputation {
	/// `score` is derived, but the invariant the data model asks for is on
	/// the counts, not the score itself.
	pub fn counts_consistent(&self) -> bool {
		self.total_submissions == self.confirmed_count + self.rejected_count + self.inconclusive_count
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "feedback_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
	ConfirmedCritical,
	ConfirmedHigh,
	ConfirmedMedium,
	ConfirmedLow,
	ConfirmedInformational,
	Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFeedback {
	pub id: uuid::Uuid,
	pub researcher_agent_id: AgentIdentityId,
	pub validator_agent_id: AgentIdentityId,
	pub feedback_type: FeedbackType,
	pub on_chain_feedback_id: Option<u64>,
	pub finding_id: Option<FindingId>,
	pub validation_id: Option<ValidationId>,
	pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_consistency() {
		let rep = AgentReputation {
			agent_identity_id: AgentIdentityId::new(),
			confirmed_count: 3,
			rejected_count: 1,
			inconclusive_count: 0,
			total_submissions: 4,
			score: 75.0,
			last_updated: Utc::now(),
		};
		assert!(rep.counts_consistent());
	}
}
