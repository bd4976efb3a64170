use bounty_primitives::{finding::Severity, validation::ValidationOutcome};
use serde::{Deserialize, Serialize};

/// Which signing key a write call goes out under. Kept to two roles, same
/// as the settings surface (`ChainSettings::payer_private_key_file` /
/// `researcher_private_key_file`): the payer signs protocol/pool/validation
/// administration, the researcher signs escrow and agent self-service calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Payer,
	Researcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainProtocol {
	pub owner: String,
	pub status: u8,
	pub total_bounty_pool: bounty_primitives::Wei,
	pub available_bounty: bounty_primitives::Wei,
	pub paid_bounty: bounty_primitives::Wei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyReceipt {
	pub bounty_id: u64,
	pub tx_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainBounty {
	pub protocol_id: u64,
	pub validation_id: u64,
	pub researcher: String,
	pub amount: bounty_primitives::Wei,
	pub severity: u8,
}

/// One `BountyPool.BountyReleased` log, decoded and tagged with its chain
/// position so the reconciler can checkpoint past it. `log_index` together
/// with `tx_hash` is what `ReconciliationRepository::exists_for_log` dedups
/// on - a re-polled range must never produce a second reconciliation row for
/// the same log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyReleasedEvent {
	pub protocol_id: u64,
	pub bounty_id: u64,
	pub validation_id: u64,
	pub researcher: String,
	pub amount: bounty_primitives::Wei,
	pub severity: u8,
	pub block_number: u64,
	pub tx_hash: String,
	pub log_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOnChain {
	pub token_id: u64,
	pub agent_type: u8,
	pub active: bool,
}

/// The on-chain contract is the source of truth for severity->amount (per
/// the Open Question decision in DESIGN.md); this is only the tag encoding,
/// matching the `Severity` enum's declaration order.
pub fn severity_tag(severity: Severity) -> u8 {
	match severity {
		Severity::Info => 0,
		Severity::Low => 1,
		Severity::Medium => 2,
		Severity::High => 3,
		Severity::Critical => 4,
	}
}

pub fn outcome_tag(outcome: ValidationOutcome) -> u8 {
	match outcome {
		ValidationOutcome::True => 0,
		ValidationOutcome::False => 1,
		ValidationOutcome::Error => 2,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn severity_tags_are_monotonic_with_declared_order() {
		assert!(severity_tag(Severity::Info) < severity_tag(Severity::Low));
		assert!(severity_tag(Severity::Low) < severity_tag(Severity::Medium));
		assert!(severity_tag(Severity::Medium) < severity_tag(Severity::High));
		assert!(severity_tag(Severity::High) < severity_tag(Severity::Critical));
	}

	#[test]
	fn outcome_tags_are_distinct() {
		let tags = [outcome_tag(ValidationOutcome::True), outcome_tag(ValidationOutcome::False), outcome_tag(ValidationOutcome::Error)];
		assert_eq!(tags[0], 0);
		assert_ne!(tags[0], tags[1]);
		assert_ne!(tags[1], tags[2]);
	}
}
