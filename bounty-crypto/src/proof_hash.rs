use bounty_primitives::{finding::Severity, ids::FindingId};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;

/// Hashes the fields recorded on-chain for a validation, matching the
/// contract's own hash convention. Field order does not matter to the
/// result: keys are sorted before serialization so the hash is stable
/// regardless of call-site field order.
pub fn proof_hash(finding_id: FindingId, vulnerability_type: &str, severity: Severity, validated: bool) -> [u8; 32] {
	let mut fields = BTreeMap::new();
	fields.insert("findingId", serde_json::Value::String(finding_id.0.to_string()));
	fields.insert("vulnerabilityType", serde_json::Value::String(vulnerability_type.to_string()));
	fields.insert("severity", serde_json::to_value(severity).expect("Severity always serializes"));
	fields.insert("validated", serde_json::Value::Bool(validated));

	let canonical = serde_json::to_vec(&fields).expect("BTreeMap<&str, Value> always serializes");
	Keccak256::digest(canonical).into()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn is_deterministic_for_the_same_inputs() {
		let id = FindingId::new();
		let a = proof_hash(id, "reentrancy", Severity::High, true);
		let b = proof_hash(id, "reentrancy", Severity::High, true);
		assert_eq!(a, b);
	}

	#[test]
	fn differs_when_the_outcome_differs() {
		let id = FindingId::new();
		let confirmed = proof_hash(id, "reentrancy", Severity::High, true);
		let rejected = proof_hash(id, "reentrancy", Severity::High, false);
		assert_ne!(confirmed, rejected);
	}
}
