//! Job payloads and idempotency-key conventions shared by every pipeline.
//! The queue itself only ever sees `(queue_name, job_id, payload)`; the
//! meaning of the payload is entirely a pipeline concern.

use bounty_primitives::ids::{PaymentId, ProofId, ProtocolId, ScanId};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_QUEUE: &str = "protocol-jobs";
pub const SCAN_QUEUE: &str = "scan-jobs";
pub const VALIDATION_QUEUE: &str = "validation-jobs";
pub const PAYMENT_QUEUE: &str = "payment-jobs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolJobPayload {
	pub protocol_id: ProtocolId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobPayload {
	pub scan_id: ScanId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationJobPayload {
	pub proof_id: ProofId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentJobPayload {
	pub payment_id: PaymentId,
}

pub fn protocol_job_id(protocol_id: ProtocolId) -> String {
	protocol_id.to_string()
}

/// `protocolId + latest commit`, per §4.8: re-registering the same protocol
/// at the same commit does not enqueue a second scan.
pub fn scan_job_id(protocol_id: ProtocolId, commit: &str) -> String {
	format!("{protocol_id}-{commit}")
}

pub fn validation_job_id(proof_id: ProofId) -> String {
	format!("proof-{proof_id}")
}

pub fn payment_job_id(payment_id: PaymentId) -> String {
	payment_id.to_string()
}
