//! Canonical topic name builders, so pipeline code and API collaborators
//! agree on the exact string without duplicating `format!` calls.

pub fn scan_progress(scan_id: &str) -> String {
	format!("scan:{scan_id}:progress")
}

pub fn scan_logs(scan_id: &str) -> String {
	format!("scan:{scan_id}:logs")
}

pub fn validation_progress(validation_id: &str) -> String {
	format!("validation:{validation_id}:progress")
}

pub fn validation_logs(validation_id: &str) -> String {
	format!("validation:{validation_id}:logs")
}

pub fn protocol_registration(protocol_id: &str) -> String {
	format!("protocol:{protocol_id}:registration")
}

pub fn payment_events(payment_id: &str) -> String {
	format!("payment:{payment_id}:events")
}

pub const SCAN_CREATED: &str = "scan:created";
pub const SCAN_CANCELED: &str = "scan:canceled";

/// Global feed of validation progress across every proof, for a dashboard
/// that wants "what's being validated right now" without subscribing to
/// each proof's topic individually. Nothing publishes here yet beyond what
/// the per-proof topics already carry - left for the dashboard consumer to
/// decide whether it wants a merged republish or a separate publisher.
pub const VALIDATION_ACTIVITY: &str = "validation:activity";
