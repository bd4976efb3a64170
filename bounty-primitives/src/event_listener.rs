use serde::{Deserialize, Serialize};

/// Per-(contract, event) checkpoint used by the reconciler to resume a log
/// stream without re-processing already-seen blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListenerState {
	pub contract_address: String,
	pub event_name: String,
	pub last_processed_block: u64,
}
