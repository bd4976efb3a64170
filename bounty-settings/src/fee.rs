use bounty_primitives::Wei;
use serde::{Deserialize, Serialize};

/// x402-flow pricing and retry-bypass window for the fee requests §6
/// describes (protocol registration, finding submission, scan requests).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeSettings {
	pub protocol_registration_fee: Wei,
	pub finding_submission_fee: Wei,
	pub scan_request_fee: Wei,
	pub pay_to_address: String,
	#[serde(default = "default_network")]
	pub network: String,
	/// How long a 402 challenge stays valid, and how long a COMPLETED fee's
	/// fingerprint keeps bypassing re-charge for a retried payload.
	#[serde(default = "default_retry_window_secs")]
	pub retry_window_secs: i64,
}

fn default_network() -> String {
	"ethereum".to_string()
}

fn default_retry_window_secs() -> i64 {
	1800
}
