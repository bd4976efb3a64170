use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainSettings {
	pub http_node_endpoint: String,
	pub payer_private_key_file: String,
	pub researcher_private_key_file: Option<String>,
	pub protocol_registry_address: String,
	pub bounty_pool_address: String,
	pub validation_registry_address: String,
	pub escrow_address: String,
	pub agent_identity_address: String,
	pub fee_token_address: String,
	#[serde(default = "default_from_block")]
	pub reconciler_from_block: u64,
	#[serde(default = "default_poll_interval_ms")]
	pub reconciler_poll_interval_ms: u64,
}

fn default_from_block() -> u64 {
	0
}

fn default_poll_interval_ms() -> u64 {
	4_000
}
