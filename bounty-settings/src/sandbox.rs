use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxSettings {
	#[serde(default = "default_port_range_start")]
	pub port_range_start: u16,
	#[serde(default = "default_port_range_end")]
	pub port_range_end: u16,
	pub evm_binary: String,
	#[serde(default = "default_readiness_attempts")]
	pub readiness_attempts: u32,
	#[serde(default = "default_readiness_backoff_ms")]
	pub readiness_backoff_ms: u64,
	#[serde(default = "default_kill_grace_ms")]
	pub kill_grace_ms: u64,
}

fn default_port_range_start() -> u16 {
	18_545
}

fn default_port_range_end() -> u16 {
	18_645
}

fn default_readiness_attempts() -> u32 {
	30
}

fn default_readiness_backoff_ms() -> u64 {
	500
}

fn default_kill_grace_ms() -> u64 {
	5_000
}
