use serde::{Deserialize, Serialize};
use tokio::process::Child;

use crate::port_lease::SandboxPortLease;

/// One step of a decrypted proof's exploit plan. `calldata` is pre-encoded
/// ABI call data (hex, `0x`-prefixed) - encoding lives with whatever
/// produced the proof, not with the sandbox that replays it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitStep {
	pub description: String,
	pub calldata: String,
	#[serde(default)]
	pub value_wei: u128,
	#[serde(default = "default_true")]
	pub expect_success: bool,
}

fn default_true() -> bool {
	true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitPlan {
	pub steps: Vec<ExploitStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitResult {
	pub validated: bool,
	pub execution_log: Vec<String>,
	pub state_changes: Option<serde_json::Value>,
	pub gas_used: Option<u64>,
	pub transaction_hash: Option<String>,
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedContract {
	pub address: String,
	pub transaction_hash: String,
}

/// A running sandbox. Owned by a single pipeline execution; must be handed
/// to `Sandbox::kill` on every exit path (the owning pipeline step wraps it
/// in an RAII cleanup guard, per §4.9's `ScanResources`).
pub struct SandboxHandle {
	pub port: u16,
	pub rpc_endpoint: String,
	pub(crate) process: Child,
	#[allow(dead_code)] // held only to keep the lease alive for the handle's lifetime
	pub(crate) lease: SandboxPortLease,
}

#[cfg(any(test, feature = "mock"))]
impl SandboxHandle {
	/// Fixture for pipeline-level tests that mock `SandboxApi`: a handle
	/// wrapping a real, inert child process so `kill` has an actual pid to
	/// signal rather than a value that was never backed by a process.
	pub fn for_test(lease: SandboxPortLease) -> Self {
		let port = lease.port();
		let process = tokio::process::Command::new("sleep")
			.arg("3600")
			.stdin(std::process::Stdio::null())
			.stdout(std::process::Stdio::null())
			.stderr(std::process::Stdio::null())
			.spawn()
			.expect("spawning `sleep` for the sandbox test fixture");
		Self { port, rpc_endpoint: format!("http://127.0.0.1:{port}"), process, lease }
	}
}
