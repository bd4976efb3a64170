//! Layered configuration for the bug-bounty worker: defaults, a TOML file,
//! environment variables (`BOUNTY__section__field`), and CLI flags, composed
//! through the `CfSettings` trait.

mod chain;
mod cli;
mod crypto;
mod database;
mod fee;
mod queue;
mod researcher;
mod sandbox;
mod toolchain;
mod traits;
mod validator;

pub use chain::ChainSettings;
pub use cli::WorkerOptions;
pub use crypto::CryptoSettings;
pub use database::DatabaseSettings;
pub use fee::FeeSettings;
pub use queue::QueueSettings;
pub use researcher::ResearcherSettings;
pub use sandbox::SandboxSettings;
pub use toolchain::ToolchainSettings;
pub use traits::CfSettings;
pub use validator::ValidatorSettings;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BountySettings {
	pub database: DatabaseSettings,
	pub queue: QueueSettings,
	pub chain: ChainSettings,
	pub sandbox: SandboxSettings,
	pub toolchain: ToolchainSettings,
	pub crypto: CryptoSettings,
	pub fee: FeeSettings,
	pub researcher: ResearcherSettings,
	pub validator: ValidatorSettings,
	#[serde(default)]
	pub json_logs: bool,
}

impl CfSettings for BountySettings {
	type OptionsType = WorkerOptions;

	fn validate_settings(&mut self) -> anyhow::Result<()> {
		if self.queue.scan_concurrency == 0 {
			anyhow::bail!("queue.scan_concurrency must be at least 1");
		}
		if self.queue.payment_concurrency == 0 {
			anyhow::bail!("queue.payment_concurrency must be at least 1");
		}
		if self.sandbox.port_range_start >= self.sandbox.port_range_end {
			anyhow::bail!("sandbox.port_range_start must be below sandbox.port_range_end");
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn options_collect_only_set_fields() {
		let opts = WorkerOptions {
			database_url: Some("postgres://localhost/bounty".to_string()),
			..Default::default()
		};
		let collected = config::Source::collect(&opts).unwrap();
		assert!(collected.contains_key("database.url"));
		assert!(!collected.contains_key("chain.http_node_endpoint"));
	}
}
