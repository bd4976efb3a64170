use std::sync::Arc;

use bounty_bus::Bus;
use bounty_chain_client::ChainClientApi;
use bounty_crypto::ReplayCache;
use bounty_queue::Queue;
use bounty_sandbox::SandboxApi;
use bounty_settings::{CryptoSettings, FeeSettings, QueueSettings, ToolchainSettings, ValidatorSettings};
use bounty_store::{Repositories, Store};
use bounty_toolchain::ToolchainApi;

/// Everything a pipeline step needs, bundled so a driver takes one
/// constructor argument instead of threading half a dozen collaborators
/// through every step function. Every external collaborator is a trait
/// object so `bounty-pipelines`'s own tests can swap in a `mockall` mock
/// without a real database, RPC endpoint, or subprocess.
#[derive(Clone)]
pub struct PipelineContext {
	pub store: Arc<Store>,
	pub repos: Arc<Repositories>,
	pub queue: Arc<Queue>,
	pub bus: Arc<Bus>,
	pub chain: Arc<dyn ChainClientApi>,
	pub toolchain: Arc<dyn ToolchainApi>,
	pub sandbox: Arc<dyn SandboxApi>,
	pub replay_cache: Arc<ReplayCache>,
	pub crypto_settings: Arc<CryptoSettings>,
	pub toolchain_settings: Arc<ToolchainSettings>,
	pub queue_settings: Arc<QueueSettings>,
	pub fee_settings: Arc<FeeSettings>,
	pub validator_settings: Arc<ValidatorSettings>,
}
