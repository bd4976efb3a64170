use std::sync::Arc;

use bounty_chain_client::ChainClientApi;
use bounty_settings::{ChainSettings, QueueSettings};
use bounty_store::{Repositories, Store};

/// Everything the event poller, the sweeper, and the read/resolve API share,
/// bundled the same way `bounty-pipelines::PipelineContext` bundles a
/// pipeline step's collaborators: one constructor argument, `chain` kept
/// behind a trait object so tests can swap in `MockChainClientApi`.
#[derive(Clone)]
pub struct ReconcilerContext {
	pub store: Arc<Store>,
	pub repos: Arc<Repositories>,
	pub chain: Arc<dyn ChainClientApi>,
	pub chain_settings: Arc<ChainSettings>,
	pub queue_settings: Arc<QueueSettings>,
}
