use bounty_primitives::ids::AgentIdentityId;
use serde::{Deserialize, Serialize};

/// Identity the worker process's own `ValidatorPipeline` records
/// validations and reputation feedback under, mirroring
/// [`crate::ResearcherSettings`] on the other side of the handoff.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorSettings {
	pub agent_id: AgentIdentityId,
}
