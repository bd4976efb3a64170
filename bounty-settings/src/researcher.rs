use bounty_primitives::ids::AgentIdentityId;
use serde::{Deserialize, Serialize};

/// Identity the worker process's own `ResearcherPipeline` submits findings
/// under. `ResearcherPipeline::ai_analyzer` has no concrete implementation
/// wired into this binary, so it is always constructed as `None`; the
/// pipeline already degrades to static-analysis-only findings in that case.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearcherSettings {
	pub agent_id: AgentIdentityId,
}
