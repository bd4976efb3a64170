//! ProtocolPipeline (C8): CLONE -> VERIFY_CONTRACT_EXISTS -> COMPILE ->
//! RISK_SCORE -> REGISTER_ON_CHAIN -> TRIGGER_SCAN -> DONE.

use std::path::Path;

use bounty_bus::{topic, BusEvent, EntityRef};
use bounty_primitives::{
	ids::ProtocolId,
	protocol::ProtocolStatus,
	CoreError,
};
use bounty_queue::{EnqueueOptions, Job};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::{
	context::PipelineContext,
	jobs::{self, ProtocolJobPayload, ScanJobPayload},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProtocolStep {
	Clone,
	VerifyContractExists,
	Compile,
	RiskScore,
	RegisterOnChain,
	TriggerScan,
	Done,
}

/// Entry point wired to the `protocol-jobs` [`bounty_queue::Poller`].
pub async fn run_protocol_job(ctx: &PipelineContext, job: Job) -> Result<(), CoreError> {
	let payload: ProtocolJobPayload =
		serde_json::from_value(job.payload).map_err(|e| CoreError::Validation(e.to_string()))?;
	let result = run_protocol_pipeline(ctx, payload.protocol_id).await;
	if let Err(err) = &result {
		reset_to_pending_on_failure(ctx, payload.protocol_id, err).await;
	}
	result
}

pub async fn run_protocol_pipeline(ctx: &PipelineContext, protocol_id: ProtocolId) -> Result<(), CoreError> {
	let mut protocol = ctx.repos.protocols.get(protocol_id).await?;
	let checkout_dir = std::env::temp_dir().join("bounty-protocol").join(protocol_id.to_string());

	let mut step = ProtocolStep::Clone;
	let mut commit = String::new();
	let mut bytecode = Vec::new();
	let mut abi = None;

	loop {
		step = match step {
			ProtocolStep::Clone => {
				ctx.toolchain
					.clone_branch(protocol.source_url.clone(), protocol.branch.clone(), checkout_dir.clone())
					.await?;
				commit = resolve_commit(&checkout_dir).await?;
				ProtocolStep::VerifyContractExists
			}
			ProtocolStep::VerifyContractExists => {
				let full_path = checkout_dir.join(&protocol.contract_path);
				tokio::fs::metadata(&full_path).await.map_err(|_| {
					CoreError::Validation(format!("contract path not found in checkout: {}", protocol.contract_path))
				})?;
				ProtocolStep::Compile
			}
			ProtocolStep::Compile => {
				let compiled = ctx
					.toolchain
					.compile(checkout_dir.clone(), protocol.contract_path.clone(), protocol.contract_name.clone())
					.await?;
				bytecode = compiled.bytecode;
				abi = Some(compiled.abi);
				ProtocolStep::RiskScore
			}
			ProtocolStep::RiskScore => {
				let abi = abi.clone().expect("set by Compile step");
				let score = ctx.toolchain.risk_score(bytecode.clone(), abi);
				ctx.repos.protocols.set_risk_score(protocol_id, score).await?;
				protocol.risk_score = Some(score);
				ProtocolStep::RegisterOnChain
			}
			ProtocolStep::RegisterOnChain => {
				let on_chain_id = if ctx.chain.is_github_url_registered(&protocol.source_url).await? {
					ctx.chain
						.get_protocol_id_by_github_url(&protocol.source_url)
						.await?
						.ok_or_else(|| CoreError::Integrity("source marked registered but id lookup returned none".to_string()))?
				} else {
					ctx.chain
						.register_protocol(
							&protocol.owner_address,
							&protocol.source_url,
							&protocol.branch,
							&protocol.contract_path,
							&protocol.contract_name,
						)
						.await?
				};
				ctx.repos.protocols.set_on_chain_id(protocol_id, on_chain_id).await?;
				ctx.repos.protocols.set_status(protocol_id, ProtocolStatus::Registered).await?;
				protocol.on_chain_id = Some(on_chain_id);
				protocol.status = ProtocolStatus::Registered;

				ctx.bus.publish(
					&topic::protocol_registration(&protocol_id.to_string()),
					BusEvent::progress(
						"protocol:registered",
						EntityRef::Protocol(&protocol_id.to_string()),
						bounty_bus::ProgressData {
							current_step: "REGISTER_ON_CHAIN".to_string(),
							state: "REGISTERED".to_string(),
							progress: 90,
							message: format!("registered on-chain as protocol #{on_chain_id}"),
						},
					),
				);
				ProtocolStep::TriggerScan
			}
			ProtocolStep::TriggerScan => {
				let scan = bounty_primitives::scan::Scan {
					id: bounty_primitives::ids::ScanId::new(),
					protocol_id,
					state: bounty_primitives::scan::ScanState::Queued,
					current_step: "QUEUED".to_string(),
					target_branch: Some(protocol.branch.clone()),
					target_commit: Some(commit.clone()),
					retry_count: 0,
					tool_status: None,
					started_at: None,
					completed_at: None,
					error_code: None,
					error_message: None,
				};
				ctx.repos.scans.insert(&scan).await?;
				ctx.queue
					.enqueue(
						jobs::SCAN_QUEUE,
						&jobs::scan_job_id(protocol_id, &commit),
						&serde_json::to_value(ScanJobPayload { scan_id: scan.id })
							.expect("ScanJobPayload always serializes"),
						EnqueueOptions::default(),
					)
					.await?;

				ctx.repos.protocols.set_status(protocol_id, ProtocolStatus::Active).await?;
				info!(protocol_id = %protocol_id, scan_id = %scan.id, "protocol active, scan triggered");
				ProtocolStep::Done
			}
			ProtocolStep::Done => return Ok(()),
		};
	}
}

async fn resolve_commit(checkout_dir: &Path) -> Result<String, CoreError> {
	let output = Command::new("git")
		.args(["rev-parse", "HEAD"])
		.current_dir(checkout_dir)
		.output()
		.await
		.map_err(|e| CoreError::Toolchain(e.to_string()))?;
	if !output.status.success() {
		return Err(CoreError::Toolchain("git rev-parse HEAD failed".to_string()));
	}
	Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resets a protocol back to PENDING after a step failure so the next
/// retry starts the pipeline cleanly rather than from wherever it crashed.
/// The step sequence is re-run from CLONE on every attempt - steps are
/// idempotent (re-cloning overwrites, re-registering is a no-op check via
/// `isGithubUrlRegistered`) so this is safe up to the queue's 3-attempt cap.
async fn reset_to_pending_on_failure(ctx: &PipelineContext, protocol_id: ProtocolId, error: &CoreError) {
	warn!(protocol_id = %protocol_id, %error, "protocol pipeline step failed");
	if let Err(e) = ctx.repos.protocols.reset_to_pending_with_error(protocol_id, &error.to_string()).await {
		error!(protocol_id = %protocol_id, error = %e, "failed to reset protocol status after pipeline failure");
	}
}
