//! ResearcherPipeline (C9): CLONE -> COMPILE -> DEPLOY -> ANALYZE ->
//! GENERATE_PROOFS -> PERSIST_FINDINGS_AND_PROOFS -> SUBMIT_TO_VALIDATION ->
//! CLEANUP.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bounty_bus::{topic, BusEvent, EntityRef, LogData, LogLevel, ProgressData};
use bounty_primitives::{
	finding::{AnalysisMethod, Finding, FindingStatus, Severity},
	ids::{AgentIdentityId, FindingId, ProofId, ScanId},
	proof::{Proof, ProofStatus},
	scan::{Scan, ScanState, ToolStatus},
	CoreError,
};
use bounty_queue::{EnqueueOptions, Job};
use bounty_sandbox::ExploitPlan;
use bounty_toolchain::StaticFinding;
use chrono::Utc;
use tracing::{info, warn};

use crate::{
	context::PipelineContext,
	jobs::{self, ScanJobPayload, ValidationJobPayload},
	proof_codec,
	resources::ScanResources,
};

/// A finding the AI analyzer produced together with a concrete exploit
/// replay - unlike a bare static-analysis hit, it carries everything the
/// Validator pipeline needs to attempt confirmation automatically.
#[derive(Debug, Clone)]
pub struct AiFinding {
	pub vulnerability_type: String,
	pub severity: Severity,
	pub file_path: String,
	pub line_number: Option<u32>,
	pub description: String,
	pub confidence: f64,
	pub exploit_plan: ExploitPlan,
}

/// Optional collaborator the Researcher pipeline consults after the static
/// analyzer. Absent (`None`) in deployments that don't wire up an AI
/// backend - the scan still succeeds on static findings alone, matching
/// the "degrade, don't fail" handling `ToolchainApi::run_static_analyzer`
/// already gets for a missing `slither` binary.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AiAnalyzerApi: Send + Sync {
	async fn analyze(&self, checkout_dir: PathBuf, contract_name: String) -> Result<Vec<AiFinding>, CoreError>;
}

pub struct ResearcherPipeline {
	pub ctx: PipelineContext,
	pub ai_analyzer: Option<Arc<dyn AiAnalyzerApi>>,
	/// The escrow/fee-paying agent identity this worker process submits
	/// findings under - the same identity that is credited or docked
	/// reputation once each finding's proof is validated.
	pub researcher_agent_id: AgentIdentityId,
}

impl ResearcherPipeline {
	pub fn new(ctx: PipelineContext, ai_analyzer: Option<Arc<dyn AiAnalyzerApi>>, researcher_agent_id: AgentIdentityId) -> Self {
		Self { ctx, ai_analyzer, researcher_agent_id }
	}

	pub async fn run_scan_job(&self, job: Job) -> Result<(), CoreError> {
		let payload: ScanJobPayload = job.payload_as().map_err(CoreError::from)?;
		self.run_scan(payload.scan_id).await
	}

	pub async fn run_scan(&self, scan_id: ScanId) -> Result<(), CoreError> {
		let ctx = &self.ctx;
		let scan = ctx.repos.scans.get(scan_id).await?;
		let protocol = ctx.repos.protocols.get(scan.protocol_id).await?;

		let checkout_dir = std::env::temp_dir().join("bounty-scan").join(scan_id.to_string());
		let mut resources = ScanResources::new(ctx.sandbox.clone());

		let result = self.run_scan_steps(&scan, &protocol, &checkout_dir, &mut resources).await;

		match &result {
			Ok(()) => {
				ctx.repos
					.scans
					.advance(scan_id, ScanState::Succeeded, "DONE", None)
					.await?;
				publish_progress(ctx, scan_id, "DONE", "SUCCEEDED", 100, "scan completed");
			}
			Err(err) => {
				warn!(scan_id = %scan_id, %err, "scan pipeline step failed");
				ctx.repos
					.scans
					.advance(scan_id, ScanState::Failed, "FAILED", Some(("SCAN_FAILED", &err.to_string())))
					.await?;
				publish_progress(ctx, scan_id, "FAILED", "FAILED", 100, &err.to_string());
			}
		}
		result
	}

	async fn run_scan_steps(
		&self,
		scan: &Scan,
		protocol: &bounty_primitives::protocol::Protocol,
		checkout_dir: &std::path::Path,
		resources: &mut ScanResources,
	) -> Result<(), CoreError> {
		let ctx = &self.ctx;
		let scan_id = scan.id;
		let branch = scan.target_branch.clone().unwrap_or_else(|| protocol.branch.clone());

		ctx.repos.scans.advance(scan_id, ScanState::Running, "CLONE", None).await?;
		publish_progress(ctx, scan_id, "CLONE", "RUNNING", 5, "cloning protocol checkout");
		ctx.toolchain
			.clone_branch(protocol.source_url.clone(), branch, checkout_dir.to_path_buf())
			.await?;
		resources.track_checkout(checkout_dir.to_path_buf());

		ctx.repos.scans.advance(scan_id, ScanState::Running, "COMPILE", None).await?;
		publish_progress(ctx, scan_id, "COMPILE", "RUNNING", 20, "compiling contract");
		let compiled = ctx
			.toolchain
			.compile(checkout_dir.to_path_buf(), protocol.contract_path.clone(), protocol.contract_name.clone())
			.await?;

		ctx.repos.scans.advance(scan_id, ScanState::Running, "DEPLOY", None).await?;
		publish_progress(ctx, scan_id, "DEPLOY", "RUNNING", 35, "deploying into sandbox");
		let (log_tx, mut log_rx) = tokio::sync::mpsc::unbounded_channel();
		let handle = ctx.sandbox.spawn(Some(log_tx)).await.map_err(CoreError::from)?;
		resources.track_sandbox(handle);
		while let Ok(line) = log_rx.try_recv() {
			publish_log(ctx, scan_id, LogLevel::Default, &line);
		}
		let deployed = {
			let handle = resources.sandbox_handle().expect("just tracked above");
			ctx.sandbox
				.deploy(handle, compiled.bytecode.clone(), compiled.abi.clone(), vec![])
				.await
				.map_err(CoreError::from)?
		};
		info!(scan_id = %scan_id, address = %deployed.address, "contract deployed into sandbox");

		ctx.repos.scans.advance(scan_id, ScanState::Running, "ANALYZE", None).await?;
		publish_progress(ctx, scan_id, "ANALYZE", "RUNNING", 55, "running static and AI analysis");
		let (static_findings, tool_status) = match ctx
			.toolchain
			.run_static_analyzer(checkout_dir.to_path_buf(), protocol.contract_name.clone())
			.await
		{
			Ok(findings) => (findings, ToolStatus::Available),
			Err(bounty_toolchain::ToolchainError::AnalyzerUnavailable(msg)) => {
				warn!(scan_id = %scan_id, %msg, "static analyzer unavailable, continuing without it");
				publish_log(ctx, scan_id, LogLevel::Warn, "static analyzer unavailable, continuing without it");
				(Vec::new(), ToolStatus::ToolUnavailable)
			}
			Err(e) => return Err(e.into()),
		};
		ctx.repos.scans.set_tool_status(scan_id, tool_status).await?;

		let ai_findings = match &self.ai_analyzer {
			Some(analyzer) => match analyzer.analyze(checkout_dir.to_path_buf(), protocol.contract_name.clone()).await {
				Ok(findings) => findings,
				Err(err) => {
					warn!(scan_id = %scan_id, %err, "AI analyzer failed, continuing with static findings only");
					publish_log(ctx, scan_id, LogLevel::Warn, "AI analyzer failed, continuing with static findings only");
					Vec::new()
				}
			},
			None => Vec::new(),
		};

		ctx.repos.scans.advance(scan_id, ScanState::Running, "GENERATE_PROOFS", None).await?;
		publish_progress(ctx, scan_id, "GENERATE_PROOFS", "RUNNING", 70, "generating proofs for confirmed findings");

		ctx.repos.scans.advance(scan_id, ScanState::Running, "PERSIST_FINDINGS_AND_PROOFS", None).await?;
		publish_progress(ctx, scan_id, "PERSIST_FINDINGS_AND_PROOFS", "RUNNING", 80, "persisting findings and proofs");

		for finding in &static_findings {
			persist_static_finding(ctx, scan_id, self.researcher_agent_id, finding).await?;
		}

		ctx.repos.scans.advance(scan_id, ScanState::Running, "SUBMIT_TO_VALIDATION", None).await?;
		publish_progress(ctx, scan_id, "SUBMIT_TO_VALIDATION", "RUNNING", 90, "submitting proofs to validation");

		for finding in &ai_findings {
			persist_ai_finding_and_submit(ctx, scan_id, self.researcher_agent_id, finding).await?;
		}

		Ok(())
	}
}

/// Static findings carry no concrete replay steps - `runStaticAnalyzer`
/// flags a pattern, it doesn't produce calldata - so they submit an empty
/// [`ExploitPlan`]; the Validator pipeline still runs CLONE_AT_COMMIT
/// through RECORD_REPUTATION against it exactly like an AI-sourced proof,
/// it just has nothing to execute.
async fn persist_static_finding(
	ctx: &PipelineContext,
	scan_id: ScanId,
	researcher_agent_id: AgentIdentityId,
	finding: &StaticFinding,
) -> Result<(), CoreError> {
	let record = Finding {
		id: FindingId::new(),
		scan_id,
		researcher_agent_id,
		vulnerability_type: finding.vulnerability_type.clone(),
		severity: finding.severity,
		file_path: finding.file_path.clone(),
		line_number: finding.line_number,
		description: finding.description.clone(),
		confidence: finding.confidence,
		analysis_method: AnalysisMethod::Static,
		ai_confidence: None,
		status: FindingStatus::Pending,
		validated_at: None,
		code_snippet: None,
		remediation_suggestion: None,
	};
	ctx.repos.findings.insert(&record).await?;
	publish_log(
		ctx,
		scan_id,
		LogLevel::Analysis,
		&format!("static analyzer flagged {} at {}: submitting for validation", finding.vulnerability_type, finding.file_path),
	);

	let proof_id = create_and_submit_proof(ctx, scan_id, record.id, &ExploitPlan { steps: Vec::new() }).await?;
	info!(scan_id = %scan_id, finding_id = %record.id, proof_id = %proof_id, "static finding proof submitted for validation");
	Ok(())
}

/// AI-sourced findings ship with a concrete exploit plan, so unlike a bare
/// static hit they can go straight to encrypted-proof creation and
/// validation without a human or model in the loop first.
async fn persist_ai_finding_and_submit(
	ctx: &PipelineContext,
	scan_id: ScanId,
	researcher_agent_id: AgentIdentityId,
	finding: &AiFinding,
) -> Result<(), CoreError> {
	let finding_id = FindingId::new();
	let record = Finding {
		id: finding_id,
		scan_id,
		researcher_agent_id,
		vulnerability_type: finding.vulnerability_type.clone(),
		severity: finding.severity,
		file_path: finding.file_path.clone(),
		line_number: finding.line_number,
		description: finding.description.clone(),
		confidence: finding.confidence,
		analysis_method: AnalysisMethod::Ai,
		ai_confidence: Some(finding.confidence),
		status: FindingStatus::Pending,
		validated_at: None,
		code_snippet: None,
		remediation_suggestion: None,
	};
	ctx.repos.findings.insert(&record).await?;

	let proof_id = create_and_submit_proof(ctx, scan_id, finding_id, &finding.exploit_plan).await?;
	info!(scan_id = %scan_id, finding_id = %finding_id, proof_id = %proof_id, "proof submitted for validation");
	Ok(())
}

/// Encrypts `plan`, writes the SUBMITTED `Proof` row, and enqueues the
/// validation job under idempotency key `proof-<proofId>`. Shared by both
/// the static and AI finding paths so "accepted finding -> Proof ->
/// validation job" is one code path, not two that can drift apart.
async fn create_and_submit_proof(
	ctx: &PipelineContext,
	scan_id: ScanId,
	finding_id: FindingId,
	plan: &ExploitPlan,
) -> Result<ProofId, CoreError> {
	let plaintext = serde_json::to_vec(plan).map_err(|e| CoreError::Validation(e.to_string()))?;
	let encrypted = bounty_crypto::encrypt_proof(&plaintext, &ctx.crypto_settings.default_proof_encryption_key_id, &ctx.crypto_settings)
		.map_err(CoreError::from)?;

	let proof_id = ProofId::new();
	let proof = Proof {
		id: proof_id,
		finding_id,
		scan_id,
		encrypted_payload: proof_codec::encode(&encrypted),
		encryption_key_id: encrypted.key_id,
		researcher_signature: String::new(),
		status: ProofStatus::Submitted,
		submitted_at: Utc::now(),
		validated_at: None,
		on_chain_validation_id: None,
		on_chain_tx_hash: None,
	};
	ctx.repos.proofs.insert(&proof).await?;

	ctx.queue
		.enqueue(
			jobs::VALIDATION_QUEUE,
			&jobs::validation_job_id(proof_id),
			&serde_json::to_value(ValidationJobPayload { proof_id }).expect("ValidationJobPayload always serializes"),
			EnqueueOptions::default(),
		)
		.await?;

	Ok(proof_id)
}

fn publish_progress(ctx: &PipelineContext, scan_id: ScanId, step: &str, state: &str, progress: u8, message: &str) {
	ctx.bus.publish(
		&topic::scan_progress(&scan_id.to_string()),
		BusEvent::progress(
			"scan:progress",
			EntityRef::Scan(&scan_id.to_string()),
			ProgressData { current_step: step.to_string(), state: state.to_string(), progress, message: message.to_string() },
		),
	);
}

fn publish_log(ctx: &PipelineContext, scan_id: ScanId, level: LogLevel, message: &str) {
	ctx.bus.publish(
		&topic::scan_logs(&scan_id.to_string()),
		BusEvent::log("scan:log", EntityRef::Scan(&scan_id.to_string()), LogData { level, message: message.to_string() }),
	);
}
