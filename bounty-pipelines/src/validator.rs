//! ValidatorPipeline (C10): DECRYPT_PROOF -> FETCH_PROTOCOL ->
//! CLONE_AT_COMMIT -> COMPILE -> SPAWN_SANDBOX -> DEPLOY -> EXECUTE_EXPLOIT
//! -> RECORD_VALIDATION -> RECORD_ONCHAIN -> RECORD_REPUTATION -> CLEANUP.
//!
//! Plus the stuck-proof sweeper in [`sweeper`].

use bounty_bus::{topic, BusEvent, EntityRef, ProgressData};
use bounty_primitives::{
	agent::FeedbackType,
	finding::{FindingStatus, Severity},
	ids::{PaymentId, ValidationId},
	payment::{Payment, PaymentStatus},
	proof::ProofStatus,
	validation::{Validation, ValidationOutcome},
	CoreError,
};
use bounty_queue::{EnqueueOptions, Job};
use bounty_sandbox::ExploitPlan;
use chrono::Utc;
use tracing::warn;

use crate::{
	context::PipelineContext,
	jobs::{self, PaymentJobPayload, ValidationJobPayload},
	proof_codec,
	resources::ScanResources,
};

pub async fn run_validation_job(ctx: &PipelineContext, job: Job) -> Result<(), CoreError> {
	let payload: ValidationJobPayload = job.payload_as().map_err(CoreError::from)?;
	run_validation(ctx, payload.proof_id).await
}

pub async fn run_validation(ctx: &PipelineContext, proof_id: bounty_primitives::ids::ProofId) -> Result<(), CoreError> {
	let mut resources = ScanResources::new(ctx.sandbox.clone());
	let outcome = run_validation_steps(ctx, proof_id, &mut resources).await;

	if let Err(err) = &outcome {
		warn!(proof_id = %proof_id, %err, "validation pipeline step failed");
		if let Err(e) = ctx.repos.proofs.transition(proof_id, ProofStatus::Validating, ProofStatus::Failed).await {
			warn!(proof_id = %proof_id, error = %e, "failed to mark proof FAILED after pipeline error");
		}
	}
	outcome
}

async fn run_validation_steps(
	ctx: &PipelineContext,
	proof_id: bounty_primitives::ids::ProofId,
	resources: &mut ScanResources,
) -> Result<(), CoreError> {
	let proof = ctx.repos.proofs.get(proof_id).await?;
	if !ctx.repos.proofs.transition(proof_id, ProofStatus::Submitted, ProofStatus::Validating).await? {
		// Already claimed by another run (the stuck-proof sweeper re-enqueued
		// it, or a second worker raced the claim) - nothing further to do.
		return Ok(());
	}

	let encrypted = proof_codec::decode(proof.encryption_key_id.clone(), &proof.encrypted_payload)?;
	let plaintext = bounty_crypto::decrypt_proof(&encrypted, &ctx.crypto_settings)?;
	let plan: ExploitPlan = serde_json::from_slice(&plaintext).map_err(|e| CoreError::Validation(e.to_string()))?;

	let finding = ctx.repos.findings.get(proof.finding_id).await?;
	let scan = ctx.repos.scans.get(proof.scan_id).await?;
	let protocol = ctx.repos.protocols.get(scan.protocol_id).await?;

	let commit = scan.target_commit.clone().unwrap_or_else(|| protocol.branch.clone());
	let checkout_dir = std::env::temp_dir().join("bounty-validate").join(proof_id.to_string());

	publish_progress(ctx, proof_id, "CLONE_AT_COMMIT", "RUNNING", 10, "cloning protocol checkout");
	ctx.toolchain
		.clone_branch(protocol.source_url.clone(), commit, checkout_dir.clone())
		.await?;
	resources.track_checkout(checkout_dir.clone());

	publish_progress(ctx, proof_id, "COMPILE", "RUNNING", 25, "compiling contract");
	let compiled = ctx
		.toolchain
		.compile(checkout_dir.clone(), protocol.contract_path.clone(), protocol.contract_name.clone())
		.await?;

	publish_progress(ctx, proof_id, "SPAWN_SANDBOX", "RUNNING", 40, "spawning validation sandbox");
	let handle = ctx.sandbox.spawn(None).await.map_err(CoreError::from)?;
	resources.track_sandbox(handle);

	publish_progress(ctx, proof_id, "DEPLOY", "RUNNING", 55, "deploying contract");
	let deployed = {
		let handle = resources.sandbox_handle().expect("just tracked above");
		ctx.sandbox
			.deploy(handle, compiled.bytecode.clone(), compiled.abi.clone(), vec![])
			.await
			.map_err(CoreError::from)?
	};

	publish_progress(ctx, proof_id, "EXECUTE_EXPLOIT", "RUNNING", 70, "replaying exploit plan");
	let result = {
		let handle = resources.sandbox_handle().expect("tracked above");
		ctx.sandbox
			.execute_exploit(handle, deployed.address.clone(), plan)
			.await
			.map_err(CoreError::from)?
	};

	let outcome = if result.validated { ValidationOutcome::True } else { ValidationOutcome::False };
	let new_proof_status = if result.validated { ProofStatus::Confirmed } else { ProofStatus::Rejected };
	let new_finding_status = if result.validated { FindingStatus::Confirmed } else { FindingStatus::Rejected };

	publish_progress(ctx, proof_id, "RECORD_VALIDATION", "RUNNING", 80, "recording validation result");
	let validation_id = ValidationId::new();
	let validator_agent_id = ctx.validator_settings.agent_id;
	let validation = Validation {
		id: validation_id,
		proof_id,
		scan_id: scan.id,
		protocol_id: protocol.id,
		validator_agent_id,
		result: outcome,
		execution_log: result.execution_log.join("\n"),
		state_changes: result.state_changes.clone(),
		transaction_hash: result.transaction_hash.clone(),
		gas_used: result.gas_used,
		failure_reason: result.error.clone(),
	};
	ctx.repos.validations.insert(&validation).await?;
	ctx.repos.proofs.transition(proof_id, ProofStatus::Validating, new_proof_status).await?;
	ctx.repos.findings.set_status(proof.finding_id, new_finding_status).await?;

	publish_progress(
		ctx,
		proof_id,
		"RECORD_ONCHAIN",
		"RUNNING",
		90,
		if result.validated { "recording confirmed validation on-chain" } else { "recording rejected validation on-chain" },
	);
	record_onchain_best_effort(ctx, &finding, &proof, proof_id, validation_id, outcome, result.validated).await;

	publish_progress(ctx, proof_id, "RECORD_REPUTATION", "RUNNING", 95, "updating agent reputation");
	record_reputation_best_effort(
		ctx,
		finding.severity,
		result.validated,
		finding.researcher_agent_id,
		validator_agent_id,
		finding.id,
		validation_id,
	)
	.await;

	if result.validated {
		enqueue_payment(ctx, &protocol, &finding).await?;
	}

	publish_progress(ctx, proof_id, "CLEANUP", "RUNNING", 100, "validation complete");
	Ok(())
}

/// Best-effort per §4.10: the off-chain `Validation` row already stands as
/// the authoritative result, so a failure here is logged and left for the
/// Reconciler to notice as a gap rather than retried in place.
async fn record_onchain_best_effort(
	ctx: &PipelineContext,
	finding: &bounty_primitives::finding::Finding,
	proof: &bounty_primitives::proof::Proof,
	proof_id: bounty_primitives::ids::ProofId,
	validation_id: ValidationId,
	outcome: ValidationOutcome,
	validated: bool,
) {
	let proof_hash = bounty_crypto::proof_hash(proof.finding_id, &finding.vulnerability_type, finding.severity, validated);
	let log_digest = proof_hash;
	// Findings never get an on-chain registration step of their own (only
	// protocols and proofs/validations do), so there is no canonical u64 id
	// to hand the contract. The low 64 bits of the finding UUID are used as
	// a stable-per-finding tag instead; collisions are astronomically
	// unlikely and the contract only uses this value to key its own event
	// log, never to look the finding back up off-chain.
	let finding_tag = finding.id.0.as_u128() as u64;
	match ctx.chain.record_validation(finding_tag, 0, outcome, finding.severity, log_digest, proof_hash).await {
		Ok(on_chain_validation_id) => {
			// `record_validation` only returns the on-chain validation id, not
			// a tx hash; the Reconciler fills `on_chain_tx_hash` in later once
			// it observes the corresponding event.
			if let Err(e) = ctx.repos.proofs.record_on_chain(proof_id, on_chain_validation_id, "").await {
				warn!(proof_id = %proof_id, error = %e, "failed to persist on-chain validation id");
			}
		}
		Err(err) => {
			warn!(validation_id = %validation_id, %err, "recording validation on-chain failed, leaving for the reconciler to notice");
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn record_reputation_best_effort(
	ctx: &PipelineContext,
	severity: Severity,
	validated: bool,
	researcher_agent_id: bounty_primitives::ids::AgentIdentityId,
	validator_agent_id: bounty_primitives::ids::AgentIdentityId,
	finding_id: bounty_primitives::ids::FindingId,
	validation_id: ValidationId,
) {
	let feedback_type = if validated { confirmed_feedback_for(severity) } else { FeedbackType::Rejected };

	// "skipped if either agent wallet cannot be resolved": both identities
	// are looked up by id rather than assumed present, since a deactivated
	// or already-deleted agent must not block the validation result itself
	// from standing.
	if ctx.repos.agent_identities.get(researcher_agent_id).await.is_err() {
		warn!(%validation_id, "researcher agent identity not found, skipping reputation update");
		return;
	}
	if ctx.repos.agent_identities.get(validator_agent_id).await.is_err() {
		warn!(%validation_id, "validator agent identity not found, skipping reputation update");
		return;
	}
	if let Err(e) = ctx.repos.agent_reputations.record_outcome(researcher_agent_id, feedback_type).await {
		warn!(%validation_id, error = %e, "failed to record agent reputation");
	}

	let feedback = bounty_primitives::agent::AgentFeedback {
		id: uuid::Uuid::new_v4(),
		researcher_agent_id,
		validator_agent_id,
		feedback_type,
		on_chain_feedback_id: None,
		finding_id: Some(finding_id),
		validation_id: Some(validation_id),
		created_at: Utc::now(),
	};
	if let Err(e) = ctx.repos.agent_feedback.insert(&feedback).await {
		warn!(%validation_id, error = %e, "failed to record agent feedback history");
	}
	ctx.store.cache.invalidate_prefix(&format!("reputation:{researcher_agent_id}"));
}

fn confirmed_feedback_for(severity: Severity) -> FeedbackType {
	match severity {
		Severity::Critical => FeedbackType::ConfirmedCritical,
		Severity::High => FeedbackType::ConfirmedHigh,
		Severity::Medium => FeedbackType::ConfirmedMedium,
		Severity::Low => FeedbackType::ConfirmedLow,
		Severity::Info => FeedbackType::ConfirmedInformational,
	}
}

async fn enqueue_payment(
	ctx: &PipelineContext,
	protocol: &bounty_primitives::protocol::Protocol,
	finding: &bounty_primitives::finding::Finding,
) -> Result<(), CoreError> {
	let researcher = ctx.repos.agent_identities.get(finding.researcher_agent_id).await?;
	let amount = ctx.chain.calculate_bounty_amount(protocol.on_chain_id.unwrap_or_default(), finding.severity).await?;

	let payment_id = PaymentId::new();
	let payment = Payment {
		id: payment_id,
		vulnerability_id: finding.id.to_string(),
		researcher_address: researcher.wallet_address,
		amount,
		currency: "WEI".to_string(),
		status: PaymentStatus::Pending,
		tx_hash: None,
		on_chain_bounty_id: None,
		failure_reason: None,
		retry_count: 0,
		reconciled: false,
		reconciled_at: None,
		queued_at: Utc::now(),
		processed_at: None,
		paid_at: None,
		admin_override: false,
	};
	ctx.repos.create_payment_reserving_bounty(&ctx.store, protocol.id, &payment).await?;
	ctx.queue
		.enqueue(
			jobs::PAYMENT_QUEUE,
			&jobs::payment_job_id(payment_id),
			&serde_json::to_value(PaymentJobPayload { payment_id }).expect("PaymentJobPayload always serializes"),
			EnqueueOptions::default(),
		)
		.await?;
	Ok(())
}

fn publish_progress(ctx: &PipelineContext, proof_id: bounty_primitives::ids::ProofId, step: &str, state: &str, progress: u8, message: &str) {
	ctx.bus.publish(
		&topic::validation_progress(&proof_id.to_string()),
		BusEvent::progress(
			"validation:progress",
			EntityRef::Validation(&proof_id.to_string()),
			ProgressData { current_step: step.to_string(), state: state.to_string(), progress, message: message.to_string() },
		),
	);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_feedback_matches_severity() {
        assert_eq!(confirmed_feedback_for(Severity::Critical), FeedbackType::ConfirmedCritical);
        assert_eq!(confirmed_feedback_for(Severity::High), FeedbackType::ConfirmedHigh);
        assert_eq!(confirmed_feedback_for(Severity::Medium), FeedbackType::ConfirmedMedium);
        assert_eq!(confirmed_feedback_for(Severity::Low), FeedbackType::ConfirmedLow);
        assert_eq!(confirmed_feedback_for(Severity::Info), FeedbackType::ConfirmedInformational);
    }
}

/// Administrative recovery for proofs a crashed or hung worker left behind
/// in SUBMITTED/VALIDATING. Runs as a `tokio::time::interval`-driven task
/// started alongside the validation-jobs `Poller`.
pub mod sweeper {
	use std::time::Duration;

	use tracing::{info, warn};

	use crate::{context::PipelineContext, jobs};

	pub async fn run(ctx: PipelineContext, mut shutdown: impl std::future::Future<Output = ()> + Unpin) {
		let threshold_secs = ctx.queue_settings.stuck_proof_threshold_secs as i64;
		let mut interval = tokio::time::interval(Duration::from_secs(threshold_secs.max(1) as u64 / 2 + 1));
		loop {
			tokio::select! {
				_ = interval.tick() => sweep_once(&ctx, threshold_secs).await,
				_ = &mut shutdown => {
					info!("stuck-proof sweeper shutting down");
					return;
				}
			}
		}
	}

	async fn sweep_once(ctx: &PipelineContext, threshold_secs: i64) {
		let stale = match ctx.repos.proofs.list_stale(threshold_secs).await {
			Ok(proofs) => proofs,
			Err(e) => {
				warn!(error = %e, "stuck-proof sweep failed to list stale proofs");
				return;
			}
		};
		for proof in stale {
			let job_id = jobs::validation_job_id(proof.id);
			if let Err(e) = ctx.queue.remove(jobs::VALIDATION_QUEUE, &job_id).await {
				warn!(proof_id = %proof.id, error = %e, "failed to remove stuck validation job before re-enqueue");
			}
			if proof.status == bounty_primitives::proof::ProofStatus::Validating {
				if let Err(e) = ctx
					.repos
					.proofs
					.transition(proof.id, bounty_primitives::proof::ProofStatus::Validating, bounty_primitives::proof::ProofStatus::Submitted)
					.await
				{
					warn!(proof_id = %proof.id, error = %e, "failed to reset stuck proof to SUBMITTED");
					continue;
				}
			}
			let payload = match serde_json::to_value(jobs::ValidationJobPayload { proof_id: proof.id }) {
				Ok(v) => v,
				Err(e) => {
					warn!(proof_id = %proof.id, error = %e, "failed to serialize validation job payload");
					continue;
				}
			};
			if let Err(e) = ctx
				.queue
				.enqueue(jobs::VALIDATION_QUEUE, &job_id, &payload, bounty_queue::EnqueueOptions::default())
				.await
			{
				warn!(proof_id = %proof.id, error = %e, "failed to re-enqueue stuck proof");
				continue;
			}
			info!(proof_id = %proof.id, "re-enqueued stuck proof");
		}
	}
}
