//! PaymentPipeline (C11): LOAD_PAYMENT -> VALIDATE_ADDRESS -> VERIFY_CONFIRMED
//! -> CALCULATE_AMOUNT -> RELEASE_BOUNTY -> RECORD_COMPLETION.
//!
//! Plus the amount-repair function in [`repair`].

use std::str::FromStr;

use bounty_bus::{topic, BusEvent, EntityRef};
use bounty_chain_client::ChainError;
use bounty_primitives::{
	finding::FindingStatus,
	ids::{FindingId, PaymentId},
	payment::PaymentStatus,
	CoreError,
};
use bounty_queue::{EnqueueOptions, Job};
use ethers::abi::Address;
use tracing::warn;

use crate::{
	context::PipelineContext,
	jobs::{self, PaymentJobPayload},
};

/// Prefix the pipeline writes to `failure_reason` when the amount it
/// recorded no longer matches what the contract now computes for this
/// severity - the marker [`repair`] scans for.
const STALE_AMOUNT_PREFIX: &str = "stale bounty amount:";

pub async fn run_payment_job(ctx: &PipelineContext, job: Job) -> Result<(), CoreError> {
	let payload: PaymentJobPayload = job.payload_as().map_err(CoreError::from)?;
	run_payment(ctx, payload.payment_id).await
}

pub async fn run_payment(ctx: &PipelineContext, payment_id: PaymentId) -> Result<(), CoreError> {
	let payment = ctx.repos.payments.get(payment_id).await?;
	if payment.status == PaymentStatus::Completed {
		// Duplicate delivery of an already-settled job; nothing to do.
		return Ok(());
	}

	if Address::from_str(&payment.researcher_address).is_err() {
		return fail(ctx, payment_id, "invalid researcher address checksum").await;
	}

	let finding_id = FindingId(
		uuid::Uuid::parse_str(&payment.vulnerability_id)
			.map_err(|e| CoreError::Validation(format!("payment {payment_id} has a malformed vulnerability_id: {e}")))?,
	);
	let finding = ctx.repos.findings.get(finding_id).await?;

	if !payment.admin_override && finding.status != FindingStatus::Confirmed {
		return fail(ctx, payment_id, "validation outcome is not CONFIRMED").await;
	}

	let scan = ctx.repos.scans.get(finding.scan_id).await?;
	let protocol = ctx.repos.protocols.get(scan.protocol_id).await?;
	let Some(protocol_on_chain_id) = protocol.on_chain_id else {
		return fail(ctx, payment_id, "protocol has no on-chain id yet").await;
	};

	let expected_amount = match ctx.chain.calculate_bounty_amount(protocol_on_chain_id, finding.severity).await {
		Ok(amount) => amount,
		Err(err) => return Err(CoreError::from(err)),
	};
	if expected_amount != payment.amount {
		return fail(
			ctx,
			payment_id,
			&format!("{STALE_AMOUNT_PREFIX} recorded {} but contract now computes {expected_amount}", payment.amount),
		)
		.await;
	}

	// The on-chain validation id only exists once the Validator pipeline's
	// best-effort RECORD_ONCHAIN step has succeeded; until then this payment
	// is retried rather than released against a placeholder id.
	let proof = ctx.repos.proofs.get_by_finding(finding_id).await?;
	let Some(on_chain_validation_id) = proof.on_chain_validation_id else {
		return Err(CoreError::Transient(format!("payment {payment_id}: on-chain validation id not recorded yet")));
	};

	match ctx.chain.release_bounty(protocol_on_chain_id, on_chain_validation_id, &payment.researcher_address, finding.severity).await {
		Ok(receipt) => {
			ctx.repos.payments.mark_completed(payment_id, &receipt.tx_hash, receipt.bounty_id).await?;
			publish(ctx, payment_id, "payment:released", "bounty released");
			Ok(())
		}
		Err(ChainError::InsufficientBalance { .. }) => fail(ctx, payment_id, "Insufficient pool balance").await,
		Err(err) => {
			ctx.repos.payments.increment_retry(payment_id).await?;
			Err(CoreError::from(err))
		}
	}
}

async fn fail(ctx: &PipelineContext, payment_id: PaymentId, reason: &str) -> Result<(), CoreError> {
	ctx.repos.payments.mark_failed(payment_id, reason).await?;
	publish(ctx, payment_id, "payment:failed", reason);
	Ok(())
}

fn publish(ctx: &PipelineContext, payment_id: PaymentId, event_type: &str, message: &str) {
	ctx.bus.publish(
		&topic::payment_events(&payment_id.to_string()),
		BusEvent::log(
			event_type,
			EntityRef::Payment(&payment_id.to_string()),
			bounty_bus::LogData { level: bounty_bus::LogLevel::Info, message: message.to_string() },
		),
	);
}

/// Re-prices every FAILED payment this pipeline flagged with a stale-amount
/// mismatch against the contract's current `calculateBountyAmount`, then
/// re-enqueues it under the *same* job id. The old queue row has to be
/// removed first - `enqueue`'s idempotency guard only protects against a
/// second concurrent enqueue of the same in-flight work, not against
/// re-driving a row the queue already marked FAILED.
pub async fn repair(ctx: &PipelineContext) -> Result<u32, CoreError> {
	let stale = ctx.repos.payments.list_failed_with_reason_prefix(STALE_AMOUNT_PREFIX).await?;
	let mut repaired = 0u32;
	for payment in stale {
		let finding_id = FindingId(match uuid::Uuid::parse_str(&payment.vulnerability_id) {
			Ok(id) => id,
			Err(e) => {
				warn!(payment_id = %payment.id, error = %e, "skipping payment with malformed vulnerability_id");
				continue;
			}
		});
		let finding = match ctx.repos.findings.get(finding_id).await {
			Ok(f) => f,
			Err(e) => {
				warn!(payment_id = %payment.id, error = %e, "skipping payment, finding not found");
				continue;
			}
		};
		let scan = match ctx.repos.scans.get(finding.scan_id).await {
			Ok(s) => s,
			Err(e) => {
				warn!(payment_id = %payment.id, error = %e, "skipping payment, scan not found");
				continue;
			}
		};
		let protocol = match ctx.repos.protocols.get(scan.protocol_id).await {
			Ok(p) => p,
			Err(e) => {
				warn!(payment_id = %payment.id, error = %e, "skipping payment, protocol not found");
				continue;
			}
		};
		let Some(protocol_on_chain_id) = protocol.on_chain_id else {
			continue;
		};
		let amount = match ctx.chain.calculate_bounty_amount(protocol_on_chain_id, finding.severity).await {
			Ok(amount) => amount,
			Err(e) => {
				warn!(payment_id = %payment.id, error = %e, "skipping payment, could not recompute amount");
				continue;
			}
		};

		if let Err(e) = ctx.repos.payments.repair_amount(payment.id, amount).await {
			warn!(payment_id = %payment.id, error = %e, "failed to repair payment amount");
			continue;
		}

		let job_id = jobs::payment_job_id(payment.id);
		if let Err(e) = ctx.queue.remove(jobs::PAYMENT_QUEUE, &job_id).await {
			warn!(payment_id = %payment.id, error = %e, "failed to remove stale payment job before re-enqueue");
			continue;
		}
		let payload = match serde_json::to_value(PaymentJobPayload { payment_id: payment.id }) {
			Ok(v) => v,
			Err(e) => {
				warn!(payment_id = %payment.id, error = %e, "failed to serialize payment job payload");
				continue;
			}
		};
		if let Err(e) = ctx.queue.enqueue(jobs::PAYMENT_QUEUE, &job_id, &payload, EnqueueOptions::default()).await {
			warn!(payment_id = %payment.id, error = %e, "failed to re-enqueue repaired payment");
			continue;
		}
		repaired += 1;
	}
	Ok(repaired)
}

#[cfg(test)]
mod tests {
	use bounty_primitives::Wei;

	use super::*;

	#[test]
	fn stale_amount_reason_carries_the_marker_prefix() {
		let reason = format!("{STALE_AMOUNT_PREFIX} recorded {} but contract now computes {}", Wei(100), Wei(150));
		assert!(reason.starts_with(STALE_AMOUNT_PREFIX));
	}
}
