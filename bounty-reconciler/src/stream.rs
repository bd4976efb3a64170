//! `BountyPool.BountyReleased` catch-up + steady-state poller.
//!
//! There is no subscription path here the way `engine/src/eth/eth_event_streamer.rs`
//! has one over a WebSocket: `bounty-chain-client` only holds an HTTP
//! provider, so both the startup catch-up range and every later tick go
//! through the same `ChainClientApi::get_bounty_released_events` call,
//! bounded by the chain's current head.

use std::time::Duration;

use bounty_chain_client::BountyReleasedEvent;
use bounty_primitives::{
	ids::ReconciliationId,
	reconciliation::{PaymentReconciliation, ReconciliationStatus},
	CoreError,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::context::ReconcilerContext;

const EVENT_NAME: &str = "BountyReleased";

/// Blocks to re-scan behind the last checkpoint on every poll. A shallow
/// reorg can replace the chain tip after a previous poll already committed
/// its checkpoint; rescanning this margin and relying on
/// `exists_for_log` to skip anything already recorded is cheaper than
/// tracking reorgs explicitly.
const REORG_SAFETY_MARGIN_BLOCKS: u64 = 12;

pub async fn run(ctx: ReconcilerContext, mut shutdown: impl std::future::Future<Output = ()> + Unpin) {
	let interval_ms = ctx.chain_settings.reconciler_poll_interval_ms.max(1);
	let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
	loop {
		tokio::select! {
			_ = interval.tick() => {
				if let Err(e) = poll_once(&ctx).await {
					warn!(error = %e, "bounty-released reconciliation poll failed");
				}
			}
			_ = &mut shutdown => {
				info!("bounty-released event poller shutting down");
				return;
			}
		}
	}
}

/// Where the next poll should start: just past the reorg-safety margin
/// behind the last checkpoint, or the configured startup block if there is
/// no checkpoint yet.
fn resume_from_block(last_processed_block: Option<u64>, configured_from_block: u64) -> u64 {
	match last_processed_block {
		Some(last) => last.saturating_sub(REORG_SAFETY_MARGIN_BLOCKS) + 1,
		None => configured_from_block,
	}
}

async fn poll_once(ctx: &ReconcilerContext) -> Result<(), CoreError> {
	let contract_address = ctx.chain_settings.bounty_pool_address.clone();
	let checkpoint = ctx.repos.event_listener_states.get(&contract_address, EVENT_NAME).await?;
	let from_block = resume_from_block(checkpoint.map(|s| s.last_processed_block), ctx.chain_settings.reconciler_from_block);

	let latest = ctx.chain.latest_block_number().await?;
	if from_block > latest {
		return Ok(());
	}

	let events = ctx.chain.get_bounty_released_events(from_block, latest).await?;
	let mut highest_processed = from_block.saturating_sub(1);
	for event in &events {
		process_event(ctx, &contract_address, event).await?;
		highest_processed = highest_processed.max(event.block_number);
	}

	// Trailing blocks after the last event (or the whole range, if there were
	// no events at all) still need the checkpoint moved past them so the
	// next poll doesn't rescan them.
	if highest_processed < latest {
		ctx.repos.advance_event_checkpoint(&ctx.store, &contract_address, EVENT_NAME, latest).await?;
	}
	Ok(())
}

async fn process_event(
	ctx: &ReconcilerContext,
	contract_address: &str,
	event: &BountyReleasedEvent,
) -> Result<(), CoreError> {
	if ctx.repos.reconciliations.exists_for_log(&event.tx_hash, event.log_index).await? {
		return Ok(());
	}

	let now = Utc::now();
	let base = |status: ReconciliationStatus, payment_id: Option<bounty_primitives::ids::PaymentId>, notes: String| PaymentReconciliation {
		id: ReconciliationId::new(),
		payment_id,
		on_chain_bounty_id: event.bounty_id,
		tx_hash: event.tx_hash.clone(),
		log_index: event.log_index,
		amount: event.amount,
		status,
		discovered_at: now,
		resolved_at: None,
		notes: Some(notes),
	};

	match ctx.repos.payments.get_by_on_chain_bounty_id(event.bounty_id).await? {
		None => {
			let record = base(
				ReconciliationStatus::Orphaned,
				None,
				format!("BountyReleased for on-chain bounty {} has no matching payment row", event.bounty_id),
			);
			ctx.repos.record_reconciliation(&ctx.store, contract_address, EVENT_NAME, event.block_number, &record).await?;
			warn!(bounty_id = event.bounty_id, tx_hash = %event.tx_hash, "orphaned on-chain bounty release");
		}
		Some(payment)
			if matches!(payment.tx_hash.as_deref(), Some(h) if !h.eq_ignore_ascii_case(&event.tx_hash)) =>
		{
			let record = base(
				ReconciliationStatus::Discrepancy,
				Some(payment.id),
				format!(
					"payment {} recorded tx {} but the release came through {}",
					payment.id,
					payment.tx_hash.as_deref().unwrap_or(""),
					event.tx_hash
				),
			);
			ctx.repos
				.record_resolved_reconciliation(&ctx.store, contract_address, EVENT_NAME, event.block_number, payment.id, now, &event.tx_hash, &record)
				.await?;
			warn!(payment_id = %payment.id, "tx hash discrepancy on bounty release");
		}
		Some(payment) if payment.amount != event.amount => {
			let record = base(
				ReconciliationStatus::AmountMismatch,
				Some(payment.id),
				format!("payment {} recorded {} but the chain released {}", payment.id, payment.amount, event.amount),
			);
			ctx.repos
				.record_resolved_reconciliation(&ctx.store, contract_address, EVENT_NAME, event.block_number, payment.id, now, &event.tx_hash, &record)
				.await?;
			warn!(payment_id = %payment.id, recorded = %payment.amount, released = %event.amount, "bounty amount mismatch");
		}
		Some(payment) if !payment.researcher_address.eq_ignore_ascii_case(&event.researcher) => {
			let record = base(
				ReconciliationStatus::Discrepancy,
				Some(payment.id),
				format!(
					"payment {} researcher {} does not match on-chain researcher {}",
					payment.id, payment.researcher_address, event.researcher
				),
			);
			ctx.repos
				.record_resolved_reconciliation(&ctx.store, contract_address, EVENT_NAME, event.block_number, payment.id, now, &event.tx_hash, &record)
				.await?;
			warn!(payment_id = %payment.id, "researcher address discrepancy on bounty release");
		}
		Some(payment) => {
			let mut record = base(
				ReconciliationStatus::Resolved,
				Some(payment.id),
				"auto-reconciled against on-chain BountyReleased log".to_string(),
			);
			record.resolved_at = Some(now);
			ctx.repos
				.record_resolved_reconciliation(
					&ctx.store,
					contract_address,
					EVENT_NAME,
					event.block_number,
					payment.id,
					now,
					&event.tx_hash,
					&record,
				)
				.await?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resume_from_block_uses_configured_start_with_no_checkpoint() {
		assert_eq!(resume_from_block(None, 1_000), 1_000);
	}

	#[test]
	fn resume_from_block_rewinds_by_the_reorg_margin() {
		assert_eq!(resume_from_block(Some(1_000), 1_000), 1_000 - REORG_SAFETY_MARGIN_BLOCKS + 1);
	}

	#[test]
	fn resume_from_block_never_underflows_near_genesis() {
		assert_eq!(resume_from_block(Some(3), 0), 1);
	}
}
