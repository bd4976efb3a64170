//! UNCONFIRMED / MISSING_PAYMENT sweep: payments marked COMPLETED by the
//! payment pipeline that the event poller in [`crate::stream`] has never
//! independently matched against an on-chain `BountyReleased` log.
//!
//! Two tiers, same shape as the stuck-proof sweeper in
//! `bounty-pipelines::validator::sweeper`: a short grace period flags a
//! payment UNCONFIRMED, a much longer one escalates it to MISSING_PAYMENT so
//! an operator can tell "probably just slow" apart from "investigate now".

use std::{collections::HashSet, time::Duration};

use bounty_primitives::{
	ids::{PaymentId, ReconciliationId},
	reconciliation::{PaymentReconciliation, ReconciliationStatus},
	CoreError,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::context::ReconcilerContext;

pub async fn run(ctx: ReconcilerContext, mut shutdown: impl std::future::Future<Output = ()> + Unpin) {
	let interval_secs = ctx.queue_settings.reconciler_sweep_interval_secs.max(1);
	let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
	loop {
		tokio::select! {
			_ = interval.tick() => sweep_once(&ctx).await,
			_ = &mut shutdown => {
				info!("unconfirmed-payment sweeper shutting down");
				return;
			}
		}
	}
}

async fn sweep_once(ctx: &ReconcilerContext) {
	flag_new_unconfirmed(ctx).await;
	escalate_stale_unconfirmed(ctx).await;
}

async fn flag_new_unconfirmed(ctx: &ReconcilerContext) {
	let threshold = ctx.queue_settings.unconfirmed_payment_threshold_secs as i64;
	let stale = match ctx.repos.payments.list_unreconciled_older_than(threshold).await {
		Ok(payments) => payments,
		Err(e) => {
			warn!(error = %e, "unconfirmed-payment sweep failed to list stale payments");
			return;
		}
	};
	if stale.is_empty() {
		return;
	}

	let already_flagged = match flagged_payment_ids(ctx).await {
		Ok(ids) => ids,
		Err(e) => {
			warn!(error = %e, "unconfirmed-payment sweep failed to list existing flags");
			return;
		}
	};

	for payment in stale {
		if already_flagged.contains(&payment.id) {
			continue;
		}
		let record = PaymentReconciliation {
			id: ReconciliationId::new(),
			payment_id: Some(payment.id),
			on_chain_bounty_id: payment.on_chain_bounty_id.unwrap_or_default(),
			tx_hash: payment.tx_hash.clone().unwrap_or_default(),
			log_index: 0,
			amount: payment.amount,
			status: ReconciliationStatus::Unconfirmed,
			discovered_at: Utc::now(),
			resolved_at: None,
			notes: Some(format!(
				"payment {} has been COMPLETED and unreconciled for over {threshold}s with no matching on-chain log observed yet",
				payment.id
			)),
		};
		if let Err(e) = ctx.repos.reconciliations.insert(&record).await {
			warn!(payment_id = %payment.id, error = %e, "failed to record UNCONFIRMED reconciliation");
			continue;
		}
		warn!(payment_id = %payment.id, "flagged payment as UNCONFIRMED pending independent on-chain confirmation");
	}
}

async fn escalate_stale_unconfirmed(ctx: &ReconcilerContext) {
	let escalate_after_secs = ctx.queue_settings.missing_payment_threshold_secs;
	let cutoff = Utc::now() - chrono::Duration::seconds(escalate_after_secs as i64);

	let open = match ctx.repos.reconciliations.list_by_status(ReconciliationStatus::Unconfirmed).await {
		Ok(rows) => rows,
		Err(e) => {
			warn!(error = %e, "unconfirmed-payment sweep failed to list UNCONFIRMED rows to escalate");
			return;
		}
	};

	for row in open {
		if row.discovered_at > cutoff {
			continue;
		}
		let notes = format!(
			"{} (escalated: still unconfirmed after {escalate_after_secs}s)",
			row.notes.as_deref().unwrap_or("no matching on-chain log observed")
		);
		if let Err(e) = ctx.repos.reconciliations.escalate_to_missing_payment(row.id, &notes).await {
			warn!(reconciliation_id = %row.id, error = %e, "failed to escalate UNCONFIRMED row to MISSING_PAYMENT");
			continue;
		}
		warn!(reconciliation_id = %row.id, payment_id = ?row.payment_id, "escalated unconfirmed payment to MISSING_PAYMENT");
	}
}

async fn flagged_payment_ids(ctx: &ReconcilerContext) -> Result<HashSet<PaymentId>, CoreError> {
	let mut ids = HashSet::new();
	for status in [ReconciliationStatus::Unconfirmed, ReconciliationStatus::MissingPayment] {
		ids.extend(ctx.repos.reconciliations.list_by_status(status).await?.into_iter().filter_map(|r| r.payment_id));
	}
	Ok(ids)
}
