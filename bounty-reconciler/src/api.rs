//! Read and manual-resolution surface over `payment_reconciliations`.
//!
//! Deliberately not part of `bounty-pipelines::api::CoreApi` (C8-C11): these
//! rows are produced by [`crate::stream`] and [`crate::sweeper`], and the
//! read/resolve path belongs next to the writer rather than being duplicated
//! across crates.

use async_trait::async_trait;
use bounty_primitives::{
	ids::ReconciliationId,
	reconciliation::{PaymentReconciliation, ReconciliationStatus},
	CoreError,
};

use crate::context::ReconcilerContext;

/// Every status that still represents an open finding - everything except
/// `Resolved`.
const OPEN_STATUSES: [ReconciliationStatus; 5] = [
	ReconciliationStatus::Orphaned,
	ReconciliationStatus::AmountMismatch,
	ReconciliationStatus::Discrepancy,
	ReconciliationStatus::MissingPayment,
	ReconciliationStatus::Unconfirmed,
];

#[async_trait]
pub trait ReconciliationApi: Send + Sync {
	async fn list_open(&self) -> Result<Vec<PaymentReconciliation>, CoreError>;
	async fn list_by_status(&self, status: ReconciliationStatus) -> Result<Vec<PaymentReconciliation>, CoreError>;
	async fn get(&self, id: ReconciliationId) -> Result<PaymentReconciliation, CoreError>;
	async fn resolve(&self, id: ReconciliationId, notes: &str) -> Result<(), CoreError>;
}

#[async_trait]
impl ReconciliationApi for ReconcilerContext {
	async fn list_open(&self) -> Result<Vec<PaymentReconciliation>, CoreError> {
		let mut open = Vec::new();
		for status in OPEN_STATUSES {
			open.extend(self.repos.reconciliations.list_by_status(status).await?);
		}
		open.sort_by_key(|r| r.discovered_at);
		Ok(open)
	}

	async fn list_by_status(&self, status: ReconciliationStatus) -> Result<Vec<PaymentReconciliation>, CoreError> {
		Ok(self.repos.reconciliations.list_by_status(status).await?)
	}

	async fn get(&self, id: ReconciliationId) -> Result<PaymentReconciliation, CoreError> {
		Ok(self.repos.reconciliations.get(id).await?)
	}

	async fn resolve(&self, id: ReconciliationId, notes: &str) -> Result<(), CoreError> {
		Ok(self.repos.resolve_reconciliation(&self.store, id, notes).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_statuses_excludes_resolved() {
		assert!(!OPEN_STATUSES.contains(&ReconciliationStatus::Resolved));
		assert_eq!(OPEN_STATUSES.len(), 5);
	}
}
