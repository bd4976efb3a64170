//! Postgres-backed persistence for the bug-bounty orchestration spine.
//!
//! Every repository follows the same shape: a private `*Row` struct with
//! sqlx-native column types, a `From<Row>` conversion into the
//! `bounty-primitives` domain type, and a thin `*Repository` wrapping a
//! `PgPool`. Multi-row writes that must commit atomically go through
//! [`Store::transaction`] rather than composing repository calls directly.

pub mod agent;
pub mod cache;
pub mod error;
pub mod escrow;
pub mod event_listener;
pub mod fee_request;
pub mod finding;
pub mod payment;
pub mod proof;
pub mod protocol;
pub mod reconciliation;
pub mod scan;
pub mod store;
pub mod validation;

pub use error::{Result, StoreError};
pub use store::Store;

use bounty_primitives::{
	ids::{PaymentId, ProtocolId, ReconciliationId},
	payment::Payment,
	reconciliation::PaymentReconciliation,
	Wei,
};

use agent::{AgentFeedbackRepository, AgentIdentityRepository, AgentReputationRepository};
use escrow::{EscrowRepository, EscrowTransactionRepository};
use event_listener::EventListenerStateRepository;
use fee_request::FeeRequestRepository;
use finding::FindingRepository;
use payment::PaymentRepository;
use proof::ProofRepository;
use protocol::ProtocolRepository;
use reconciliation::ReconciliationRepository;
use scan::ScanRepository;
use validation::ValidationRepository;

/// Bundles every repository behind the one `Store` handed to pipelines,
/// queue workers, and the reconciler - so a component only ever needs one
/// constructor argument instead of threading a dozen repositories through.
#[derive(Clone)]
pub struct Repositories {
	pub protocols: ProtocolRepository,
	pub scans: ScanRepository,
	pub findings: FindingRepository,
	pub proofs: ProofRepository,
	pub validations: ValidationRepository,
	pub payments: PaymentRepository,
	pub reconciliations: ReconciliationRepository,
	pub agent_identities: AgentIdentityRepository,
	pub agent_reputations: AgentReputationRepository,
	pub agent_feedback: AgentFeedbackRepository,
	pub escrows: EscrowRepository,
	pub escrow_transactions: EscrowTransactionRepository,
	pub fee_requests: FeeRequestRepository,
	pub event_listener_states: EventListenerStateRepository,
}

impl Repositories {
	pub fn new(store: &Store) -> Self {
		let pool = store.pool().clone();
		Self {
			protocols: ProtocolRepository::new(pool.clone()),
			scans: ScanRepository::new(pool.clone()),
			findings: FindingRepository::new(pool.clone()),
			proofs: ProofRepository::new(pool.clone()),
			validations: ValidationRepository::new(pool.clone()),
			payments: PaymentRepository::new(pool.clone()),
			reconciliations: ReconciliationRepository::new(pool.clone()),
			agent_identities: AgentIdentityRepository::new(pool.clone()),
			agent_reputations: AgentReputationRepository::new(pool.clone()),
			agent_feedback: AgentFeedbackRepository::new(pool.clone()),
			escrows: EscrowRepository::new(pool.clone()),
			escrow_transactions: EscrowTransactionRepository::new(pool.clone()),
			fee_requests: FeeRequestRepository::new(pool.clone()),
			event_listener_states: EventListenerStateRepository::new(pool),
		}
	}

	/// The atomic write named by the payment pipeline: reserve the bounty
	/// amount out of the protocol's `available_bounty` and create the
	/// pending payment row in the same transaction. If the reservation
	/// loses the compare-and-set, no payment row is ever created.
	pub async fn create_payment_reserving_bounty(
		&self,
		store: &Store,
		protocol_id: ProtocolId,
		payment: &Payment,
	) -> Result<()> {
		let amount = payment.amount;
		let payment = payment.clone();
		store
			.transaction(|tx| {
				let protocols = self.protocols.clone();
				let payments = self.payments.clone();
				Box::pin(async move {
					protocols.reserve_bounty(tx, protocol_id, amount).await?;
					payments.insert_tx(tx, &payment).await
				})
			})
			.await
	}

	pub async fn earnings_for_address(&self, address: &str, since: chrono::DateTime<chrono::Utc>) -> Result<Wei> {
		self.payments.earnings_for_address(address, since).await
	}

	/// Records an anomalous reconciliation finding (orphan, mismatch,
	/// discrepancy, missing payment) and advances the event listener's
	/// checkpoint in the same transaction, so a crash between the two can
	/// never leave the checkpoint ahead of a row that was never committed.
	pub async fn record_reconciliation(
		&self,
		store: &Store,
		contract_address: &str,
		event_name: &str,
		last_processed_block: u64,
		record: &PaymentReconciliation,
	) -> Result<()> {
		let record = record.clone();
		let contract_address = contract_address.to_string();
		let event_name = event_name.to_string();
		store
			.transaction(|tx| {
				let reconciliations = self.reconciliations.clone();
				let event_listener_states = self.event_listener_states.clone();
				Box::pin(async move {
					reconciliations.insert_tx(tx, &record).await?;
					event_listener_states.advance(tx, &contract_address, &event_name, last_processed_block).await
				})
			})
			.await
	}

	/// Records any `BountyReleased` log matched to an existing payment -
	/// clean match, amount mismatch, or discrepancy alike: the release
	/// happened on-chain either way, so the payment is always marked
	/// reconciled/COMPLETED; the passed-in `record`'s status is what carries
	/// the anomaly forward for human review. Marks the payment, inserts the
	/// reconciliation row, and advances the checkpoint in one transaction.
	pub async fn record_resolved_reconciliation(
		&self,
		store: &Store,
		contract_address: &str,
		event_name: &str,
		last_processed_block: u64,
		payment_id: PaymentId,
		paid_at: chrono::DateTime<chrono::Utc>,
		tx_hash_if_unset: &str,
		record: &PaymentReconciliation,
	) -> Result<()> {
		let record = record.clone();
		let tx_hash_if_unset = tx_hash_if_unset.to_string();
		let contract_address = contract_address.to_string();
		let event_name = event_name.to_string();
		store
			.transaction(|tx| {
				let payments = self.payments.clone();
				let reconciliations = self.reconciliations.clone();
				let event_listener_states = self.event_listener_states.clone();
				Box::pin(async move {
					payments.mark_reconciled_tx(tx, payment_id, paid_at, &tx_hash_if_unset).await?;
					reconciliations.insert_tx(tx, &record).await?;
					event_listener_states.advance(tx, &contract_address, &event_name, last_processed_block).await
				})
			})
			.await
	}

	/// Resolves a reconciliation finding and, if it references a payment
	/// that isn't already marked reconciled (the UNCONFIRMED/MISSING_PAYMENT
	/// case - every other status already marks its payment reconciled the
	/// moment it's recorded), flips that flag in the same transaction so
	/// `status=RESOLVED` always implies its payment is reconciled.
	pub async fn resolve_reconciliation(&self, store: &Store, id: ReconciliationId, notes: &str) -> Result<()> {
		let existing = self.reconciliations.get(id).await?;
		let notes = notes.to_string();
		store
			.transaction(|tx| {
				let reconciliations = self.reconciliations.clone();
				let payments = self.payments.clone();
				Box::pin(async move {
					reconciliations.resolve_tx(tx, id, &notes).await?;
					if let Some(payment_id) = existing.payment_id {
						payments.mark_reconciled_flag_only_tx(tx, payment_id).await?;
					}
					Ok(())
				})
			})
			.await
	}

	/// Advances the checkpoint alone, for a polled range whose trailing
	/// blocks had no matching logs at all.
	pub async fn advance_event_checkpoint(
		&self,
		store: &Store,
		contract_address: &str,
		event_name: &str,
		last_processed_block: u64,
	) -> Result<()> {
		let contract_address = contract_address.to_string();
		let event_name = event_name.to_string();
		store
			.transaction(|tx| {
				let event_listener_states = self.event_listener_states.clone();
				Box::pin(async move { event_listener_states.advance(tx, &contract_address, &event_name, last_processed_block).await })
			})
			.await
	}
}
