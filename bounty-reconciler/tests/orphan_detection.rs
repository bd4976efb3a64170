//! Integration tests against a real Postgres instance.
//!
//! Run with:
//! ```bash
//! DATABASE_URL=postgres://localhost/bounty_test cargo test -p bounty-reconciler --test orphan_detection -- --ignored
//! ```

use std::sync::Arc;

use bounty_chain_client::{BountyReleasedEvent, ChainClientApi, MockChainClientApi};
use bounty_primitives::{reconciliation::ReconciliationStatus, Wei};
use bounty_reconciler::{context::ReconcilerContext, stream};
use bounty_settings::{ChainSettings, QueueSettings};
use bounty_store::{Repositories, Store};

async fn test_ctx(chain: MockChainClientApi) -> ReconcilerContext {
	let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
	let store = Arc::new(Store::connect(&url, 5).await.expect("failed to connect to Postgres"));
	store.migrate().await.expect("failed to run bounty-store migrations");
	let repos = Arc::new(Repositories::new(&store));
	let chain: Arc<dyn ChainClientApi> = Arc::new(chain);

	ReconcilerContext {
		store,
		repos,
		chain,
		chain_settings: Arc::new(ChainSettings {
			http_node_endpoint: "http://localhost:8545".to_string(),
			payer_private_key_file: "/dev/null".to_string(),
			researcher_private_key_file: None,
			protocol_registry_address: "0x0000000000000000000000000000000000aaaa".to_string(),
			bounty_pool_address: format!("0x{}", uuid::Uuid::new_v4().simple()),
			validation_registry_address: "0x0000000000000000000000000000000000bbbb".to_string(),
			escrow_address: "0x0000000000000000000000000000000000cccc".to_string(),
			agent_identity_address: "0x0000000000000000000000000000000000dddd".to_string(),
			fee_token_address: "0x0000000000000000000000000000000000eeee".to_string(),
			reconciler_from_block: 0,
			reconciler_poll_interval_ms: 50,
		}),
		queue_settings: Arc::new(QueueSettings {
			scan_concurrency: 1,
			payment_concurrency: 5,
			payment_rate_per_sec: 10,
			max_attempts: 3,
			backoff_base_ms: 500,
			stuck_proof_threshold_secs: 3_600,
			unconfirmed_payment_threshold_secs: 3_600,
			reconciler_sweep_interval_secs: 300,
			missing_payment_threshold_secs: 86_400,
		}),
	}
}

/// Scenario 2: a `BountyReleased` log with no matching payment row (the
/// pipeline never recorded a payment for this bounty id, or it paid out
/// through some other path entirely) is recorded as ORPHANED rather than
/// silently dropped or matched to the wrong row.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn unmatched_bounty_released_log_is_recorded_as_orphaned() {
	let event = BountyReleasedEvent {
		protocol_id: 1,
		bounty_id: 999_999,
		validation_id: 1,
		researcher: "0x0000000000000000000000000000000000aaaa".to_string(),
		amount: Wei(500),
		severity: 2,
		block_number: 100,
		tx_hash: format!("0x{}", uuid::Uuid::new_v4().simple()),
		log_index: 0,
	};
	let event_for_mock = event.clone();

	let mut chain = MockChainClientApi::new();
	chain.expect_latest_block_number().returning(|| Ok(100));
	chain.expect_get_bounty_released_events().returning(move |_, _| Ok(vec![event_for_mock.clone()]));

	let ctx = test_ctx(chain).await;

	let (tx, rx) = tokio::sync::oneshot::channel();
	let poller_ctx = ctx.clone();
	let poller = tokio::spawn(async move {
		stream::run(poller_ctx, Box::pin(async move { let _ = rx.await; })).await;
	});
	tokio::time::sleep(std::time::Duration::from_millis(200)).await;
	let _ = tx.send(());
	poller.await.unwrap();

	let orphans = ctx.repos.reconciliations.list_by_status(ReconciliationStatus::Orphaned).await.unwrap();
	let recorded = orphans
		.iter()
		.find(|r| r.tx_hash == event.tx_hash)
		.expect("the unmatched BountyReleased log should produce an ORPHANED reconciliation row");
	assert_eq!(recorded.payment_id, None);
	assert_eq!(recorded.on_chain_bounty_id, event.bounty_id);
}

/// The same event observed twice (e.g. a restart re-scans the reorg-safety
/// margin) must not produce a second ORPHANED row for the same log.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn the_same_log_is_never_recorded_twice() {
	let event = BountyReleasedEvent {
		protocol_id: 1,
		bounty_id: 888_888,
		validation_id: 1,
		researcher: "0x0000000000000000000000000000000000aaaa".to_string(),
		amount: Wei(500),
		severity: 2,
		block_number: 100,
		tx_hash: format!("0x{}", uuid::Uuid::new_v4().simple()),
		log_index: 0,
	};
	let event_for_mock = event.clone();

	let mut chain = MockChainClientApi::new();
	chain.expect_latest_block_number().returning(|| Ok(100));
	chain.expect_get_bounty_released_events().returning(move |_, _| Ok(vec![event_for_mock.clone()]));

	let ctx = test_ctx(chain).await;

	for _ in 0..2 {
		let (tx, rx) = tokio::sync::oneshot::channel();
		let poller_ctx = ctx.clone();
		let poller = tokio::spawn(async move {
			stream::run(poller_ctx, Box::pin(async move { let _ = rx.await; })).await;
		});
		tokio::time::sleep(std::time::Duration::from_millis(200)).await;
		let _ = tx.send(());
		poller.await.unwrap();
	}

	let orphans = ctx.repos.reconciliations.list_by_status(ReconciliationStatus::Orphaned).await.unwrap();
	let matches = orphans.iter().filter(|r| r.tx_hash == event.tx_hash).count();
	assert_eq!(matches, 1, "exists_for_log should prevent a duplicate ORPHANED row for the same tx_hash/log_index");
}
