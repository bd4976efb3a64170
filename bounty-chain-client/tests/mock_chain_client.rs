//! `ChainClientApi` is consumed as `Arc<dyn ChainClientApi>` everywhere in
//! `bounty-pipelines`; this just confirms the generated mock satisfies the
//! trait object bound other crates rely on.
#![cfg(feature = "mock")]

use bounty_chain_client::{client::MockChainClientApi, ChainClientApi};
use bounty_primitives::finding::Severity;

#[tokio::test]
async fn mock_satisfies_the_trait_object_bound() {
	let mut mock = MockChainClientApi::new();
	mock.expect_calculate_bounty_amount()
		.withf(|protocol_id, severity| *protocol_id == 7 && *severity == Severity::High)
		.returning(|_, _| Ok(bounty_primitives::Wei(1_000)));

	let client: std::sync::Arc<dyn ChainClientApi> = std::sync::Arc::new(mock);
	let amount = client.calculate_bounty_amount(7, Severity::High).await.unwrap();
	assert_eq!(amount, bounty_primitives::Wei(1_000));
}
