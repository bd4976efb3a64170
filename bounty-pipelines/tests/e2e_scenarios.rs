//! End-to-end pipeline scenarios against a real Postgres instance.
//!
//! Run with:
//! ```bash
//! DATABASE_URL=postgres://localhost/bounty_test cargo test -p bounty-pipelines --test e2e_scenarios -- --ignored
//! ```
//!
//! "Orphan detection" (a BountyReleased event with no matching Payment row)
//! lives in `bounty-reconciler/tests/orphan_detection.rs` instead - that
//! crate owns the reconciliation stream, and `bounty-pipelines` has no
//! dependency on it.

mod support;

use std::sync::{
	atomic::{AtomicU32, Ordering},
	Arc,
};

use bounty_chain_client::{BountyReceipt, ChainError, MockChainClientApi};
use bounty_pipelines::{
	api::{CoreApi, FeePayment, PaymentsApi, ProtocolsApi, RegisterOutcome},
	payment, validator,
};
use bounty_primitives::{
	agent::AgentType,
	finding::Severity,
	ids::{FindingId, PaymentId},
	payment::{Payment, PaymentStatus},
	protocol::ProtocolRegistrationInput,
	proof::{Proof, ProofStatus},
	Wei,
};
use bounty_sandbox::{ExploitResult, MockSandboxApi};
use bounty_toolchain::{CompiledContract, MockToolchainApi, StaticFinding, ToolchainError};
use chrono::Utc;
use ethers::abi::Abi;

use support::{build_ctx, insert_active_protocol, insert_agent, insert_queued_scan, mock_sandbox_handle};

/// Scenario 1: a scan finds a static vulnerability, the validator confirms
/// it against a sandbox replay, and the payment pipeline releases the
/// bounty on the first attempt.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn happy_path_scan_to_confirmed_payment() {
	let mut chain = MockChainClientApi::new();
	chain.expect_calculate_bounty_amount().returning(|_, _| Ok(Wei(500)));
	chain.expect_record_validation().returning(|_, _, _, _, _, _| Ok(1));
	chain.expect_release_bounty().returning(|_, _, _, _| {
		Ok(BountyReceipt { bounty_id: 1, tx_hash: "0xabc".to_string() })
	});

	let mut toolchain = MockToolchainApi::new();
	toolchain.expect_clone_branch().times(2).returning(|_, _, _| Ok(()));
	toolchain.expect_compile().times(2).returning(|_, _, _| {
		Ok(CompiledContract { bytecode: vec![0xfe], abi: Abi::default(), raw_output: String::new() })
	});
	toolchain.expect_run_static_analyzer().returning(|_, _| {
		Ok(vec![StaticFinding {
			vulnerability_type: "reentrancy".to_string(),
			severity: Severity::High,
			file_path: "src/V.sol".to_string(),
			line_number: Some(42),
			description: "external call before state update".to_string(),
			confidence: 0.9,
		}])
	});

	let mut sandbox = MockSandboxApi::new();
	sandbox.expect_spawn().times(2).returning(|_| Ok(mock_sandbox_handle()));
	sandbox.expect_deploy().times(2).returning(|_, _, _, _| {
		Ok(bounty_sandbox::DeployedContract { address: "0x1".to_string(), transaction_hash: "0xdeploy".to_string() })
	});
	sandbox.expect_execute_exploit().returning(|_, _, _| {
		Ok(ExploitResult {
			validated: true,
			execution_log: vec!["call succeeded".to_string()],
			state_changes: None,
			gas_used: Some(21_000),
			transaction_hash: Some("0xexploit".to_string()),
			error: None,
		})
	});

	let ctx = build_ctx(chain, toolchain, sandbox).await;
	insert_agent(&ctx, AgentType::Validator).await;
	let researcher = insert_agent(&ctx, AgentType::Researcher).await;
	let protocol = insert_active_protocol(&ctx, Wei(10_000)).await;
	let scan = insert_queued_scan(&ctx, &protocol).await;

	let researcher_pipeline = bounty_pipelines::researcher::ResearcherPipeline::new(ctx.clone(), None, researcher.id);
	researcher_pipeline.run_scan(scan.id).await.expect("scan should succeed");

	let findings = ctx.repos.findings.list_by_scan(scan.id).await.unwrap();
	assert_eq!(findings.len(), 1);
	let finding = &findings[0];

	let proof = ctx.repos.proofs.get_by_finding(finding.id).await.unwrap();
	validator::run_validation(&ctx, proof.id).await.expect("validation should succeed");

	let proof = ctx.repos.proofs.get(proof.id).await.unwrap();
	assert_eq!(proof.status, ProofStatus::Confirmed);
	assert_eq!(proof.on_chain_validation_id, Some(1));

	let payments = ctx.repos.payments.list(None, None).await.unwrap();
	let payment = payments
		.into_iter()
		.find(|p| p.vulnerability_id == finding.id.to_string())
		.expect("enqueue_payment should have created a payment row");
	assert_eq!(payment.status, PaymentStatus::Pending);

	payment::run_payment(&ctx, payment.id).await.expect("payment should complete");
	let payment = ctx.repos.payments.get(payment.id).await.unwrap();
	assert_eq!(payment.status, PaymentStatus::Completed);
	assert_eq!(payment.tx_hash.as_deref(), Some("0xabc"));
}

/// Scenario 3: the bounty pool is momentarily short the full amount, the
/// payment fails terminally, and an admin retry succeeds once the chain
/// accepts the release on the next attempt.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn insufficient_pool_then_admin_retry_succeeds() {
	let attempt = Arc::new(AtomicU32::new(0));
	let attempt_for_mock = attempt.clone();

	let mut chain = MockChainClientApi::new();
	chain.expect_calculate_bounty_amount().returning(|_, _| Ok(Wei(500)));
	chain.expect_release_bounty().returning(move |_, _, _, _| {
		if attempt_for_mock.fetch_add(1, Ordering::SeqCst) == 0 {
			Err(ChainError::InsufficientBalance { message: "bounty pool is dry".to_string() })
		} else {
			Ok(BountyReceipt { bounty_id: 7, tx_hash: "0xretried".to_string() })
		}
	});

	let toolchain = MockToolchainApi::new();
	let sandbox = MockSandboxApi::new();
	let ctx = build_ctx(chain, toolchain, sandbox).await;

	let researcher = insert_agent(&ctx, AgentType::Researcher).await;
	let protocol = insert_active_protocol(&ctx, Wei(10_000)).await;
	let scan = insert_queued_scan(&ctx, &protocol).await;
	let finding = bounty_primitives::finding::Finding {
		id: FindingId::new(),
		scan_id: scan.id,
		researcher_agent_id: researcher.id,
		vulnerability_type: "oracle manipulation".to_string(),
		severity: Severity::Critical,
		file_path: "src/V.sol".to_string(),
		line_number: None,
		description: "insufficient-pool fixture".to_string(),
		confidence: 0.9,
		analysis_method: bounty_primitives::finding::AnalysisMethod::Static,
		ai_confidence: None,
		status: bounty_primitives::finding::FindingStatus::Confirmed,
		validated_at: None,
		code_snippet: None,
		remediation_suggestion: None,
	};
	ctx.repos.findings.insert(&finding).await.unwrap();

	let proof = Proof {
		id: bounty_primitives::ids::ProofId::new(),
		finding_id: finding.id,
		scan_id: scan.id,
		encrypted_payload: vec![],
		encryption_key_id: ctx.crypto_settings.default_proof_encryption_key_id.clone(),
		researcher_signature: String::new(),
		status: ProofStatus::Confirmed,
		submitted_at: Utc::now(),
		validated_at: Some(Utc::now()),
		on_chain_validation_id: Some(42),
		on_chain_tx_hash: None,
	};
	ctx.repos.proofs.insert(&proof).await.unwrap();

	let payment = Payment {
		id: PaymentId::new(),
		vulnerability_id: finding.id.to_string(),
		researcher_address: "0x0000000000000000000000000000000000aaaa".to_string(),
		amount: Wei(500),
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
	ctx.repos.payments.insert(&payment).await.unwrap();

	payment::run_payment(&ctx, payment.id).await.expect("the InsufficientBalance branch resolves, not propagates");
	let failed = ctx.repos.payments.get(payment.id).await.unwrap();
	assert_eq!(failed.status, PaymentStatus::Failed);
	assert_eq!(failed.failure_reason.as_deref(), Some("Insufficient pool balance"));

	let api = CoreApi::new(ctx.clone());
	api.retry_failed(payment.id).await.expect("admin retry should be accepted");
	let reset = ctx.repos.payments.get(payment.id).await.unwrap();
	assert_eq!(reset.status, PaymentStatus::Pending);
	assert_eq!(reset.retry_count, 0);

	payment::run_payment(&ctx, payment.id).await.expect("second release attempt should succeed");
	let completed = ctx.repos.payments.get(payment.id).await.unwrap();
	assert_eq!(completed.status, PaymentStatus::Completed);
	assert_eq!(completed.on_chain_bounty_id, Some(7));
}

/// Scenario 4: registering the same source_url twice is fee-exempt the
/// second time - `register` resolves an existing protocol by source_url
/// before the fee gate ever runs, so no second on-chain transfer is checked.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn duplicate_registration_is_fee_exempt() {
	let transfer_checks = Arc::new(AtomicU32::new(0));
	let transfer_checks_for_mock = transfer_checks.clone();

	let mut chain = MockChainClientApi::new();
	chain.expect_verify_erc20_transfer().returning(move |_, _, _| {
		transfer_checks_for_mock.fetch_add(1, Ordering::SeqCst);
		Ok(true)
	});

	let toolchain = MockToolchainApi::new();
	let sandbox = MockSandboxApi::new();
	let ctx = build_ctx(chain, toolchain, sandbox).await;
	let api = CoreApi::new(ctx.clone());

	let input = ProtocolRegistrationInput {
		owner_address: "0x0000000000000000000000000000000000bbbb".to_string(),
		source_url: format!("https://github.com/example/{}", uuid::Uuid::new_v4()),
		branch: "main".to_string(),
		contract_path: "src/V.sol".to_string(),
		contract_name: "V".to_string(),
	};

	let first = api
		.register("owner-1", input.clone(), Some(FeePayment { tx_hash: "0xfee1".to_string() }))
		.await
		.expect("first registration should be accepted");
	let first_protocol = match first {
		RegisterOutcome::Accepted(protocol) => protocol,
		RegisterOutcome::PaymentRequired(_) => panic!("first registration should not require a fee challenge"),
	};

	let second = api.register("owner-1", input, None).await.expect("duplicate registration should succeed");
	match second {
		RegisterOutcome::Accepted(protocol) => assert_eq!(protocol.id, first_protocol.id),
		RegisterOutcome::PaymentRequired(_) => panic!("registering the same source_url twice must not require a new fee"),
	}
	assert_eq!(transfer_checks.load(Ordering::SeqCst), 1, "the duplicate must not re-verify a transfer");
}

/// Scenario 5: a proof a crashed worker left claimed in VALIDATING past the
/// staleness threshold is reclaimed by the sweeper and re-enqueued, and a
/// subsequent validation run against it still succeeds.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn stuck_proof_is_recovered_by_the_sweeper() {
	let mut chain = MockChainClientApi::new();
	chain.expect_calculate_bounty_amount().returning(|_, _| Ok(Wei(500)));
	chain.expect_record_validation().returning(|_, _, _, _, _, _| Ok(9));

	let mut toolchain = MockToolchainApi::new();
	toolchain.expect_clone_branch().returning(|_, _, _| Ok(()));
	toolchain.expect_compile().returning(|_, _, _| {
		Ok(CompiledContract { bytecode: vec![0xfe], abi: Abi::default(), raw_output: String::new() })
	});

	let mut sandbox = MockSandboxApi::new();
	sandbox.expect_spawn().returning(|_| Ok(mock_sandbox_handle()));
	sandbox.expect_deploy().returning(|_, _, _, _| {
		Ok(bounty_sandbox::DeployedContract { address: "0x1".to_string(), transaction_hash: "0xdeploy".to_string() })
	});
	sandbox.expect_execute_exploit().returning(|_, _, _| {
		Ok(ExploitResult {
			validated: true,
			execution_log: vec![],
			state_changes: None,
			gas_used: None,
			transaction_hash: None,
			error: None,
		})
	});

	let ctx = build_ctx(chain, toolchain, sandbox).await;
	insert_agent(&ctx, AgentType::Validator).await;
	let researcher = insert_agent(&ctx, AgentType::Researcher).await;
	let protocol = insert_active_protocol(&ctx, Wei(10_000)).await;
	let scan = insert_queued_scan(&ctx, &protocol).await;

	let finding = bounty_primitives::finding::Finding {
		id: FindingId::new(),
		scan_id: scan.id,
		researcher_agent_id: researcher.id,
		vulnerability_type: "reentrancy".to_string(),
		severity: Severity::High,
		file_path: "src/V.sol".to_string(),
		line_number: None,
		description: "stuck proof fixture".to_string(),
		confidence: 0.8,
		analysis_method: bounty_primitives::finding::AnalysisMethod::Static,
		ai_confidence: None,
		status: bounty_primitives::finding::FindingStatus::Pending,
		validated_at: None,
		code_snippet: None,
		remediation_suggestion: None,
	};
	ctx.repos.findings.insert(&finding).await.unwrap();

	let proof = Proof {
		id: bounty_primitives::ids::ProofId::new(),
		finding_id: finding.id,
		scan_id: scan.id,
		encrypted_payload: vec![],
		encryption_key_id: ctx.crypto_settings.default_proof_encryption_key_id.clone(),
		researcher_signature: String::new(),
		status: ProofStatus::Validating,
		// Past the 1-second test threshold, simulating a worker that claimed
		// the proof and then crashed before finishing it.
		submitted_at: Utc::now() - chrono::Duration::seconds(5),
		validated_at: None,
		on_chain_validation_id: None,
		on_chain_tx_hash: None,
	};
	let plaintext = serde_json::to_vec(&bounty_sandbox::ExploitPlan { steps: vec![] }).unwrap();
	let encrypted =
		bounty_crypto::encrypt_proof(&plaintext, &ctx.crypto_settings.default_proof_encryption_key_id, &ctx.crypto_settings).unwrap();
	let proof = Proof { encrypted_payload: bounty_pipelines::proof_codec::encode(&encrypted), ..proof };
	ctx.repos.proofs.insert(&proof).await.unwrap();

	let (tx, rx) = tokio::sync::oneshot::channel();
	let sweeper_ctx = ctx.clone();
	let sweeper = tokio::spawn(async move {
		validator::sweeper::run(sweeper_ctx, Box::pin(async move { let _ = rx.await; })).await;
	});
	tokio::time::sleep(std::time::Duration::from_millis(1_200)).await;
	let _ = tx.send(());
	sweeper.await.unwrap();

	let recovered = ctx.repos.proofs.get(proof.id).await.unwrap();
	assert_eq!(recovered.status, ProofStatus::Submitted, "the sweeper should reclaim a stuck VALIDATING proof");

	let job = ctx.queue.claim(bounty_pipelines::jobs::VALIDATION_QUEUE, "test-worker").await.unwrap();
	assert!(job.is_some(), "the sweeper should have re-enqueued the validation job");
	ctx.queue.complete(job.unwrap().id).await.unwrap();

	validator::run_validation(&ctx, proof.id).await.expect("re-run validation should succeed");
	let confirmed = ctx.repos.proofs.get(proof.id).await.unwrap();
	assert_eq!(confirmed.status, ProofStatus::Confirmed);
}

/// Scenario 6: the static analyzer binary is missing from the worker's
/// environment - the scan degrades to TOOL_UNAVAILABLE instead of failing,
/// and still succeeds with zero findings.
#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn analyzer_unavailable_degrades_instead_of_failing_the_scan() {
	let chain = MockChainClientApi::new();

	let mut toolchain = MockToolchainApi::new();
	toolchain.expect_clone_branch().returning(|_, _, _| Ok(()));
	toolchain.expect_compile().returning(|_, _, _| {
		Ok(CompiledContract { bytecode: vec![0xfe], abi: Abi::default(), raw_output: String::new() })
	});
	toolchain
		.expect_run_static_analyzer()
		.returning(|_, _| Err(ToolchainError::AnalyzerUnavailable("slither not found on PATH".to_string())));

	let mut sandbox = MockSandboxApi::new();
	sandbox.expect_spawn().returning(|_| Ok(mock_sandbox_handle()));
	sandbox.expect_deploy().returning(|_, _, _, _| {
		Ok(bounty_sandbox::DeployedContract { address: "0x1".to_string(), transaction_hash: "0xdeploy".to_string() })
	});

	let ctx = build_ctx(chain, toolchain, sandbox).await;
	let researcher = insert_agent(&ctx, AgentType::Researcher).await;
	let protocol = insert_active_protocol(&ctx, Wei(10_000)).await;
	let scan = insert_queued_scan(&ctx, &protocol).await;

	let researcher_pipeline = bounty_pipelines::researcher::ResearcherPipeline::new(ctx.clone(), None, researcher.id);
	researcher_pipeline.run_scan(scan.id).await.expect("a degraded analyzer must not fail the scan");

	let scan = ctx.repos.scans.get(scan.id).await.unwrap();
	assert_eq!(scan.state, bounty_primitives::scan::ScanState::Succeeded);
	assert_eq!(scan.tool_status, Some(bounty_primitives::scan::ToolStatus::ToolUnavailable));
	assert!(ctx.repos.findings.list_by_scan(scan.id).await.unwrap().is_empty());
}
