//! Shared harness for the end-to-end scenario tests.
//!
//! Run with:
//! ```bash
//! DATABASE_URL=postgres://localhost/bounty_test cargo test -p bounty-pipelines --test e2e_scenarios -- --ignored
//! ```
//!
//! Every test builds its own `PipelineContext` wired exactly like
//! `bounty-worker`'s `main` does, swapping in `mockall` mocks for the three
//! external collaborators (`ChainClientApi`, `ToolchainApi`, `SandboxApi`)
//! and a real Postgres-backed `Store`.

#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc, time::Duration};

use bounty_bus::Bus;
use bounty_chain_client::{ChainClientApi, MockChainClientApi};
use bounty_crypto::ReplayCache;
use bounty_pipelines::context::PipelineContext;
use bounty_primitives::{
	agent::{AgentIdentity, AgentType},
	ids::{AgentIdentityId, ProtocolId, ScanId},
	protocol::{Protocol, ProtocolStatus},
	scan::{Scan, ScanState},
	Wei,
};
use bounty_queue::Queue;
use bounty_sandbox::{MockSandboxApi, SandboxApi};
use bounty_settings::{CryptoSettings, FeeSettings, QueueSettings, ToolchainSettings, ValidatorSettings};
use bounty_store::{Repositories, Store};
use bounty_toolchain::{MockToolchainApi, ToolchainApi};
use chrono::Utc;

pub async fn test_pool_url() -> String {
	std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test")
}

pub async fn build_ctx(chain: MockChainClientApi, toolchain: MockToolchainApi, sandbox: MockSandboxApi) -> PipelineContext {
	let store = Arc::new(Store::connect(&test_pool_url().await, 5).await.expect("failed to connect to Postgres"));
	store.migrate().await.expect("failed to run bounty-store migrations");

	let queue = Arc::new(Queue::new(store.pool().clone()));
	queue.migrate().await.expect("failed to run bounty-queue migrations");

	let repos = Arc::new(Repositories::new(&store));
	let bus = Arc::new(Bus::new());
	let chain: Arc<dyn ChainClientApi> = Arc::new(chain);
	let toolchain: Arc<dyn ToolchainApi> = Arc::new(toolchain);
	let sandbox: Arc<dyn SandboxApi> = Arc::new(sandbox);
	let replay_cache = Arc::new(ReplayCache::new(Duration::from_secs(720)));

	PipelineContext {
		store,
		repos,
		queue,
		bus,
		chain,
		toolchain,
		sandbox,
		replay_cache,
		crypto_settings: Arc::new(test_crypto_settings()),
		toolchain_settings: Arc::new(test_toolchain_settings()),
		queue_settings: Arc::new(test_queue_settings()),
		fee_settings: Arc::new(test_fee_settings()),
		validator_settings: Arc::new(ValidatorSettings { agent_id: AgentIdentityId::new() }),
	}
}

pub fn test_crypto_settings() -> CryptoSettings {
	let mut keys = HashMap::new();
	keys.insert("default".to_string(), hex::encode([9u8; 32]));
	CryptoSettings {
		proof_encryption_keys: keys,
		default_proof_encryption_key_id: "default".to_string(),
		allowed_sign_in_domains: vec![],
		allowed_sign_in_chain_ids: vec![1],
		sign_in_max_age_secs: 600,
		sign_in_skew_secs: 120,
	}
}

pub fn test_toolchain_settings() -> ToolchainSettings {
	ToolchainSettings {
		allowed_git_host: "github.com".to_string(),
		compile_timeout_secs: 120,
		analyzer_timeout_secs: 120,
		subprocess_output_cap_bytes: 10 * 1024 * 1024,
		analyzer_commands: vec![],
		min_confidence: 0.4,
		min_info_confidence: 0.7,
	}
}

pub fn test_queue_settings() -> QueueSettings {
	QueueSettings {
		scan_concurrency: 1,
		payment_concurrency: 5,
		payment_rate_per_sec: 10,
		max_attempts: 3,
		backoff_base_ms: 500,
		// Short enough that the sweeper test doesn't need to wait long for
		// a "stuck" proof to actually qualify as stale.
		stuck_proof_threshold_secs: 1,
		unconfirmed_payment_threshold_secs: 3_600,
		reconciler_sweep_interval_secs: 300,
		missing_payment_threshold_secs: 86_400,
	}
}

pub fn test_fee_settings() -> FeeSettings {
	FeeSettings {
		protocol_registration_fee: Wei(1_000),
		finding_submission_fee: Wei(0),
		scan_request_fee: Wei(0),
		pay_to_address: "0x000000000000000000000000000000000000fe".to_string(),
		network: "ethereum".to_string(),
		retry_window_secs: 600,
	}
}

/// Inserts and returns a fresh agent identity of the given type, under a
/// random wallet address so parallel test runs never collide.
pub async fn insert_agent(ctx: &PipelineContext, agent_type: AgentType) -> AgentIdentity {
	let agent = AgentIdentity {
		id: AgentIdentityId::new(),
		wallet_address: format!("0x{}", uuid::Uuid::new_v4().simple()),
		agent_type,
		active: true,
		on_chain_token_id: None,
		registered_at: Utc::now(),
	};
	ctx.repos.agent_identities.insert(&agent).await.expect("failed to insert agent identity");
	agent
}

/// Inserts an ACTIVE, on-chain-registered protocol with the given bounty
/// pool, under a unique source url so parallel test runs never collide.
pub async fn insert_active_protocol(ctx: &PipelineContext, available_bounty: Wei) -> Protocol {
	let protocol = Protocol {
		id: ProtocolId::new(),
		owner_id: "owner-1".to_string(),
		owner_address: "0x00000000000000000000000000000000000001".to_string(),
		source_url: format!("https://github.com/example/{}", uuid::Uuid::new_v4()),
		branch: "main".to_string(),
		contract_path: "src/V.sol".to_string(),
		contract_name: "V".to_string(),
		status: ProtocolStatus::Active,
		on_chain_id: Some(1),
		total_bounty_pool: available_bounty,
		available_bounty,
		paid_bounty: Wei::ZERO,
		risk_score: None,
		error_message: None,
		created_at: Utc::now(),
	};
	ctx.repos.protocols.insert(&protocol).await.expect("failed to insert protocol");
	protocol
}

pub async fn insert_queued_scan(ctx: &PipelineContext, protocol: &Protocol) -> Scan {
	let scan = Scan {
		id: ScanId::new(),
		protocol_id: protocol.id,
		state: ScanState::Queued,
		current_step: "QUEUED".to_string(),
		target_branch: Some(protocol.branch.clone()),
		target_commit: Some("deadbeef".to_string()),
		retry_count: 0,
		tool_status: None,
		started_at: None,
		completed_at: None,
		error_code: None,
		error_message: None,
	};
	ctx.repos.scans.insert(&scan).await.expect("failed to insert scan");
	scan
}

pub fn mock_sandbox_handle() -> bounty_sandbox::SandboxHandle {
	use bounty_sandbox::PortPool;
	let pool = PortPool::new(19_000..19_999);
	let lease = pool.lease().expect("free port for sandbox test fixture");
	bounty_sandbox::SandboxHandle::for_test(lease)
}
