//! Requires an `anvil` binary on PATH. Run with
//! `cargo test -p bounty-sandbox -- --ignored`.
use bounty_sandbox::Sandbox;
use bounty_settings::SandboxSettings;

fn settings() -> SandboxSettings {
	SandboxSettings {
		port_range_start: 19_900,
		port_range_end: 19_920,
		evm_binary: "anvil".to_string(),
		readiness_attempts: 30,
		readiness_backoff_ms: 200,
		kill_grace_ms: 2_000,
	}
}

#[tokio::test]
#[ignore = "requires a local anvil binary"]
async fn spawn_and_kill_is_idempotent() {
	let sandbox = Sandbox::new(settings());
	let mut handle = sandbox.spawn(None).await.unwrap();
	sandbox.kill(&mut handle).await.unwrap();
	sandbox.kill(&mut handle).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a local anvil binary"]
async fn overlapping_spawns_get_distinct_ports() {
	let sandbox = Sandbox::new(settings());
	let mut a = sandbox.spawn(None).await.unwrap();
	let mut b = sandbox.spawn(None).await.unwrap();
	assert_ne!(a.port, b.port);
	sandbox.kill(&mut a).await.unwrap();
	sandbox.kill(&mut b).await.unwrap();
}
