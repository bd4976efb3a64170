//! Worker process bootstrap: load settings, wire every collaborator once,
//! then run the job pollers, the stuck-proof and reconciliation sweepers,
//! the `BountyReleased` event poller, and the health/metrics servers side
//! by side until a shutdown signal arrives.
//!
//! Grounded on the `#[tokio::main]` + single `start()` entry point shape of
//! `api/bin/chainflip-ingress-egress-tracker/src/main.rs`, minus that
//! binary's `task_scope` dependency: this workspace has no equivalent
//! crate, so shutdown is coordinated with a plain `tokio::sync::watch`
//! channel instead.

use std::{sync::Arc, time::Duration};

use bounty_bus::Bus;
use bounty_chain_client::{ChainClientApi, EthersChainClient};
use bounty_crypto::ReplayCache;
use bounty_pipelines::{
	jobs, payment, protocol,
	researcher::ResearcherPipeline,
	validator::{self, sweeper as proof_sweeper},
	PipelineContext,
};
use bounty_queue::{Poller, Queue};
use bounty_reconciler::{stream as reconciler_stream, sweeper as reconciler_sweeper, ReconcilerContext};
use bounty_sandbox::{Sandbox, SandboxApi};
use bounty_settings::{BountySettings, CfSettings, WorkerOptions};
use bounty_store::{Repositories, Store};
use bounty_toolchain::{DefaultToolchain, ToolchainApi};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let opts = WorkerOptions::parse();
	let config_root = opts.config_root.clone();
	let settings = BountySettings::load_settings_from_all_sources(&config_root, "config", opts)?;

	bounty_telemetry::logging::init(settings.json_logs)?;
	info!("starting bounty worker");

	let store = Arc::new(Store::connect(&settings.database.url, settings.database.max_connections).await?);
	store.migrate().await?;

	let queue = Arc::new(Queue::new(store.pool().clone()));
	queue.migrate().await?;

	let repos = Arc::new(Repositories::new(&store));
	let bus = Arc::new(Bus::new());
	let chain: Arc<dyn ChainClientApi> = Arc::new(EthersChainClient::new(&settings.chain).await?);
	let toolchain: Arc<dyn ToolchainApi> = Arc::new(DefaultToolchain::new(settings.toolchain.clone()));
	let sandbox: Arc<dyn SandboxApi> = Arc::new(Sandbox::new(settings.sandbox.clone()));
	let replay_ttl = Duration::from_secs((settings.crypto.sign_in_max_age_secs + settings.crypto.sign_in_skew_secs).max(0) as u64);
	let replay_cache = Arc::new(ReplayCache::new(replay_ttl));

	let pipeline_ctx = PipelineContext {
		store: store.clone(),
		repos: repos.clone(),
		queue: queue.clone(),
		bus,
		chain: chain.clone(),
		toolchain,
		sandbox,
		replay_cache,
		crypto_settings: Arc::new(settings.crypto.clone()),
		toolchain_settings: Arc::new(settings.toolchain.clone()),
		queue_settings: Arc::new(settings.queue.clone()),
		fee_settings: Arc::new(settings.fee.clone()),
		validator_settings: Arc::new(settings.validator.clone()),
	};

	let reconciler_ctx = ReconcilerContext {
		store: store.clone(),
		repos: repos.clone(),
		chain,
		chain_settings: Arc::new(settings.chain.clone()),
		queue_settings: Arc::new(settings.queue.clone()),
	};

	let researcher_pipeline = Arc::new(ResearcherPipeline::new(
		pipeline_ctx.clone(),
		None,
		settings.researcher.agent_id,
	));

	let (shutdown_tx, _) = tokio::sync::watch::channel(());
	let shutdown = || {
		let mut rx = shutdown_tx.subscribe();
		Box::pin(async move {
			let _ = rx.changed().await;
		}) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
	};

	let health_state = Arc::new(tokio::sync::RwLock::new(bounty_telemetry::HealthState {
		store_connected: true,
		queue_pollers_alive: true,
	}));
	let health_checker = bounty_telemetry::HealthChecker::new("0.0.0.0", 8080, health_state).await?;
	let metrics = bounty_telemetry::Metrics::new()?;

	let protocol_poller = Poller::new(
		(*queue).clone(),
		jobs::PROTOCOL_QUEUE,
		"bounty-worker-protocol".to_string(),
		1,
		None,
	);
	let scan_poller = Poller::new(
		(*queue).clone(),
		jobs::SCAN_QUEUE,
		"bounty-worker-scan".to_string(),
		settings.queue.scan_concurrency as usize,
		None,
	);
	let validation_poller = Poller::new(
		(*queue).clone(),
		jobs::VALIDATION_QUEUE,
		"bounty-worker-validation".to_string(),
		1,
		None,
	);
	let payment_poller = Poller::new(
		(*queue).clone(),
		jobs::PAYMENT_QUEUE,
		"bounty-worker-payment".to_string(),
		settings.queue.payment_concurrency as usize,
		Some(settings.queue.payment_rate_per_sec as f64),
	);

	let protocol_ctx = pipeline_ctx.clone();
	let payment_ctx = pipeline_ctx.clone();
	let validation_ctx = pipeline_ctx.clone();

	tokio::select! {
		_ = protocol_poller.run(shutdown(), move |job| {
			let ctx = protocol_ctx.clone();
			async move { protocol::run_protocol_job(&ctx, job).await }
		}) => {}
		_ = scan_poller.run(shutdown(), move |job| {
			let pipeline = researcher_pipeline.clone();
			async move { pipeline.run_scan_job(job).await }
		}) => {}
		_ = validation_poller.run(shutdown(), move |job| {
			let ctx = validation_ctx.clone();
			async move { validator::run_validation_job(&ctx, job).await }
		}) => {}
		_ = payment_poller.run(shutdown(), move |job| {
			let ctx = payment_ctx.clone();
			async move { payment::run_payment_job(&ctx, job).await }
		}) => {}
		_ = proof_sweeper::run(pipeline_ctx.clone(), shutdown()) => {}
		_ = reconciler_stream::run(reconciler_ctx.clone(), shutdown()) => {}
		_ = reconciler_sweeper::run(reconciler_ctx, shutdown()) => {}
		result = health_checker.run() => {
			if let Err(e) = result {
				tracing::error!(error = %e, "health check server exited");
			}
		}
		_ = serve_metrics(metrics) => {}
		_ = tokio::signal::ctrl_c() => {
			info!("shutdown signal received");
		}
	}

	let _ = shutdown_tx.send(());
	// Give in-flight tasks a moment to observe the shutdown signal and
	// release their semaphore permits / close their DB connections.
	tokio::time::sleep(Duration::from_millis(200)).await;
	Ok(())
}

/// Serves the Prometheus text exposition format on `/metrics`, next to the
/// health endpoint's bare-bones `httparse` handling rather than pulling in a
/// full HTTP server crate for one read-only route.
async fn serve_metrics(metrics: bounty_telemetry::Metrics) -> anyhow::Result<()> {
	use prometheus::Encoder;
	use tokio::{
		io::{AsyncReadExt, AsyncWriteExt},
		net::TcpListener,
	};

	let listener = TcpListener::bind(("0.0.0.0", 9090)).await?;
	info!("metrics server listening on :9090");
	loop {
		let (mut stream, _) = listener.accept().await?;
		let registry = metrics.registry.clone();
		tokio::spawn(async move {
			let mut buf = [0u8; 1024];
			if stream.read(&mut buf).await.is_err() {
				return;
			}
			let encoder = prometheus::TextEncoder::new();
			let metric_families = registry.gather();
			let mut output = Vec::new();
			if encoder.encode(&metric_families, &mut output).is_err() {
				return;
			}
			let response = format!(
				"HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
				encoder.format_type(),
				output.len()
			);
			let _ = stream.write_all(response.as_bytes()).await;
			let _ = stream.write_all(&output).await;
		});
	}
}
