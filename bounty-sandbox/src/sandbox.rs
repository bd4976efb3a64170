use std::{process::Stdio, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use bounty_settings::SandboxSettings;
use ethers::{
	abi::{Abi, Address},
	contract::ContractFactory,
	middleware::SignerMiddleware,
	providers::{Http, Middleware, Provider},
	signers::{LocalWallet, Signer},
	types::{Bytes, TransactionRequest},
};
use nix::{
	sys::signal::{kill, Signal},
	unistd::Pid,
};
use tokio::{
	io::{AsyncBufReadExt, BufReader},
	process::Command,
	sync::mpsc::UnboundedSender,
};

use crate::{
	error::{Result, SandboxError},
	port_lease::PortPool,
	types::{DeployedContract, ExploitPlan, ExploitResult, SandboxHandle},
};

/// Well-known Anvil/Hardhat account #0 private key. Never holds real value;
/// every sandbox is a fresh throwaway local chain, so there is nothing to
/// protect by generating a random key per run.
const LOCAL_DEV_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

type SandboxSigner = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Narrow seam the Validator/Researcher pipelines depend on instead of the
/// concrete [`Sandbox`], so pipeline step logic is testable with
/// `mockall::automock` rather than a real subprocess and RPC endpoint.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SandboxApi: Send + Sync {
	async fn spawn(&self, log_sink: Option<UnboundedSender<String>>) -> Result<SandboxHandle>;
	async fn kill(&self, handle: &mut SandboxHandle) -> Result<()>;
	async fn deploy(
		&self,
		handle: &SandboxHandle,
		bytecode: Vec<u8>,
		abi: Abi,
		constructor_args: Vec<ethers::abi::Token>,
	) -> Result<DeployedContract>;
	async fn execute_exploit(
		&self,
		handle: &SandboxHandle,
		contract_address: String,
		plan: ExploitPlan,
	) -> Result<ExploitResult>;
}

pub struct Sandbox {
	settings: SandboxSettings,
	ports: PortPool,
}

impl Sandbox {
	pub fn new(settings: SandboxSettings) -> Self {
		let ports = PortPool::new(settings.port_range_start..settings.port_range_end);
		Self { settings, ports }
	}

	/// Spawns a local EVM process bound to loopback, draining its stdout
	/// and stderr into `log_sink` (typically wired to the Bus `logs` topic
	/// by the owning pipeline step), and waits for it to accept RPC calls.
	pub async fn spawn(&self, log_sink: Option<UnboundedSender<String>>) -> Result<SandboxHandle> {
		let lease = self.ports.lease()?;
		let port = lease.port();

		let mut process = Command::new(&self.settings.evm_binary)
			.args(["--port", &port.to_string(), "--host", "127.0.0.1", "--silent"])
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| SandboxError::SpawnFailed(e.to_string()))?;

		if let Some(sink) = log_sink {
			if let Some(stdout) = process.stdout.take() {
				drain_lines(stdout, sink.clone());
			}
			if let Some(stderr) = process.stderr.take() {
				drain_lines(stderr, sink);
			}
		}

		let rpc_endpoint = format!("http://127.0.0.1:{port}");
		let provider = Provider::<Http>::try_from(rpc_endpoint.as_str())
			.map_err(|e| SandboxError::SpawnFailed(format!("bad sandbox RPC url: {e}")))?;

		bounty_queue::backoff::poll_until(
			self.settings.readiness_attempts,
			Duration::from_millis(self.settings.readiness_backoff_ms),
			|| {
				let provider = provider.clone();
				async move { provider.get_block_number().await }
			},
		)
		.await
		.map_err(|_| SandboxError::SpawnTimeout)?;

		Ok(SandboxHandle { port, rpc_endpoint, process, lease })
	}

	/// Graceful termination: SIGTERM, wait up to `kill_grace_ms`, then
	/// SIGKILL. `Child::try_wait` makes this idempotent - calling `kill`
	/// again on an already-reaped handle is a no-op rather than an error.
	pub async fn kill(&self, handle: &mut SandboxHandle) -> Result<()> {
		if matches!(handle.process.try_wait(), Ok(Some(_))) {
			return Ok(());
		}
		let Some(pid) = handle.process.id() else {
			return Ok(());
		};
		let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);

		let grace = Duration::from_millis(self.settings.kill_grace_ms);
		if tokio::time::timeout(grace, handle.process.wait()).await.is_ok() {
			return Ok(());
		}

		handle.process.start_kill().map_err(|e| SandboxError::KillFailed(e.to_string()))?;
		handle.process.wait().await.map_err(|e| SandboxError::KillFailed(e.to_string()))?;
		Ok(())
	}

	pub async fn deploy(
		&self,
		handle: &SandboxHandle,
		bytecode: &[u8],
		abi: &Abi,
		constructor_args: Vec<ethers::abi::Token>,
	) -> Result<DeployedContract> {
		let client = Arc::new(self.dev_signer(handle).await?);
		let factory = ContractFactory::new(abi.clone(), Bytes::from(bytecode.to_vec()), client);
		let deployer = factory
			.deploy_tokens(constructor_args)
			.map_err(|e| SandboxError::DeployFailed(e.to_string()))?;
		let (contract, receipt) = deployer
			.send_with_receipt()
			.await
			.map_err(|e| SandboxError::DeployFailed(e.to_string()))?;
		Ok(DeployedContract {
			address: format!("{:#x}", contract.address()),
			transaction_hash: format!("{:#x}", receipt.transaction_hash),
		})
	}

	/// Replays a proof's exploit steps against the deployed contract.
	/// `validated` is true only if every step's actual success/revert
	/// outcome matches its `expect_success` flag - a run that fails
	/// earlier than the plan expected is not a confirmed exploit.
	pub async fn execute_exploit(
		&self,
		handle: &SandboxHandle,
		contract_address: &str,
		plan: &ExploitPlan,
	) -> Result<ExploitResult> {
		let client = self.dev_signer(handle).await?;
		let to = Address::from_str(contract_address)
			.map_err(|e| SandboxError::ExecuteFailed(format!("bad contract address: {e}")))?;

		let mut log = Vec::new();
		let mut gas_used = 0u64;
		let mut last_tx_hash = None;
		let mut validated = true;

		for step in &plan.steps {
			let calldata = Bytes::from_str(&step.calldata)
				.map_err(|e| SandboxError::ExecuteFailed(format!("bad calldata in step {:?}: {e}", step.description)))?;
			let tx = TransactionRequest::new().to(to).data(calldata).value(step.value_wei);

			let outcome = client.send_transaction(tx, None).await;
			let succeeded = match outcome {
				Ok(pending) => match pending.await {
					Ok(Some(receipt)) => {
						last_tx_hash = Some(format!("{:#x}", receipt.transaction_hash));
						gas_used += receipt.gas_used.map(|g| g.as_u64()).unwrap_or_default();
						receipt.status != Some(0.into())
					}
					Ok(None) => false,
					Err(_) => false,
				},
				Err(_) => false,
			};

			log.push(format!(
				"{}: {}",
				step.description,
				if succeeded { "succeeded" } else { "reverted" }
			));

			if succeeded != step.expect_success {
				validated = false;
			}
		}

		Ok(ExploitResult {
			validated,
			execution_log: log,
			state_changes: None,
			gas_used: Some(gas_used),
			transaction_hash: last_tx_hash,
			error: None,
		})
	}

	async fn dev_signer(&self, handle: &SandboxHandle) -> Result<SandboxSigner> {
		let provider = Provider::<Http>::try_from(handle.rpc_endpoint.as_str())
			.map_err(|e| SandboxError::ExecuteFailed(format!("bad sandbox RPC url: {e}")))?;
		let chain_id = provider.get_chainid().await.map_err(|e| SandboxError::ExecuteFailed(e.to_string()))?;
		let wallet = LocalWallet::from_str(LOCAL_DEV_PRIVATE_KEY)
			.expect("hardcoded local dev key is well-formed")
			.with_chain_id(chain_id.as_u64());
		Ok(SignerMiddleware::new(provider, wallet))
	}
}

#[async_trait]
impl SandboxApi for Sandbox {
	async fn spawn(&self, log_sink: Option<UnboundedSender<String>>) -> Result<SandboxHandle> {
		Sandbox::spawn(self, log_sink).await
	}

	async fn kill(&self, handle: &mut SandboxHandle) -> Result<()> {
		Sandbox::kill(self, handle).await
	}

	async fn deploy(
		&self,
		handle: &SandboxHandle,
		bytecode: Vec<u8>,
		abi: Abi,
		constructor_args: Vec<ethers::abi::Token>,
	) -> Result<DeployedContract> {
		Sandbox::deploy(self, handle, &bytecode, &abi, constructor_args).await
	}

	async fn execute_exploit(
		&self,
		handle: &SandboxHandle,
		contract_address: String,
		plan: ExploitPlan,
	) -> Result<ExploitResult> {
		Sandbox::execute_exploit(self, handle, &contract_address, &plan).await
	}
}

fn drain_lines(reader: impl tokio::io::AsyncRead + Unpin + Send + 'static, sink: UnboundedSender<String>) {
	tokio::spawn(async move {
		let mut lines = BufReader::new(reader).lines();
		while let Ok(Some(line)) = lines.next_line().await {
			if sink.send(line).is_err() {
				break;
			}
		}
	});
}
