use std::path::PathBuf;

use async_trait::async_trait;
use bounty_settings::ToolchainSettings;
use ethers::abi::Abi;

use crate::{
	clone::clone_branch,
	compile::{compile, CompiledContract},
	error::Result,
	risk_score::risk_score,
	static_analyzer::{run_static_analyzer, StaticFinding},
};

/// Narrow seam the Protocol/Researcher/Validator pipelines depend on
/// instead of the free functions directly, so pipeline step logic is
/// testable with `mockall::automock` rather than a real git/forge/slither
/// invocation.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ToolchainApi: Send + Sync {
	async fn clone_branch(&self, source_url: String, branch: String, dest: PathBuf) -> Result<()>;
	async fn compile(&self, checkout_dir: PathBuf, contract_path: String, contract_name: String)
		-> Result<CompiledContract>;
	fn risk_score(&self, bytecode: Vec<u8>, abi: Abi) -> u8;
	async fn run_static_analyzer(&self, checkout_dir: PathBuf, contract_name: String) -> Result<Vec<StaticFinding>>;
}

pub struct DefaultToolchain {
	settings: ToolchainSettings,
}

impl DefaultToolchain {
	pub fn new(settings: ToolchainSettings) -> Self {
		Self { settings }
	}
}

#[async_trait]
impl ToolchainApi for DefaultToolchain {
	async fn clone_branch(&self, source_url: String, branch: String, dest: PathBuf) -> Result<()> {
		clone_branch(&source_url, &branch, &self.settings.allowed_git_host, &dest).await
	}

	async fn compile(
		&self,
		checkout_dir: PathBuf,
		contract_path: String,
		contract_name: String,
	) -> Result<CompiledContract> {
		compile(&checkout_dir, &contract_path, &contract_name, self.settings.compile_timeout_secs).await
	}

	fn risk_score(&self, bytecode: Vec<u8>, abi: Abi) -> u8 {
		risk_score(&bytecode, &abi)
	}

	async fn run_static_analyzer(&self, checkout_dir: PathBuf, contract_name: String) -> Result<Vec<StaticFinding>> {
		run_static_analyzer(&self.settings, &checkout_dir, &contract_name).await
	}
}
