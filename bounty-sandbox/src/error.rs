use bounty_primitives::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
	#[error("no free port in the configured range")]
	NoFreePort,

	#[error("sandbox process failed to spawn: {0}")]
	SpawnFailed(String),

	#[error("sandbox did not become ready within the configured attempts")]
	SpawnTimeout,

	#[error("contract deployment failed: {0}")]
	DeployFailed(String),

	#[error("exploit execution failed: {0}")]
	ExecuteFailed(String),

	#[error("failed to terminate sandbox process: {0}")]
	KillFailed(String),
}

impl From<SandboxError> for CoreError {
	fn from(err: SandboxError) -> Self {
		CoreError::Sandbox(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, SandboxError>;
