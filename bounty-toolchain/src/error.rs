use bounty_primitives::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolchainError {
	#[error("invalid source url: {0}")]
	InvalidSource(String),

	#[error("clone failed: {0}")]
	CloneFailed(String),

	#[error("compile failed: {stderr}")]
	CompileFailed { stderr: String },

	#[error("static analyzer binary not found: {0}")]
	AnalyzerUnavailable(String),

	#[error("static analyzer failed: {0}")]
	AnalyzerFailed(String),

	#[error("subprocess exceeded its output cap")]
	OutputCapExceeded,

	#[error("subprocess timed out")]
	Timeout,
}

/// Everything here rolls up into `CoreError::Toolchain` per §7 - the
/// distinction between e.g. `AnalyzerUnavailable` and `CompileFailed`
/// matters to the caller deciding how to proceed (degrade vs. fail the
/// scan), not to the queue's retry decision, which only looks at
/// `is_transient` and none of these are.
impl From<ToolchainError> for CoreError {
	fn from(err: ToolchainError) -> Self {
		CoreError::Toolchain(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, ToolchainError>;
