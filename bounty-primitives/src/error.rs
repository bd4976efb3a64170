use thiserror::Error;

/// The core error taxonomy shared across every component.
///
/// Components define their own narrower error enums (`StoreError`,
/// `ChainError`, ...) and convert into this one at the pipeline boundary;
/// `CoreError::is_transient` is the single place that decides whether the
/// queue should retry a failure or terminate the job.
#[derive(Error, Debug)]
pub enum CoreError {
	#[error("validation failed: {0}")]
	Validation(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("permission denied: {0}")]
	Permission(String),

	#[error("transient failure: {0}")]
	Transient(String),

	#[error("permanent chain failure: {0}")]
	PermanentChain(String),

	#[error("toolchain failure: {0}")]
	Toolchain(String),

	#[error("sandbox failure: {0}")]
	Sandbox(String),

	#[error("crypto failure: {0}")]
	Crypto(String),

	#[error("integrity discrepancy: {0}")]
	Integrity(String),
}

impl CoreError {
	/// Whether the queue should retry the job that produced this error.
	///
	/// Only `Transient` errors are retried. Everything else either means the
	/// input or state will never succeed (`Validation`, `PermanentChain`,
	/// ...) or is out of scope for the queue's retry loop (`Integrity`).
	pub fn is_transient(&self) -> bool {
		matches!(self, CoreError::Transient(_))
	}
}

/// Structured error envelope returned across the API boundary. `CoreError`'s
/// `Display`/`source()` chain never crosses this line.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorEnvelope {
	pub code: &'static str,
	pub message: String,
	pub request_id: Option<String>,
}

impl From<&CoreError> for ErrorEnvelope {
	fn from(err: &CoreError) -> Self {
		let code = match err {
			CoreError::Validation(_) => "validation",
			CoreError::NotFound(_) => "not_found",
			CoreError::Permission(_) => "permission",
			CoreError::Transient(_) => "transient",
			CoreError::PermanentChain(_) => "permanent_chain",
			CoreError::Toolchain(_) => "toolchain",
			CoreError::Sandbox(_) => "sandbox",
			CoreError::Crypto(_) => "crypto",
			CoreError::Integrity(_) => "integrity",
		};
		ErrorEnvelope { code, message: err.to_string(), request_id: None }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_transient_retries() {
		assert!(CoreError::Transient("timeout".into()).is_transient());
		assert!(!CoreError::Validation("bad address".into()).is_transient());
		assert!(!CoreError::PermanentChain("reverted".into()).is_transient());
	}
}
