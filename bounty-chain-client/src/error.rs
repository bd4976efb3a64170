use bounty_primitives::CoreError;
use thiserror::Error;

/// Taxonomy named in full by the spec: `{kind, message, hash?}`. `kind` is
/// the enum variant; `hash` (a tx hash, when one exists) rides along on the
/// variants where a failed submission still produced one.
#[derive(Error, Debug)]
pub enum ChainError {
	#[error("transaction reverted: {message}")]
	Revert { message: String, hash: Option<String> },

	#[error("insufficient balance: {message}")]
	InsufficientBalance { message: String },

	#[error("invalid receipt: {message}")]
	InvalidReceipt { message: String, hash: Option<String> },

	#[error("network error: {0}")]
	Network(String),

	#[error("timed out waiting for {0}")]
	Timeout(String),

	#[error("receipt missing for {hash}")]
	MissingReceipt { hash: String },
}

impl ChainError {
	pub fn hash(&self) -> Option<&str> {
		match self {
			ChainError::Revert { hash, .. } | ChainError::InvalidReceipt { hash, .. } => hash.as_deref(),
			ChainError::MissingReceipt { hash } => Some(hash),
			_ => None,
		}
	}
}

/// `Network`, `Timeout` and a missing receipt are transient: the chain or
/// node hiccuped, a retry may succeed. Everything else is a permanent
/// rejection of this particular call's inputs.
impl From<ChainError> for CoreError {
	fn from(err: ChainError) -> Self {
		match err {
			ChainError::Network(_) | ChainError::Timeout(_) | ChainError::MissingReceipt { .. } => {
				CoreError::Transient(err.to_string())
			}
			ChainError::InsufficientBalance { .. } | ChainError::Revert { .. } => {
				CoreError::PermanentChain(err.to_string())
			}
			ChainError::InvalidReceipt { .. } => CoreError::PermanentChain(err.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, ChainError>;
