use bounty_primitives::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
	#[error("invalid signature")]
	InvalidSignature,

	#[error("nonce already used: {0}")]
	ReplayedNonce(String),

	#[error("sign-in message malformed: {0}")]
	Malformed(String),

	#[error("untrusted domain: {0}")]
	UntrustedDomain(String),

	#[error("untrusted chain id: {0}")]
	UntrustedChainId(u64),

	#[error("sign-in message expired")]
	Expired,

	#[error("sign-in message not yet valid")]
	NotYetValid,

	#[error("unknown encryption key id: {0}")]
	InvalidKey(String),

	#[error("decrypt failed: {0}")]
	DecryptFailed(String),
}

impl From<CryptoError> for CoreError {
	fn from(err: CryptoError) -> Self {
		CoreError::Crypto(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, CryptoError>;
