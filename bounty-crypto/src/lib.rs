mod error;
mod fingerprint;
mod proof_crypto;
mod proof_hash;
mod replay_cache;
mod sign_in;

pub use error::{CryptoError, Result};
pub use fingerprint::fingerprint;
pub use proof_crypto::{decrypt_proof, encrypt_proof, EncryptedProof};
pub use proof_hash::proof_hash;
pub use replay_cache::ReplayCache;
pub use sign_in::{verify_signed_message, SignInMessage, VerifiedSignIn};
