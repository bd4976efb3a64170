use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CryptoSettings {
	/// Per-`encryptionKeyId` symmetric keys, hex-encoded 32-byte ChaCha20-Poly1305 keys.
	pub proof_encryption_keys: std::collections::HashMap<String, String>,
	/// Key id the Researcher pipeline encrypts new proofs under; must be a
	/// key present in `proof_encryption_keys`.
	#[serde(default = "default_proof_encryption_key_id")]
	pub default_proof_encryption_key_id: String,
	#[serde(default = "default_allowed_domains")]
	pub allowed_sign_in_domains: Vec<String>,
	#[serde(default = "default_allowed_chain_ids")]
	pub allowed_sign_in_chain_ids: Vec<u64>,
	#[serde(default = "default_max_age_secs")]
	pub sign_in_max_age_secs: i64,
	#[serde(default = "default_skew_secs")]
	pub sign_in_skew_secs: i64,
}

fn default_proof_encryption_key_id() -> String {
	"default".to_string()
}

fn default_allowed_domains() -> Vec<String> {
	vec![]
}

fn default_allowed_chain_ids() -> Vec<u64> {
	vec![1]
}

fn default_max_age_secs() -> i64 {
	600
}

fn default_skew_secs() -> i64 {
	120
}
