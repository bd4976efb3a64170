use bounty_settings::CryptoSettings;
use chacha20poly1305::{
	aead::{Aead, AeadCore, KeyInit, OsRng},
	ChaCha20Poly1305, Key, Nonce,
};

use crate::error::{CryptoError, Result};

#[derive(Debug, Clone)]
pub struct EncryptedProof {
	pub key_id: String,
	pub nonce: Vec<u8>,
	pub ciphertext: Vec<u8>,
}

fn cipher_for(key_id: &str, settings: &CryptoSettings) -> Result<ChaCha20Poly1305> {
	let key_hex = settings
		.proof_encryption_keys
		.get(key_id)
		.ok_or_else(|| CryptoError::InvalidKey(key_id.to_string()))?;
	let key_bytes = hex::decode(key_hex).map_err(|e| CryptoError::InvalidKey(format!("{key_id}: {e}")))?;
	if key_bytes.len() != 32 {
		return Err(CryptoError::InvalidKey(format!("{key_id}: expected a 32-byte key")));
	}
	Ok(ChaCha20Poly1305::new(Key::from_slice(&key_bytes)))
}

pub fn encrypt_proof(plaintext: &[u8], key_id: &str, settings: &CryptoSettings) -> Result<EncryptedProof> {
	let cipher = cipher_for(key_id, settings)?;
	let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
	let ciphertext = cipher
		.encrypt(&nonce, plaintext)
		.map_err(|e| CryptoError::DecryptFailed(format!("encrypt failed: {e}")))?;
	Ok(EncryptedProof { key_id: key_id.to_string(), nonce: nonce.to_vec(), ciphertext })
}

pub fn decrypt_proof(proof: &EncryptedProof, settings: &CryptoSettings) -> Result<Vec<u8>> {
	if proof.nonce.len() != 12 {
		return Err(CryptoError::DecryptFailed("malformed nonce length".to_string()));
	}
	let cipher = cipher_for(&proof.key_id, settings)?;
	let nonce = Nonce::from_slice(&proof.nonce);
	cipher
		.decrypt(nonce, proof.ciphertext.as_ref())
		.map_err(|e| CryptoError::DecryptFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn settings() -> CryptoSettings {
		let mut keys = HashMap::new();
		keys.insert("default".to_string(), hex::encode([7u8; 32]));
		CryptoSettings {
			proof_encryption_keys: keys,
			default_proof_encryption_key_id: "default".to_string(),
			allowed_sign_in_domains: vec![],
			allowed_sign_in_chain_ids: vec![1],
			sign_in_max_age_secs: 600,
			sign_in_skew_secs: 120,
		}
	}

	#[test]
	fn round_trips_through_encrypt_and_decrypt() {
		let settings = settings();
		let plaintext = b"proof-of-concept exploit trace";
		let encrypted = encrypt_proof(plaintext, "default", &settings).unwrap();
		let decrypted = decrypt_proof(&encrypted, &settings).unwrap();
		assert_eq!(decrypted, plaintext);
	}

	#[test]
	fn unknown_key_id_is_rejected_before_touching_the_cipher() {
		let err = encrypt_proof(b"x", "missing", &settings()).unwrap_err();
		assert!(matches!(err, CryptoError::InvalidKey(_)));
	}

	#[test]
	fn tampered_ciphertext_fails_to_decrypt() {
		let settings = settings();
		let mut encrypted = encrypt_proof(b"payload", "default", &settings).unwrap();
		*encrypted.ciphertext.last_mut().unwrap() ^= 0xff;
		let err = decrypt_proof(&encrypted, &settings).unwrap_err();
		assert!(matches!(err, CryptoError::DecryptFailed(_)));
	}
}
