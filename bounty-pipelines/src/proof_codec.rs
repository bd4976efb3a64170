//! Packs/unpacks a `bounty_crypto::EncryptedProof` into the single
//! `encrypted_payload` column the `Proof` row stores, so the key id travels
//! separately (`Proof::encryption_key_id`) while nonce and ciphertext share
//! one blob: the first 12 bytes are always the ChaCha20-Poly1305 nonce.

use bounty_crypto::EncryptedProof;
use bounty_primitives::CoreError;

const NONCE_LEN: usize = 12;

pub fn encode(proof: &EncryptedProof) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(NONCE_LEN + proof.ciphertext.len());
	bytes.extend_from_slice(&proof.nonce);
	bytes.extend_from_slice(&proof.ciphertext);
	bytes
}

pub fn decode(key_id: String, payload: &[u8]) -> Result<EncryptedProof, CoreError> {
	if payload.len() < NONCE_LEN {
		return Err(CoreError::Crypto("encrypted proof payload shorter than the nonce".to_string()));
	}
	let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
	Ok(EncryptedProof { key_id, nonce: nonce.to_vec(), ciphertext: ciphertext.to_vec() })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_nonce_and_ciphertext() {
		let original = EncryptedProof { key_id: "default".to_string(), nonce: vec![1; 12], ciphertext: vec![9; 40] };
		let packed = encode(&original);
		let unpacked = decode(original.key_id.clone(), &packed).unwrap();
		assert_eq!(unpacked.nonce, original.nonce);
		assert_eq!(unpacked.ciphertext, original.ciphertext);
	}

	#[test]
	fn rejects_a_payload_shorter_than_the_nonce() {
		let err = decode("default".to_string(), &[1, 2, 3]).unwrap_err();
		assert!(matches!(err, CoreError::Crypto(_)));
	}
}
