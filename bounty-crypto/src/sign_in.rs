//! EIP-4361-shaped ("Sign-In with Ethereum") message verification.

use bounty_settings::CryptoSettings;
use chrono::{DateTime, Duration, Utc};
use ethers::types::Signature;

use crate::error::{CryptoError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
	pub domain: String,
	pub address: String,
	pub uri: String,
	pub version: String,
	pub chain_id: u64,
	pub nonce: String,
	pub issued_at: DateTime<Utc>,
	pub expiration_time: Option<DateTime<Utc>>,
}

pub struct VerifiedSignIn {
	pub nonce: String,
}

impl SignInMessage {
	pub fn parse(message: &str) -> Result<Self> {
		let mut lines = message.lines();
		let header = lines.next().ok_or_else(|| CryptoError::Malformed("empty message".to_string()))?;
		let domain = header
			.strip_suffix(" wants you to sign in with your Ethereum account:")
			.ok_or_else(|| CryptoError::Malformed("missing domain header".to_string()))?
			.to_string();
		let address = lines
			.next()
			.ok_or_else(|| CryptoError::Malformed("missing address line".to_string()))?
			.trim()
			.to_string();

		let mut uri = None;
		let mut version = None;
		let mut chain_id = None;
		let mut nonce = None;
		let mut issued_at = None;
		let mut expiration_time = None;

		for line in lines {
			if let Some(v) = line.strip_prefix("URI: ") {
				uri = Some(v.to_string());
			} else if let Some(v) = line.strip_prefix("Version: ") {
				version = Some(v.to_string());
			} else if let Some(v) = line.strip_prefix("Chain ID: ") {
				chain_id = v.parse::<u64>().ok();
			} else if let Some(v) = line.strip_prefix("Nonce: ") {
				nonce = Some(v.to_string());
			} else if let Some(v) = line.strip_prefix("Issued At: ") {
				issued_at = DateTime::parse_from_rfc3339(v).ok().map(|d| d.with_timezone(&Utc));
			} else if let Some(v) = line.strip_prefix("Expiration Time: ") {
				expiration_time = DateTime::parse_from_rfc3339(v).ok().map(|d| d.with_timezone(&Utc));
			}
		}

		let missing = |field: &str| CryptoError::Malformed(format!("missing field: {field}"));
		Ok(SignInMessage {
			domain,
			address,
			uri: uri.ok_or_else(|| missing("URI"))?,
			version: version.ok_or_else(|| missing("Version"))?,
			chain_id: chain_id.ok_or_else(|| missing("Chain ID"))?,
			nonce: nonce.ok_or_else(|| missing("Nonce"))?,
			issued_at: issued_at.ok_or_else(|| missing("Issued At"))?,
			expiration_time,
		})
	}
}

/// Verifies a sign-in message against its signature and the caller's
/// expectations. Does not itself enforce replay protection; the caller is
/// expected to check the returned nonce against a [`crate::ReplayCache`].
pub fn verify_signed_message(
	message: &str,
	signature: &str,
	expected_address: &str,
	settings: &CryptoSettings,
) -> Result<VerifiedSignIn> {
	let parsed = SignInMessage::parse(message)?;

	if !settings.allowed_sign_in_domains.iter().any(|d| d.eq_ignore_ascii_case(&parsed.domain)) {
		return Err(CryptoError::UntrustedDomain(parsed.domain));
	}
	if !settings.allowed_sign_in_chain_ids.contains(&parsed.chain_id) {
		return Err(CryptoError::UntrustedChainId(parsed.chain_id));
	}

	let now = Utc::now();
	let skew = Duration::seconds(settings.sign_in_skew_secs);
	let max_age = Duration::seconds(settings.sign_in_max_age_secs);

	if parsed.issued_at > now + skew {
		return Err(CryptoError::NotYetValid);
	}
	if now - parsed.issued_at > max_age {
		return Err(CryptoError::Expired);
	}
	if let Some(expiration) = parsed.expiration_time {
		if expiration + skew < now {
			return Err(CryptoError::Expired);
		}
	}

	let sig: Signature = signature.parse().map_err(|_| CryptoError::InvalidSignature)?;
	let recovered = sig.recover(message).map_err(|_| CryptoError::InvalidSignature)?;
	let recovered = format!("{recovered:#x}").to_lowercase();

	if recovered != parsed.address.to_lowercase() || recovered != expected_address.to_lowercase() {
		return Err(CryptoError::InvalidSignature);
	}

	Ok(VerifiedSignIn { nonce: parsed.nonce })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_message() -> String {
		format!(
			"example.com wants you to sign in with your Ethereum account:\n\
			 0x0000000000000000000000000000000000000001\n\
			 \n\
			 Sign in to the bounty platform.\n\
			 \n\
			 URI: https://example.com\n\
			 Version: 1\n\
			 Chain ID: 1\n\
			 Nonce: abc123\n\
			 Issued At: {}\n",
			Utc::now().to_rfc3339()
		)
	}

	#[test]
	fn parses_all_documented_fields() {
		let parsed = SignInMessage::parse(&sample_message()).unwrap();
		assert_eq!(parsed.domain, "example.com");
		assert_eq!(parsed.chain_id, 1);
		assert_eq!(parsed.nonce, "abc123");
		assert_eq!(parsed.expiration_time, None);
	}

	#[test]
	fn rejects_messages_missing_the_domain_header() {
		let err = SignInMessage::parse("not a siwe message").unwrap_err();
		assert!(matches!(err, CryptoError::Malformed(_)));
	}

	#[test]
	fn rejects_untrusted_domains() {
		let settings = CryptoSettings {
			proof_encryption_keys: Default::default(),
			default_proof_encryption_key_id: "default".to_string(),
			allowed_sign_in_domains: vec!["other.example".to_string()],
			allowed_sign_in_chain_ids: vec![1],
			sign_in_max_age_secs: 600,
			sign_in_skew_secs: 120,
		};
		let err = verify_signed_message(
			&sample_message(),
			"0x00",
			"0x0000000000000000000000000000000000000001",
			&settings,
		)
		.unwrap_err();
		assert!(matches!(err, CryptoError::UntrustedDomain(_)));
	}
}
