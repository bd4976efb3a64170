use sha2::{Digest, Sha256};

/// Fingerprints a protocol-registration payload so a retried submission of
/// the same (owner, source, branch, contract) is recognized as a duplicate.
/// Returns `None` if any field is empty once trimmed, matching the
/// "fingerprint not applicable" rule.
pub fn fingerprint(
	owner_address: &str,
	source_url: &str,
	branch: &str,
	contract_path: &str,
	contract_name: &str,
) -> Option<String> {
	let fields = [owner_address, source_url, branch, contract_path, contract_name]
		.map(|f| f.trim().to_lowercase());

	if fields.iter().any(|f| f.is_empty()) {
		return None;
	}

	let joined = fields.join("|");
	let digest = Sha256::digest(joined.as_bytes());
	Some(hex::encode(digest))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn missing_field_yields_no_fingerprint() {
		assert!(fingerprint("0xabc", "", "main", "src/A.sol", "A").is_none());
	}

	#[test]
	fn stable_under_case_and_whitespace() {
		let a = fingerprint("0xAbC", "https://github.com/o/r", "  main  ", "src/A.sol", "A").unwrap();
		let b = fingerprint(" 0xabc ", "HTTPS://GITHUB.COM/O/R", "main", "SRC/A.SOL", "a").unwrap();
		assert_eq!(a, b);
	}

	proptest! {
		#[test]
		fn fingerprint_is_stable_under_case_and_whitespace_perturbation(
			owner in "[a-zA-Z0-9]{4,10}",
			source in "[a-zA-Z0-9/:.]{4,20}",
			branch in "[a-zA-Z0-9]{1,10}",
			path in "[a-zA-Z0-9/.]{1,20}",
			name in "[a-zA-Z0-9]{1,10}",
		) {
			let lower = fingerprint(&owner, &source, &branch, &path, &name);
			let upper = fingerprint(
				&format!(" {} ", owner.to_uppercase()),
				&source.to_uppercase(),
				&branch.to_uppercase(),
				&path.to_uppercase(),
				&name.to_uppercase(),
			);
			prop_assert_eq!(lower, upper);
		}

		#[test]
		fn empty_field_always_yields_none(idx in 0..5usize) {
			let mut fields = ["owner", "source", "branch", "path", "name"].map(|s| s.to_string());
			fields[idx] = "   ".to_string();
			let result = fingerprint(&fields[0], &fields[1], &fields[2], &fields[3], &fields[4]);
			prop_assert!(result.is_none());
		}
	}
}
