use std::{
	collections::HashMap,
	sync::Mutex,
	time::{Duration, Instant},
};

use crate::error::{CryptoError, Result};

/// In-memory nonce replay guard for sign-in verification. Pruned lazily on
/// access; a multi-process deployment needs a shared store to preserve the
/// no-replay property across workers.
pub struct ReplayCache {
	seen: Mutex<HashMap<String, Instant>>,
	ttl: Duration,
}

impl ReplayCache {
	pub fn new(ttl: Duration) -> Self {
		Self { seen: Mutex::new(HashMap::new()), ttl }
	}

	/// Records `nonce` as used, returning an error if it was already seen
	/// within the TTL window.
	pub fn check_and_insert(&self, nonce: &str) -> Result<()> {
		let now = Instant::now();
		let mut seen = self.seen.lock().expect("replay cache mutex poisoned");
		seen.retain(|_, seen_at| now.duration_since(*seen_at) < self.ttl);

		if seen.contains_key(nonce) {
			return Err(CryptoError::ReplayedNonce(nonce.to_string()));
		}
		seen.insert(nonce.to_string(), now);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_a_nonce_seen_twice_within_the_ttl() {
		let cache = ReplayCache::new(Duration::from_secs(60));
		cache.check_and_insert("n1").unwrap();
		let err = cache.check_and_insert("n1").unwrap_err();
		assert!(matches!(err, CryptoError::ReplayedNonce(_)));
	}

	#[test]
	fn a_nonce_is_pruned_once_its_ttl_elapses() {
		let cache = ReplayCache::new(Duration::from_millis(10));
		cache.check_and_insert("n1").unwrap();
		std::thread::sleep(Duration::from_millis(30));
		cache.check_and_insert("n1").unwrap();
	}

	#[test]
	fn distinct_nonces_do_not_collide() {
		let cache = ReplayCache::new(Duration::from_secs(60));
		cache.check_and_insert("n1").unwrap();
		cache.check_and_insert("n2").unwrap();
	}
}
