use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};

/// Read-side acceleration only; every write path invalidates by prefix
/// before returning success, and nothing here is treated as authoritative -
/// on a cache miss the caller always falls back to the Store.
#[derive(Default)]
pub struct Cache {
	entries: DashMap<String, (serde_json::Value, Instant)>,
}

impl Cache {
	pub fn new() -> Self {
		Self { entries: DashMap::new() }
	}

	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		let (value, expires_at) = self.entries.get(key).map(|e| e.value().clone())?;
		if Instant::now() >= expires_at {
			self.entries.remove(key);
			return None;
		}
		serde_json::from_value(value).ok()
	}

	pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
		if let Ok(json) = serde_json::to_value(value) {
			self.entries.insert(key.into(), (json, Instant::now() + ttl));
		}
	}

	/// Removes every key starting with `prefix`. Linear scan is fine at the
	/// scale of dashboard/leaderboard read acceleration this cache serves.
	pub fn invalidate_prefix(&self, prefix: &str) {
		self.entries.retain(|k, _| !k.starts_with(prefix));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expired_entries_are_absent() {
		let cache = Cache::new();
		cache.set("leaderboard:week", &42u32, Duration::from_millis(1));
		std::thread::sleep(Duration::from_millis(5));
		assert_eq!(cache.get::<u32>("leaderboard:week"), None);
	}

	#[test]
	fn invalidate_prefix_clears_matching_keys_only() {
		let cache = Cache::new();
		cache.set("leaderboard:week", &1u32, Duration::from_secs(60));
		cache.set("earnings:addr", &2u32, Duration::from_secs(60));
		cache.invalidate_prefix("leaderboard:");
		assert_eq!(cache.get::<u32>("leaderboard:week"), None);
		assert_eq!(cache.get::<u32>("earnings:addr"), Some(2));
	}
}
