use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A simple per-queue token-bucket rate limiter. Not a `governor`-grade
/// implementation; a gate sized to the spec's modest throughput
/// requirements (e.g. payment processing at 10/s), following the Design
/// Notes' "or a simple `tokio::time::interval` gate" alternative.
pub struct RateLimiter {
	min_interval: Duration,
	last: Mutex<Option<Instant>>,
}

impl RateLimiter {
	pub fn per_second(rate: f64) -> Self {
		let min_interval = Duration::from_secs_f64(1.0 / rate.max(0.001));
		Self { min_interval, last: Mutex::new(None) }
	}

	/// Blocks until the next slot is available, then reserves it.
	pub async fn acquire(&self) {
		let mut last = self.last.lock().await;
		let now = Instant::now();
		if let Some(prev) = *last {
			let earliest = prev + self.min_interval;
			if earliest > now {
				tokio::time::sleep_until(earliest).await;
			}
		}
		*last = Some(Instant::now());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn spaces_out_acquisitions() {
		let limiter = RateLimiter::per_second(100.0);
		let start = Instant::now();
		for _ in 0..3 {
			limiter.acquire().await;
		}
		assert!(start.elapsed() >= Duration::from_millis(15));
	}
}
