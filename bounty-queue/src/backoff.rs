//! Exponential backoff with jitter, the same shape as the engine's
//! `retrier.rs::max_sleep_duration`, adapted to produce a `run_at` timestamp
//! persisted in the `queue_jobs` table rather than an in-memory sleep.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

const MAX_DELAY: Duration = Duration::from_secs(10 * 60);

fn capped_exponential(base: Duration, attempt: u32) -> Duration {
	base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_DELAY)
}

/// Next `run_at` for a retried job: half the capped exponential delay, plus
/// a random jitter up to the other half - avoids every failed job in a
/// cohort waking up at exactly the same instant.
pub fn next_run_at(base: Duration, attempt: u32) -> DateTime<Utc> {
	let half = capped_exponential(base, attempt) / 2;
	let jitter = if half.is_zero() { Duration::ZERO } else { rand::thread_rng().gen_range(Duration::ZERO..half) };
	Utc::now() + chrono::Duration::from_std(half + jitter).unwrap_or(chrono::Duration::zero())
}

/// Fixed-interval backoff used by the Sandbox's readiness polling, not the
/// queue's own retry schedule - no jitter, since it's a tight local poll
/// loop rather than a cross-worker stampede risk.
pub async fn poll_until<F, Fut, T, E>(attempts: u32, interval: Duration, mut f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, E>>,
{
	let mut last_err = None;
	for _ in 0..attempts {
		match f().await {
			Ok(t) => return Ok(t),
			Err(e) => {
				last_err = Some(e);
				tokio::time::sleep(interval).await;
			}
		}
	}
	Err(last_err.expect("attempts > 0"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_grows_with_attempt() {
		let now = Utc::now();
		let attempt0 = next_run_at(Duration::from_secs(1), 0);
		let attempt5 = next_run_at(Duration::from_secs(1), 5);
		assert!(attempt0 >= now);
		assert!(attempt5 > attempt0 || attempt5 >= now + chrono::Duration::seconds(1));
	}
}
