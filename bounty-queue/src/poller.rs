use std::{future::Future, sync::Arc};

use bounty_primitives::CoreError;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::{backoff, queue::Queue, queue::EMPTY_POLL_INTERVAL, rate_limiter::RateLimiter};

/// Drives one named queue: claims jobs up to `concurrency` at a time,
/// rate-limited, dispatching each to `handler`. Retries are governed by
/// `CoreError::is_transient` - the single place §7 says this decision
/// belongs - so `Poller` itself never re-implements retry-vs-terminal logic
/// per pipeline.
pub struct Poller {
	queue: Queue,
	queue_name: &'static str,
	worker_id: String,
	concurrency: Arc<Semaphore>,
	rate_limiter: Option<Arc<RateLimiter>>,
	retry_base: std::time::Duration,
}

impl Poller {
	pub fn new(
		queue: Queue,
		queue_name: &'static str,
		worker_id: String,
		concurrency: usize,
		rate_limit_per_sec: Option<f64>,
	) -> Self {
		Self {
			queue,
			queue_name,
			worker_id,
			concurrency: Arc::new(Semaphore::new(concurrency)),
			rate_limiter: rate_limit_per_sec.map(|r| Arc::new(RateLimiter::per_second(r))),
			retry_base: std::time::Duration::from_secs(1),
		}
	}

	/// Runs until `shutdown` resolves. Each claimed job is spawned as its
	/// own task bounded by the concurrency semaphore, so a slow handler
	/// never blocks other in-flight jobs on the same queue.
	pub async fn run<H, Fut>(&self, mut shutdown: impl Future<Output = ()> + Unpin, handler: H)
	where
		H: Fn(crate::job::Job) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
	{
		let handler = Arc::new(handler);
		loop {
			if let Some(limiter) = &self.rate_limiter {
				limiter.acquire().await;
			}

			let permit = tokio::select! {
				permit = self.concurrency.clone().acquire_owned() => permit.expect("semaphore not closed"),
				_ = &mut shutdown => {
					info!(queue = self.queue_name, "poller shutting down");
					return;
				}
			};

			match self.queue.claim(self.queue_name, &self.worker_id).await {
				Ok(Some(job)) => {
					let queue = self.queue.clone();
					let handler = handler.clone();
					let queue_name = self.queue_name;
					let retry_base = self.retry_base;
					tokio::spawn(async move {
						let _permit = permit;
						let id = job.id;
						let attempts = job.attempts;
						let max_attempts = job.max_attempts;
						match handler(job).await {
							Ok(()) => {
								if let Err(e) = queue.complete(id).await {
									error!(queue = queue_name, job_id = id, error = %e, "failed to mark job complete");
								}
							}
							Err(err) if err.is_transient() && attempts + 1 < max_attempts => {
								let run_at = backoff::next_run_at(retry_base, attempts);
								warn!(queue = queue_name, job_id = id, %err, "transient failure, retrying");
								if let Err(e) = queue.fail_retry(id, run_at).await {
									error!(queue = queue_name, job_id = id, error = %e, "failed to schedule retry");
								}
							}
							Err(err) => {
								error!(queue = queue_name, job_id = id, %err, "terminal failure");
								if let Err(e) = queue.fail_terminal(id).await {
									error!(queue = queue_name, job_id = id, error = %e, "failed to mark job failed");
								}
							}
						}
					});
				}
				Ok(None) => {
					drop(permit);
					tokio::time::sleep(EMPTY_POLL_INTERVAL).await;
				}
				Err(e) => {
					drop(permit);
					error!(queue = self.queue_name, error = %e, "claim failed");
					tokio::time::sleep(EMPTY_POLL_INTERVAL).await;
				}
			}
		}
	}
}
