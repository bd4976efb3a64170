//! Durable, Postgres-backed multi-queue job delivery with at-least-once
//! semantics and idempotent job ids.

pub mod backoff;
pub mod error;
pub mod job;
pub mod poller;
pub mod queue;
pub mod rate_limiter;

pub use error::{QueueError, Result};
pub use job::{EnqueueOptions, Job, JobState};
pub use poller::Poller;
pub use queue::Queue;
pub use rate_limiter::RateLimiter;
