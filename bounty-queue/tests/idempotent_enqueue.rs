//! Integration tests against a real Postgres instance.
//!
//! Run with:
//! ```bash
//! DATABASE_URL=postgres://localhost/bounty_test cargo test -p bounty-queue --test idempotent_enqueue -- --ignored
//! ```

use bounty_queue::{EnqueueOptions, Queue};
use sqlx::PgPool;

async fn test_pool() -> PgPool {
	let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
	PgPool::connect(&url).await.expect("failed to connect to Postgres")
}

#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn enqueueing_same_job_id_twice_produces_one_row() {
	let pool = test_pool().await;
	let queue = Queue::new(pool.clone());
	queue.migrate().await.unwrap();

	let payload = serde_json::json!({ "protocol_id": "11111111-1111-1111-1111-111111111111" });
	queue.enqueue("scan-jobs", "dup-test", &payload, EnqueueOptions::default()).await.unwrap();
	queue.enqueue("scan-jobs", "dup-test", &payload, EnqueueOptions::default()).await.unwrap();

	let count: (i64,) =
		sqlx::query_as("SELECT count(*) FROM queue_jobs WHERE queue_name = 'scan-jobs' AND job_id = 'dup-test'")
			.fetch_one(&pool)
			.await
			.unwrap();
	assert_eq!(count.0, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance, see DATABASE_URL above"]
async fn claim_is_exclusive_under_concurrent_pollers() {
	let pool = test_pool().await;
	let queue = Queue::new(pool.clone());
	queue.migrate().await.unwrap();

	let payload = serde_json::json!({});
	queue
		.enqueue("validation-queue", "only-job", &payload, EnqueueOptions::default())
		.await
		.unwrap();

	let (a, b) = tokio::join!(
		queue.claim("validation-queue", "worker-a"),
		queue.claim("validation-queue", "worker-b"),
	);
	let claims = [a.unwrap(), b.unwrap()];
	let claimed_count = claims.iter().filter(|c| c.is_some()).count();
	assert_eq!(claimed_count, 1, "exactly one of two concurrent claimants should win the only pending job");
}
