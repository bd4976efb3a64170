use std::future::Future;

use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use crate::{cache::Cache, error::Result};

/// Connection pool plus the read-side cache, shared (by `Arc`) across every
/// repository and every pipeline in the worker process.
#[derive(Clone)]
pub struct Store {
	pub(crate) pool: PgPool,
	pub cache: std::sync::Arc<Cache>,
}

impl Store {
	pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
		let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
		Ok(Self { pool, cache: std::sync::Arc::new(Cache::new()) })
	}

	pub async fn migrate(&self) -> Result<()> {
		sqlx::migrate!("./migrations").run(&self.pool).await?;
		Ok(())
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	/// Runs `f` inside a single transaction. Callers that touch more than
	/// one row - e.g. "decrement availableBounty and create a payment row" -
	/// always go through this rather than interleaving separate repository
	/// calls, so partial writes can't be observed.
	pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce(&mut Transaction<'_, Postgres>) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut tx = self.pool.begin().await?;
		let result = f(&mut tx).await?;
		tx.commit().await?;
		Ok(result)
	}
}
