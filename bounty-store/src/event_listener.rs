use bounty_primitives::event_listener::EventListenerState;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::Result;

#[derive(sqlx::FromRow)]
struct EventListenerStateRow {
	contract_address: String,
	event_name: String,
	last_processed_block: i64,
}

impl From<EventListenerStateRow> for EventListenerState {
	fn from(row: EventListenerStateRow) -> Self {
		EventListenerState {
			contract_address: row.contract_address,
			event_name: row.event_name,
			last_processed_block: row.last_processed_block as u64,
		}
	}
}

#[derive(Clone)]
pub struct EventListenerStateRepository {
	pool: PgPool,
}

impl EventListenerStateRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(
		&self,
		contract_address: &str,
		event_name: &str,
	) -> Result<Option<EventListenerState>> {
		Ok(sqlx::query_as::<_, EventListenerStateRow>(
			"SELECT * FROM event_listener_states WHERE contract_address = $1 AND event_name = $2",
		)
		.bind(contract_address)
		.bind(event_name)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into))
	}

	/// Advances the checkpoint inside the caller's reconciliation
	/// transaction, so a crash between "record reconciliation row" and
	/// "advance checkpoint" can never happen - both commit together or not
	/// at all.
	pub async fn advance(
		&self,
		tx: &mut Transaction<'_, Postgres>,
		contract_address: &str,
		event_name: &str,
		last_processed_block: u64,
	) -> Result<()> {
		sqlx::query(
			"INSERT INTO event_listener_states (contract_address, event_name, last_processed_block) \
			 VALUES ($1,$2,$3) \
			 ON CONFLICT (contract_address, event_name) DO UPDATE SET \
			 last_processed_block = GREATEST(event_listener_states.last_processed_block, EXCLUDED.last_processed_block)",
		)
		.bind(contract_address)
		.bind(event_name)
		.bind(last_processed_block as i64)
		.execute(&mut **tx)
		.await?;
		Ok(())
	}
}
