use bounty_primitives::{
	agent::{AgentFeedback, AgentIdentity, AgentReputation, AgentType, FeedbackType},
	ids::{AgentIdentityId, FindingId, ValidationId},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct AgentIdentityRow {
	id: AgentIdentityId,
	wallet_address: String,
	agent_type: AgentType,
	active: bool,
	on_chain_token_id: Option<i64>,
	registered_at: chrono::DateTime<chrono::Utc>,
}

impl From<AgentIdentityRow> for AgentIdentity {
	fn from(row: AgentIdentityRow) -> Self {
		AgentIdentity {
			id: row.id,
			wallet_address: row.wallet_address,
			agent_type: row.agent_type,
			active: row.active,
			on_chain_token_id: row.on_chain_token_id.map(|v| v as u64),
			registered_at: row.registered_at,
		}
	}
}

#[derive(Clone)]
pub struct AgentIdentityRepository {
	pool: PgPool,
}

impl AgentIdentityRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: AgentIdentityId) -> Result<AgentIdentity> {
		sqlx::query_as::<_, AgentIdentityRow>("SELECT * FROM agent_identities WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("agent identity {id}")))
	}

	pub async fn get_by_wallet(&self, wallet_address: &str) -> Result<Option<AgentIdentity>> {
		Ok(sqlx::query_as::<_, AgentIdentityRow>(
			"SELECT * FROM agent_identities WHERE wallet_address = $1",
		)
		.bind(wallet_address)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into))
	}

	pub async fn insert(&self, agent: &AgentIdentity) -> Result<()> {
		sqlx::query(
			"INSERT INTO agent_identities (id, wallet_address, agent_type, active, on_chain_token_id, \
			 registered_at) VALUES ($1,$2,$3,$4,$5,$6)",
		)
		.bind(agent.id)
		.bind(&agent.wallet_address)
		.bind(agent.agent_type)
		.bind(agent.active)
		.bind(agent.on_chain_token_id.map(|v| v as i64))
		.bind(agent.registered_at)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn set_active(&self, id: AgentIdentityId, active: bool) -> Result<()> {
		sqlx::query("UPDATE agent_identities SET active = $2 WHERE id = $1")
			.bind(id)
			.bind(active)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct AgentReputationRow {
	agent_identity_id: AgentIdentityId,
	confirmed_count: i32,
	rejected_count: i32,
	inconclusive_count: i32,
	total_submissions: i32,
	score: f64,
	last_updated: chrono::DateTime<chrono::Utc>,
}

impl From<AgentReputationRow> for AgentReputation {
	fn from(row: AgentReputationRow) -> Self {
		AgentReputation {
			agent_identity_id: row.agent_identity_id,
			confirmed_count: row.confirmed_count as u32,
			rejected_count: row.rejected_count as u32,
			inconclusive_count: row.inconclusive_count as u32,
			total_submissions: row.total_submissions as u32,
			score: row.score,
			last_updated: row.last_updated,
		}
	}
}

#[derive(Clone)]
pub struct AgentReputationRepository {
	pool: PgPool,
}

impl AgentReputationRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, agent_identity_id: AgentIdentityId) -> Result<AgentReputation> {
		sqlx::query_as::<_, AgentReputationRow>(
			"SELECT * FROM agent_reputations WHERE agent_identity_id = $1",
		)
		.bind(agent_identity_id)
		.fetch_optional(&self.pool)
		.await?
		.map(Into::into)
		.ok_or_else(|| StoreError::NotFound(format!("agent reputation {agent_identity_id}")))
	}

	pub async fn ensure_row(&self, agent_identity_id: AgentIdentityId) -> Result<()> {
		sqlx::query(
			"INSERT INTO agent_reputations (agent_identity_id, confirmed_count, rejected_count, \
			 inconclusive_count, total_submissions, score, last_updated) \
			 VALUES ($1, 0, 0, 0, 0, 0.0, now()) ON CONFLICT (agent_identity_id) DO NOTHING",
		)
		.bind(agent_identity_id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Increments exactly one of the three counts and recomputes `score`
	/// server-side in the same statement, so the counts-consistency
	/// invariant in `AgentReputation::counts_consistent` can never observe a
	/// half-applied update.
	pub async fn record_outcome(&self, agent_identity_id: AgentIdentityId, feedback: FeedbackType) -> Result<()> {
		self.ensure_row(agent_identity_id).await?;
		let column = match feedback {
			FeedbackType::Rejected => "rejected_count",
			FeedbackType::ConfirmedCritical
			| FeedbackType::ConfirmedHigh
			| FeedbackType::ConfirmedMedium
			| FeedbackType::ConfirmedLow
			| FeedbackType::ConfirmedInformational => "confirmed_count",
		};
		let sql = format!(
			"UPDATE agent_reputations SET {column} = {column} + 1, total_submissions = total_submissions + 1, \
			 score = (confirmed_count::float8 + CASE WHEN '{column}' = 'confirmed_count' THEN 1 ELSE 0 END) \
			 / GREATEST(total_submissions + 1, 1) * 100.0, last_updated = now() \
			 WHERE agent_identity_id = $1"
		);
		sqlx::query(&sql).bind(agent_identity_id).execute(&self.pool).await?;
		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct AgentFeedbackRow {
	id: Uuid,
	researcher_agent_id: AgentIdentityId,
	validator_agent_id: AgentIdentityId,
	feedback_type: FeedbackType,
	on_chain_feedback_id: Option<i64>,
	finding_id: Option<FindingId>,
	validation_id: Option<ValidationId>,
	created_at: chrono::DateTime<chrono::Utc>,
}

impl From<AgentFeedbackRow> for AgentFeedback {
	fn from(row: AgentFeedbackRow) -> Self {
		AgentFeedback {
			id: row.id,
			researcher_agent_id: row.researcher_agent_id,
			validator_agent_id: row.validator_agent_id,
			feedback_type: row.feedback_type,
			on_chain_feedback_id: row.on_chain_feedback_id.map(|v| v as u64),
			finding_id: row.finding_id,
			validation_id: row.validation_id,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone)]
pub struct AgentFeedbackRepository {
	pool: PgPool,
}

impl AgentFeedbackRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn list_for_validator(&self, validator_agent_id: AgentIdentityId) -> Result<Vec<AgentFeedback>> {
		let rows = sqlx::query_as::<_, AgentFeedbackRow>(
			"SELECT * FROM agent_feedback WHERE validator_agent_id = $1 ORDER BY created_at DESC",
		)
		.bind(validator_agent_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn list_for_researcher(&self, researcher_agent_id: AgentIdentityId) -> Result<Vec<AgentFeedback>> {
		let rows = sqlx::query_as::<_, AgentFeedbackRow>(
			"SELECT * FROM agent_feedback WHERE researcher_agent_id = $1 ORDER BY created_at DESC",
		)
		.bind(researcher_agent_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn insert(&self, feedback: &AgentFeedback) -> Result<()> {
		sqlx::query(
			"INSERT INTO agent_feedback (id, researcher_agent_id, validator_agent_id, feedback_type, \
			 on_chain_feedback_id, finding_id, validation_id, created_at) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
		)
		.bind(feedback.id)
		.bind(feedback.researcher_agent_id)
		.bind(feedback.validator_agent_id)
		.bind(feedback.feedback_type)
		.bind(feedback.on_chain_feedback_id.map(|v| v as i64))
		.bind(feedback.finding_id)
		.bind(feedback.validation_id)
		.bind(feedback.created_at)
		.execute(&self.pool)
		.await?;
		Ok(())
	}
}
