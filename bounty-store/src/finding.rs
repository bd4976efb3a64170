use bounty_primitives::{
	finding::{AnalysisMethod, Finding, FindingStatus, Severity},
	ids::{AgentIdentityId, FindingId, ScanId},
};
use sqlx::PgPool;

use crate::error::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct FindingRow {
	id: FindingId,
	scan_id: ScanId,
	researcher_agent_id: AgentIdentityId,
	vulnerability_type: String,
	severity: Severity,
	file_path: String,
	line_number: Option<i32>,
	description: String,
	confidence: f64,
	analysis_method: AnalysisMethod,
	ai_confidence: Option<f64>,
	status: FindingStatus,
	validated_at: Option<chrono::DateTime<chrono::Utc>>,
	code_snippet: Option<String>,
	remediation_suggestion: Option<String>,
}

impl From<FindingRow> for Finding {
	fn from(row: FindingRow) -> Self {
		Finding {
			id: row.id,
			scan_id: row.scan_id,
			researcher_agent_id: row.researcher_agent_id,
			vulnerability_type: row.vulnerability_type,
			severity: row.severity,
			file_path: row.file_path,
			line_number: row.line_number.map(|v| v as u32),
			description: row.description,
			confidence: row.confidence,
			analysis_method: row.analysis_method,
			ai_confidence: row.ai_confidence,
			status: row.status,
			validated_at: row.validated_at,
			code_snippet: row.code_snippet,
			remediation_suggestion: row.remediation_suggestion,
		}
	}
}

#[derive(Clone)]
pub struct FindingRepository {
	pool: PgPool,
}

impl FindingRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: FindingId) -> Result<Finding> {
		sqlx::query_as::<_, FindingRow>("SELECT * FROM findings WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.map(Into::into)
			.ok_or_else(|| StoreError::NotFound(format!("finding {id}")))
	}

	pub async fn list_by_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>> {
		let rows = sqlx::query_as::<_, FindingRow>("SELECT * FROM findings WHERE scan_id = $1")
			.bind(scan_id)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	/// Scoped listing for the Validations API surface: `scan_id` and
	/// `status` each narrow the result when present, combined with AND.
	pub async fn list(&self, scan_id: Option<ScanId>, status: Option<FindingStatus>) -> Result<Vec<Finding>> {
		let rows = sqlx::query_as::<_, FindingRow>(
			"SELECT * FROM findings WHERE ($1::uuid IS NULL OR scan_id = $1) \
			 AND ($2::finding_status IS NULL OR status = $2) ORDER BY id",
		)
		.bind(scan_id)
		.bind(status)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(Into::into).collect())
	}

	pub async fn insert(&self, finding: &Finding) -> Result<()> {
		sqlx::query(
			"INSERT INTO findings (id, scan_id, researcher_agent_id, vulnerability_type, severity, \
			 file_path, line_number, description, confidence, analysis_method, ai_confidence, status, \
			 validated_at, code_snippet, remediation_suggestion) \
			 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
		)
		.bind(finding.id)
		.bind(finding.scan_id)
		.bind(finding.researcher_agent_id)
		.bind(&finding.vulnerability_type)
		.bind(finding.severity)
		.bind(&finding.file_path)
		.bind(finding.line_number.map(|v| v as i32))
		.bind(&finding.description)
		.bind(finding.confidence)
		.bind(finding.analysis_method)
		.bind(finding.ai_confidence)
		.bind(finding.status)
		.bind(finding.validated_at)
		.bind(&finding.code_snippet)
		.bind(&finding.remediation_suggestion)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// `Finding.status = CONFIRMED` must imply a CONFIRMED proof exists; the
	/// caller (Validator pipeline) only calls this after creating that proof.
	pub async fn set_status(&self, id: FindingId, status: FindingStatus) -> Result<()> {
		sqlx::query("UPDATE findings SET status = $2, validated_at = now() WHERE id = $1")
			.bind(id)
			.bind(status)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}
