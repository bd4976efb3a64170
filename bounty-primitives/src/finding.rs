use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentIdentityId, FindingId, ScanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "severity", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
	Info,
	Low,
	Medium,
	High,
	Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "analysis_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisMethod {
	Static,
	Ai,
	Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "finding_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingStatus {
	Pending,
	Validated,
	Rejected,
	Duplicate,
	Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
	pub id: FindingId,
	pub scan_id: ScanId,
	/// The agent (escrow/fee-paying identity) that submitted this finding;
	/// also the payee once the finding's proof is CONFIRMED.
	pub researcher_agent_id: AgentIdentityId,
	pub vulnerability_type: String,
	pub severity: Severity,
	pub file_path: String,
	pub line_number: Option<u32>,
	pub description: String,
	pub confidence: f64,
	pub analysis_method: AnalysisMethod,
	pub ai_confidence: Option<f64>,
	pub status: FindingStatus,
	pub validated_at: Option<DateTime<Utc>>,
	pub code_snippet: Option<String>,
	pub remediation_suggestion: Option<String>,
}
