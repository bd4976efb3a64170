use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProtocolId, ScanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scan_state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanState {
	Queued,
	Running,
	Succeeded,
	Failed,
	Canceled,
}

impl ScanState {
	/// Terminal states must carry a `completed_at`; only these three do.
	pub fn is_terminal(self) -> bool {
		matches!(self, ScanState::Succeeded | ScanState::Failed | ScanState::Canceled)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tool_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolStatus {
	Available,
	ToolUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
	pub id: ScanId,
	pub protocol_id: ProtocolId,
	pub state: ScanState,
	pub current_step: String,
	pub target_branch: Option<String>,
	pub target_commit: Option<String>,
	pub retry_count: u32,
	pub tool_status: Option<ToolStatus>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub error_code: Option<String>,
	pub error_message: Option<String>,
}
