use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ids::FeeRequestId, ids::ProtocolId, money::Wei};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fee_request_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeRequestType {
	ProtocolRegistration,
	FindingSubmission,
	ScanRequestFee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fee_request_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeRequestStatus {
	Pending,
	Completed,
	Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRequest {
	pub id: FeeRequestId,
	pub request_type: FeeRequestType,
	pub requester_address: String,
	pub amount: Wei,
	pub status: FeeRequestStatus,
	pub tx_hash: Option<String>,
	pub fingerprint: Option<String>,
	pub protocol_id: Option<ProtocolId>,
	pub expires_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

/// A 402-style resource descriptor returned at the API boundary when a fee
/// is required before a request proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeChallenge {
	pub scheme: String,
	pub price: Wei,
	pub network: String,
	pub pay_to: String,
	pub description: String,
}
