use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log severity carried by a log-topic event. Distinct from
/// `bounty_primitives::finding::Severity` - this classifies a log line, not
/// a vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
	Info,
	Analysis,
	Alert,
	Warn,
	Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressData {
	pub current_step: String,
	pub state: String,
	pub progress: u8,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogData {
	pub level: LogLevel,
	pub message: String,
}

/// Which entity a `BusEvent` is about - exactly one of these is set on the
/// envelope, matching the `scanId|validationId|protocolId` union in §6.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
	Scan(&'a str),
	Validation(&'a str),
	Protocol(&'a str),
	Payment(&'a str),
}

/// The envelope every event carries regardless of topic, matching the
/// `{eventType, timestamp, scanId|validationId|protocolId, data}` shape at
/// the external-interface boundary (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
	pub event_type: String,
	pub timestamp: DateTime<Utc>,
	pub scan_id: Option<String>,
	pub validation_id: Option<String>,
	pub protocol_id: Option<String>,
	pub payment_id: Option<String>,
	pub data: serde_json::Value,
}

impl BusEvent {
	pub fn progress(event_type: &str, entity: EntityRef<'_>, data: ProgressData) -> Self {
		Self::new(event_type, entity, serde_json::to_value(data).expect("ProgressData is always representable as JSON"))
	}

	pub fn log(event_type: &str, entity: EntityRef<'_>, data: LogData) -> Self {
		Self::new(event_type, entity, serde_json::to_value(data).expect("LogData is always representable as JSON"))
	}

	fn new(event_type: &str, entity: EntityRef<'_>, data: serde_json::Value) -> Self {
		let mut event = BusEvent {
			event_type: event_type.to_string(),
			timestamp: Utc::now(),
			scan_id: None,
			validation_id: None,
			protocol_id: None,
			payment_id: None,
			data,
		};
		match entity {
			EntityRef::Scan(id) => event.scan_id = Some(id.to_string()),
			EntityRef::Validation(id) => event.validation_id = Some(id.to_string()),
			EntityRef::Protocol(id) => event.protocol_id = Some(id.to_string()),
			EntityRef::Payment(id) => event.payment_id = Some(id.to_string()),
		}
		event
	}
}
