use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares an opaque, UUID-backed identifier newtype for one entity family.
///
/// Every id in the data model is otherwise interchangeable (all are just
/// UUIDs) but mixing up a `ScanId` and a `ProtocolId` at a call site is a
/// real bug class; the newtypes exist so the compiler catches it.
macro_rules! entity_id {
	($name:ident) => {
		#[derive(
			Debug,
			Clone,
			Copy,
			PartialEq,
			Eq,
			PartialOrd,
			Ord,
			Hash,
			Serialize,
			Deserialize,
			sqlx::Type,
		)]
		#[sqlx(transparent)]
		pub struct $name(pub Uuid);

		impl $name {
			pub fn new() -> Self {
				Self(Uuid::new_v4())
			}
		}

		impl Default for $name {
			fn default() -> Self {
				Self::new()
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}", self.0)
			}
		}
	};
}

entity_id!(ProtocolId);
entity_id!(ScanId);
entity_id!(FindingId);
entity_id!(ProofId);
entity_id!(ValidationId);
entity_id!(PaymentId);
entity_id!(ReconciliationId);
entity_id!(AgentIdentityId);
entity_id!(FeeRequestId);
