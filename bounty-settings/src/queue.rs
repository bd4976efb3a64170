use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
	#[serde(default = "default_scan_concurrency")]
	pub scan_concurrency: u32,
	#[serde(default = "default_payment_concurrency")]
	pub payment_concurrency: u32,
	#[serde(default = "default_payment_rate_per_sec")]
	pub payment_rate_per_sec: u32,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_backoff_base_ms")]
	pub backoff_base_ms: u64,
	/// Staleness threshold (seconds) for the stuck-proof sweeper.
	#[serde(default = "default_stuck_proof_threshold_secs")]
	pub stuck_proof_threshold_secs: u64,
	/// How long a COMPLETED-but-unreconciled payment can go before the
	/// reconciler's UNCONFIRMED sweeper flags it.
	#[serde(default = "default_unconfirmed_payment_threshold_secs")]
	pub unconfirmed_payment_threshold_secs: u64,
	/// How often the reconciler's UNCONFIRMED sweeper runs.
	#[serde(default = "default_reconciler_sweep_interval_secs")]
	pub reconciler_sweep_interval_secs: u64,
	/// How long a payment can sit UNCONFIRMED before the sweeper escalates it
	/// to MISSING_PAYMENT, the more urgent of the two reconciler-sweeper
	/// statuses.
	#[serde(default = "default_missing_payment_threshold_secs")]
	pub missing_payment_threshold_secs: u64,
}

fn default_scan_concurrency() -> u32 {
	1
}

fn default_payment_concurrency() -> u32 {
	5
}

fn default_payment_rate_per_sec() -> u32 {
	10
}

fn default_max_attempts() -> u32 {
	3
}

fn default_backoff_base_ms() -> u64 {
	500
}

fn default_stuck_proof_threshold_secs() -> u64 {
	900
}

fn default_unconfirmed_payment_threshold_secs() -> u64 {
	3_600
}

fn default_reconciler_sweep_interval_secs() -> u64 {
	300
}

fn default_missing_payment_threshold_secs() -> u64 {
	86_400
}
