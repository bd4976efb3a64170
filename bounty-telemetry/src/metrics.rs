use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

/// Worker-wide Prometheus registry. One instance is constructed at startup
/// and shared (by reference) across every queue poller and pipeline.
pub struct Metrics {
	pub registry: Registry,
	pub jobs_processed: IntCounterVec,
	pub jobs_retried: IntCounterVec,
	pub jobs_failed: IntCounterVec,
	pub sandbox_ports_leased: IntGaugeVec,
	pub pipeline_step_duration: Histogram,
}

impl Metrics {
	pub fn new() -> anyhow::Result<Self> {
		let registry = Registry::new();

		let jobs_processed = IntCounterVec::new(
			Opts::new("bounty_jobs_processed_total", "jobs processed per queue"),
			&["queue"],
		)?;
		let jobs_retried = IntCounterVec::new(
			Opts::new("bounty_jobs_retried_total", "jobs retried per queue"),
			&["queue"],
		)?;
		let jobs_failed = IntCounterVec::new(
			Opts::new("bounty_jobs_failed_total", "jobs permanently failed per queue"),
			&["queue"],
		)?;
		let sandbox_ports_leased = IntGaugeVec::new(
			Opts::new("bounty_sandbox_ports_leased", "ports currently leased by the sandbox"),
			&["pool"],
		)?;
		let pipeline_step_duration = Histogram::with_opts(HistogramOpts::new(
			"bounty_pipeline_step_duration_seconds",
			"duration of a single pipeline step",
		))?;

		registry.register(Box::new(jobs_processed.clone()))?;
		registry.register(Box::new(jobs_retried.clone()))?;
		registry.register(Box::new(jobs_failed.clone()))?;
		registry.register(Box::new(sandbox_ports_leased.clone()))?;
		registry.register(Box::new(pipeline_step_duration.clone()))?;

		Ok(Self {
			registry,
			jobs_processed,
			jobs_retried,
			jobs_failed,
			sandbox_ports_leased,
			pipeline_step_duration,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn metrics_register_without_collision() {
		let metrics = Metrics::new().unwrap();
		metrics.jobs_processed.with_label_values(&["scan-jobs"]).inc();
		assert_eq!(metrics.registry.gather().len(), 5);
	}
}
