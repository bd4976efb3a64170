use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber. `RUST_LOG` controls the
/// filter, defaulting to `info` when unset. `json` switches to the
/// structured formatter used for production log ingestion; plain text is
/// used otherwise, matching the two modes already distinguished by the
/// `tracing-subscriber` features this crate depends on.
pub fn init(json: bool) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let subscriber = fmt().with_env_filter(filter);
	if json {
		subscriber.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
	} else {
		subscriber.try_init().map_err(|e| anyhow::anyhow!(e))?;
	}
	Ok(())
}

#[cfg(test)]
pub mod test_utils {
	/// Installs a `tracing` subscriber for tests, ignoring the "already set"
	/// error from being called more than once per process.
	pub fn init_test_logging() {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	}
}
