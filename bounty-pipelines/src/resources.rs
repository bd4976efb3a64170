//! RAII guard owning the checkout directory and sandbox handle a scan or
//! validation run acquires, so every exit path - success, `?`, or panic
//! unwind - releases both without the step sequence having to remember to.
//!
//! Cleanup is fire-and-forget: `Drop` cannot `.await`, so it hands the
//! async teardown work to the ambient Tokio runtime via `Handle::spawn`
//! rather than blocking the dropping thread. A run outside a Tokio runtime
//! (unit tests that never spawned a handle) silently skips cleanup, which
//! is fine since there is nothing live to clean up in that case.

use std::path::PathBuf;
use std::sync::Arc;

use bounty_sandbox::{SandboxApi, SandboxHandle};
use tracing::warn;

pub struct ScanResources {
	checkout: Option<PathBuf>,
	sandbox_handle: Option<SandboxHandle>,
	sandbox: Arc<dyn SandboxApi>,
}

impl ScanResources {
	pub fn new(sandbox: Arc<dyn SandboxApi>) -> Self {
		Self { checkout: None, sandbox_handle: None, sandbox }
	}

	pub fn track_checkout(&mut self, path: PathBuf) {
		self.checkout = Some(path);
	}

	pub fn track_sandbox(&mut self, handle: SandboxHandle) {
		self.sandbox_handle = Some(handle);
	}

	/// Hands the sandbox handle back to the caller for a step that needs it
	/// directly (deploy, execute-exploit) without giving up cleanup - the
	/// handle is re-tracked by the caller via `track_sandbox` once done, or
	/// left untracked if the step itself took ownership through to CLEANUP.
	pub fn sandbox_handle(&self) -> Option<&SandboxHandle> {
		self.sandbox_handle.as_ref()
	}

	pub fn sandbox_handle_mut(&mut self) -> Option<&mut SandboxHandle> {
		self.sandbox_handle.as_mut()
	}
}

impl Drop for ScanResources {
	fn drop(&mut self) {
		if let Some(checkout) = self.checkout.take() {
			if let Ok(handle) = tokio::runtime::Handle::try_current() {
				handle.spawn(async move {
					if let Err(e) = tokio::fs::remove_dir_all(&checkout).await {
						if e.kind() != std::io::ErrorKind::NotFound {
							warn!(path = %checkout.display(), error = %e, "failed to remove checkout directory during cleanup");
						}
					}
				});
			}
		}

		if let Some(mut sandbox_handle) = self.sandbox_handle.take() {
			let sandbox = self.sandbox.clone();
			if let Ok(handle) = tokio::runtime::Handle::try_current() {
				handle.spawn(async move {
					if let Err(e) = sandbox.kill(&mut sandbox_handle).await {
						warn!(error = %e, "failed to kill sandbox during cleanup");
					}
				});
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bounty_sandbox::MockSandboxApi;

	#[tokio::test]
	async fn drop_with_nothing_tracked_spawns_no_work() {
		let resources = ScanResources::new(Arc::new(MockSandboxApi::new()));
		drop(resources);
		tokio::task::yield_now().await;
	}

	#[tokio::test]
	async fn drop_removes_the_tracked_checkout_directory() {
		let dir = std::env::temp_dir().join(format!("bounty-scan-resources-test-{}", uuid::Uuid::new_v4()));
		tokio::fs::create_dir_all(&dir).await.unwrap();

		let mut resources = ScanResources::new(Arc::new(MockSandboxApi::new()));
		resources.track_checkout(dir.clone());
		drop(resources);

		for _ in 0..20 {
			tokio::task::yield_now().await;
			if !dir.exists() {
				break;
			}
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		}
		assert!(!dir.exists());
	}
}
