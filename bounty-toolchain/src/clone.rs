//! Shallow, host-allow-listed git clone. Mirrors the engine's habit of
//! validating untrusted input (a protocol owner's `source_url`) before
//! it ever reaches a subprocess.

use std::{path::Path, time::Duration};

use tokio::process::Command;
use tracing::warn;
use url::Url;

use crate::{
	error::{Result, ToolchainError},
	process::run_capped,
};

pub fn validate_source_url(source_url: &str, allowed_host: &str) -> Result<Url> {
	let url = Url::parse(source_url).map_err(|e| ToolchainError::InvalidSource(e.to_string()))?;
	match url.scheme() {
		"https" => {}
		other => return Err(ToolchainError::InvalidSource(format!("unsupported scheme: {other}"))),
	}
	let host = url.host_str().ok_or_else(|| ToolchainError::InvalidSource("missing host".to_string()))?;
	if !host.eq_ignore_ascii_case(allowed_host) {
		return Err(ToolchainError::InvalidSource(format!("host {host} is not {allowed_host}")));
	}
	Ok(url)
}

/// Clones `branch` of `source_url` into `dest`, replacing anything already
/// there. `dest` is expected to be a scratch directory owned by the caller,
/// never a path under the bounty-worker's own checkout.
pub async fn clone_branch(source_url: &str, branch: &str, allowed_host: &str, dest: &Path) -> Result<()> {
	validate_source_url(source_url, allowed_host)?;

	match tokio::fs::remove_dir_all(dest).await {
		Ok(()) => {}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => return Err(ToolchainError::CloneFailed(e.to_string())),
	}

	let mut cmd = Command::new("git");
	cmd.args(["clone", "--depth", "1", "--branch", branch, source_url]).arg(dest);

	let out = run_capped(cmd, Duration::from_secs(60), 16 * 1024 * 1024)
		.await
		.map_err(|e| ToolchainError::CloneFailed(e.to_string()))?;
	if !out.status.success() {
		return Err(ToolchainError::CloneFailed(String::from_utf8_lossy(&out.stderr).into_owned()));
	}

	init_submodules(dest).await;
	Ok(())
}

/// Best-effort `git submodule update --init` against an already-cloned
/// checkout. Protocols without submodules are the common case, and a
/// submodule fetch failure (private submodule, network hiccup) shouldn't
/// fail a clone that otherwise succeeded, so errors are logged, not returned.
async fn init_submodules(checkout_dir: &Path) {
	let mut cmd = Command::new("git");
	cmd.args(["submodule", "update", "--init", "--depth", "1"]).current_dir(checkout_dir);

	match run_capped(cmd, Duration::from_secs(60), 16 * 1024 * 1024).await {
		Ok(out) if !out.status.success() => {
			warn!(
				stderr = %String::from_utf8_lossy(&out.stderr),
				"submodule init failed, continuing without submodules"
			);
		}
		Err(e) => warn!(error = %e, "submodule init failed, continuing without submodules"),
		Ok(_) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_hosts_outside_the_allow_list() {
		let err = validate_source_url("https://evil.example/owner/repo", "github.com").unwrap_err();
		assert!(matches!(err, ToolchainError::InvalidSource(_)));
	}

	#[test]
	fn rejects_non_http_schemes() {
		let err = validate_source_url("git@github.com:owner/repo.git", "github.com").unwrap_err();
		assert!(matches!(err, ToolchainError::InvalidSource(_)));
	}

	#[test]
	fn rejects_plain_http() {
		let err = validate_source_url("http://github.com/owner/repo", "github.com").unwrap_err();
		assert!(matches!(err, ToolchainError::InvalidSource(_)));
	}

	#[test]
	fn accepts_the_allowed_host() {
		let url = validate_source_url("https://github.com/owner/repo", "github.com").unwrap();
		assert_eq!(url.host_str(), Some("github.com"));
	}
}
