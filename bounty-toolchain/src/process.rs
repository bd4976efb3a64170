//! Shared "don't trust the external process" plumbing used by both
//! `compile` and `run_static_analyzer`: a wall-clock timeout and a
//! byte-counting reader that aborts the child rather than buffering an
//! unbounded amount of its output.

use std::{process::ExitStatus, process::Stdio, time::Duration};

use tokio::{
	io::{AsyncRead, AsyncReadExt},
	process::{Child, Command},
};

use crate::error::{Result, ToolchainError};

pub struct CappedOutput {
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
	pub status: ExitStatus,
}

pub async fn run_capped(mut cmd: Command, timeout: Duration, cap_bytes: usize) -> Result<CappedOutput> {
	cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
	let mut child: Child = cmd.spawn().map_err(|e| ToolchainError::CompileFailed { stderr: e.to_string() })?;
	let mut stdout = child.stdout.take().expect("stdout piped");
	let mut stderr = child.stderr.take().expect("stderr piped");

	let run = async {
		let (stdout, stderr) =
			tokio::try_join!(read_capped(&mut stdout, cap_bytes), read_capped(&mut stderr, cap_bytes))?;
		let status = child.wait().await.map_err(|e| ToolchainError::CompileFailed { stderr: e.to_string() })?;
		Ok((stdout, stderr, status))
	};

	match tokio::time::timeout(timeout, run).await {
		Ok(result) => {
			let (stdout, stderr, status) = result?;
			Ok(CappedOutput { stdout, stderr, status })
		}
		Err(_) => {
			let _ = child.start_kill();
			let _ = child.wait().await;
			Err(ToolchainError::Timeout)
		}
	}
}

async fn read_capped(reader: &mut (impl AsyncRead + Unpin), cap: usize) -> Result<Vec<u8>> {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 8192];
	loop {
		let n =
			reader.read(&mut chunk).await.map_err(|e| ToolchainError::CompileFailed { stderr: e.to_string() })?;
		if n == 0 {
			break;
		}
		buf.extend_from_slice(&chunk[..n]);
		if buf.len() > cap {
			return Err(ToolchainError::OutputCapExceeded);
		}
	}
	Ok(buf)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn captures_stdout_of_a_short_lived_process() {
		let mut cmd = Command::new("printf");
		cmd.arg("hello");
		let out = run_capped(cmd, Duration::from_secs(5), 1024).await.unwrap();
		assert_eq!(out.stdout, b"hello");
		assert!(out.status.success());
	}

	#[tokio::test]
	async fn times_out_a_long_running_process() {
		let mut cmd = Command::new("sleep");
		cmd.arg("5");
		let err = run_capped(cmd, Duration::from_millis(50), 1024).await.unwrap_err();
		assert!(matches!(err, ToolchainError::Timeout));
	}

	#[tokio::test]
	async fn rejects_output_over_the_cap() {
		let mut cmd = Command::new("yes");
		let err = run_capped(cmd.arg("x"), Duration::from_secs(5), 16).await.unwrap_err();
		assert!(matches!(err, ToolchainError::OutputCapExceeded));
	}
}
