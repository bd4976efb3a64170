//! Invokes `forge build` against a cloned checkout and recovers the
//! bytecode/ABI pair for the contract a scan actually cares about.

use std::{path::Path, time::Duration};

use ethers::abi::Abi;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::{
	error::{Result, ToolchainError},
	process::run_capped,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledContract {
	pub bytecode: Vec<u8>,
	pub abi: Abi,
	pub raw_output: String,
}

#[derive(Deserialize)]
struct ForgeArtifact {
	abi: Abi,
	bytecode: ForgeBytecode,
}

#[derive(Deserialize)]
struct ForgeBytecode {
	object: String,
}

/// The minimal `foundry.toml` written into a checkout that doesn't already
/// carry one, so `forge build` has somewhere to resolve `src`/`out`/
/// `libs` from instead of failing outright on a bare checkout.
const MINIMAL_FOUNDRY_CONFIG: &str = "[profile.default]\nsrc = \"src\"\nout = \"out\"\nlibs = [\"lib\"]\n";

/// Writes `MINIMAL_FOUNDRY_CONFIG` into `checkout_dir/foundry.toml` if the
/// checkout doesn't already have a config of its own; never overwrites an
/// existing one.
async fn ensure_minimal_compiler_config(checkout_dir: &Path) -> Result<()> {
	let config_path = checkout_dir.join("foundry.toml");
	if tokio::fs::try_exists(&config_path).await.unwrap_or(false) {
		return Ok(());
	}
	tokio::fs::write(&config_path, MINIMAL_FOUNDRY_CONFIG)
		.await
		.map_err(|e| ToolchainError::CompileFailed { stderr: format!("failed to write minimal foundry.toml: {e}") })
}

pub async fn compile(
	checkout_dir: &Path,
	contract_path: &str,
	contract_name: &str,
	timeout_secs: u64,
) -> Result<CompiledContract> {
	ensure_minimal_compiler_config(checkout_dir).await?;

	let mut cmd = Command::new("forge");
	cmd.arg("build").current_dir(checkout_dir);

	let out = run_capped(cmd, Duration::from_secs(timeout_secs), 16 * 1024 * 1024).await?;
	let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
	let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
	if !out.status.success() {
		return Err(ToolchainError::CompileFailed { stderr });
	}

	let artifact_path = find_artifact(checkout_dir, contract_path, contract_name)
		.ok_or_else(|| ToolchainError::CompileFailed { stderr: format!("no build artifact for {contract_name}") })?;

	let raw = tokio::fs::read(&artifact_path)
		.await
		.map_err(|e| ToolchainError::CompileFailed { stderr: e.to_string() })?;
	let artifact: ForgeArtifact =
		serde_json::from_slice(&raw).map_err(|e| ToolchainError::CompileFailed { stderr: e.to_string() })?;
	let bytecode = hex_decode(&artifact.bytecode.object)
		.map_err(|e| ToolchainError::CompileFailed { stderr: format!("malformed bytecode hex: {e}") })?;

	Ok(CompiledContract { bytecode, abi: artifact.abi, raw_output: format!("{stdout}{stderr}") })
}

fn find_artifact(checkout_dir: &Path, contract_path: &str, contract_name: &str) -> Option<std::path::PathBuf> {
	let basename = Path::new(contract_path).file_name()?.to_str()?;
	let candidates = [
		checkout_dir.join("out").join(basename).join(format!("{contract_name}.json")),
		checkout_dir.join("out").join(format!("{contract_name}.sol")).join(format!("{contract_name}.json")),
		checkout_dir.join("out").join(format!("{contract_name}.json")),
	];
	candidates.into_iter().find(|p| p.exists())
}

fn hex_decode(s: &str) -> std::result::Result<Vec<u8>, String> {
	let s = s.strip_prefix("0x").unwrap_or(s);
	if s.len() % 2 != 0 {
		return Err("odd-length hex string".to_string());
	}
	(0..s.len())
		.step_by(2)
		.map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finds_the_canonical_forge_artifact_path() {
		let dir = tempfile::tempdir().unwrap();
		let artifact_dir = dir.path().join("out").join("Escrow.sol");
		std::fs::create_dir_all(&artifact_dir).unwrap();
		std::fs::write(artifact_dir.join("Escrow.json"), "{}").unwrap();

		let found = find_artifact(dir.path(), "src/Escrow.sol", "Escrow").unwrap();
		assert_eq!(found, artifact_dir.join("Escrow.json"));
	}

	#[test]
	fn decodes_hex_bytecode_with_and_without_prefix() {
		assert_eq!(hex_decode("0x0011ff").unwrap(), vec![0x00, 0x11, 0xff]);
		assert_eq!(hex_decode("0011ff").unwrap(), vec![0x00, 0x11, 0xff]);
		assert!(hex_decode("abc").is_err());
	}

	#[tokio::test]
	async fn writes_a_minimal_config_when_none_exists() {
		let dir = tempfile::tempdir().unwrap();
		ensure_minimal_compiler_config(dir.path()).await.unwrap();
		let written = tokio::fs::read_to_string(dir.path().join("foundry.toml")).await.unwrap();
		assert_eq!(written, MINIMAL_FOUNDRY_CONFIG);
	}

	#[tokio::test]
	async fn never_overwrites_an_existing_config() {
		let dir = tempfile::tempdir().unwrap();
		tokio::fs::write(dir.path().join("foundry.toml"), "[profile.default]\nsrc = \"contracts\"\n").await.unwrap();
		ensure_minimal_compiler_config(dir.path()).await.unwrap();
		let written = tokio::fs::read_to_string(dir.path().join("foundry.toml")).await.unwrap();
		assert_eq!(written, "[profile.default]\nsrc = \"contracts\"\n");
	}
}
