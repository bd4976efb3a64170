use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolchainSettings {
	#[serde(default = "default_allowed_git_host")]
	pub allowed_git_host: String,
	#[serde(default = "default_compile_timeout_secs")]
	pub compile_timeout_secs: u64,
	#[serde(default = "default_analyzer_timeout_secs")]
	pub analyzer_timeout_secs: u64,
	#[serde(default = "default_subprocess_output_cap_bytes")]
	pub subprocess_output_cap_bytes: usize,
	#[serde(default = "default_analyzer_commands")]
	pub analyzer_commands: Vec<String>,
	#[serde(default = "default_min_confidence")]
	pub min_confidence: f64,
	#[serde(default = "default_min_info_confidence")]
	pub min_info_confidence: f64,
}

fn default_allowed_git_host() -> String {
	"github.com".to_string()
}

fn default_compile_timeout_secs() -> u64 {
	120
}

fn default_analyzer_timeout_secs() -> u64 {
	180
}

fn default_subprocess_output_cap_bytes() -> usize {
	10 * 1024 * 1024
}

fn default_analyzer_commands() -> Vec<String> {
	vec!["slither {path} --json -".to_string(), "slither {path}/{contract} --json -".to_string()]
}

fn default_min_confidence() -> f64 {
	0.4
}

fn default_min_info_confidence() -> f64 {
	0.7
}
