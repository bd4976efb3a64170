//! Runs an external static analyzer (slither by default) against a
//! compiled checkout and normalizes its output into severities and
//! confidences the rest of the system understands.

use std::time::Duration;

use bounty_primitives::finding::Severity;
use bounty_settings::ToolchainSettings;
use serde::Deserialize;
use tokio::process::Command;

use crate::{
	error::{Result, ToolchainError},
	process::run_capped,
};

#[derive(Debug, Clone)]
pub struct StaticFinding {
	pub vulnerability_type: String,
	pub severity: Severity,
	pub file_path: String,
	pub line_number: Option<u32>,
	pub description: String,
	pub confidence: f64,
}

#[derive(Deserialize)]
struct SlitherOutput {
	success: bool,
	results: Option<SlitherResults>,
}

#[derive(Deserialize)]
struct SlitherResults {
	detectors: Vec<SlitherDetector>,
}

#[derive(Deserialize)]
struct SlitherDetector {
	check: String,
	impact: String,
	confidence: String,
	description: String,
	#[serde(default)]
	elements: Vec<SlitherElement>,
}

#[derive(Deserialize)]
struct SlitherElement {
	#[serde(rename = "source_mapping")]
	source_mapping: Option<SlitherSourceMapping>,
}

#[derive(Deserialize)]
struct SlitherSourceMapping {
	filename_relative: String,
	lines: Vec<u32>,
}

pub async fn run_static_analyzer(
	settings: &ToolchainSettings,
	checkout_dir: &std::path::Path,
	contract_name: &str,
) -> Result<Vec<StaticFinding>> {
	which::which("slither").map_err(|_| ToolchainError::AnalyzerUnavailable("slither".to_string()))?;

	let path = checkout_dir.to_string_lossy();
	let mut last_err = None;
	for template in &settings.analyzer_commands {
		let rendered = template.replace("{path}", &path).replace("{contract}", contract_name);
		let mut parts = rendered.split_whitespace();
		let Some(program) = parts.next() else { continue };
		let mut cmd = Command::new(program);
		cmd.args(parts);

		let out = match run_capped(cmd, Duration::from_secs(settings.analyzer_timeout_secs), settings.subprocess_output_cap_bytes).await {
			Ok(out) => out,
			Err(e) => {
				last_err = Some(e);
				continue;
			}
		};

		match serde_json::from_slice::<SlitherOutput>(&out.stdout) {
			Ok(parsed) if parsed.success => return Ok(normalize(parsed, settings)),
			Ok(_) => {
				last_err = Some(ToolchainError::AnalyzerFailed("analyzer reported success=false".to_string()));
			}
			Err(e) => {
				last_err = Some(ToolchainError::AnalyzerFailed(format!(
					"unparsable output: {e}; stderr: {}",
					String::from_utf8_lossy(&out.stderr)
				)));
			}
		}
	}

	Err(last_err.unwrap_or_else(|| ToolchainError::AnalyzerFailed("no analyzer command configured".to_string())))
}

fn normalize(output: SlitherOutput, settings: &ToolchainSettings) -> Vec<StaticFinding> {
	let Some(results) = output.results else { return Vec::new() };
	results
		.detectors
		.into_iter()
		.filter_map(|d| {
			let severity = normalize_severity(&d.impact);
			let confidence = normalize_confidence(&d.confidence);
			let threshold = if severity == Severity::Info { settings.min_info_confidence } else { settings.min_confidence };
			if confidence < threshold {
				return None;
			}
			let element = d.elements.into_iter().find_map(|e| e.source_mapping);
			let file_path = element.as_ref().map(|s| s.filename_relative.clone()).unwrap_or_default();
			if file_path.to_lowercase().contains("test") {
				return None;
			}
			Some(StaticFinding {
				vulnerability_type: d.check,
				severity,
				file_path,
				line_number: element.and_then(|s| s.lines.first().copied()),
				description: d.description,
				confidence,
			})
		})
		.collect()
}

fn normalize_severity(impact: &str) -> Severity {
	match impact.to_uppercase().as_str() {
		"HIGH" => Severity::Critical,
		"MEDIUM" => Severity::High,
		"LOW" => Severity::Medium,
		"INFORMATIONAL" => Severity::Info,
		_ => Severity::Low,
	}
}

fn normalize_confidence(confidence: &str) -> f64 {
	match confidence.to_lowercase().as_str() {
		"high" => 0.9,
		"medium" => 0.7,
		"low" => 0.5,
		_ => 0.6,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_slither_impact_to_severity_per_the_documented_table() {
		assert_eq!(normalize_severity("High"), Severity::Critical);
		assert_eq!(normalize_severity("Medium"), Severity::High);
		assert_eq!(normalize_severity("Low"), Severity::Medium);
		assert_eq!(normalize_severity("Informational"), Severity::Info);
		assert_eq!(normalize_severity("Optimization"), Severity::Low);
	}

	#[test]
	fn maps_slither_confidence_to_a_numeric_scale() {
		assert_eq!(normalize_confidence("High"), 0.9);
		assert_eq!(normalize_confidence("Medium"), 0.7);
		assert_eq!(normalize_confidence("Low"), 0.5);
		assert_eq!(normalize_confidence("whatever"), 0.6);
	}

	#[test]
	fn filters_findings_under_confidence_and_in_test_paths() {
		let settings = ToolchainSettings {
			allowed_git_host: "github.com".to_string(),
			compile_timeout_secs: 120,
			analyzer_timeout_secs: 180,
			subprocess_output_cap_bytes: 10 * 1024 * 1024,
			analyzer_commands: vec![],
			min_confidence: 0.6,
			min_info_confidence: 0.8,
		};
		let output = SlitherOutput {
			success: true,
			results: Some(SlitherResults {
				detectors: vec![
					SlitherDetector {
						check: "reentrancy".to_string(),
						impact: "High".to_string(),
						confidence: "Low".to_string(),
						description: "low confidence finding".to_string(),
						elements: vec![],
					},
					SlitherDetector {
						check: "naming".to_string(),
						impact: "Informational".to_string(),
						confidence: "High".to_string(),
						description: "in a test file".to_string(),
						elements: vec![SlitherElement {
							source_mapping: Some(SlitherSourceMapping {
								filename_relative: "test/Escrow.t.sol".to_string(),
								lines: vec![10],
							}),
						}],
					},
				],
			}),
		};
		assert!(normalize(output, &settings).is_empty());
	}
}
