use clap::Parser;
use config::{ConfigError, Map, Source, Value};

use crate::traits::insert_command_line_option;

/// CLI surface for the worker binary. Every field is optional: a flag left
/// unset falls through to the environment, then the config file, then the
/// struct-level defaults, per `CfSettings::load_settings_from_all_sources`.
#[derive(Parser, Debug, Clone, Default)]
pub struct WorkerOptions {
	#[clap(long = "config-root", default_value = ".")]
	pub config_root: String,

	#[clap(long = "database.url")]
	pub database_url: Option<String>,

	#[clap(long = "chain.http_node_endpoint")]
	pub chain_http_node_endpoint: Option<String>,

	#[clap(long = "chain.payer_private_key_file")]
	pub chain_payer_private_key_file: Option<String>,

	#[clap(long = "sandbox.evm_binary")]
	pub sandbox_evm_binary: Option<String>,

	#[clap(long = "json-logs")]
	pub json_logs: bool,
}

impl Source for WorkerOptions {
	fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
		Box::new(self.clone())
	}

	fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
		let mut map = Map::new();
		insert_command_line_option(&mut map, "database.url", &self.database_url);
		insert_command_line_option(&mut map, "chain.http_node_endpoint", &self.chain_http_node_endpoint);
		insert_command_line_option(
			&mut map,
			"chain.payer_private_key_file",
			&self.chain_payer_private_key_file,
		);
		insert_command_line_option(&mut map, "sandbox.evm_binary", &self.sandbox_evm_binary);
		if self.json_logs {
			map.insert("json_logs".into(), Value::new(Some(&"json_logs".to_string()), true));
		}
		Ok(map)
	}
}
