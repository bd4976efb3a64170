use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, Source};

/// Layered configuration: defaults -> `config/default.toml` -> environment
/// (`BOUNTY__section__field`) -> CLI flags, in that order of increasing
/// priority. Mirrors the split used for the ingress-egress tracker's own
/// settings: a `set_defaults` step the struct gets to customize, a single
/// `load_settings_from_all_sources` entry point, and a `validate_settings`
/// pass that runs only after the whole struct has been deserialized (so it
/// can cross-check fields against each other).
pub trait CfSettings: serde::de::DeserializeOwned {
	type OptionsType: Source + Clone + Send + Sync + 'static;

	fn load_settings_from_all_sources(
		config_root: &str,
		settings_dir: &str,
		opts: Self::OptionsType,
	) -> Result<Self, ConfigError> {
		let config_builder = Config::builder();
		let config_builder = Self::set_defaults(config_builder, config_root)?;
		let config = config_builder
			.add_source(
				File::with_name(&format!("{config_root}/{settings_dir}/default")).required(false),
			)
			.add_source(Environment::default().separator("__"))
			.add_source(opts)
			.build()?;

		let mut settings: Self = config.try_deserialize()?;
		settings
			.validate_settings()
			.map_err(|e| ConfigError::Message(e.to_string()))?;
		Ok(settings)
	}

	/// Hook for a struct to inject localnet-friendly defaults before any
	/// file/env/CLI source is layered on top.
	fn set_defaults(
		config_builder: ConfigBuilder<DefaultState>,
		_config_root: &str,
	) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
		Ok(config_builder)
	}

	/// Cross-field validation that can only happen once the whole struct is
	/// assembled (e.g. "queue concurrency must be nonzero").
	fn validate_settings(&mut self) -> anyhow::Result<()> {
		Ok(())
	}
}

/// Inserts a CLI-provided value into a `config::Map` under `key`, skipping
/// `None`s so that an absent flag doesn't shadow a lower-priority source.
pub fn insert_command_line_option(
	map: &mut std::collections::HashMap<String, config::Value>,
	key: &str,
	option: &Option<String>,
) {
	if let Some(value) = option {
		map.insert(key.to_string(), config::Value::new(Some(&key.to_string()), value.clone()));
	}
}
