use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
	pub url: String,
	#[serde(default = "default_max_connections")]
	pub max_connections: u32,
}

fn default_max_connections() -> u32 {
	10
}
