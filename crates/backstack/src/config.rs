use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Back-stack settings.
///
/// Frozen once the back-stack is set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackstackConfig {
	/// Tag written into saved state and checked on restore.
	pub persistence_tag: Option<String>,
	/// Fold every queued navigation into a single transition.
	///
	/// When disabled, each queued request is dispatched on its own, in
	/// arrival order.
	pub coalesce_requests: bool,
}

impl Default for BackstackConfig {
	fn default() -> Self {
		Self {
			persistence_tag: None,
			coalesce_requests: true,
		}
	}
}

impl BackstackConfig {
	/// Parses a config from TOML. Missing fields take their defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}
}
