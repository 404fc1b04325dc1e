//! Configuration for the Styx settlement service.
//!
//! Configuration is TOML. A file may pull in others with
//! `include = ["venues.toml", ...]`; every top-level section must then be
//! defined in exactly one file. `${VAR}` and `${VAR:-default}` are replaced
//! from the environment before parsing.

mod loader;

use alloy_primitives::{Address, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use styx_types::u256_serde;
use thiserror::Error;

pub use loader::ConfigLoader;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub engine: EngineConfig,
	pub storage: StorageConfig,
	#[serde(default)]
	pub registry: RegistryConfig,
	#[serde(default)]
	pub adapters: Vec<VenueConfig>,
	#[serde(default)]
	pub aggregators: Vec<VenueConfig>,
	#[serde(default)]
	pub ledger: LedgerConfig,
	pub api: Option<ApiConfig>,
}

/// Identity of the engine and the contracts it talks to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Account that holds funds in flight and retains fees.
	pub address: Address,
	pub chain_id: u64,
	/// Verifying contract of the signature-transfer domain.
	pub permit2: Address,
	pub wrapped_native: Address,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval() -> u64 {
	3600
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
	/// Callers allowed to submit signed instructions.
	#[serde(default)]
	pub keepers: Vec<Address>,
	/// Addresses interned at startup, in order.
	#[serde(default)]
	pub tokens: Vec<Address>,
}

/// An adapter or aggregator bound to a venue id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueConfig {
	pub id: u8,
	pub kind: String,
	/// Implementation settings, handed to the factory as-is.
	#[serde(flatten)]
	pub settings: toml::Table,
}

impl VenueConfig {
	/// Implementation settings as a TOML value, `id` and `kind` excluded.
	pub fn settings_value(&self) -> toml::Value {
		toml::Value::Table(self.settings.clone())
	}
}

/// Balances and approvals applied to a fresh ledger.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerConfig {
	#[serde(default)]
	pub balances: Vec<GenesisBalance>,
	#[serde(default)]
	pub approvals: Vec<GenesisApproval>,
}

/// A starting balance. `token` set to the native sentinel mints native.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenesisBalance {
	pub token: Address,
	pub holder: Address,
	#[serde(with = "u256_serde")]
	pub amount: U256,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenesisApproval {
	pub token: Address,
	pub owner: Address,
	pub spender: Address,
	#[serde(with = "u256_serde")]
	pub amount: U256,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
	/// Account `/api/execute` submits instructions as. Without one the
	/// endpoint refuses every request.
	pub relayer: Option<Address>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Replaces `${VAR}` and `${VAR:-default}` with environment values.
///
/// Inputs are capped at 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut replacements = Vec::new();
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};
		replacements.push((full_match.start(), full_match.end(), value));
	}

	let mut result = input.to_string();
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}
	Ok(result)
}

/// Highest id in either venue namespace.
const MAX_VENUE_ID: u8 = 0x7f;

impl Config {
	/// Loads `path` and its includes.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;

		let mut loader = ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.engine.chain_id == 0 {
			return Err(ConfigError::Validation("engine.chain_id must be non-zero".into()));
		}
		if self.engine.address == Address::ZERO {
			return Err(ConfigError::Validation("engine.address cannot be zero".into()));
		}

		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0
			|| self.storage.cleanup_interval_seconds > 86400
		{
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be between 1 and 86400".into(),
			));
		}

		validate_venues("adapters", &self.adapters)?;
		validate_venues("aggregators", &self.aggregators)?;

		let mut tokens = HashSet::new();
		for token in &self.registry.tokens {
			if !tokens.insert(token) {
				return Err(ConfigError::Validation(format!(
					"Token {} listed twice in registry.tokens",
					token
				)));
			}
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation("api.port cannot be 0".into()));
			}
		}
		Ok(())
	}
}

fn validate_venues(section: &str, venues: &[VenueConfig]) -> Result<(), ConfigError> {
	let mut ids = HashSet::new();
	for venue in venues {
		if venue.id > MAX_VENUE_ID {
			return Err(ConfigError::Validation(format!(
				"{} id {} exceeds {}",
				section, venue.id, MAX_VENUE_ID
			)));
		}
		if !ids.insert(venue.id) {
			return Err(ConfigError::Validation(format!(
				"Duplicate {} id {}",
				section, venue.id
			)));
		}
		if venue.kind.is_empty() {
			return Err(ConfigError::Validation(format!(
				"{} id {} has no kind",
				section, venue.id
			)));
		}
	}
	Ok(())
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
