// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment, CLI, defaults.

use std::path::PathBuf;

use tracing::{debug, trace, warn};

use crate::layer::*;
use crate::paths::PathsConfig;
use crate::ConfigError;

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	SystemFile = 20,
	UserFile = 30,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source. Defaults are applied when the runtime config is
/// built, so this contributes an empty layer.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
}

impl FileSource {
	/// System config: /etc/harbor/config.toml
	pub fn system(paths: &PathsConfig) -> Self {
		Self {
			path: paths.system_config_file.clone(),
			precedence: Precedence::SystemFile,
			name: "system-config",
		}
	}

	/// User config: ~/.config/harbor/config.toml
	pub fn user(paths: &PathsConfig) -> Self {
		Self {
			path: paths.user_config_file.clone(),
			precedence: Precedence::UserFile,
			name: "user-config",
		}
	}

	pub fn custom(path: PathBuf, precedence: Precedence, name: &'static str) -> Self {
		Self {
			path,
			precedence,
			name,
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: HARBOR_<SECTION>__<FIELD>.
pub struct EnvSource {
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// Reads the process environment at load time.
	pub fn new() -> Self {
		Self { vars: None }
	}

	/// Uses a fixed set of variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let vars: Vec<(String, String)> = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut layer = ConfigLayer::default();
		for (key, value) in vars {
			if !key.starts_with("HARBOR_") {
				continue;
			}
			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");
			apply_env_var(&mut layer, &key, value)?;
		}

		Ok(layer)
	}
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
	value
		.parse()
		.map_err(|_| ConfigError::invalid_value(key, format!("cannot parse {value:?}")))
}

fn apply_env_var(layer: &mut ConfigLayer, key: &str, value: String) -> Result<(), ConfigError> {
	match key {
		"HARBOR_NETWORK__CHAIN_ID" => network(layer).chain_id = Some(value),
		"HARBOR_NETWORK__ADDRESS_PREFIX" => network(layer).address_prefix = Some(value),
		"HARBOR_NETWORK__DENOM" => network(layer).denom = Some(value),
		"HARBOR_NETWORK__RPC_URL" => network(layer).rpc_url = Some(value),

		"HARBOR_PATHS__DATA_DIR" => {
			layer.paths.get_or_insert_with(PathsLayer::default).data_dir = Some(PathBuf::from(value))
		}
		"HARBOR_PATHS__STATE_DIR" => {
			layer.paths.get_or_insert_with(PathsLayer::default).state_dir = Some(PathBuf::from(value))
		}

		"HARBOR_KEYCHAIN__SERVICE" => keychain(layer).service = Some(value),
		"HARBOR_KEYCHAIN__ACCOUNT" => keychain(layer).account = Some(value),
		"HARBOR_KEYCHAIN__USE_NATIVE" => keychain(layer).use_native = Some(parse_env(key, &value)?),

		"HARBOR_SECURITY_LOG__MIN_SEVERITY" => security_log(layer).min_severity = Some(value),
		"HARBOR_SECURITY_LOG__CONSOLE" => security_log(layer).console = Some(parse_env(key, &value)?),

		"HARBOR_BIDS__POLL_INTERVAL_MS" => bids(layer).poll_interval_ms = Some(parse_env(key, &value)?),
		"HARBOR_BIDS__QUORUM" => bids(layer).quorum = Some(parse_env(key, &value)?),
		"HARBOR_BIDS__TIMEOUT_SECS" => bids(layer).timeout_secs = Some(parse_env(key, &value)?),

		"HARBOR_SERVICE__POLL_INTERVAL_MS" => {
			service(layer).poll_interval_ms = Some(parse_env(key, &value)?)
		}
		"HARBOR_SERVICE__STARTUP_TIMEOUT_SECS" => {
			service(layer).startup_timeout_secs = Some(parse_env(key, &value)?)
		}

		"HARBOR_ESCROW__INITIAL_DEPOSIT" => {
			escrow(layer).initial_deposit = Some(parse_env(key, &value)?)
		}
		"HARBOR_ESCROW__THRESHOLD_FRACTION" => {
			escrow(layer).threshold_fraction = Some(parse_env(key, &value)?)
		}
		"HARBOR_ESCROW__REFERENCE_WINDOW_HOURS" => {
			escrow(layer).reference_window_hours = Some(parse_env(key, &value)?)
		}

		"HARBOR_LOG_LEVEL" | "HARBOR_LOGGING__LEVEL" => logging(layer).level = Some(value),
		"HARBOR_LOGGING__FORMAT" => logging(layer).format = Some(value),

		_ => {
			warn!(key = %key, "ignoring unknown HARBOR_ environment variable");
		}
	}
	Ok(())
}

fn network(layer: &mut ConfigLayer) -> &mut NetworkLayer {
	layer.network.get_or_insert_with(NetworkLayer::default)
}

fn keychain(layer: &mut ConfigLayer) -> &mut KeychainLayer {
	layer.keychain.get_or_insert_with(KeychainLayer::default)
}

fn security_log(layer: &mut ConfigLayer) -> &mut SecurityLogLayer {
	layer
		.security_log
		.get_or_insert_with(SecurityLogLayer::default)
}

fn bids(layer: &mut ConfigLayer) -> &mut BidsLayer {
	layer.bids.get_or_insert_with(BidsLayer::default)
}

fn service(layer: &mut ConfigLayer) -> &mut ServiceLayer {
	layer.service.get_or_insert_with(ServiceLayer::default)
}

fn escrow(layer: &mut ConfigLayer) -> &mut EscrowLayer {
	layer.escrow.get_or_insert_with(EscrowLayer::default)
}

fn logging(layer: &mut ConfigLayer) -> &mut LoggingLayer {
	layer.logging.get_or_insert_with(LoggingLayer::default)
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	/// Replaces the user config file when set.
	pub config_file: Option<PathBuf>,
	pub log_level: Option<String>,
	pub json_logs: bool,
	pub data_dir: Option<PathBuf>,
}

/// CLI argument source, highest precedence.
pub struct CliSource {
	overrides: CliOverrides,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		let mut layer = ConfigLayer::default();

		if let Some(level) = &self.overrides.log_level {
			logging(&mut layer).level = Some(level.clone());
		}
		if self.overrides.json_logs {
			logging(&mut layer).format = Some("json".to_string());
		}
		if let Some(dir) = &self.overrides.data_dir {
			layer.paths.get_or_insert_with(PathsLayer::default).data_dir = Some(dir.clone());
		}

		Ok(layer)
	}
}
