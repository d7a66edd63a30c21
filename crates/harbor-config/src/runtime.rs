// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use serde::Serialize;
use std::time::Duration;

use crate::layer::*;
use crate::paths::PathsConfig;
use crate::ConfigError;

/// The final, validated configuration for Harbor.
#[derive(Debug, Clone, Serialize)]
pub struct HarborConfig {
	pub network: NetworkConfig,
	pub keychain: KeychainConfig,
	pub security_log: SecurityLogConfig,
	pub bids: BidsConfig,
	pub service: ServiceConfig,
	pub escrow: EscrowConfig,
	pub logging: LoggingConfig,

	/// Resolved paths (not serialized)
	#[serde(skip)]
	pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkConfig {
	pub chain_id: String,
	pub address_prefix: String,
	pub denom: String,
	pub rpc_url: String,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			chain_id: "akashnet-2".to_string(),
			address_prefix: "akash".to_string(),
			denom: "uakt".to_string(),
			rpc_url: "https://rpc.akashnet.net:443".to_string(),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct KeychainConfig {
	pub service: String,
	pub account: String,
	/// Try the OS-native secret store before the fallback file.
	pub use_native: bool,
}

impl Default for KeychainConfig {
	fn default() -> Self {
		Self {
			service: "harbor".to_string(),
			account: "wallet-encryption-key".to_string(),
			use_native: true,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityLogConfig {
	/// Lowest severity written, by name (`debug` .. `critical`).
	pub min_severity: String,
	/// Mirror events to the tracing console.
	pub console: bool,
	/// Append events to the JSONL file under the state dir.
	pub file: bool,
}

impl Default for SecurityLogConfig {
	fn default() -> Self {
		Self {
			min_severity: "info".to_string(),
			console: true,
			file: true,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct BidsConfig {
	pub poll_interval: Duration,
	pub quorum: usize,
	pub timeout: Duration,
}

impl Default for BidsConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_secs(2),
			quorum: 3,
			timeout: Duration::from_secs(60),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
	pub poll_interval: Duration,
	pub startup_timeout: Duration,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_secs(5),
			startup_timeout: Duration::from_secs(300),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct EscrowConfig {
	/// Minor units of the network denom deposited when a deployment is created.
	pub initial_deposit: u64,
	pub threshold_fraction: f64,
	pub reference_window_hours: f64,
}

impl Default for EscrowConfig {
	fn default() -> Self {
		Self {
			initial_deposit: 5_000_000,
			threshold_fraction: 0.25,
			reference_window_hours: 24.0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
}

impl LogLevel {
	pub fn as_str(&self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
		}
	}
}

impl std::str::FromStr for LogLevel {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"trace" => Ok(LogLevel::Trace),
			"debug" => Ok(LogLevel::Debug),
			"info" => Ok(LogLevel::Info),
			"warn" | "warning" => Ok(LogLevel::Warn),
			"error" => Ok(LogLevel::Error),
			other => Err(ConfigError::invalid_value(
				"logging.level",
				format!("unknown level {other:?}"),
			)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Text,
	Json,
}

impl std::str::FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"text" | "pretty" => Ok(LogFormat::Text),
			"json" => Ok(LogFormat::Json),
			other => Err(ConfigError::invalid_value(
				"logging.format",
				format!("unknown format {other:?}"),
			)),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: LogLevel::Info,
			format: LogFormat::Text,
		}
	}
}

impl HarborConfig {
	/// Resolve a merged layer into runtime config, filling defaults.
	pub fn from_layer(layer: ConfigLayer, mut paths: PathsConfig) -> Result<Self, ConfigError> {
		if let Some(p) = layer.paths {
			if let Some(data_dir) = p.data_dir {
				paths.data_dir = data_dir;
			}
			if let Some(state_dir) = p.state_dir {
				paths.state_dir = state_dir;
			}
		}

		let network = {
			let d = NetworkConfig::default();
			let l = layer.network.unwrap_or_default();
			NetworkConfig {
				chain_id: l.chain_id.unwrap_or(d.chain_id),
				address_prefix: l.address_prefix.unwrap_or(d.address_prefix),
				denom: l.denom.unwrap_or(d.denom),
				rpc_url: l.rpc_url.unwrap_or(d.rpc_url),
			}
		};

		let keychain = {
			let d = KeychainConfig::default();
			let l = layer.keychain.unwrap_or_default();
			KeychainConfig {
				service: l.service.unwrap_or(d.service),
				account: l.account.unwrap_or(d.account),
				use_native: l.use_native.unwrap_or(d.use_native),
			}
		};

		let security_log = {
			let d = SecurityLogConfig::default();
			let l = layer.security_log.unwrap_or_default();
			SecurityLogConfig {
				min_severity: l.min_severity.unwrap_or(d.min_severity),
				console: l.console.unwrap_or(d.console),
				file: l.file.unwrap_or(d.file),
			}
		};

		let bids = {
			let d = BidsConfig::default();
			let l = layer.bids.unwrap_or_default();
			BidsConfig {
				poll_interval: l
					.poll_interval_ms
					.map(Duration::from_millis)
					.unwrap_or(d.poll_interval),
				quorum: l.quorum.unwrap_or(d.quorum),
				timeout: l.timeout_secs.map(Duration::from_secs).unwrap_or(d.timeout),
			}
		};

		let service = {
			let d = ServiceConfig::default();
			let l = layer.service.unwrap_or_default();
			ServiceConfig {
				poll_interval: l
					.poll_interval_ms
					.map(Duration::from_millis)
					.unwrap_or(d.poll_interval),
				startup_timeout: l
					.startup_timeout_secs
					.map(Duration::from_secs)
					.unwrap_or(d.startup_timeout),
			}
		};

		let escrow = {
			let d = EscrowConfig::default();
			let l = layer.escrow.unwrap_or_default();
			EscrowConfig {
				initial_deposit: l.initial_deposit.unwrap_or(d.initial_deposit),
				threshold_fraction: l.threshold_fraction.unwrap_or(d.threshold_fraction),
				reference_window_hours: l
					.reference_window_hours
					.unwrap_or(d.reference_window_hours),
			}
		};

		let logging = {
			let l = layer.logging.unwrap_or_default();
			LoggingConfig {
				level: match l.level {
					Some(s) => s.parse()?,
					None => LogLevel::Info,
				},
				format: match l.format {
					Some(s) => s.parse()?,
					None => LogFormat::Text,
				},
			}
		};

		Ok(Self {
			network,
			keychain,
			security_log,
			bids,
			service,
			escrow,
			logging,
			paths,
		})
	}
}
