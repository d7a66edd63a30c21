// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for Harbor.
//!
//! This crate provides:
//! - XDG Base Directory compliant path resolution
//! - Layered configuration from defaults, files, environment and CLI
//! - Configuration validation

pub mod error;
pub mod layer;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod validation;

pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use paths::PathsConfig;
pub use registry::ConfigRegistry;
pub use runtime::{
	BidsConfig, EscrowConfig, HarborConfig, KeychainConfig, LogFormat, LogLevel, LoggingConfig,
	NetworkConfig, SecurityLogConfig, ServiceConfig,
};
pub use sources::{CliOverrides, ConfigSource, Precedence};

/// Load configuration from all sources with default precedence.
pub fn load_config() -> Result<HarborConfig, ConfigError> {
	load_config_with_cli(CliOverrides::default())
}

/// Load configuration with CLI overrides applied last.
pub fn load_config_with_cli(cli: CliOverrides) -> Result<HarborConfig, ConfigError> {
	let paths = paths::resolve_xdg_paths()?;
	build_registry(&paths, cli).load(paths)
}

fn build_registry(paths: &PathsConfig, cli: CliOverrides) -> ConfigRegistry {
	let mut registry = ConfigRegistry::new();

	registry.register(Box::new(sources::DefaultsSource));
	registry.register(Box::new(sources::FileSource::system(paths)));
	match &cli.config_file {
		Some(path) => registry.register(Box::new(sources::FileSource::custom(
			path.clone(),
			Precedence::UserFile,
			"cli-config-file",
		))),
		None => registry.register(Box::new(sources::FileSource::user(paths))),
	}
	registry.register(Box::new(sources::EnvSource::new()));
	registry.register(Box::new(sources::CliSource::new(cli)));

	registry
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn explicit_config_file_replaces_user_file() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("custom.toml");
		let mut f = std::fs::File::create(&file).unwrap();
		writeln!(f, "[service]\nstartup_timeout_secs = 42").unwrap();

		let mut paths = PathsConfig::rooted_at(dir.path());
		paths.system_config_file = dir.path().join("absent-system.toml");
		let cli = CliOverrides {
			config_file: Some(file),
			log_level: Some("debug".to_string()),
			..Default::default()
		};
		let config = build_registry(&paths, cli).load(paths).unwrap();
		assert_eq!(config.service.startup_timeout.as_secs(), 42);
		assert_eq!(config.logging.level, LogLevel::Debug);
	}
}
