// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! XDG Base Directory path resolution and the local state layout.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Resolved locations for configuration and local state.
#[derive(Debug, Clone)]
pub struct PathsConfig {
	/// ~/.config/harbor/config.toml
	pub user_config_file: PathBuf,
	/// /etc/harbor/config.toml
	pub system_config_file: PathBuf,
	/// ~/.local/share/harbor/ (wallet, keystore, deployment snapshots)
	pub data_dir: PathBuf,
	/// ~/.local/state/harbor/ (security log)
	pub state_dir: PathBuf,
}

impl PathsConfig {
	/// Lays every file out under a single root. Used by tests and by
	/// `--data-dir` style overrides.
	pub fn rooted_at(root: impl AsRef<Path>) -> Self {
		let root = root.as_ref();
		Self {
			user_config_file: root.join("config.toml"),
			system_config_file: PathBuf::from("/etc/harbor/config.toml"),
			data_dir: root.join("data"),
			state_dir: root.join("state"),
		}
	}

	pub fn wallet_file(&self) -> PathBuf {
		self.data_dir.join("wallet.json")
	}

	pub fn ephemeral_key_file(&self) -> PathBuf {
		self.data_dir.join("ephemeral-key.json")
	}

	pub fn keystore_file(&self) -> PathBuf {
		self.data_dir.join("keystore.json")
	}

	pub fn deployment_snapshot_file(&self) -> PathBuf {
		self.data_dir.join("deployments").join("current.json")
	}

	pub fn security_log_file(&self) -> PathBuf {
		self.state_dir.join("security.log")
	}
}

/// Resolve paths from `XDG_CONFIG_HOME`, `XDG_DATA_HOME` and `XDG_STATE_HOME`,
/// falling back to the usual dot-directories under `$HOME`.
pub fn resolve_xdg_paths() -> Result<PathsConfig, ConfigError> {
	let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;

	let config_home = std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.unwrap_or_else(|| home.join(".config"));

	let data_home = std::env::var_os("XDG_DATA_HOME")
		.map(PathBuf::from)
		.unwrap_or_else(|| home.join(".local/share"));

	let state_home = std::env::var_os("XDG_STATE_HOME")
		.map(PathBuf::from)
		.unwrap_or_else(|| home.join(".local/state"));

	tracing::debug!(
		config_home = %config_home.display(),
		data_home = %data_home.display(),
		state_home = %state_home.display(),
		"resolved XDG paths"
	);

	Ok(PathsConfig {
		user_config_file: config_home.join("harbor/config.toml"),
		system_config_file: PathBuf::from("/etc/harbor/config.toml"),
		data_dir: data_home.join("harbor"),
		state_dir: state_home.join("harbor"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_xdg_paths_scopes_to_harbor() {
		let paths = resolve_xdg_paths().unwrap();
		assert!(paths.user_config_file.ends_with("harbor/config.toml"));
		assert!(paths.data_dir.ends_with("harbor"));
		assert!(paths.state_dir.ends_with("harbor"));
		assert_eq!(
			paths.system_config_file,
			PathBuf::from("/etc/harbor/config.toml")
		);
	}

	#[test]
	fn state_files_live_under_their_roots() {
		let paths = PathsConfig::rooted_at("/tmp/harbor-test");
		assert_eq!(
			paths.wallet_file(),
			PathBuf::from("/tmp/harbor-test/data/wallet.json")
		);
		assert_eq!(
			paths.deployment_snapshot_file(),
			PathBuf::from("/tmp/harbor-test/data/deployments/current.json")
		);
		assert_eq!(
			paths.security_log_file(),
			PathBuf::from("/tmp/harbor-test/state/security.log")
		);
	}
}
