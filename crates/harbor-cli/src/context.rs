// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use anyhow::{Context as _, Result};
use harbor_config::HarborConfig;
use harbor_keychain::KeychainStore;
use harbor_security_log::SecurityLog;
use harbor_wallet::{WalletManager, WalletSettings};

/// Loaded configuration plus the services every command shares.
pub struct Context {
	pub config: HarborConfig,
	pub log: SecurityLog,
	keychain: Arc<KeychainStore>,
}

impl Context {
	pub fn new(config: HarborConfig) -> Result<Self> {
		let log = SecurityLog::from_config(&config.security_log, &config.paths.security_log_file())
			.context("invalid security log configuration")?;
		let keychain = Arc::new(KeychainStore::from_config(
			&config.keychain,
			&config.paths.keystore_file(),
			log.clone(),
		));
		Ok(Self {
			config,
			log,
			keychain,
		})
	}

	pub fn keychain(&self) -> &KeychainStore {
		&self.keychain
	}

	pub fn wallet(&self) -> WalletManager {
		WalletManager::new(
			WalletSettings::from_config(&self.config),
			self.keychain.clone(),
			self.log.clone(),
		)
	}
}
