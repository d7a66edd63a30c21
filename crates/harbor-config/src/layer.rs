// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer merged from multiple sources.

use serde::Deserialize;
use std::path::PathBuf;

/// Every field is optional so that later layers only override what they set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub network: Option<NetworkLayer>,
	#[serde(default)]
	pub paths: Option<PathsLayer>,
	#[serde(default)]
	pub keychain: Option<KeychainLayer>,
	#[serde(default)]
	pub security_log: Option<SecurityLogLayer>,
	#[serde(default)]
	pub bids: Option<BidsLayer>,
	#[serde(default)]
	pub service: Option<ServiceLayer>,
	#[serde(default)]
	pub escrow: Option<EscrowLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkLayer {
	pub chain_id: Option<String>,
	pub address_prefix: Option<String>,
	pub denom: Option<String>,
	pub rpc_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsLayer {
	pub data_dir: Option<PathBuf>,
	pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeychainLayer {
	pub service: Option<String>,
	pub account: Option<String>,
	pub use_native: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityLogLayer {
	pub min_severity: Option<String>,
	pub console: Option<bool>,
	pub file: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidsLayer {
	pub poll_interval_ms: Option<u64>,
	pub quorum: Option<usize>,
	pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceLayer {
	pub poll_interval_ms: Option<u64>,
	pub startup_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscrowLayer {
	pub initial_deposit: Option<u64>,
	pub threshold_fraction: Option<f64>,
	pub reference_window_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	pub level: Option<String>,
	pub format: Option<String>,
}

impl ConfigLayer {
	/// Overlay `other` on top of `self`.
	pub fn merge(&mut self, other: ConfigLayer) {
		merge_option(&mut self.network, other.network, NetworkLayer::merge);
		merge_option(&mut self.paths, other.paths, PathsLayer::merge);
		merge_option(&mut self.keychain, other.keychain, KeychainLayer::merge);
		merge_option(
			&mut self.security_log,
			other.security_log,
			SecurityLogLayer::merge,
		);
		merge_option(&mut self.bids, other.bids, BidsLayer::merge);
		merge_option(&mut self.service, other.service, ServiceLayer::merge);
		merge_option(&mut self.escrow, other.escrow, EscrowLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

fn overlay<T>(target: &mut Option<T>, source: Option<T>) {
	if source.is_some() {
		*target = source;
	}
}

impl NetworkLayer {
	fn merge(&mut self, other: NetworkLayer) {
		overlay(&mut self.chain_id, other.chain_id);
		overlay(&mut self.address_prefix, other.address_prefix);
		overlay(&mut self.denom, other.denom);
		overlay(&mut self.rpc_url, other.rpc_url);
	}
}

impl PathsLayer {
	fn merge(&mut self, other: PathsLayer) {
		overlay(&mut self.data_dir, other.data_dir);
		overlay(&mut self.state_dir, other.state_dir);
	}
}

impl KeychainLayer {
	fn merge(&mut self, other: KeychainLayer) {
		overlay(&mut self.service, other.service);
		overlay(&mut self.account, other.account);
		overlay(&mut self.use_native, other.use_native);
	}
}

impl SecurityLogLayer {
	fn merge(&mut self, other: SecurityLogLayer) {
		overlay(&mut self.min_severity, other.min_severity);
		overlay(&mut self.console, other.console);
		overlay(&mut self.file, other.file);
	}
}

impl BidsLayer {
	fn merge(&mut self, other: BidsLayer) {
		overlay(&mut self.poll_interval_ms, other.poll_interval_ms);
		overlay(&mut self.quorum, other.quorum);
		overlay(&mut self.timeout_secs, other.timeout_secs);
	}
}

impl ServiceLayer {
	fn merge(&mut self, other: ServiceLayer) {
		overlay(&mut self.poll_interval_ms, other.poll_interval_ms);
		overlay(&mut self.startup_timeout_secs, other.startup_timeout_secs);
	}
}

impl EscrowLayer {
	fn merge(&mut self, other: EscrowLayer) {
		overlay(&mut self.initial_deposit, other.initial_deposit);
		overlay(&mut self.threshold_fraction, other.threshold_fraction);
		overlay(&mut self.reference_window_hours, other.reference_window_hours);
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		overlay(&mut self.level, other.level);
		overlay(&mut self.format, other.format);
	}
}
