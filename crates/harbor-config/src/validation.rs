// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use std::time::Duration;

use tracing::warn;

use crate::runtime::HarborConfig;
use crate::ConfigError;

/// Severity names understood by the security log.
pub const SEVERITY_NAMES: &[&str] = &[
	"debug", "info", "notice", "warn", "warning", "error", "critical",
];

/// Validate the configuration.
pub fn validate_config(config: &HarborConfig) -> Result<(), ConfigError> {
	validate_network(config)?;
	validate_intervals(config)?;
	validate_escrow(config)?;
	validate_security_log(config)?;

	Ok(())
}

fn validate_network(config: &HarborConfig) -> Result<(), ConfigError> {
	let network = &config.network;
	if network.address_prefix.is_empty() {
		return Err(ConfigError::invalid_value(
			"network.address_prefix",
			"address_prefix cannot be empty",
		));
	}
	if network.denom.is_empty() {
		return Err(ConfigError::invalid_value(
			"network.denom",
			"denom cannot be empty",
		));
	}
	if !network.rpc_url.starts_with("https://") {
		warn!(rpc_url = %network.rpc_url, "network.rpc_url is not https");
	}
	Ok(())
}

fn non_zero(field: &str, value: Duration) -> Result<(), ConfigError> {
	if value.is_zero() {
		return Err(ConfigError::invalid_value(field, "must be greater than zero"));
	}
	Ok(())
}

fn validate_intervals(config: &HarborConfig) -> Result<(), ConfigError> {
	non_zero("bids.poll_interval_ms", config.bids.poll_interval)?;
	non_zero("bids.timeout_secs", config.bids.timeout)?;
	non_zero("service.poll_interval_ms", config.service.poll_interval)?;
	non_zero("service.startup_timeout_secs", config.service.startup_timeout)?;

	if config.bids.quorum == 0 {
		return Err(ConfigError::invalid_value(
			"bids.quorum",
			"quorum must be at least 1",
		));
	}
	if config.bids.poll_interval > config.bids.timeout {
		warn!(
			poll_interval_ms = config.bids.poll_interval.as_millis() as u64,
			timeout_secs = config.bids.timeout.as_secs(),
			"bid poll interval exceeds the bid timeout; at most one poll will run"
		);
	}
	Ok(())
}

fn validate_escrow(config: &HarborConfig) -> Result<(), ConfigError> {
	let fraction = config.escrow.threshold_fraction;
	if !(fraction > 0.0 && fraction <= 1.0) {
		return Err(ConfigError::invalid_value(
			"escrow.threshold_fraction",
			format!("{fraction} is outside (0, 1]"),
		));
	}
	let window = config.escrow.reference_window_hours;
	if !(window.is_finite() && window > 0.0) {
		return Err(ConfigError::invalid_value(
			"escrow.reference_window_hours",
			"must be a positive number of hours",
		));
	}
	if config.escrow.initial_deposit == 0 {
		warn!("escrow.initial_deposit is zero; deployments will start unfunded");
	}
	Ok(())
}

fn validate_security_log(config: &HarborConfig) -> Result<(), ConfigError> {
	let name = config.security_log.min_severity.to_ascii_lowercase();
	if !SEVERITY_NAMES.contains(&name.as_str()) {
		return Err(ConfigError::invalid_value(
			"security_log.min_severity",
			format!("unknown severity {name:?}"),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::layer::ConfigLayer;
	use crate::paths::PathsConfig;
	use proptest::prelude::*;

	fn defaults() -> HarborConfig {
		HarborConfig::from_layer(ConfigLayer::default(), PathsConfig::rooted_at("/tmp/h")).unwrap()
	}

	#[test]
	fn defaults_are_valid() {
		validate_config(&defaults()).unwrap();
	}

	#[test]
	fn zero_quorum_is_rejected() {
		let mut config = defaults();
		config.bids.quorum = 0;
		let err = validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("bids.quorum"));
	}

	#[test]
	fn zero_poll_interval_is_rejected() {
		let mut config = defaults();
		config.service.poll_interval = Duration::ZERO;
		assert!(validate_config(&config).is_err());
	}

	#[test]
	fn unknown_severity_is_rejected() {
		let mut config = defaults();
		config.security_log.min_severity = "loud".to_string();
		assert!(validate_config(&config).is_err());
	}

	proptest! {
		#[test]
		fn threshold_fraction_bounds(fraction in -2.0f64..3.0) {
			let mut config = defaults();
			config.escrow.threshold_fraction = fraction;
			let accepted = validate_config(&config).is_ok();
			prop_assert_eq!(accepted, fraction > 0.0 && fraction <= 1.0);
		}
	}
}
