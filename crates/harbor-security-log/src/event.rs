// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for the security log.
//!
//! - [`SecurityEventType`]: every sensitive operation that is recorded
//! - [`Severity`]: RFC 5424-compatible severity levels
//! - [`SecurityEvent`]: one sanitized record, written as one JSON line

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SecurityLogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
	// Wallet lifecycle
	WalletCreated,
	WalletLoaded,
	WalletDeleted,
	TransactionSigned,
	DecryptionFailed,

	// Ephemeral keys
	EphemeralKeyCreated,
	EphemeralKeyRevoked,
	EphemeralKeyExpired,

	// Keychain
	KeychainPasswordLoaded,
	KeychainPasswordCreated,
	KeychainPasswordDeleted,
	KeychainPasswordRotated,
	KeychainBackendUnavailable,
	KeychainCacheCleared,
	TamperDetected,
	InsecurePermissions,

	// Deployments and funding
	DegradedBidSelection,
	DeploymentFailed,
	FundingExecuted,
	FundingRefused,
}

impl SecurityEventType {
	pub fn default_severity(&self) -> Severity {
		match self {
			SecurityEventType::WalletLoaded
			| SecurityEventType::TransactionSigned
			| SecurityEventType::KeychainPasswordLoaded => Severity::Info,

			SecurityEventType::WalletCreated
			| SecurityEventType::EphemeralKeyCreated
			| SecurityEventType::EphemeralKeyRevoked
			| SecurityEventType::EphemeralKeyExpired
			| SecurityEventType::KeychainPasswordCreated
			| SecurityEventType::KeychainCacheCleared
			| SecurityEventType::FundingExecuted => Severity::Notice,

			SecurityEventType::WalletDeleted
			| SecurityEventType::KeychainPasswordDeleted
			| SecurityEventType::KeychainPasswordRotated
			| SecurityEventType::KeychainBackendUnavailable
			| SecurityEventType::InsecurePermissions
			| SecurityEventType::DegradedBidSelection
			| SecurityEventType::FundingRefused => Severity::Warning,

			SecurityEventType::DecryptionFailed | SecurityEventType::DeploymentFailed => {
				Severity::Error
			}

			SecurityEventType::TamperDetected => Severity::Critical,
		}
	}
}

impl fmt::Display for SecurityEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = serde_json::to_value(self)
			.ok()
			.and_then(|v| v.as_str().map(str::to_owned))
			.unwrap_or_else(|| format!("{self:?}"));
		write!(f, "{s}")
	}
}

/// Severity levels, ordered so that `Critical > Error > ... > Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl Severity {
	/// Returns the RFC 5424 numeric severity code.
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}
}

impl PartialOrd for Severity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Severity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity (Critical=2 > Debug=7)
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Severity::Debug => "debug",
			Severity::Info => "info",
			Severity::Notice => "notice",
			Severity::Warning => "warning",
			Severity::Error => "error",
			Severity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

impl FromStr for Severity {
	type Err = SecurityLogError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"debug" => Ok(Severity::Debug),
			"info" => Ok(Severity::Info),
			"notice" => Ok(Severity::Notice),
			"warn" | "warning" => Ok(Severity::Warning),
			"error" => Ok(Severity::Error),
			"critical" => Ok(Severity::Critical),
			other => Err(SecurityLogError::UnknownSeverity(other.to_string())),
		}
	}
}

/// A sanitized security record. `data` has already been through
/// [`crate::redaction::sanitize`] when an event reaches a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: SecurityEventType,
	pub severity: Severity,
	pub data: serde_json::Value,
}

impl SecurityEvent {
	pub fn new(event_type: SecurityEventType, severity: Severity, data: serde_json::Value) -> Self {
		Self {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type,
			severity,
			data,
		}
	}
}
