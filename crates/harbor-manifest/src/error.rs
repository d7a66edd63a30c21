// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use thiserror::Error;

/// One rejected field, addressed by its dotted path (`services.web.memory`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
	pub field: String,
	pub message: String,
}

impl Violation {
	pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			message: message.into(),
		}
	}
}

impl fmt::Display for Violation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.field, self.message)
	}
}

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error("invalid app config: {}", join(.violations))]
	InvalidConfig { violations: Vec<Violation> },

	#[error("failed to parse app config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("failed to serialize manifest: {0}")]
	Serialize(#[from] serde_json::Error),
}

impl ManifestError {
	/// Dotted field paths of every violation, in reporting order.
	pub fn fields(&self) -> Vec<&str> {
		match self {
			ManifestError::InvalidConfig { violations } => {
				violations.iter().map(|v| v.field.as_str()).collect()
			}
			_ => Vec::new(),
		}
	}
}

fn join(violations: &[Violation]) -> String {
	violations
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("; ")
}

pub type ManifestResult<T> = Result<T, ManifestError>;
