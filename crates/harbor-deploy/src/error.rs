// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deployment error types.

use crate::types::DeploymentState;

pub type DeployResult<T> = Result<T, DeployError>;

/// Errors raised while driving a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
	/// The state table forbids this move
	#[error("invalid deployment transition: {from} -> {to}")]
	InvalidTransition {
		from: DeploymentState,
		to: DeploymentState,
	},

	/// The step needs the deployment in a particular state
	#[error("deployment {dseq} is {actual}, expected {expected}")]
	UnexpectedState {
		dseq: u64,
		expected: DeploymentState,
		actual: DeploymentState,
	},

	/// No provider bid before the collection deadline
	#[error("no bids received for deployment {dseq}")]
	NoBidsReceived { dseq: u64 },

	/// Provider never reported a reachable service
	#[error("service for deployment {dseq} did not come online within {waited_secs}s")]
	ServiceStartupTimeout { dseq: u64, waited_secs: u64 },

	/// Provider rejected or did not accept the manifest
	#[error("manifest delivery to {provider} failed: {reason}")]
	ManifestDeliveryFailed { provider: String, reason: String },

	/// Funding source cannot cover the quoted swap
	#[error("insufficient funds: {required} {denom} required, {available} {denom} available")]
	InsufficientFunds {
		required: u64,
		available: u64,
		denom: String,
	},

	#[error("swap quote {id} expired")]
	QuoteExpired { id: String },

	/// Transport-level failure talking to a provider
	#[error("provider {provider} unreachable: {reason}")]
	ProviderUnreachable { provider: String, reason: String },

	#[error("deployment {dseq} not found")]
	DeploymentNotFound { dseq: u64 },

	#[error("no lease exists for deployment {dseq}")]
	LeaseNotFound { dseq: u64 },

	/// The manifest is only held in memory for the session that created it
	#[error("no manifest held for deployment {dseq}")]
	NoManifest { dseq: u64 },

	#[error("chain error: {0}")]
	Chain(String),

	#[error("funding router error: {0}")]
	Router(String),

	#[error(transparent)]
	Manifest(#[from] harbor_manifest::ManifestError),

	#[error(transparent)]
	Wallet(#[from] harbor_wallet::WalletError),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serde(#[from] serde_json::Error),
}

impl DeployError {
	/// Errors after which the deployment is in `failed` and must be re-driven.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			DeployError::NoBidsReceived { .. } | DeployError::ServiceStartupTimeout { .. }
		)
	}

	/// Errors worth retrying for the same step.
	pub fn is_transient(&self) -> bool {
		matches!(
			self,
			DeployError::ProviderUnreachable { .. } | DeployError::ManifestDeliveryFailed { .. }
		)
	}

	/// A short hint for the operator.
	pub fn remediation(&self) -> Option<String> {
		match self {
			DeployError::NoBidsReceived { .. } => Some(
				"the deployment moved to failed; raise the pricing hints or relax resource \
				 requirements, then retry the deployment"
					.to_string(),
			),
			DeployError::ServiceStartupTimeout { .. } => Some(
				"the deployment moved to failed; check the container image and its logs, \
				 then retry the deployment"
					.to_string(),
			),
			DeployError::ManifestDeliveryFailed { .. } => {
				Some("the lease is still held; resend the manifest".to_string())
			}
			DeployError::InsufficientFunds {
				required,
				available,
				denom,
			} => Some(format!(
				"fund the source account with at least {} {denom} more",
				required.saturating_sub(*available)
			)),
			DeployError::QuoteExpired { .. } => Some("request a new quote".to_string()),
			DeployError::ProviderUnreachable { .. } => {
				Some("check network connectivity and retry this step".to_string())
			}
			DeployError::NoManifest { .. } => {
				Some("regenerate the manifest and deploy again".to_string())
			}
			DeployError::Wallet(harbor_wallet::WalletError::WalletNotFound { .. }) => {
				Some("create a wallet with `harbor init`".to_string())
			}
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_errors_mention_failed_state() {
		let err = DeployError::NoBidsReceived { dseq: 1 };
		assert!(err.is_terminal());
		assert!(err.remediation().unwrap().contains("failed"));

		let err = DeployError::ServiceStartupTimeout {
			dseq: 1,
			waited_secs: 300,
		};
		assert!(err.is_terminal());
		assert!(err.remediation().unwrap().contains("failed"));
	}

	#[test]
	fn insufficient_funds_shows_both_amounts_with_denom() {
		let err = DeployError::InsufficientFunds {
			required: 150,
			available: 100,
			denom: "uusdc".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"insufficient funds: 150 uusdc required, 100 uusdc available"
		);
		assert!(err.remediation().unwrap().contains("50 uusdc"));
		assert!(!err.is_terminal());
	}

	#[test]
	fn unexpected_state_names_both_states() {
		let err = DeployError::UnexpectedState {
			dseq: 9,
			expected: DeploymentState::Bidding,
			actual: DeploymentState::Active,
		};
		assert_eq!(err.to_string(), "deployment 9 is active, expected bidding");
		assert!(!err.is_terminal());
	}

	#[test]
	fn delivery_failure_is_transient() {
		let err = DeployError::ManifestDeliveryFailed {
			provider: "akash1p".to_string(),
			reason: "status 500".to_string(),
		};
		assert!(err.is_transient());
		assert!(!err.is_terminal());
	}
}
