// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deployment, bid, lease and escrow records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use harbor_manifest::Price;

use crate::error::{DeployError, DeployResult};

/// Group and order sequence numbers. Single-group deployments always use 1.
pub const DEFAULT_GSEQ: u32 = 1;
pub const DEFAULT_OSEQ: u32 = 1;

/// A deployment on chain is identified by its owner and sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeploymentId {
	pub owner: String,
	pub dseq: u64,
}

impl DeploymentId {
	pub fn new(owner: impl Into<String>, dseq: u64) -> Self {
		Self {
			owner: owner.into(),
			dseq,
		}
	}
}

impl fmt::Display for DeploymentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.owner, self.dseq)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
	/// Recorded locally, not yet accepted on chain.
	Pending,
	/// On chain with escrow funded; providers are bidding.
	Bidding,
	/// A lease exists with the winning provider.
	Leased,
	/// The provider runs the workload and a service URL is known.
	Active,
	Closed,
	Failed,
}

impl DeploymentState {
	pub fn as_str(&self) -> &'static str {
		match self {
			DeploymentState::Pending => "pending",
			DeploymentState::Bidding => "bidding",
			DeploymentState::Leased => "leased",
			DeploymentState::Active => "active",
			DeploymentState::Closed => "closed",
			DeploymentState::Failed => "failed",
		}
	}

	pub fn can_transition_to(&self, next: DeploymentState) -> bool {
		use DeploymentState::*;
		matches!(
			(self, next),
			(Pending, Bidding)
				| (Bidding, Leased)
				| (Leased, Active)
				| (Active, Closed)
				| (Bidding, Failed)
				| (Leased, Failed)
				| (Active, Failed)
				| (Failed, Pending)
		)
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, DeploymentState::Closed | DeploymentState::Failed)
	}
}

impl fmt::Display for DeploymentState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
	pub id: DeploymentId,
	pub state: DeploymentState,
	pub manifest_hash: String,
	/// 1 for the first attempt, incremented by each retry.
	#[serde(default = "first_attempt")]
	pub attempt: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub failure_reason: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

fn first_attempt() -> u32 {
	1
}

impl Deployment {
	pub fn new(id: DeploymentId, manifest_hash: impl Into<String>, now: DateTime<Utc>) -> Self {
		Self {
			id,
			state: DeploymentState::Pending,
			manifest_hash: manifest_hash.into(),
			attempt: 1,
			failure_reason: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Move to `next`, refusing anything the state table does not allow.
	pub fn transition(&mut self, next: DeploymentState, now: DateTime<Utc>) -> DeployResult<()> {
		if !self.state.can_transition_to(next) {
			return Err(DeployError::InvalidTransition {
				from: self.state,
				to: next,
			});
		}
		self.state = next;
		self.updated_at = now;
		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId {
	pub dseq: u64,
	pub gseq: u32,
	pub oseq: u32,
	pub provider: String,
}

impl fmt::Display for BidId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}/{}", self.dseq, self.gseq, self.oseq, self.provider)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
	pub id: BidId,
	/// Per-block price in minor units.
	pub price: Price,
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
}

impl Bid {
	pub fn provider(&self) -> &str {
		&self.id.provider
	}
}

/// `dseq` + provider + gseq + oseq.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId {
	pub owner: String,
	pub dseq: u64,
	pub gseq: u32,
	pub oseq: u32,
	pub provider: String,
}

impl LeaseId {
	pub fn from_bid(owner: impl Into<String>, bid: &BidId) -> Self {
		Self {
			owner: owner.into(),
			dseq: bid.dseq,
			gseq: bid.gseq,
			oseq: bid.oseq,
			provider: bid.provider.clone(),
		}
	}

	pub fn deployment_id(&self) -> DeploymentId {
		DeploymentId::new(self.owner.clone(), self.dseq)
	}
}

impl fmt::Display for LeaseId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}/{}/{}/{}/{}",
			self.owner, self.dseq, self.gseq, self.oseq, self.provider
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
	Active,
	Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
	pub id: LeaseId,
	pub price: Price,
	pub state: LeaseState,
}

impl Lease {
	pub fn provider(&self) -> &str {
		&self.id.provider
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowState {
	Open,
	Closed,
	Overdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAccount {
	/// Remaining balance in minor units of `denom`.
	pub balance: u64,
	pub denom: String,
	pub state: EscrowState,
}

/// Chain-side view of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDeployment {
	pub id: DeploymentId,
	pub manifest_hash: String,
	pub active: bool,
}

/// Registration details a provider publishes on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
	pub address: String,
	/// Base URL of the provider's API, e.g. `https://provider.example.com:8443`.
	pub host_uri: String,
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
	/// Addresses of auditors that signed off on this provider's attributes.
	#[serde(default)]
	pub audited_by: Vec<String>,
}

/// Composite view returned by `Orchestrator::get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
	pub deployment: Deployment,
	pub lease: Option<Lease>,
	pub escrow: Option<EscrowAccount>,
	/// Minor units of the escrow denom consumed per hour.
	pub burn_rate_per_hour: u64,
	pub estimated_time_remaining: String,
	pub service_url: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use DeploymentState::*;

	const ALL: [DeploymentState; 6] = [Pending, Bidding, Leased, Active, Closed, Failed];

	#[test]
	fn happy_path_transitions_are_allowed() {
		assert!(Pending.can_transition_to(Bidding));
		assert!(Bidding.can_transition_to(Leased));
		assert!(Leased.can_transition_to(Active));
		assert!(Active.can_transition_to(Closed));
	}

	#[test]
	fn closed_is_final() {
		for next in ALL {
			assert!(!Closed.can_transition_to(next));
		}
	}

	#[test]
	fn failed_only_redrives_to_pending() {
		for next in ALL {
			assert_eq!(Failed.can_transition_to(next), next == Pending);
		}
	}

	#[test]
	fn no_skipping_or_going_backwards() {
		assert!(!Pending.can_transition_to(Leased));
		assert!(!Pending.can_transition_to(Active));
		assert!(!Bidding.can_transition_to(Active));
		assert!(!Active.can_transition_to(Leased));
		assert!(!Leased.can_transition_to(Bidding));
		assert!(!Pending.can_transition_to(Failed));
	}

	#[test]
	fn illegal_transition_is_an_error_and_leaves_state() {
		let now = Utc::now();
		let mut d = Deployment::new(DeploymentId::new("akash1owner", 7), "abc", now);
		let err = d.transition(Active, now).unwrap_err();
		assert!(matches!(
			err,
			DeployError::InvalidTransition {
				from: Pending,
				to: Active
			}
		));
		assert_eq!(d.state, Pending);

		d.transition(Bidding, now).unwrap();
		assert_eq!(d.state, Bidding);
	}

	#[test]
	fn lease_id_derives_from_bid() {
		let bid = BidId {
			dseq: 9,
			gseq: DEFAULT_GSEQ,
			oseq: DEFAULT_OSEQ,
			provider: "akash1prov".to_string(),
		};
		let lease = LeaseId::from_bid("akash1owner", &bid);
		assert_eq!(lease.to_string(), "akash1owner/9/1/1/akash1prov");
		assert_eq!(lease.deployment_id(), DeploymentId::new("akash1owner", 9));
	}
}
