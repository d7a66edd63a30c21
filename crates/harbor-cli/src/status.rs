// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt::Write as _;

use anyhow::{Context as _, Result};
use harbor_deploy::{burn_rate_per_hour, DeploymentSnapshot, LeaseState, SnapshotStore};

use crate::context::Context;

/// Print the local snapshot. This binary has no chain client, so the view is
/// whatever the last session recorded.
pub async fn run(ctx: &Context) -> Result<()> {
	let store = SnapshotStore::new(ctx.config.paths.deployment_snapshot_file());
	let snapshot = store
		.load()
		.await
		.with_context(|| format!("failed to read {}", store.path().display()))?;
	match snapshot {
		Some(snapshot) => print!("{}", render(&snapshot)),
		None => println!("no deployment recorded"),
	}
	Ok(())
}

fn render(snapshot: &DeploymentSnapshot) -> String {
	let d = &snapshot.deployment;
	let mut out = String::new();
	let _ = writeln!(
		out,
		"deployment {} (cached {})",
		d.id,
		snapshot.updated_at.to_rfc3339()
	);
	let _ = writeln!(out, "  state:    {}", d.state);
	let _ = writeln!(out, "  attempt:  {}", d.attempt);
	let _ = writeln!(out, "  manifest: {}", d.manifest_hash);
	if let Some(reason) = &d.failure_reason {
		let _ = writeln!(out, "  failure:  {reason}");
	}
	if let Some(lease) = &snapshot.lease {
		let state = match lease.state {
			LeaseState::Active => "active",
			LeaseState::Closed => "closed",
		};
		let _ = writeln!(out, "  provider: {} (lease {state})", lease.provider());
		let _ = writeln!(
			out,
			"  price:    {} {}/block ({} {}/hour)",
			lease.price.amount,
			lease.price.denom,
			burn_rate_per_hour(&lease.price),
			lease.price.denom
		);
	}
	if let Some(url) = &snapshot.service_url {
		let _ = writeln!(out, "  url:      {url}");
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use harbor_deploy::{Deployment, DeploymentId, DeploymentState, Lease, LeaseId, Price};

	#[test]
	fn renders_active_deployment_as_cached() {
		let now = Utc::now();
		let id = DeploymentId::new("akash1owner", 812);
		let mut deployment = Deployment::new(id.clone(), "abc123", now);
		for next in [
			DeploymentState::Bidding,
			DeploymentState::Leased,
			DeploymentState::Active,
		] {
			deployment.transition(next, now).unwrap();
		}
		let snapshot = DeploymentSnapshot {
			deployment,
			lease: Some(Lease {
				id: LeaseId {
					owner: id.owner.clone(),
					dseq: 812,
					gseq: 1,
					oseq: 1,
					provider: "akash1provider".to_string(),
				},
				price: Price {
					denom: "uakt".to_string(),
					amount: 95,
				},
				state: LeaseState::Active,
			}),
			service_url: Some("https://web.example".to_string()),
			updated_at: now,
		};

		let text = render(&snapshot);
		assert!(text.starts_with("deployment akash1owner/812 (cached "));
		assert!(text.contains("state:    active"));
		assert!(text.contains("akash1provider (lease active)"));
		assert!(text.contains("57000 uakt/hour"));
		assert!(text.contains("https://web.example"));
	}

	#[test]
	fn renders_failure_reason() {
		let now = Utc::now();
		let mut deployment = Deployment::new(DeploymentId::new("akash1owner", 3), "h", now);
		deployment.transition(DeploymentState::Bidding, now).unwrap();
		deployment.transition(DeploymentState::Failed, now).unwrap();
		deployment.failure_reason = Some("no bids received for deployment 3".to_string());

		let text = render(&DeploymentSnapshot {
			deployment,
			lease: None,
			service_url: None,
			updated_at: now,
		});
		assert!(text.contains("state:    failed"));
		assert!(text.contains("failure:  no bids received"));
		assert!(!text.contains("provider:"));
	}
}
