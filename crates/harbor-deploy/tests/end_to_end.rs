// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use harbor_deploy::testing::{bid, test_manifest, MockChain, MockProvider, StaticSigner};
use harbor_deploy::{
	AllowListVerifier, ChainMessage, DeploymentState, LeaseState, ManualClock, Orchestrator,
	OrchestratorDeps, OrchestratorSettings, Price, SnapshotStore,
};
use harbor_security_log::{MemorySink, SecurityEventType, SecurityLog, Severity};

const OWNER: &str = "akash1integration";

fn settings() -> OrchestratorSettings {
	OrchestratorSettings {
		bid_poll_interval: Duration::from_secs(3),
		bid_quorum: 3,
		bid_timeout: Duration::from_secs(120),
		service_poll_interval: Duration::from_secs(5),
		service_startup_timeout: Duration::from_secs(300),
		initial_deposit: Price {
			denom: "uakt".to_string(),
			amount: 5_000_000,
		},
	}
}

#[tokio::test]
async fn deploys_to_cheapest_verified_provider() {
	let dir = tempfile::tempdir().unwrap();
	let sink = MemorySink::new();
	let log = SecurityLog::new(Severity::Debug, vec![Arc::new(sink.clone())]);

	let chain = Arc::new(MockChain::new("akashnet-2"));
	chain.set_height(4242);
	for provider in ["p-a", "p-b", "p-c"] {
		chain.add_provider(provider, &format!("https://{provider}.example:8443"), &[]);
	}
	chain.push_bid_poll(vec![bid(4242, "p-a", 120)]);
	chain.push_bid_poll(vec![bid(4242, "p-a", 120), bid(4242, "p-b", 95)]);
	chain.push_bid_poll(vec![
		bid(4242, "p-a", 120),
		bid(4242, "p-b", 95),
		bid(4242, "p-c", 110),
	]);

	let provider = Arc::new(MockProvider::default());
	provider.ready_after(2, "https://shop.p-b.example");

	let snapshots = SnapshotStore::new(dir.path().join("deployments").join("current.json"));
	let clock = Arc::new(ManualClock::new());
	let orchestrator = Orchestrator::new(
		OrchestratorDeps {
			chain: chain.clone(),
			provider: provider.clone(),
			signer: Arc::new(StaticSigner::new(OWNER)),
			verifier: Arc::new(AllowListVerifier::new(["p-a", "p-b", "p-c"])),
			snapshots: snapshots.clone(),
			log: log.clone(),
		},
		settings(),
	)
	.with_clock(clock.clone());

	let manifest = test_manifest();
	let status = orchestrator.deploy(manifest.clone()).await.unwrap();

	assert_eq!(status.deployment.state, DeploymentState::Active);
	assert_eq!(status.deployment.id.dseq, 4242);
	assert_eq!(status.deployment.manifest_hash, manifest.hash);
	let lease = status.lease.clone().unwrap();
	assert_eq!(lease.provider(), "p-b");
	assert_eq!(lease.price.amount, 95);
	assert_eq!(lease.state, LeaseState::Active);
	assert_eq!(status.service_url.as_deref(), Some("https://shop.p-b.example"));
	assert_eq!(status.burn_rate_per_hour, 95 * 600);

	// three bid polls at 3s, then three status polls at 5s
	assert_eq!(clock.elapsed(), Duration::from_secs(6 + 10));

	let delivered = provider.manifests();
	assert_eq!(delivered.len(), 1);
	assert_eq!(delivered[0].0, "p-b");
	assert_eq!(delivered[0].2, manifest.canonical);

	let messages = chain.messages();
	assert!(matches!(messages[0], ChainMessage::CreateDeployment { .. }));
	assert!(matches!(
		&messages[1],
		ChainMessage::CreateLease { provider, .. } if provider == "p-b"
	));

	let snapshot = snapshots.load().await.unwrap().unwrap();
	assert_eq!(snapshot.deployment, status.deployment);
	assert_eq!(snapshot.lease, status.lease);
	assert_eq!(snapshot.service_url, status.service_url);

	log.flush().await.unwrap();
	assert!(sink
		.of_type(SecurityEventType::DegradedBidSelection)
		.await
		.is_empty());

	let closed = orchestrator.close(&status.deployment.id).await.unwrap();
	assert_eq!(closed.state, DeploymentState::Closed);
	assert!(snapshots.load().await.unwrap().is_none());
}

#[tokio::test]
async fn restarted_session_resumes_from_snapshot() {
	let dir = tempfile::tempdir().unwrap();
	let chain = Arc::new(MockChain::new("akashnet-2"));
	chain.set_height(77);
	chain.add_provider("p-a", "https://p-a.example:8443", &[]);
	chain.push_bid_poll(vec![bid(77, "p-a", 10)]);
	let provider = Arc::new(MockProvider::default());
	provider.ready_after(0, "https://svc.p-a.example");
	let snapshots = SnapshotStore::new(dir.path().join("current.json"));

	let build = || {
		Orchestrator::new(
			OrchestratorDeps {
				chain: chain.clone(),
				provider: provider.clone(),
				signer: Arc::new(StaticSigner::new(OWNER)),
				verifier: Arc::new(AllowListVerifier::new(["p-a"])),
				snapshots: snapshots.clone(),
				log: SecurityLog::discard(),
			},
			settings(),
		)
		.with_clock(Arc::new(ManualClock::new()))
	};

	let first = build();
	let status = first.deploy(test_manifest()).await.unwrap();
	drop(first);

	let second = build();
	let resumed = second.get_active_deployment().await.unwrap().unwrap();
	assert_eq!(resumed.deployment, status.deployment);

	let closed = second.close(&status.deployment.id).await.unwrap();
	assert_eq!(closed.state, DeploymentState::Closed);
}
