// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core orchestrator driving one deployment through its lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harbor_manifest::GeneratedManifest;
use harbor_security_log::{SecurityEventType, SecurityLog};
use harbor_wallet::{SystemClock, WallClock};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::bids::{select_bid, BidCollector, BidSelection, ProviderVerifier};
use crate::chain::{sign_and_broadcast, ChainClient, ChainMessage, TxReceipt, TxSigner};
use crate::clock::{Clock, TokioClock};
use crate::error::{DeployError, DeployResult};
use crate::escrow::{burn_rate_per_hour, estimate_time_remaining, is_exhausted};
use crate::funding::EscrowDepositor;
use crate::provider::ProviderApi;
use crate::snapshot::{DeploymentSnapshot, SnapshotStore};
use crate::types::{
	Bid, ChainDeployment, Deployment, DeploymentId, DeploymentState, DeploymentStatus, Lease,
	LeaseId, LeaseState, Price, ProviderInfo,
};

const TX_MEMO: &str = "harbor";

/// Tunables for one orchestrator session.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
	pub bid_poll_interval: Duration,
	pub bid_quorum: usize,
	pub bid_timeout: Duration,
	pub service_poll_interval: Duration,
	pub service_startup_timeout: Duration,
	/// Escrow deposit attached to every new deployment.
	pub initial_deposit: Price,
}

impl OrchestratorSettings {
	pub fn from_config(config: &harbor_config::HarborConfig) -> Self {
		Self {
			bid_poll_interval: config.bids.poll_interval,
			bid_quorum: config.bids.quorum,
			bid_timeout: config.bids.timeout,
			service_poll_interval: config.service.poll_interval,
			service_startup_timeout: config.service.startup_timeout,
			initial_deposit: Price {
				denom: config.network.denom.clone(),
				amount: config.escrow.initial_deposit,
			},
		}
	}
}

#[derive(Default)]
struct Session {
	deployment: Option<Deployment>,
	manifest: Option<GeneratedManifest>,
	lease: Option<Lease>,
	service_url: Option<String>,
}

/// The collaborators an [`Orchestrator`] talks to.
pub struct OrchestratorDeps {
	pub chain: Arc<dyn ChainClient>,
	pub provider: Arc<dyn ProviderApi>,
	pub signer: Arc<dyn TxSigner>,
	pub verifier: Arc<dyn ProviderVerifier>,
	pub snapshots: SnapshotStore,
	pub log: SecurityLog,
}

/// Drives a deployment from manifest to running service and keeps a local
/// snapshot of where it got to.
///
/// Owns the deployment, lease and escrow views for one session. The chain is
/// the source of truth; the snapshot is advisory.
pub struct Orchestrator {
	chain: Arc<dyn ChainClient>,
	provider: Arc<dyn ProviderApi>,
	signer: Arc<dyn TxSigner>,
	verifier: Arc<dyn ProviderVerifier>,
	snapshots: SnapshotStore,
	log: SecurityLog,
	clock: Arc<dyn Clock>,
	wall_clock: Arc<dyn WallClock>,
	settings: OrchestratorSettings,
	session: Mutex<Session>,
}

impl Orchestrator {
	pub fn new(deps: OrchestratorDeps, settings: OrchestratorSettings) -> Self {
		Self {
			chain: deps.chain,
			provider: deps.provider,
			signer: deps.signer,
			verifier: deps.verifier,
			snapshots: deps.snapshots,
			log: deps.log,
			clock: Arc::new(TokioClock),
			wall_clock: Arc::new(SystemClock),
			settings,
			session: Mutex::new(Session::default()),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_wall_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
		self.wall_clock = clock;
		self
	}

	/// Run the whole happy path: publish, collect bids, lease, deliver the
	/// manifest and wait for the service to come online.
	#[instrument(skip(self, manifest), fields(hash = %manifest.hash))]
	pub async fn deploy(&self, manifest: GeneratedManifest) -> DeployResult<DeploymentStatus> {
		let deployment = self.create(manifest).await?;
		let id = deployment.id.clone();

		let bids = self.wait_for_bids(&id).await?;
		let selection = self.select_best_bid(&id, &bids).await?;
		let lease = self.create_lease(&selection.bid).await?;
		self.send_manifest(&lease).await?;
		let url = self.wait_for_service(&lease).await?;

		info!(dseq = id.dseq, provider = %lease.provider(), url = %url, "deployment active");
		self.get_status(&id).await
	}

	/// Publish the manifest hash on chain with the initial escrow deposit.
	#[instrument(skip(self, manifest), fields(hash = %manifest.hash))]
	pub async fn create(&self, manifest: GeneratedManifest) -> DeployResult<Deployment> {
		self.publish(manifest, 1).await
	}

	/// Poll for bids until quorum or the configured timeout. With no bids at
	/// all the deployment moves to `failed`.
	#[instrument(skip(self), fields(dseq = id.dseq))]
	pub async fn wait_for_bids(&self, id: &DeploymentId) -> DeployResult<Vec<Bid>> {
		let deployment = self.deployment(id).await?;
		if deployment.state != DeploymentState::Bidding {
			return Err(DeployError::UnexpectedState {
				dseq: id.dseq,
				expected: DeploymentState::Bidding,
				actual: deployment.state,
			});
		}

		let collector = BidCollector::new(
			self.chain.clone(),
			self.clock.clone(),
			self.settings.bid_poll_interval,
			self.settings.bid_quorum,
		);
		match collector.collect_bids(id, self.settings.bid_timeout).await {
			Ok(bids) => Ok(bids),
			Err(e @ DeployError::NoBidsReceived { .. }) => {
				self.mark_failed(id, &e.to_string()).await?;
				Err(e)
			}
			Err(e) => Err(e),
		}
	}

	pub async fn select_best_bid(
		&self,
		id: &DeploymentId,
		bids: &[Bid],
	) -> DeployResult<BidSelection> {
		let selection = select_bid(bids, self.verifier.as_ref(), &self.log)
			.await
			.ok_or(DeployError::NoBidsReceived { dseq: id.dseq })?;
		info!(
			dseq = id.dseq,
			provider = %selection.bid.provider(),
			price = selection.bid.price.amount,
			degraded = selection.degraded,
			"bid selected"
		);
		Ok(selection)
	}

	#[instrument(skip(self, bid), fields(dseq = bid.id.dseq, provider = %bid.provider()))]
	pub async fn create_lease(&self, bid: &Bid) -> DeployResult<Lease> {
		let owner = self.signer.address().await?;
		let lease_id = LeaseId::from_bid(owner, &bid.id);
		let id = lease_id.deployment_id();

		let current = self.deployment(&id).await?;
		if !current.state.can_transition_to(DeploymentState::Leased) {
			return Err(DeployError::InvalidTransition {
				from: current.state,
				to: DeploymentState::Leased,
			});
		}

		self.broadcast(ChainMessage::create_lease(&lease_id)).await?;

		let lease = Lease {
			id: lease_id,
			price: bid.price.clone(),
			state: LeaseState::Active,
		};
		self.session.lock().await.lease = Some(lease.clone());
		self.transition(&id, DeploymentState::Leased).await?;
		Ok(lease)
	}

	/// Deliver the manifest to the lease's provider. Not retried here; the
	/// lease is still held if this fails.
	#[instrument(skip(self, lease), fields(dseq = lease.id.dseq, provider = %lease.provider()))]
	pub async fn send_manifest(&self, lease: &Lease) -> DeployResult<()> {
		let manifest = self
			.session
			.lock()
			.await
			.manifest
			.as_ref()
			.map(|m| m.canonical.clone())
			.ok_or(DeployError::NoManifest { dseq: lease.id.dseq })?;

		let provider = self.provider_info(lease.provider()).await?;
		self.provider
			.send_manifest(&provider, lease.id.dseq, &manifest)
			.await
	}

	/// Poll the provider until the workload reports a reachable URL.
	///
	/// Poll failures are absorbed. Reaching the startup timeout moves the
	/// deployment to `failed`.
	#[instrument(skip(self, lease), fields(dseq = lease.id.dseq, provider = %lease.provider()))]
	pub async fn wait_for_service(&self, lease: &Lease) -> DeployResult<String> {
		let id = lease.id.deployment_id();
		let timeout = self.settings.service_startup_timeout;
		let deadline = self.clock.now() + timeout;
		let mut provider: Option<ProviderInfo> = None;

		loop {
			if provider.is_none() {
				match self.provider_info(lease.provider()).await {
					Ok(info) => provider = Some(info),
					Err(e) => debug!(error = %e, "provider lookup failed"),
				}
			}

			if let Some(info) = &provider {
				match self.provider.lease_status(info, &lease.id).await {
					Ok(status) => {
						if let Some(url) = status.service_url() {
							self.session.lock().await.service_url = Some(url.clone());
							self.transition(&id, DeploymentState::Active).await?;
							return Ok(url);
						}
						debug!("service not ready yet");
					}
					Err(e) => debug!(error = %e, "lease status poll failed"),
				}
			}

			let now = self.clock.now();
			if now >= deadline {
				break;
			}
			self.clock
				.sleep(self.settings.service_poll_interval.min(deadline - now))
				.await;
		}

		let err = DeployError::ServiceStartupTimeout {
			dseq: id.dseq,
			waited_secs: timeout.as_secs(),
		};
		self.mark_failed(&id, &err.to_string()).await?;
		Err(err)
	}

	/// Top up the escrow account. Deployment state is unchanged.
	#[instrument(skip(self), fields(dseq = id.dseq))]
	pub async fn deposit_to_escrow(
		&self,
		id: &DeploymentId,
		amount: Price,
	) -> DeployResult<TxReceipt> {
		let receipt = self
			.broadcast(ChainMessage::DepositEscrow {
				id: id.clone(),
				amount: amount.clone(),
			})
			.await?;
		info!(amount = amount.amount, denom = %amount.denom, "escrow deposit broadcast");
		Ok(receipt)
	}

	/// Deployment, lease and escrow in one view, with an estimate of how long
	/// the escrow lasts. Exhausted escrow closes the lease and deployment.
	#[instrument(skip(self), fields(dseq = id.dseq))]
	pub async fn get_status(&self, id: &DeploymentId) -> DeployResult<DeploymentStatus> {
		let chain_deployment = self
			.chain
			.get_deployment(id)
			.await?
			.ok_or(DeployError::DeploymentNotFound { dseq: id.dseq })?;
		let mut lease = self.chain.get_lease(id).await?;
		let escrow = self.chain.get_escrow(id).await?;

		let mut deployment = match self.deployment(id).await {
			Ok(d) => d,
			Err(DeployError::DeploymentNotFound { .. }) => {
				self.rebuild_deployment(&chain_deployment, lease.as_ref())
			}
			Err(e) => return Err(e),
		};

		let exhausted = escrow.as_ref().map(is_exhausted).unwrap_or(false);
		if exhausted || !chain_deployment.active {
			if let Some(lease) = lease.as_mut() {
				lease.state = LeaseState::Closed;
			}
			if deployment.state == DeploymentState::Active {
				warn!(exhausted, "escrow exhausted or deployment closed on chain; closing view");
				deployment = self.transition(id, DeploymentState::Closed).await?;
			}
		}

		let burn = match &lease {
			Some(l) if l.state == LeaseState::Active => burn_rate_per_hour(&l.price),
			_ => 0,
		};
		let balance = escrow.as_ref().map(|e| e.balance).unwrap_or(0);

		let service_url = {
			let session = self.session.lock().await;
			match &session.deployment {
				Some(d) if d.id == *id => session.service_url.clone(),
				_ => None,
			}
		};

		Ok(DeploymentStatus {
			deployment,
			lease,
			escrow,
			burn_rate_per_hour: burn,
			estimated_time_remaining: estimate_time_remaining(balance as f64, burn as f64),
			service_url,
		})
	}

	/// The current deployment, reconciled against the chain.
	///
	/// A snapshot that names a deployment the chain no longer reports as open
	/// is discarded. When the chain has an open deployment the snapshot does
	/// not know about, the snapshot is rebuilt from chain state.
	#[instrument(skip(self))]
	pub async fn get_active_deployment(&self) -> DeployResult<Option<DeploymentSnapshot>> {
		let owner = self.signer.address().await?;
		let active = self.chain.active_deployments(&owner).await?;
		let snapshot = self.snapshots.load().await?;

		if let Some(snapshot) = snapshot {
			if active.iter().any(|d| d.id == snapshot.deployment.id) {
				self.adopt(&snapshot).await;
				return Ok(Some(snapshot));
			}
			warn!(
				dseq = snapshot.deployment.id.dseq,
				"snapshot disagrees with chain; discarding"
			);
			self.snapshots.clear().await?;
		}

		let Some(latest) = active.into_iter().max_by_key(|d| d.id.dseq) else {
			return Ok(None);
		};

		let lease = self.chain.get_lease(&latest.id).await?;
		let mut deployment = self.rebuild_deployment(&latest, lease.as_ref());
		let mut service_url = None;
		if let Some(lease) = lease.as_ref().filter(|l| l.state == LeaseState::Active) {
			if let Ok(provider) = self.provider_info(lease.provider()).await {
				if let Ok(status) = self.provider.lease_status(&provider, &lease.id).await {
					service_url = status.service_url();
				}
			}
			if service_url.is_some() {
				deployment.state = DeploymentState::Active;
			}
		}

		let snapshot = DeploymentSnapshot {
			deployment,
			lease,
			service_url,
			updated_at: self.wall_clock.now(),
		};
		self.snapshots.save(&snapshot).await?;
		self.adopt(&snapshot).await;
		info!(dseq = snapshot.deployment.id.dseq, state = %snapshot.deployment.state, "snapshot rebuilt from chain");
		Ok(Some(snapshot))
	}

	/// Close an active deployment and release its escrow.
	///
	/// A failed deployment that is still open on chain is closed there too, but
	/// stays `failed` locally.
	#[instrument(skip(self), fields(dseq = id.dseq))]
	pub async fn close(&self, id: &DeploymentId) -> DeployResult<Deployment> {
		let current = self.deployment(id).await?;
		match current.state {
			DeploymentState::Active => {}
			DeploymentState::Failed => {
				self.broadcast(ChainMessage::CloseDeployment { id: id.clone() })
					.await?;
				return Ok(current);
			}
			other => {
				return Err(DeployError::InvalidTransition {
					from: other,
					to: DeploymentState::Closed,
				})
			}
		}

		self.broadcast(ChainMessage::CloseDeployment { id: id.clone() })
			.await?;
		if let Some(lease) = self.session.lock().await.lease.as_mut() {
			lease.state = LeaseState::Closed;
		}
		let closed = self.transition(id, DeploymentState::Closed).await?;
		self.snapshots.clear().await?;
		info!("deployment closed");
		Ok(closed)
	}

	/// Move the deployment to `failed` and record why.
	#[instrument(skip(self), fields(dseq = id.dseq))]
	pub async fn mark_failed(&self, id: &DeploymentId, reason: &str) -> DeployResult<Deployment> {
		let failed = {
			let mut session = self.session.lock().await;
			let deployment = session
				.deployment
				.as_mut()
				.filter(|d| d.id == *id)
				.ok_or(DeployError::DeploymentNotFound { dseq: id.dseq })?;
			let from = deployment.state;
			deployment.transition(DeploymentState::Failed, self.wall_clock.now())?;
			deployment.failure_reason = Some(reason.to_string());
			warn!(from = %from, reason, "deployment failed");
			deployment.clone()
		};

		self.log.record(
			SecurityEventType::DeploymentFailed,
			json!({
				"dseq": id.dseq,
				"owner": id.owner,
				"attempt": failed.attempt,
				"reason": reason,
			}),
		);
		self.persist().await?;
		Ok(failed)
	}

	/// Start a fresh attempt for a failed deployment with the same manifest.
	///
	/// The failed deployment is closed on chain first so its escrow is
	/// released; a failure to close is logged and does not block the retry.
	#[instrument(skip(self), fields(dseq = id.dseq))]
	pub async fn retry_deployment(&self, id: &DeploymentId) -> DeployResult<Deployment> {
		let (previous, manifest) = {
			let session = self.session.lock().await;
			let previous = session
				.deployment
				.clone()
				.filter(|d| d.id == *id)
				.ok_or(DeployError::DeploymentNotFound { dseq: id.dseq })?;
			(previous, session.manifest.clone())
		};
		if !previous.state.can_transition_to(DeploymentState::Pending) {
			return Err(DeployError::InvalidTransition {
				from: previous.state,
				to: DeploymentState::Pending,
			});
		}
		let manifest = manifest.ok_or(DeployError::NoManifest { dseq: id.dseq })?;

		if let Err(e) = self
			.broadcast(ChainMessage::CloseDeployment { id: id.clone() })
			.await
		{
			warn!(error = %e, "failed to close previous attempt on chain");
		}

		info!(attempt = previous.attempt + 1, "retrying deployment");
		self.publish(manifest, previous.attempt + 1).await
	}

	async fn publish(&self, manifest: GeneratedManifest, attempt: u32) -> DeployResult<Deployment> {
		let owner = self.signer.address().await?;
		let dseq = self.chain.latest_height().await?;
		let id = DeploymentId::new(owner, dseq);

		let mut deployment = Deployment::new(id.clone(), manifest.hash.clone(), self.wall_clock.now());
		deployment.attempt = attempt;

		// The session keeps the previous deployment until the chain has
		// accepted this one.
		self.broadcast(ChainMessage::CreateDeployment {
			id: id.clone(),
			manifest_hash: manifest.hash.clone(),
			deposit: self.settings.initial_deposit.clone(),
		})
		.await?;

		{
			let mut session = self.session.lock().await;
			*session = Session {
				deployment: Some(deployment),
				manifest: Some(manifest),
				lease: None,
				service_url: None,
			};
		}
		let bidding = self.transition(&id, DeploymentState::Bidding).await?;
		info!(dseq, attempt, "deployment published");
		Ok(bidding)
	}

	async fn broadcast(&self, message: ChainMessage) -> DeployResult<TxReceipt> {
		sign_and_broadcast(
			self.chain.as_ref(),
			self.signer.as_ref(),
			vec![message],
			TX_MEMO,
		)
		.await
	}

	async fn provider_info(&self, address: &str) -> DeployResult<ProviderInfo> {
		self.chain
			.provider_info(address)
			.await?
			.ok_or_else(|| DeployError::ProviderUnreachable {
				provider: address.to_string(),
				reason: "provider is not registered on chain".to_string(),
			})
	}

	/// The session's deployment, falling back to the snapshot.
	async fn deployment(&self, id: &DeploymentId) -> DeployResult<Deployment> {
		{
			let session = self.session.lock().await;
			if let Some(d) = session.deployment.as_ref().filter(|d| d.id == *id) {
				return Ok(d.clone());
			}
		}

		match self.snapshots.load().await? {
			Some(snapshot) if snapshot.deployment.id == *id => {
				self.adopt(&snapshot).await;
				Ok(snapshot.deployment)
			}
			_ => Err(DeployError::DeploymentNotFound { dseq: id.dseq }),
		}
	}

	async fn adopt(&self, snapshot: &DeploymentSnapshot) {
		let mut session = self.session.lock().await;
		if session
			.deployment
			.as_ref()
			.map(|d| d.id == snapshot.deployment.id)
			.unwrap_or(false)
		{
			return;
		}
		*session = Session {
			deployment: Some(snapshot.deployment.clone()),
			manifest: None,
			lease: snapshot.lease.clone(),
			service_url: snapshot.service_url.clone(),
		};
	}

	fn rebuild_deployment(&self, chain: &ChainDeployment, lease: Option<&Lease>) -> Deployment {
		let now = self.wall_clock.now();
		let mut deployment = Deployment::new(chain.id.clone(), chain.manifest_hash.clone(), now);
		deployment.state = match (chain.active, lease.map(|l| l.state)) {
			(false, _) => DeploymentState::Closed,
			(true, Some(LeaseState::Active)) => DeploymentState::Leased,
			(true, _) => DeploymentState::Bidding,
		};
		deployment
	}

	async fn transition(
		&self,
		id: &DeploymentId,
		next: DeploymentState,
	) -> DeployResult<Deployment> {
		let updated = {
			let mut session = self.session.lock().await;
			let deployment = session
				.deployment
				.as_mut()
				.filter(|d| d.id == *id)
				.ok_or(DeployError::DeploymentNotFound { dseq: id.dseq })?;
			deployment.transition(next, self.wall_clock.now())?;
			deployment.clone()
		};
		debug!(dseq = id.dseq, state = %next, "deployment transitioned");
		self.persist().await?;
		Ok(updated)
	}

	async fn persist(&self) -> DeployResult<()> {
		let snapshot = {
			let session = self.session.lock().await;
			match &session.deployment {
				Some(deployment) => DeploymentSnapshot {
					deployment: deployment.clone(),
					lease: session.lease.clone(),
					service_url: session.service_url.clone(),
					updated_at: self.wall_clock.now(),
				},
				None => return Ok(()),
			}
		};
		self.snapshots.save(&snapshot).await
	}
}

#[async_trait]
impl EscrowDepositor for Orchestrator {
	async fn deposit_to_escrow(&self, id: &DeploymentId, amount: Price) -> DeployResult<TxReceipt> {
		Orchestrator::deposit_to_escrow(self, id, amount).await
	}
}
