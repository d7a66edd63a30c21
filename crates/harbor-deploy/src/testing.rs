// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory doubles for the chain, provider, swap router and signer.
//!
//! Available to this crate's tests and, with the `testing` feature, to
//! downstream crates.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use harbor_manifest::{generate, AppConfig, GeneratedManifest};
use harbor_wallet::{TxSignature, UnsignedTx};

use crate::chain::{AccountInfo, ChainClient, ChainMessage, SignedTx, TxReceipt, TxSigner};
use crate::error::{DeployError, DeployResult};
use crate::funding::{EscrowDepositor, FundingRouter, SwapQuote, SwapReceipt};
use crate::provider::{LeaseStatus, ProviderApi, ServiceStatus};
use crate::types::{
	Bid, BidId, ChainDeployment, DeploymentId, EscrowAccount, EscrowState, Lease, LeaseId,
	LeaseState, Price, ProviderInfo, DEFAULT_GSEQ, DEFAULT_OSEQ,
};

const TEST_APP: &str = r#"
name = "harbor-test"

[services.web]
image = "nginx:1.25"
cpu = 0.5
memory = "512Mi"
storage = "1Gi"
expose = [{ port = 80 }]

[services.web.pricing]
amount = 1000
"#;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

/// A bid from `provider` for group 1, order 1, priced in `uakt`.
pub fn bid(dseq: u64, provider: &str, amount: u64) -> Bid {
	Bid {
		id: BidId {
			dseq,
			gseq: DEFAULT_GSEQ,
			oseq: DEFAULT_OSEQ,
			provider: provider.to_string(),
		},
		price: Price {
			denom: "uakt".to_string(),
			amount,
		},
		attributes: BTreeMap::new(),
	}
}

/// A small single-service manifest.
pub fn test_manifest() -> GeneratedManifest {
	let config = AppConfig::from_toml_str(TEST_APP).expect("test app config parses");
	generate(&config).expect("test app config is valid")
}

#[derive(Default)]
struct ChainState {
	height: u64,
	sequence: u64,
	bid_queue: VecDeque<Vec<Bid>>,
	last_bids: Vec<Bid>,
	known_bids: Vec<Bid>,
	failing_bid_polls: usize,
	failing_broadcasts: usize,
	bid_polls: usize,
	providers: HashMap<String, ProviderInfo>,
	provider_lookups: usize,
	deployments: BTreeMap<DeploymentId, ChainDeployment>,
	leases: BTreeMap<DeploymentId, Lease>,
	escrows: BTreeMap<DeploymentId, EscrowAccount>,
	broadcasts: Vec<SignedTx>,
}

impl ChainState {
	fn apply(&mut self, message: &ChainMessage) {
		match message {
			ChainMessage::CreateDeployment {
				id,
				manifest_hash,
				deposit,
			} => {
				self.deployments.insert(
					id.clone(),
					ChainDeployment {
						id: id.clone(),
						manifest_hash: manifest_hash.clone(),
						active: true,
					},
				);
				self.escrows.insert(
					id.clone(),
					EscrowAccount {
						balance: deposit.amount,
						denom: deposit.denom.clone(),
						state: EscrowState::Open,
					},
				);
			}
			ChainMessage::UpdateDeployment { id, manifest_hash } => {
				if let Some(d) = self.deployments.get_mut(id) {
					d.manifest_hash = manifest_hash.clone();
				}
			}
			ChainMessage::CloseDeployment { id } => {
				if let Some(d) = self.deployments.get_mut(id) {
					d.active = false;
				}
				if let Some(lease) = self.leases.get_mut(id) {
					lease.state = LeaseState::Closed;
				}
				if let Some(escrow) = self.escrows.get_mut(id) {
					escrow.state = EscrowState::Closed;
				}
			}
			ChainMessage::DepositEscrow { id, amount } => {
				let escrow = self.escrows.entry(id.clone()).or_insert_with(|| EscrowAccount {
					balance: 0,
					denom: amount.denom.clone(),
					state: EscrowState::Open,
				});
				escrow.balance += amount.amount;
			}
			ChainMessage::CreateLease {
				id,
				gseq,
				oseq,
				provider,
			} => {
				let price = self
					.known_bids
					.iter()
					.find(|b| {
						b.id.dseq == id.dseq
							&& b.id.gseq == *gseq
							&& b.id.oseq == *oseq && b.id.provider == *provider
					})
					.map(|b| b.price.clone())
					.unwrap_or(Price {
						denom: "uakt".to_string(),
						amount: 0,
					});
				self.leases.insert(
					id.clone(),
					Lease {
						id: LeaseId {
							owner: id.owner.clone(),
							dseq: id.dseq,
							gseq: *gseq,
							oseq: *oseq,
							provider: provider.clone(),
						},
						price,
						state: LeaseState::Active,
					},
				);
			}
			ChainMessage::WithdrawLease { .. } | ChainMessage::CloseBid { .. } => {}
		}
	}
}

/// A marketplace chain held in memory. Broadcast messages are applied to its
/// state immediately.
pub struct MockChain {
	chain_id: String,
	state: Mutex<ChainState>,
}

impl MockChain {
	pub fn new(chain_id: impl Into<String>) -> Self {
		Self {
			chain_id: chain_id.into(),
			state: Mutex::new(ChainState::default()),
		}
	}

	pub fn set_height(&self, height: u64) {
		lock(&self.state).height = height;
	}

	/// Queue the result of the next bid poll. Once the queue drains the last
	/// batch is repeated.
	pub fn push_bid_poll(&self, bids: Vec<Bid>) {
		let mut state = lock(&self.state);
		state.known_bids.extend(bids.iter().cloned());
		state.bid_queue.push_back(bids);
	}

	/// Fail the next `n` bid polls without consuming the queue.
	pub fn fail_next_bid_polls(&self, n: usize) {
		lock(&self.state).failing_bid_polls = n;
	}

	/// Reject the next `n` broadcasts as if the node were unreachable.
	pub fn fail_next_broadcasts(&self, n: usize) {
		lock(&self.state).failing_broadcasts = n;
	}

	pub fn bid_polls(&self) -> usize {
		lock(&self.state).bid_polls
	}

	pub fn add_provider(&self, address: &str, host_uri: &str, auditors: &[&str]) {
		lock(&self.state).providers.insert(
			address.to_string(),
			ProviderInfo {
				address: address.to_string(),
				host_uri: host_uri.to_string(),
				attributes: BTreeMap::new(),
				audited_by: auditors.iter().map(|a| a.to_string()).collect(),
			},
		);
	}

	pub fn provider_lookups(&self) -> usize {
		lock(&self.state).provider_lookups
	}

	pub fn insert_deployment(&self, deployment: ChainDeployment) {
		lock(&self.state)
			.deployments
			.insert(deployment.id.clone(), deployment);
	}

	/// Close a deployment as if another client had done it.
	pub fn close_on_chain(&self, id: &DeploymentId) {
		lock(&self.state).apply(&ChainMessage::CloseDeployment { id: id.clone() });
	}

	pub fn set_escrow(&self, id: &DeploymentId, escrow: EscrowAccount) {
		lock(&self.state).escrows.insert(id.clone(), escrow);
	}

	pub fn broadcasts(&self) -> Vec<SignedTx> {
		lock(&self.state).broadcasts.clone()
	}

	/// Every message broadcast so far, in order.
	pub fn messages(&self) -> Vec<ChainMessage> {
		lock(&self.state)
			.broadcasts
			.iter()
			.flat_map(|tx| tx.messages.iter().cloned())
			.collect()
	}
}

#[async_trait]
impl ChainClient for MockChain {
	fn chain_id(&self) -> &str {
		&self.chain_id
	}

	async fn latest_height(&self) -> DeployResult<u64> {
		Ok(lock(&self.state).height)
	}

	async fn account(&self, _address: &str) -> DeployResult<AccountInfo> {
		let state = lock(&self.state);
		Ok(AccountInfo {
			account_number: 7,
			sequence: state.sequence,
		})
	}

	async fn broadcast(&self, tx: SignedTx) -> DeployResult<TxReceipt> {
		let mut state = lock(&self.state);
		if state.failing_broadcasts > 0 {
			state.failing_broadcasts -= 1;
			return Err(DeployError::Chain("connection reset by peer".to_string()));
		}
		if tx.tx.chain_id != self.chain_id {
			return Err(DeployError::Chain(format!(
				"wrong chain id {}",
				tx.tx.chain_id
			)));
		}
		if tx.tx.sequence != state.sequence {
			return Err(DeployError::Chain(format!(
				"account sequence mismatch: expected {}, got {}",
				state.sequence, tx.tx.sequence
			)));
		}
		for message in &tx.messages {
			state.apply(message);
		}
		state.sequence += 1;
		state.broadcasts.push(tx);
		Ok(TxReceipt {
			tx_hash: format!("TX{:06}", state.broadcasts.len()),
			height: state.height,
		})
	}

	async fn list_bids(&self, _id: &DeploymentId) -> DeployResult<Vec<Bid>> {
		let mut state = lock(&self.state);
		state.bid_polls += 1;
		if state.failing_bid_polls > 0 {
			state.failing_bid_polls -= 1;
			return Err(DeployError::Chain("bid query unavailable".to_string()));
		}
		if let Some(batch) = state.bid_queue.pop_front() {
			state.last_bids = batch;
		}
		Ok(state.last_bids.clone())
	}

	async fn get_deployment(&self, id: &DeploymentId) -> DeployResult<Option<ChainDeployment>> {
		Ok(lock(&self.state).deployments.get(id).cloned())
	}

	async fn active_deployments(&self, owner: &str) -> DeployResult<Vec<ChainDeployment>> {
		Ok(lock(&self.state)
			.deployments
			.values()
			.filter(|d| d.active && d.id.owner == owner)
			.cloned()
			.collect())
	}

	async fn get_lease(&self, id: &DeploymentId) -> DeployResult<Option<Lease>> {
		Ok(lock(&self.state).leases.get(id).cloned())
	}

	async fn get_escrow(&self, id: &DeploymentId) -> DeployResult<Option<EscrowAccount>> {
		Ok(lock(&self.state).escrows.get(id).cloned())
	}

	async fn provider_info(&self, address: &str) -> DeployResult<Option<ProviderInfo>> {
		let mut state = lock(&self.state);
		state.provider_lookups += 1;
		Ok(state.providers.get(address).cloned())
	}
}

#[derive(Default)]
struct ProviderState {
	manifests: Vec<(String, u64, String)>,
	fail_manifest: bool,
	ready_after: Option<(usize, String)>,
	status_polls: usize,
}

/// A provider that accepts manifests and reports a service URL after a
/// configurable number of status polls.
#[derive(Default)]
pub struct MockProvider {
	state: Mutex<ProviderState>,
}

impl MockProvider {
	/// Report `url` once `polls` status polls have returned nothing.
	pub fn ready_after(&self, polls: usize, url: &str) {
		let mut state = lock(&self.state);
		state.ready_after = Some((polls, url.to_string()));
		state.status_polls = 0;
	}

	pub fn fail_manifest_delivery(&self, fail: bool) {
		lock(&self.state).fail_manifest = fail;
	}

	/// `(provider, dseq, manifest)` for every accepted delivery.
	pub fn manifests(&self) -> Vec<(String, u64, String)> {
		lock(&self.state).manifests.clone()
	}

	pub fn status_polls(&self) -> usize {
		lock(&self.state).status_polls
	}
}

#[async_trait]
impl ProviderApi for MockProvider {
	async fn send_manifest(
		&self,
		provider: &ProviderInfo,
		dseq: u64,
		manifest: &str,
	) -> DeployResult<()> {
		let mut state = lock(&self.state);
		if state.fail_manifest {
			return Err(DeployError::ManifestDeliveryFailed {
				provider: provider.address.clone(),
				reason: "HTTP 503".to_string(),
			});
		}
		state
			.manifests
			.push((provider.address.clone(), dseq, manifest.to_string()));
		Ok(())
	}

	async fn lease_status(
		&self,
		_provider: &ProviderInfo,
		_lease: &LeaseId,
	) -> DeployResult<LeaseStatus> {
		let mut state = lock(&self.state);
		let polls = state.status_polls;
		state.status_polls += 1;
		match &state.ready_after {
			Some((after, url)) if polls >= *after => {
				let mut status = LeaseStatus::default();
				status.services.insert(
					"web".to_string(),
					ServiceStatus {
						name: "web".to_string(),
						available: 1,
						total: 1,
						uris: vec![url.clone()],
					},
				);
				Ok(status)
			}
			_ => Ok(LeaseStatus::default()),
		}
	}
}

/// Quotes `source = destination * rate` in the requested source denom.
pub struct MockRouter {
	rate: u64,
	executions: Mutex<usize>,
}

impl MockRouter {
	pub fn new(rate: u64) -> Self {
		Self {
			rate,
			executions: Mutex::new(0),
		}
	}

	pub fn executions(&self) -> usize {
		*lock(&self.executions)
	}
}

#[async_trait]
impl FundingRouter for MockRouter {
	async fn quote(&self, source_denom: &str, destination: &Price) -> DeployResult<SwapQuote> {
		Ok(SwapQuote {
			id: uuid::Uuid::new_v4().to_string(),
			source: Price {
				denom: source_denom.to_string(),
				amount: destination.amount.saturating_mul(self.rate),
			},
			destination: destination.clone(),
			fee: Price {
				denom: source_denom.to_string(),
				amount: 0,
			},
			route: vec!["osmosis".to_string(), "akash".to_string()],
			expires_at: Utc::now() + ChronoDuration::minutes(5),
		})
	}

	async fn execute(&self, quote: &SwapQuote) -> DeployResult<SwapReceipt> {
		*lock(&self.executions) += 1;
		Ok(SwapReceipt {
			quote_id: quote.id.clone(),
			received: quote.destination.clone(),
			tx_hash: format!("SWAP-{}", quote.id),
		})
	}
}

/// Records deposits instead of broadcasting them.
#[derive(Default)]
pub struct MockDepositor {
	deposits: Mutex<Vec<(DeploymentId, Price)>>,
}

impl MockDepositor {
	pub fn deposits(&self) -> Vec<(DeploymentId, Price)> {
		lock(&self.deposits).clone()
	}
}

#[async_trait]
impl EscrowDepositor for MockDepositor {
	async fn deposit_to_escrow(&self, id: &DeploymentId, amount: Price) -> DeployResult<TxReceipt> {
		let mut deposits = lock(&self.deposits);
		deposits.push((id.clone(), amount));
		Ok(TxReceipt {
			tx_hash: format!("DEPOSIT{}", deposits.len()),
			height: 0,
		})
	}
}

/// A signer with a fixed address and a placeholder signature.
pub struct StaticSigner {
	address: String,
}

impl StaticSigner {
	pub fn new(address: impl Into<String>) -> Self {
		Self {
			address: address.into(),
		}
	}
}

#[async_trait]
impl TxSigner for StaticSigner {
	async fn address(&self) -> DeployResult<String> {
		Ok(self.address.clone())
	}

	async fn sign(&self, tx: &UnsignedTx) -> DeployResult<TxSignature> {
		Ok(TxSignature {
			address: self.address.clone(),
			public_key: "00".repeat(32),
			signature: format!("{}:{}:{}", tx.chain_id, tx.account_number, tx.sequence),
		})
	}
}
