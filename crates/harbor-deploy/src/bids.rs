// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bid collection and winner selection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harbor_security_log::{SecurityEventType, SecurityLog};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::ExpiringCache;
use crate::chain::ChainClient;
use crate::clock::Clock;
use crate::error::{DeployError, DeployResult};
use crate::types::{Bid, DeploymentId};

const VERIFICATION_TTL: Duration = Duration::from_secs(15 * 60);
const VERIFICATION_CACHE_ENTRIES: usize = 1024;

/// Decides whether a provider is trusted enough to win a bid.
#[async_trait]
pub trait ProviderVerifier: Send + Sync {
	async fn is_verified(&self, provider: &str) -> bool;
}

/// Trusts exactly the listed provider addresses.
#[derive(Debug, Clone, Default)]
pub struct AllowListVerifier {
	providers: HashSet<String>,
}

impl AllowListVerifier {
	pub fn new<I, S>(providers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			providers: providers.into_iter().map(Into::into).collect(),
		}
	}
}

#[async_trait]
impl ProviderVerifier for AllowListVerifier {
	async fn is_verified(&self, provider: &str) -> bool {
		self.providers.contains(provider)
	}
}

/// Trusts providers whose on-chain attributes were signed by one of the
/// configured auditors. Lookups are cached; failed lookups are not.
pub struct AuditorVerifier {
	chain: Arc<dyn ChainClient>,
	clock: Arc<dyn Clock>,
	auditors: HashSet<String>,
	cache: Mutex<ExpiringCache<String, bool>>,
}

impl AuditorVerifier {
	pub fn new<I, S>(chain: Arc<dyn ChainClient>, clock: Arc<dyn Clock>, auditors: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			chain,
			clock,
			auditors: auditors.into_iter().map(Into::into).collect(),
			cache: Mutex::new(ExpiringCache::new(
				VERIFICATION_TTL,
				VERIFICATION_CACHE_ENTRIES,
			)),
		}
	}

	/// Drop expired verification results.
	pub async fn sweep(&self) -> usize {
		self.cache.lock().await.sweep(self.clock.now())
	}
}

#[async_trait]
impl ProviderVerifier for AuditorVerifier {
	async fn is_verified(&self, provider: &str) -> bool {
		let key = provider.to_string();
		if let Some(hit) = self.cache.lock().await.get(&key, self.clock.now()) {
			return hit;
		}

		let verified = match self.chain.provider_info(provider).await {
			Ok(Some(info)) => info.audited_by.iter().any(|a| self.auditors.contains(a)),
			Ok(None) => false,
			Err(e) => {
				debug!(provider, error = %e, "provider lookup failed");
				return false;
			}
		};

		self.cache
			.lock()
			.await
			.insert(key, verified, self.clock.now());
		verified
	}
}

/// Polls the marketplace for bids on one deployment.
pub struct BidCollector {
	chain: Arc<dyn ChainClient>,
	clock: Arc<dyn Clock>,
	poll_interval: Duration,
	quorum: usize,
}

impl BidCollector {
	pub fn new(
		chain: Arc<dyn ChainClient>,
		clock: Arc<dyn Clock>,
		poll_interval: Duration,
		quorum: usize,
	) -> Self {
		Self {
			chain,
			clock,
			poll_interval,
			quorum: quorum.max(1),
		}
	}

	pub fn from_config(
		chain: Arc<dyn ChainClient>,
		clock: Arc<dyn Clock>,
		config: &harbor_config::BidsConfig,
	) -> Self {
		Self::new(chain, clock, config.poll_interval, config.quorum)
	}

	/// Poll until `quorum` distinct bids arrived or `timeout` elapsed.
	///
	/// Bids are deduplicated by id and kept in first-seen order. A failed poll
	/// is logged and retried on the next tick. Timing out with at least one bid
	/// returns what was collected.
	pub async fn collect_bids(&self, id: &DeploymentId, timeout: Duration) -> DeployResult<Vec<Bid>> {
		let deadline = self.clock.now() + timeout;
		let mut seen = HashSet::new();
		let mut bids: Vec<Bid> = Vec::new();

		loop {
			match self.chain.list_bids(id).await {
				Ok(batch) => {
					for bid in batch {
						if seen.insert(bid.id.clone()) {
							debug!(dseq = id.dseq, provider = %bid.provider(), price = bid.price.amount, "bid received");
							bids.push(bid);
						}
					}
				}
				Err(e) => debug!(dseq = id.dseq, error = %e, "bid poll failed"),
			}

			if bids.len() >= self.quorum {
				info!(dseq = id.dseq, count = bids.len(), "bid quorum reached");
				return Ok(bids);
			}

			let now = self.clock.now();
			if now >= deadline {
				break;
			}
			self.clock
				.sleep(self.poll_interval.min(deadline - now))
				.await;
		}

		if bids.is_empty() {
			return Err(DeployError::NoBidsReceived { dseq: id.dseq });
		}
		info!(dseq = id.dseq, count = bids.len(), quorum = self.quorum, "bid collection timed out below quorum");
		Ok(bids)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidSelection {
	pub bid: Bid,
	/// No bidder was verified, so the cheapest unverified bid was taken.
	pub degraded: bool,
}

/// Cheapest verified bid, ties going to the earliest. With no verified
/// bidder the cheapest overall wins and the selection is flagged degraded.
pub async fn select_bid(
	bids: &[Bid],
	verifier: &dyn ProviderVerifier,
	log: &SecurityLog,
) -> Option<BidSelection> {
	let mut verified = Vec::new();
	for bid in bids {
		if verifier.is_verified(bid.provider()).await {
			verified.push(bid);
		}
	}

	if let Some(bid) = cheapest(verified.into_iter()) {
		return Some(BidSelection {
			bid: bid.clone(),
			degraded: false,
		});
	}

	let bid = cheapest(bids.iter())?;
	warn!(
		dseq = bid.id.dseq,
		provider = %bid.provider(),
		price = bid.price.amount,
		candidates = bids.len(),
		"no verified provider bid; selecting cheapest unverified bid"
	);
	log.record(
		SecurityEventType::DegradedBidSelection,
		json!({
			"dseq": bid.id.dseq,
			"provider": bid.provider(),
			"price": bid.price.amount,
			"denom": bid.price.denom,
			"candidates": bids.len(),
		}),
	);
	Some(BidSelection {
		bid: bid.clone(),
		degraded: true,
	})
}

fn cheapest<'a>(bids: impl Iterator<Item = &'a Bid>) -> Option<&'a Bid> {
	bids.fold(None, |best: Option<&Bid>, bid| match best {
		Some(current) if current.price.amount <= bid.price.amount => Some(current),
		_ => Some(bid),
	})
}
