// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Escrow top-ups paid for by swapping another token ("gas station").
//!
//! Funding is two-phase: [`GasStation::quote`] returns a [`SwapQuote`] the
//! caller can inspect, and [`GasStation::execute`] only accepts such a quote.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harbor_security_log::{SecurityEventType, SecurityLog, Severity};
use harbor_wallet::{SystemClock, WallClock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::chain::TxReceipt;
use crate::error::{DeployError, DeployResult};
use crate::types::{DeploymentId, DeploymentStatus, Price};

/// A priced swap offer from the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
	pub id: String,
	/// What will be spent.
	pub source: Price,
	/// What will arrive on the marketplace chain.
	pub destination: Price,
	pub fee: Price,
	/// Hops, e.g. `["osmosis", "akash"]`.
	pub route: Vec<String>,
	pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
	pub quote_id: String,
	pub received: Price,
	pub tx_hash: String,
}

/// Cross-chain swap service.
#[async_trait]
pub trait FundingRouter: Send + Sync {
	/// Quote a swap from `source_denom` that yields `destination`.
	async fn quote(&self, source_denom: &str, destination: &Price) -> DeployResult<SwapQuote>;

	async fn execute(&self, quote: &SwapQuote) -> DeployResult<SwapReceipt>;
}

/// Where swapped funds are deposited.
#[async_trait]
pub trait EscrowDepositor: Send + Sync {
	async fn deposit_to_escrow(&self, id: &DeploymentId, amount: Price) -> DeployResult<TxReceipt>;
}

#[derive(Debug, Clone)]
pub struct FundingPolicy {
	/// Fund when the balance drops below this fraction of a reference window.
	pub threshold_fraction: f64,
	pub reference_window_hours: f64,
	/// Token the user pays with.
	pub source_denom: String,
}

impl FundingPolicy {
	pub fn from_config(config: &harbor_config::EscrowConfig, source_denom: impl Into<String>) -> Self {
		Self {
			threshold_fraction: config.threshold_fraction,
			reference_window_hours: config.reference_window_hours,
			source_denom: source_denom.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundingCheck {
	pub needs_funding: bool,
	pub balance: u64,
	pub threshold: u64,
	/// Amount that refills the escrow to one full reference window.
	pub top_up: Price,
}

pub struct GasStation {
	router: Arc<dyn FundingRouter>,
	policy: FundingPolicy,
	log: SecurityLog,
	clock: Arc<dyn WallClock>,
}

impl GasStation {
	pub fn new(router: Arc<dyn FundingRouter>, policy: FundingPolicy, log: SecurityLog) -> Self {
		Self {
			router,
			policy,
			log,
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
		self.clock = clock;
		self
	}

	/// Compare the escrow balance with `threshold_fraction` of the burn over
	/// the reference window.
	pub fn check(&self, status: &DeploymentStatus) -> FundingCheck {
		let balance = status.escrow.as_ref().map(|e| e.balance).unwrap_or(0);
		let denom = status
			.escrow
			.as_ref()
			.map(|e| e.denom.clone())
			.or_else(|| status.lease.as_ref().map(|l| l.price.denom.clone()))
			.unwrap_or_default();

		let window_burn = status.burn_rate_per_hour as f64 * self.policy.reference_window_hours;
		let threshold = (window_burn * self.policy.threshold_fraction).floor() as u64;
		let full = window_burn.ceil() as u64;

		FundingCheck {
			needs_funding: balance < threshold,
			balance,
			threshold,
			top_up: Price {
				denom,
				amount: full.saturating_sub(balance),
			},
		}
	}

	pub async fn quote(&self, amount: &Price) -> DeployResult<SwapQuote> {
		let quote = self
			.router
			.quote(&self.policy.source_denom, amount)
			.await?;
		info!(
			quote_id = %quote.id,
			source = quote.source.amount,
			destination = quote.destination.amount,
			fee = quote.fee.amount,
			"swap quoted"
		);
		Ok(quote)
	}

	/// Execute an accepted quote and deposit the proceeds into escrow.
	///
	/// `available` is the caller's balance in the quote's source denom.
	#[instrument(skip(self, quote, depositor), fields(quote_id = %quote.id, dseq = id.dseq))]
	pub async fn execute(
		&self,
		quote: &SwapQuote,
		available: u64,
		depositor: &dyn EscrowDepositor,
		id: &DeploymentId,
	) -> DeployResult<SwapReceipt> {
		if quote.source.amount > available {
			self.refuse(quote, "insufficient funds");
			return Err(DeployError::InsufficientFunds {
				required: quote.source.amount,
				available,
				denom: quote.source.denom.clone(),
			});
		}
		if self.clock.now() >= quote.expires_at {
			self.refuse(quote, "quote expired");
			return Err(DeployError::QuoteExpired {
				id: quote.id.clone(),
			});
		}

		let receipt = self.router.execute(quote).await?;
		depositor
			.deposit_to_escrow(id, receipt.received.clone())
			.await?;

		self.log.record(
			SecurityEventType::FundingExecuted,
			json!({
				"dseq": id.dseq,
				"quote_id": quote.id,
				"spent": quote.source.amount,
				"spent_denom": quote.source.denom,
				"deposited": receipt.received.amount,
				"deposited_denom": receipt.received.denom,
			}),
		);
		Ok(receipt)
	}

	fn refuse(&self, quote: &SwapQuote, reason: &str) {
		warn!(quote_id = %quote.id, reason, "funding refused");
		self.log.log(
			SecurityEventType::FundingRefused,
			json!({
				"quote_id": quote.id,
				"reason": reason,
				"required": quote.source.amount,
				"denom": quote.source.denom,
			}),
			Severity::Warning,
		);
	}
}
