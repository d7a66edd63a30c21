// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deployment orchestration for Harbor.
//!
//! The [`Orchestrator`] moves a deployment through
//! `pending -> bidding -> leased -> active -> closed`, with `failed` reachable
//! from bidding, leased and active. Chain access, provider access and signing
//! sit behind the [`ChainClient`], [`ProviderApi`] and [`TxSigner`] traits.

pub mod bids;
pub mod cache;
pub mod chain;
pub mod clock;
pub mod error;
pub mod escrow;
pub mod funding;
pub mod logs;
pub mod orchestrator;
pub mod provider;
pub mod snapshot;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bids::{
	select_bid, AllowListVerifier, AuditorVerifier, BidCollector, BidSelection, ProviderVerifier,
};
pub use cache::ExpiringCache;
pub use chain::{
	sign_and_broadcast, AccountInfo, ChainClient, ChainMessage, SignedTx, TxReceipt, TxSigner,
};
pub use clock::{Clock, ManualClock, TokioClock};
pub use error::{DeployError, DeployResult};
pub use escrow::{burn_rate_per_hour, estimate_time_remaining, is_exhausted, BLOCKS_PER_HOUR};
pub use funding::{
	EscrowDepositor, FundingCheck, FundingPolicy, FundingRouter, GasStation, SwapQuote,
	SwapReceipt,
};
pub use logs::{logs_url, stream_logs, LogLine};
pub use orchestrator::{Orchestrator, OrchestratorDeps, OrchestratorSettings};
pub use provider::{HttpProviderApi, LeaseStatus, ProviderApi};
pub use snapshot::{DeploymentSnapshot, SnapshotStore};
pub use types::*;
