// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use harbor_wallet::{TxSignature, UnsignedTx, WalletManager};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::DeployResult;
use crate::types::{
	Bid, BidId, ChainDeployment, DeploymentId, EscrowAccount, Lease, LeaseId, Price, ProviderInfo,
};

/// Marketplace messages a deployment session broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChainMessage {
	CreateDeployment {
		id: DeploymentId,
		manifest_hash: String,
		deposit: Price,
	},
	UpdateDeployment {
		id: DeploymentId,
		manifest_hash: String,
	},
	CloseDeployment {
		id: DeploymentId,
	},
	DepositEscrow {
		id: DeploymentId,
		amount: Price,
	},
	CreateLease {
		id: DeploymentId,
		gseq: u32,
		oseq: u32,
		provider: String,
	},
	WithdrawLease {
		id: DeploymentId,
		gseq: u32,
		oseq: u32,
		provider: String,
	},
	CloseBid {
		id: DeploymentId,
		gseq: u32,
		oseq: u32,
		provider: String,
	},
}

impl ChainMessage {
	pub fn create_lease(lease: &LeaseId) -> Self {
		ChainMessage::CreateLease {
			id: lease.deployment_id(),
			gseq: lease.gseq,
			oseq: lease.oseq,
			provider: lease.provider.clone(),
		}
	}

	pub fn withdraw_lease(lease: &LeaseId) -> Self {
		ChainMessage::WithdrawLease {
			id: lease.deployment_id(),
			gseq: lease.gseq,
			oseq: lease.oseq,
			provider: lease.provider.clone(),
		}
	}

	pub fn close_bid(owner: &str, bid: &BidId) -> Self {
		ChainMessage::CloseBid {
			id: DeploymentId::new(owner, bid.dseq),
			gseq: bid.gseq,
			oseq: bid.oseq,
			provider: bid.provider.clone(),
		}
	}

	pub fn deployment_id(&self) -> &DeploymentId {
		match self {
			ChainMessage::CreateDeployment { id, .. }
			| ChainMessage::UpdateDeployment { id, .. }
			| ChainMessage::CloseDeployment { id }
			| ChainMessage::DepositEscrow { id, .. }
			| ChainMessage::CreateLease { id, .. }
			| ChainMessage::WithdrawLease { id, .. }
			| ChainMessage::CloseBid { id, .. } => id,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
	pub account_number: u64,
	pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
	pub tx: UnsignedTx,
	pub messages: Vec<ChainMessage>,
	pub signature: TxSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
	pub tx_hash: String,
	pub height: u64,
}

/// Read and broadcast access to the marketplace chain.
///
/// Production implementations talk to an RPC node; tests use
/// [`crate::testing::MockChain`].
#[async_trait]
pub trait ChainClient: Send + Sync {
	fn chain_id(&self) -> &str;

	/// Latest block height, used as the sequence number of new deployments.
	async fn latest_height(&self) -> DeployResult<u64>;

	async fn account(&self, address: &str) -> DeployResult<AccountInfo>;

	async fn broadcast(&self, tx: SignedTx) -> DeployResult<TxReceipt>;

	/// Open bids for a deployment.
	async fn list_bids(&self, id: &DeploymentId) -> DeployResult<Vec<Bid>>;

	async fn get_deployment(&self, id: &DeploymentId) -> DeployResult<Option<ChainDeployment>>;

	/// Deployments owned by `owner` that are still open.
	async fn active_deployments(&self, owner: &str) -> DeployResult<Vec<ChainDeployment>>;

	async fn get_lease(&self, id: &DeploymentId) -> DeployResult<Option<Lease>>;

	async fn get_escrow(&self, id: &DeploymentId) -> DeployResult<Option<EscrowAccount>>;

	async fn provider_info(&self, address: &str) -> DeployResult<Option<ProviderInfo>>;
}

/// Something that can sign chain transactions on the owner's behalf.
#[async_trait]
pub trait TxSigner: Send + Sync {
	async fn address(&self) -> DeployResult<String>;

	async fn sign(&self, tx: &UnsignedTx) -> DeployResult<TxSignature>;
}

#[async_trait]
impl TxSigner for WalletManager {
	async fn address(&self) -> DeployResult<String> {
		Ok(self.load().await?.address)
	}

	async fn sign(&self, tx: &UnsignedTx) -> DeployResult<TxSignature> {
		Ok(self.sign_transaction(tx).await?)
	}
}

/// Wrap `messages` in a transaction, sign it and broadcast it.
pub async fn sign_and_broadcast(
	chain: &dyn ChainClient,
	signer: &dyn TxSigner,
	messages: Vec<ChainMessage>,
	memo: &str,
) -> DeployResult<TxReceipt> {
	let address = signer.address().await?;
	let account = chain.account(&address).await?;
	let tx = UnsignedTx {
		chain_id: chain.chain_id().to_string(),
		account_number: account.account_number,
		sequence: account.sequence,
		body: json!({ "messages": messages }),
		memo: memo.to_string(),
	};
	let signature = signer.sign(&tx).await?;
	chain
		.broadcast(SignedTx {
			tx,
			messages,
			signature,
		})
		.await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_serialize_with_kebab_case_tag() {
		let msg = ChainMessage::CloseDeployment {
			id: DeploymentId::new("akash1owner", 12),
		};
		let value = serde_json::to_value(&msg).unwrap();
		assert_eq!(value["type"], "close-deployment");
		assert_eq!(value["id"]["dseq"], 12);
	}

	#[test]
	fn lease_messages_carry_group_and_order() {
		let lease = LeaseId {
			owner: "akash1owner".to_string(),
			dseq: 3,
			gseq: 1,
			oseq: 1,
			provider: "akash1prov".to_string(),
		};
		let msg = ChainMessage::create_lease(&lease);
		assert_eq!(msg.deployment_id(), &DeploymentId::new("akash1owner", 3));
		match msg {
			ChainMessage::CreateLease {
				gseq,
				oseq,
				provider,
				..
			} => {
				assert_eq!((gseq, oseq), (1, 1));
				assert_eq!(provider, "akash1prov");
			}
			other => panic!("unexpected message {other:?}"),
		}
	}
}
