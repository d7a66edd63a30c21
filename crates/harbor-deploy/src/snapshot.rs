// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local record of the current deployment between invocations.
//!
//! The snapshot is a cache of chain state. When it disagrees with the chain
//! it is thrown away and rebuilt.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use harbor_common_secret::{remove_if_exists, write_private_file};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::DeployResult;
use crate::types::{Deployment, Lease};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
	pub deployment: Deployment,
	pub lease: Option<Lease>,
	pub service_url: Option<String>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
	path: PathBuf,
}

impl SnapshotStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// `None` when there is no snapshot or it cannot be parsed.
	pub async fn load(&self) -> DeployResult<Option<DeploymentSnapshot>> {
		let bytes = match fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		match serde_json::from_slice(&bytes) {
			Ok(snapshot) => Ok(Some(snapshot)),
			Err(e) => {
				warn!(path = ?self.path, error = %e, "discarding unreadable deployment snapshot");
				Ok(None)
			}
		}
	}

	pub async fn save(&self, snapshot: &DeploymentSnapshot) -> DeployResult<()> {
		let contents = serde_json::to_vec_pretty(snapshot)?;
		write_private_file(&self.path, &contents).await?;
		debug!(dseq = snapshot.deployment.id.dseq, state = %snapshot.deployment.state, "snapshot saved");
		Ok(())
	}

	pub async fn clear(&self) -> DeployResult<()> {
		remove_if_exists(&self.path).await?;
		Ok(())
	}
}
