// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Owner-only files for wallet, keystore and snapshot state.

use std::io;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Atomically replace `path` with `contents`, mode 0600 on Unix.
///
/// The bytes go to a sibling `.tmp` file which is synced and then renamed over
/// `path`, so readers see either the old file or the new one. Missing parent
/// directories are created.
pub async fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).await?;
	}

	let temp_path = path.with_extension("tmp");
	let mut out = fs::File::create(&temp_path).await?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let perms = std::fs::Permissions::from_mode(0o600);
		if let Err(e) = fs::set_permissions(&temp_path, perms).await {
			warn!(path = ?temp_path, error = %e, "failed to set file permissions to 0600");
		}
	}

	out.write_all(contents).await?;
	out.sync_all().await?;
	drop(out);

	fs::rename(&temp_path, path).await?;
	debug!(path = ?path, "private file written");
	Ok(())
}

/// Remove `path`, treating a missing file as already removed.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e),
	}
}
