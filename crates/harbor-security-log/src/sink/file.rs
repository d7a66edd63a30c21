// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::event::SecurityEvent;
use crate::sink::SecuritySink;

/// Appends one JSON object per line. The file is created with mode 0600.
pub struct JsonlFileSink {
	path: PathBuf,
	file: Mutex<Option<tokio::fs::File>>,
}

impl JsonlFileSink {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			file: Mutex::new(None),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn open(&self) -> Result<tokio::fs::File, SinkError> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		let mut options = OpenOptions::new();
		options.create(true).append(true);
		#[cfg(unix)]
		options.mode(0o600);

		Ok(options.open(&self.path).await?)
	}
}

pub fn format_json_line(event: &SecurityEvent) -> Result<String, SinkError> {
	let json = serde_json::to_string(event)?;
	Ok(format!("{json}\n"))
}

#[async_trait]
impl SecuritySink for JsonlFileSink {
	fn name(&self) -> &str {
		"file"
	}

	async fn publish(&self, event: &SecurityEvent) -> Result<(), SinkError> {
		let line = format_json_line(event)?;

		let mut guard = self.file.lock().await;
		if guard.is_none() {
			*guard = Some(self.open().await?);
		}
		if let Some(file) = guard.as_mut() {
			// One write_all per event keeps each line intact.
			file.write_all(line.as_bytes()).await?;
			file.flush().await?;
		}
		Ok(())
	}

	async fn flush(&self) -> Result<(), SinkError> {
		let mut guard = self.file.lock().await;
		if let Some(file) = guard.as_mut() {
			file.sync_data().await?;
		}
		Ok(())
	}
}
