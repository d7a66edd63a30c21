// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::SinkError;
use crate::event::SecurityEvent;

pub mod console;
pub mod file;
pub mod memory;

/// A destination for sanitized security events.
///
/// Sinks are driven by the single writer task in [`crate::SecurityLog`], so
/// `publish` is never called concurrently for the same log.
#[async_trait]
pub trait SecuritySink: Send + Sync {
	fn name(&self) -> &str;

	async fn publish(&self, event: &SecurityEvent) -> Result<(), SinkError>;

	/// Push buffered output to durable storage.
	async fn flush(&self) -> Result<(), SinkError> {
		Ok(())
	}
}
