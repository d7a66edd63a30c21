// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::event::{SecurityEvent, SecurityEventType};
use crate::sink::SecuritySink;

/// Keeps events in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
	events: Arc<Mutex<Vec<SecurityEvent>>>,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn events(&self) -> Vec<SecurityEvent> {
		self.events.lock().await.clone()
	}

	pub async fn of_type(&self, event_type: SecurityEventType) -> Vec<SecurityEvent> {
		self
			.events
			.lock()
			.await
			.iter()
			.filter(|e| e.event_type == event_type)
			.cloned()
			.collect()
	}
}

#[async_trait]
impl SecuritySink for MemorySink {
	fn name(&self) -> &str {
		"memory"
	}

	async fn publish(&self, event: &SecurityEvent) -> Result<(), SinkError> {
		self.events.lock().await.push(event.clone());
		Ok(())
	}
}
