// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::SinkError;
use crate::event::{SecurityEvent, Severity};
use crate::sink::SecuritySink;

/// Mirrors events to the process's tracing subscriber.
pub struct TracingSink;

#[async_trait]
impl SecuritySink for TracingSink {
	fn name(&self) -> &str {
		"console"
	}

	async fn publish(&self, event: &SecurityEvent) -> Result<(), SinkError> {
		let event_type = event.event_type.to_string();
		let data = event.data.to_string();
		match event.severity {
			Severity::Critical | Severity::Error => {
				tracing::error!(target: "harbor::security", event_type = %event_type, severity = %event.severity, data = %data, "security event");
			}
			Severity::Warning => {
				tracing::warn!(target: "harbor::security", event_type = %event_type, data = %data, "security event");
			}
			Severity::Notice | Severity::Info => {
				tracing::info!(target: "harbor::security", event_type = %event_type, data = %data, "security event");
			}
			Severity::Debug => {
				tracing::debug!(target: "harbor::security", event_type = %event_type, data = %data, "security event");
			}
		}
		Ok(())
	}
}
