// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{instrument, warn};

use crate::error::{SecurityLogError, SecurityLogResult};
use crate::event::{SecurityEvent, SecurityEventType, Severity};
use crate::redaction::sanitize;
use crate::sink::console::TracingSink;
use crate::sink::file::JsonlFileSink;
use crate::sink::SecuritySink;

enum Command {
	Event(SecurityEvent),
	Flush(oneshot::Sender<()>),
}

/// Ordered, redacting security event log.
///
/// Events are sanitized on the caller's task and handed to one background
/// writer that publishes them to every sink in arrival order. Cloning shares
/// the same writer.
#[derive(Clone)]
pub struct SecurityLog {
	tx: mpsc::UnboundedSender<Command>,
	min_severity: Severity,
}

impl SecurityLog {
	/// Must be called from within a tokio runtime.
	pub fn new(min_severity: Severity, sinks: Vec<Arc<dyn SecuritySink>>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(Self::writer_task(rx, sinks));
		Self { tx, min_severity }
	}

	/// Builds the file and console sinks described by `config`.
	pub fn from_config(
		config: &harbor_config::SecurityLogConfig,
		log_file: &Path,
	) -> SecurityLogResult<Self> {
		let min_severity = config.min_severity.parse()?;
		let mut sinks: Vec<Arc<dyn SecuritySink>> = Vec::new();
		if config.file {
			sinks.push(Arc::new(JsonlFileSink::new(log_file)));
		}
		if config.console {
			sinks.push(Arc::new(TracingSink));
		}
		Ok(Self::new(min_severity, sinks))
	}

	/// A log with no sinks. Events are still sanitized and then discarded.
	pub fn discard() -> Self {
		Self::new(Severity::Debug, Vec::new())
	}

	pub fn min_severity(&self) -> Severity {
		self.min_severity
	}

	async fn writer_task(
		mut rx: mpsc::UnboundedReceiver<Command>,
		sinks: Vec<Arc<dyn SecuritySink>>,
	) {
		while let Some(command) = rx.recv().await {
			match command {
				Command::Event(event) => {
					for sink in &sinks {
						if let Err(e) = sink.publish(&event).await {
							warn!(sink = sink.name(), error = %e, "security sink publish failed");
						}
					}
				}
				Command::Flush(done) => {
					for sink in &sinks {
						if let Err(e) = sink.flush().await {
							warn!(sink = sink.name(), error = %e, "security sink flush failed");
						}
					}
					let _ = done.send(());
				}
			}
		}
	}

	/// Record an event. Never blocks and never fails the caller; events below
	/// the minimum severity are dropped.
	#[instrument(level = "trace", skip_all, fields(event_type = %event_type, severity = %severity))]
	pub fn log(&self, event_type: SecurityEventType, data: Value, severity: Severity) {
		if severity < self.min_severity {
			return;
		}

		let event = SecurityEvent::new(event_type, severity, sanitize(&data));
		if self.tx.send(Command::Event(event)).is_err() {
			warn!("security log writer is gone; event dropped");
		}
	}

	/// [`Self::log`] at the event type's default severity.
	pub fn record(&self, event_type: SecurityEventType, data: Value) {
		self.log(event_type, data, event_type.default_severity());
	}

	/// Wait until every event queued before this call has been written.
	pub async fn flush(&self) -> SecurityLogResult<()> {
		let (done_tx, done_rx) = oneshot::channel();
		self
			.tx
			.send(Command::Flush(done_tx))
			.map_err(|_| SecurityLogError::Shutdown)?;
		done_rx.await.map_err(|_| SecurityLogError::Shutdown)
	}
}
