// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod error;
pub mod event;
pub mod log;
pub mod redaction;
pub mod sink;

pub use error::{SecurityLogError, SecurityLogResult, SinkError};
pub use event::{SecurityEvent, SecurityEventType, Severity};
pub use log::SecurityLog;
pub use redaction::{sanitize, REDACTED};
pub use sink::console::TracingSink;
pub use sink::file::JsonlFileSink;
pub use sink::memory::MemorySink;
pub use sink::SecuritySink;
