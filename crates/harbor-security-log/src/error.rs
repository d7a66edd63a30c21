// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type SecurityLogResult<T> = Result<T, SecurityLogError>;

#[derive(Error, Debug)]
pub enum SecurityLogError {
	#[error("unknown severity: {0}")]
	UnknownSeverity(String),

	#[error("sink '{sink}' error: {source}")]
	Sink {
		sink: String,
		#[source]
		source: SinkError,
	},

	#[error("security log writer has shut down")]
	Shutdown,
}

#[derive(Error, Debug)]
pub enum SinkError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialize(#[from] serde_json::Error),
}
