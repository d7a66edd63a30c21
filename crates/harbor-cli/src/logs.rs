// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::{Context as _, Result};
use harbor_deploy::{logs_url, stream_logs, LogLine};
use tracing::info;

#[derive(Debug, Clone, clap::Args)]
pub struct LogsArgs {
	/// Provider API base URL, e.g. https://provider.example.com:8443
	pub provider_host: String,

	/// Deployment sequence number
	pub dseq: u64,
}

pub async fn run(args: LogsArgs) -> Result<()> {
	let url = logs_url(&args.provider_host, args.dseq).context("invalid provider host")?;
	info!(url = %url, "streaming deployment logs");
	stream_logs(&url, |line| println!("{}", format_line(&line)))
		.await
		.context("log stream failed")?;
	Ok(())
}

fn format_line(line: &LogLine) -> String {
	if line.name.is_empty() {
		line.message.clone()
	} else {
		format!("[{}] {}", line.name, line.message)
	}
}
