// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Harbor command line interface.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use harbor_config::{CliOverrides, LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod context;
mod keychain;
mod logs;
mod manifest;
mod status;
mod wallet;

use context::Context;

/// Harbor - deploy containers to a decentralized compute marketplace.
#[derive(Parser, Debug)]
#[command(name = "harbor", about = "Deploy containers to a decentralized compute marketplace", version)]
struct Cli {
	/// Config file to use instead of the user config file
	#[arg(long, global = true, env = "HARBOR_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, global = true)]
	log_level: Option<String>,

	/// Emit logs as JSON
	#[arg(long, global = true)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create the deployment wallet
	Init,

	/// Inspect the wallet and manage ephemeral keys
	#[command(subcommand)]
	Wallet(wallet::WalletCommand),

	/// Manage the wallet encryption password
	#[command(subcommand)]
	Keychain(keychain::KeychainCommand),

	/// Generate a deployment manifest from an app description
	Manifest(manifest::ManifestArgs),

	/// Show the last known deployment
	Status,

	/// Stream logs for a deployment from its provider
	Logs(logs::LogsArgs),
}

fn init_logging(config: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
	let registry = tracing_subscriber::registry().with(filter);
	match config.format {
		LogFormat::Json => registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init(),
		LogFormat::Text => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = harbor_config::load_config_with_cli(CliOverrides {
		config_file: cli.config.clone(),
		log_level: cli.log_level.clone(),
		json_logs: cli.json_logs,
		data_dir: None,
	})
	.context("failed to load configuration")?;
	init_logging(&config.logging);

	let ctx = Context::new(config)?;
	let result = match cli.command {
		Command::Init => wallet::init(&ctx).await,
		Command::Wallet(cmd) => wallet::run(&ctx, cmd).await,
		Command::Keychain(cmd) => keychain::run(&ctx, cmd).await,
		Command::Manifest(args) => manifest::run(args),
		Command::Status => status::run(&ctx).await,
		Command::Logs(args) => logs::run(args).await,
	};

	if let Err(e) = ctx.log.flush().await {
		tracing::warn!(error = %e, "failed to flush security log");
	}
	result
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn global_flags_parse_after_subcommand() {
		let cli = Cli::try_parse_from(["harbor", "status", "--json-logs", "--log-level", "debug"])
			.unwrap();
		assert!(cli.json_logs);
		assert_eq!(cli.log_level.as_deref(), Some("debug"));
		assert!(matches!(cli.command, Command::Status));
	}

	#[test]
	fn ephemeral_takes_several_permissions() {
		let cli =
			Cli::try_parse_from(["harbor", "wallet", "ephemeral", "deploy", "query"]).unwrap();
		match cli.command {
			Command::Wallet(wallet::WalletCommand::Ephemeral { permissions }) => {
				assert_eq!(permissions, vec!["deploy", "query"]);
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn ephemeral_requires_a_permission() {
		assert!(Cli::try_parse_from(["harbor", "wallet", "ephemeral"]).is_err());
	}

	#[test]
	fn logs_takes_host_and_dseq() {
		let cli = Cli::try_parse_from(["harbor", "logs", "https://p.example:8443", "42"]).unwrap();
		match cli.command {
			Command::Logs(args) => {
				assert_eq!(args.provider_host, "https://p.example:8443");
				assert_eq!(args.dseq, 42);
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn config_flag_is_global() {
		let cli =
			Cli::try_parse_from(["harbor", "--config", "/tmp/harbor.toml", "keychain", "rotate"])
				.unwrap();
		assert_eq!(cli.config, Some(PathBuf::from("/tmp/harbor.toml")));
	}
}
