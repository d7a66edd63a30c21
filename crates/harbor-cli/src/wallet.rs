// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use harbor_wallet::{EphemeralKeyMetadata, EphemeralPermission};

use crate::context::Context;

const INSPECTION_ONLY: &str =
	"the private key lives only in this process; this key cannot sign once harbor exits";

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
	/// Show the wallet address and any ephemeral key
	Show,

	/// Create a 24 hour ephemeral key limited to the given permissions
	///
	/// For inspection only. The private half is never written to disk and is
	/// dropped when this process exits, so the key cannot sign afterwards.
	/// Only its metadata is kept; remove it with `wallet revoke-ephemeral`.
	Ephemeral {
		/// deploy, close, deposit or query
		#[arg(required = true)]
		permissions: Vec<String>,
	},

	/// Revoke the current ephemeral key
	RevokeEphemeral,
}

pub async fn init(ctx: &Context) -> Result<()> {
	let wallet = ctx.wallet();
	if wallet.exists().await {
		bail!(
			"a wallet already exists at {}",
			wallet.settings().wallet_file.display()
		);
	}
	let info = wallet.create().await.context("failed to create wallet")?;
	println!("Wallet created");
	println!("  address:    {}", info.address);
	println!("  public key: {}", info.public_key);
	Ok(())
}

pub async fn run(ctx: &Context, cmd: WalletCommand) -> Result<()> {
	let wallet = ctx.wallet();
	match cmd {
		WalletCommand::Show => {
			let info = wallet.load().await.context("failed to load wallet")?;
			println!("address:    {}", info.address);
			println!("public key: {}", info.public_key);
			match wallet.get_ephemeral_key().await? {
				Some(meta) => println!("{}", describe_ephemeral(&meta)),
				None => println!("ephemeral key: none"),
			}
		}
		WalletCommand::Ephemeral { permissions } => {
			let permissions = parse_permissions(&permissions)?;
			let key = wallet
				.create_ephemeral_key(permissions)
				.await
				.context("failed to create ephemeral key")?;
			println!("{}", describe_ephemeral(&key.metadata));
			println!("  note:        {INSPECTION_ONLY}");
		}
		WalletCommand::RevokeEphemeral => {
			wallet
				.revoke_ephemeral_key()
				.await
				.context("failed to revoke ephemeral key")?;
			println!("ephemeral key revoked");
		}
	}
	Ok(())
}

fn parse_permissions(raw: &[String]) -> Result<Vec<EphemeralPermission>> {
	raw.iter()
		.map(|p| {
			p.parse::<EphemeralPermission>()
				.with_context(|| format!("invalid permission {p:?}"))
		})
		.collect()
}

fn describe_ephemeral(meta: &EphemeralKeyMetadata) -> String {
	let permissions: Vec<&str> = meta.permissions.iter().map(|p| p.as_str()).collect();
	format!(
		"ephemeral key: {}\n  permissions: {}\n  expires:     {}",
		meta.address,
		permissions.join(", "),
		meta.expires_at.to_rfc3339()
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn permissions_parse_case_insensitively() {
		let parsed = parse_permissions(&["Deploy".to_string(), "query".to_string()]).unwrap();
		assert_eq!(
			parsed,
			vec![EphemeralPermission::Deploy, EphemeralPermission::Query]
		);
	}

	#[test]
	fn ephemeral_help_says_key_is_inspection_only() {
		use clap::CommandFactory;

		#[derive(clap::Parser)]
		struct Harness {
			#[command(subcommand)]
			wallet: WalletCommand,
		}

		let command = Harness::command();
		let ephemeral = command.find_subcommand("ephemeral").unwrap();
		let help = ephemeral.get_long_about().unwrap().to_string();
		assert!(help.contains("For inspection only"));
		assert!(help.contains("cannot sign"));
	}

	#[test]
	fn unknown_permission_is_rejected() {
		let err = parse_permissions(&["withdraw".to_string()]).unwrap_err();
		assert!(err.to_string().contains("withdraw"));
	}
}
