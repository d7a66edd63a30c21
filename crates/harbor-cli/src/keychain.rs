// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;

use crate::context::Context;

#[derive(Subcommand, Debug)]
pub enum KeychainCommand {
	/// Generate a new password and re-encrypt the wallet under it
	Rotate,

	/// Delete the stored password
	Clear {
		/// Delete even though a wallet encrypted under it exists
		#[arg(long)]
		force: bool,
	},
}

pub async fn run(ctx: &Context, cmd: KeychainCommand) -> Result<()> {
	let wallet = ctx.wallet();
	match cmd {
		KeychainCommand::Rotate => {
			if wallet.exists().await {
				wallet
					.rotate_encryption()
					.await
					.context("failed to re-encrypt wallet")?;
				println!("password rotated; wallet re-encrypted");
			} else {
				let resolved = ctx
					.keychain()
					.rotate_password()
					.await
					.context("failed to rotate password")?;
				println!("password rotated (stored in {})", resolved.source);
			}
		}
		KeychainCommand::Clear { force } => {
			if wallet.exists().await && !force {
				bail!(
					"a wallet at {} is encrypted under this password; pass --force to delete it anyway",
					wallet.settings().wallet_file.display()
				);
			}
			ctx.keychain()
				.delete_password()
				.await
				.context("failed to delete password")?;
			println!("password deleted");
		}
	}
	Ok(())
}
