// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use harbor_manifest::{generate, AppConfig, GeneratedManifest};
use harbor_security_log::REDACTED;

#[derive(Debug, Clone, clap::Args)]
pub struct ManifestArgs {
	/// Path to the app description
	pub app: PathBuf,
}

/// Prints the canonical manifest with secret values masked. The hash is over
/// the unmasked text that is delivered to providers.
pub fn run(args: ManifestArgs) -> Result<()> {
	let (config, generated) = generate_from_file(&args.app)?;
	println!("{}", mask_secrets(&generated.canonical, &config));
	println!("sha256: {}", generated.hash);
	Ok(())
}

fn generate_from_file(path: &Path) -> Result<(AppConfig, GeneratedManifest)> {
	let content = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read {}", path.display()))?;
	let config = AppConfig::from_toml_str(&content)
		.with_context(|| format!("failed to parse {}", path.display()))?;
	let generated = generate(&config).context("app description is invalid")?;
	Ok((config, generated))
}

fn mask_secrets(canonical: &str, config: &AppConfig) -> String {
	config
		.secrets
		.iter()
		.fold(canonical.to_string(), |text, (name, value)| {
			text.replace(
				&format!("{name}={}", value.expose()),
				&format!("{name}={REDACTED}"),
			)
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generates_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("app.toml");
		std::fs::write(
			&path,
			r#"
name = "blog"

[services.web]
image = "ghost:5"
expose = [{ port = 2368, as = 80 }]

[secrets]
DB_PASSWORD = "hunter2"
"#,
		)
		.unwrap();

		let (config, generated) = generate_from_file(&path).unwrap();
		assert_eq!(generated.hash.len(), 64);
		assert!(generated.canonical.contains("ghost:5"));
		assert!(generated.canonical.contains("DB_PASSWORD=hunter2"));

		let shown = mask_secrets(&generated.canonical, &config);
		assert!(!shown.contains("hunter2"));
		assert!(shown.contains("DB_PASSWORD="));
	}

	#[test]
	fn invalid_app_reports_context() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("app.toml");
		std::fs::write(&path, "name = \"\"\n[services]\n").unwrap();

		let err = generate_from_file(&path).unwrap_err();
		assert!(err.to_string().contains("invalid"));
	}

	#[test]
	fn missing_file_names_path() {
		let err = generate_from_file(Path::new("/nonexistent/app.toml")).unwrap_err();
		assert!(err.to_string().contains("/nonexistent/app.toml"));
	}
}
