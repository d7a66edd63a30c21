// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The declarative application description a user writes (`app.toml`).

use std::collections::BTreeMap;

use harbor_common_secret::SecretString;
use serde::Deserialize;

use crate::error::ManifestResult;

pub const DEFAULT_DENOM: &str = "uakt";
pub const DEFAULT_PRICE: u64 = 1_000;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	/// Project name. Must be non-empty.
	pub name: String,
	pub services: BTreeMap<String, ServiceConfig>,
	/// Merged into every service's env as `NAME=value`. Never printed.
	#[serde(default)]
	pub secrets: BTreeMap<String, SecretString>,
}

impl AppConfig {
	pub fn from_toml_str(content: &str) -> ManifestResult<Self> {
		Ok(toml::from_str(content)?)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
	pub image: String,
	/// CPU units, fractional allowed (`0.5`).
	#[serde(default = "default_cpu")]
	pub cpu: f64,
	#[serde(default = "default_memory")]
	pub memory: String,
	/// Ephemeral storage size.
	#[serde(default = "default_storage")]
	pub storage: String,
	#[serde(default)]
	pub expose: Vec<ExposeConfig>,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	#[serde(default)]
	pub gpu: Option<GpuConfig>,
	#[serde(default)]
	pub volumes: Vec<VolumeConfig>,
	#[serde(default)]
	pub pricing: Option<PricingConfig>,
	#[serde(default = "default_count")]
	pub count: u32,
}

/// Port numbers are parsed wide so out-of-range values are reported as
/// violations rather than parse failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ExposeConfig {
	pub port: u32,
	#[serde(default, rename = "as")]
	pub as_port: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpuConfig {
	pub model: String,
	#[serde(default = "default_gpu_count")]
	pub count: u32,
	#[serde(default = "default_gpu_vendor")]
	pub vendor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeConfig {
	pub name: String,
	pub size: String,
	pub mount: String,
	#[serde(default)]
	pub class: Option<String>,
	#[serde(default)]
	pub read_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
	pub amount: u64,
	#[serde(default = "default_denom")]
	pub denom: String,
}

impl Default for PricingConfig {
	fn default() -> Self {
		Self {
			amount: DEFAULT_PRICE,
			denom: DEFAULT_DENOM.to_string(),
		}
	}
}

fn default_cpu() -> f64 {
	0.5
}

fn default_memory() -> String {
	"512Mi".to_string()
}

fn default_storage() -> String {
	"1Gi".to_string()
}

fn default_count() -> u32 {
	1
}

fn default_gpu_count() -> u32 {
	1
}

fn default_gpu_vendor() -> String {
	"nvidia".to_string()
}

fn default_denom() -> String {
	DEFAULT_DENOM.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_minimal_app() {
		let app = AppConfig::from_toml_str(
			r#"
			name = "blog"

			[services.web]
			image = "nginx:1.25"
			expose = [{ port = 80 }]
			"#,
		)
		.unwrap();
		let web = &app.services["web"];
		assert_eq!(web.memory, "512Mi");
		assert_eq!(web.count, 1);
		assert_eq!(web.expose[0].port, 80);
		assert!(app.secrets.is_empty());
	}

	#[test]
	fn secrets_do_not_leak_through_debug() {
		let app = AppConfig::from_toml_str(
			r#"
			name = "blog"

			[services.web]
			image = "nginx:1.25"

			[secrets]
			DB_PASSWORD = "hunter2-very-secret"
			"#,
		)
		.unwrap();
		let debug = format!("{app:?}");
		assert!(!debug.contains("hunter2-very-secret"));
		assert!(debug.contains("DB_PASSWORD"));
	}
}
