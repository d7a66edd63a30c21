// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! App config validation. Every violation is collected; nothing short-circuits.

use std::collections::HashSet;

use crate::config::{AppConfig, ServiceConfig};
use crate::error::{ManifestError, ManifestResult, Violation};

pub const MAX_GPU_UNITS: u32 = 8;

/// GPU models providers advertise, by vendor.
pub const GPU_ALLOW_LIST: &[(&str, &[&str])] = &[
	(
		"nvidia",
		&[
			"a100", "a10", "a40", "a6000", "h100", "l4", "l40s", "rtx3080", "rtx3090", "rtx4090", "t4",
			"v100",
		],
	),
	("amd", &["mi100", "mi210", "mi250"]),
];

/// `<positive integer><Gi|Mi>` with no leading zero.
pub fn is_valid_size(value: &str) -> bool {
	let Some(digits) = value
		.strip_suffix("Gi")
		.or_else(|| value.strip_suffix("Mi"))
	else {
		return false;
	};
	let mut chars = digits.chars();
	match chars.next() {
		Some('1'..='9') => chars.all(|c| c.is_ascii_digit()),
		_ => false,
	}
}

pub fn is_allowed_gpu(vendor: &str, model: &str) -> bool {
	GPU_ALLOW_LIST
		.iter()
		.find(|(v, _)| *v == vendor)
		.is_some_and(|(_, models)| models.contains(&model))
}

pub fn validate(config: &AppConfig) -> ManifestResult<()> {
	let mut violations = Vec::new();

	if config.name.trim().is_empty() {
		violations.push(Violation::new("name", "project name must not be empty"));
	}
	if config.services.is_empty() {
		violations.push(Violation::new("services", "at least one service is required"));
	}

	for (name, service) in &config.services {
		validate_service(name, service, &mut violations);
	}

	for name in config.secrets.keys() {
		if name.is_empty() || name.contains('=') {
			violations.push(Violation::new(
				format!("secrets.{name}"),
				"secret name must be non-empty and contain no '='",
			));
		}
		for (service_name, service) in &config.services {
			if service.env.contains_key(name) {
				violations.push(Violation::new(
					format!("services.{service_name}.env.{name}"),
					"env entry collides with a secret of the same name",
				));
			}
		}
	}

	if violations.is_empty() {
		Ok(())
	} else {
		tracing::debug!(count = violations.len(), "app config rejected");
		Err(ManifestError::InvalidConfig { violations })
	}
}

fn validate_service(name: &str, service: &ServiceConfig, violations: &mut Vec<Violation>) {
	let field = |suffix: &str| format!("services.{name}.{suffix}");

	if name.is_empty() {
		violations.push(Violation::new("services", "service name must not be empty"));
	}
	if service.image.trim().is_empty() {
		violations.push(Violation::new(field("image"), "image must not be empty"));
	}
	if !(service.cpu.is_finite() && service.cpu > 0.0) {
		violations.push(Violation::new(field("cpu"), "cpu units must be positive"));
	}
	if !is_valid_size(&service.memory) {
		violations.push(Violation::new(
			field("memory"),
			format!("{:?} is not <integer><Gi|Mi>", service.memory),
		));
	}
	if !is_valid_size(&service.storage) {
		violations.push(Violation::new(
			field("storage"),
			format!("{:?} is not <integer><Gi|Mi>", service.storage),
		));
	}
	if service.count == 0 {
		violations.push(Violation::new(field("count"), "count must be at least 1"));
	}

	let mut seen_ports = HashSet::new();
	for (i, expose) in service.expose.iter().enumerate() {
		if !(1..=65535).contains(&expose.port) {
			violations.push(Violation::new(
				field(&format!("expose[{i}].port")),
				format!("{} is outside 1..=65535", expose.port),
			));
		} else if !seen_ports.insert(expose.port) {
			violations.push(Violation::new(
				field(&format!("expose[{i}].port")),
				format!("port {} is exposed more than once", expose.port),
			));
		}
		if let Some(as_port) = expose.as_port {
			if !(1..=65535).contains(&as_port) {
				violations.push(Violation::new(
					field(&format!("expose[{i}].as")),
					format!("{as_port} is outside 1..=65535"),
				));
			}
		}
	}

	if let Some(gpu) = &service.gpu {
		if !(1..=MAX_GPU_UNITS).contains(&gpu.count) {
			violations.push(Violation::new(
				field("gpu.count"),
				format!("{} is outside 1..={MAX_GPU_UNITS}", gpu.count),
			));
		}
		if !is_allowed_gpu(&gpu.vendor, &gpu.model) {
			violations.push(Violation::new(
				field("gpu.model"),
				format!("{}/{} is not an allowed GPU", gpu.vendor, gpu.model),
			));
		}
	}

	let mut seen_volumes = HashSet::new();
	for (i, volume) in service.volumes.iter().enumerate() {
		if volume.name.is_empty() || !seen_volumes.insert(volume.name.as_str()) {
			violations.push(Violation::new(
				field(&format!("volumes[{i}].name")),
				"volume names must be non-empty and unique",
			));
		}
		if !is_valid_size(&volume.size) {
			violations.push(Violation::new(
				field(&format!("volumes[{i}].size")),
				format!("{:?} is not <integer><Gi|Mi>", volume.size),
			));
		}
		if !volume.mount.starts_with('/') {
			violations.push(Violation::new(
				field(&format!("volumes[{i}].mount")),
				"mount must be an absolute path",
			));
		}
	}

	if let Some(pricing) = &service.pricing {
		if pricing.denom.is_empty() {
			violations.push(Violation::new(field("pricing.denom"), "denom must not be empty"));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn app(body: &str) -> AppConfig {
		AppConfig::from_toml_str(body).unwrap()
	}

	#[test]
	fn size_pattern() {
		for ok in ["1Gi", "512Mi", "10Gi", "100Mi"] {
			assert!(is_valid_size(ok), "{ok}");
		}
		for bad in [
			"", "0Gi", "05Mi", "1.5Gi", "1G", "1gi", "Gi", "-1Gi", "1 Gi", "1GiB", "1Ti", "1Mi ",
		] {
			assert!(!is_valid_size(bad), "{bad:?}");
		}
	}

	#[test]
	fn every_violation_is_reported_at_once() {
		let config = app(
			r#"
			name = ""

			[services.web]
			image = ""
			memory = "512MB"
			storage = "0Gi"
			expose = [{ port = 80 }, { port = 80 }, { port = 70000 }]

			[services.web.gpu]
			model = "voodoo2"
			count = 9
			"#,
		);
		let err = validate(&config).unwrap_err();
		let fields = err.fields();
		for expected in [
			"name",
			"services.web.image",
			"services.web.memory",
			"services.web.storage",
			"services.web.expose[1].port",
			"services.web.expose[2].port",
			"services.web.gpu.count",
			"services.web.gpu.model",
		] {
			assert!(fields.contains(&expected), "missing {expected} in {fields:?}");
		}
	}

	#[test]
	fn valid_config_passes() {
		let config = app(
			r#"
			name = "ml"

			[services.worker]
			image = "pytorch/pytorch:2.3.0"
			cpu = 4.0
			memory = "16Gi"
			storage = "20Gi"

			[services.worker.gpu]
			model = "rtx4090"
			count = 2
			"#,
		);
		validate(&config).unwrap();
	}

	#[test]
	fn secret_colliding_with_env_is_rejected() {
		let config = app(
			r#"
			name = "blog"

			[services.web]
			image = "ghost:5"
			env = { DB_PASSWORD = "plain" }

			[secrets]
			DB_PASSWORD = "hidden"
			"#,
		);
		let err = validate(&config).unwrap_err();
		assert_eq!(err.fields(), vec!["services.web.env.DB_PASSWORD"]);
	}

	proptest! {
		#[test]
		fn malformed_memory_is_named(suffix in "(GB|MB|G|M|gi|Ti|)", number in "[0-9]{0,4}") {
			let memory = format!("{number}{suffix}");
			prop_assume!(!is_valid_size(&memory));
			let body = format!(
				"name = \"p\"\n[services.web]\nimage = \"nginx\"\nmemory = \"{memory}\"\n"
			);
			let err = validate(&app(&body)).unwrap_err();
			prop_assert!(err.fields().contains(&"services.web.memory"));
		}
	}
}
