// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::config::{AppConfig, PricingConfig, ServiceConfig};
use crate::error::ManifestResult;
use crate::types::*;
use crate::validate::validate;

/// Validate `config` and build the manifest with its canonical form and hash.
///
/// Pure: the same config always produces byte-identical `canonical` output.
pub fn generate(config: &AppConfig) -> ManifestResult<GeneratedManifest> {
	validate(config)?;

	let secret_env: Vec<String> = config
		.secrets
		.iter()
		.map(|(name, value)| format!("{name}={}", value.expose()))
		.collect();

	let mut services = BTreeMap::new();
	let mut compute = BTreeMap::new();
	let mut pricing = BTreeMap::new();
	let mut deployment = BTreeMap::new();

	for (name, service) in &config.services {
		services.insert(name.clone(), service_spec(service, &secret_env));
		compute.insert(
			name.clone(),
			ComputeProfile {
				resources: resources(service),
			},
		);

		let price = service.pricing.clone().unwrap_or_default();
		pricing.insert(name.clone(), price_of(price));

		let mut placements = BTreeMap::new();
		placements.insert(
			PLACEMENT_NAME.to_string(),
			DeploymentSpec {
				profile: name.clone(),
				count: service.count,
			},
		);
		deployment.insert(name.clone(), placements);
	}

	let mut placement = BTreeMap::new();
	placement.insert(PLACEMENT_NAME.to_string(), PlacementProfile { pricing });

	let manifest = Manifest {
		version: MANIFEST_VERSION.to_string(),
		services,
		profiles: Profiles { compute, placement },
		deployment,
	};

	let canonical = to_canonical_json(&manifest)?;
	let hash = manifest_hash(&canonical);

	tracing::debug!(
		project = %config.name,
		services = manifest.services.len(),
		hash = %hash,
		"generated manifest"
	);

	Ok(GeneratedManifest {
		manifest,
		canonical,
		hash,
	})
}

/// Serialize with lexicographically ordered keys and no whitespace.
pub fn to_canonical_json(manifest: &Manifest) -> ManifestResult<String> {
	let value = sort_keys(serde_json::to_value(manifest)?);
	Ok(serde_json::to_string(&value)?)
}

// Rebuilds every object with keys inserted in sorted order, which holds
// whether or not serde_json's preserve_order feature is enabled.
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
	use serde_json::Value;
	match value {
		Value::Object(map) => {
			let mut entries: Vec<_> = map.into_iter().collect();
			entries.sort_by(|a, b| a.0.cmp(&b.0));
			Value::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k, sort_keys(v)))
					.collect(),
			)
		}
		Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
		other => other,
	}
}

pub fn manifest_hash(canonical: &str) -> String {
	hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn service_spec(service: &ServiceConfig, secret_env: &[String]) -> ServiceSpec {
	let mut env: Vec<String> = service
		.env
		.iter()
		.map(|(key, value)| format!("{key}={value}"))
		.collect();
	env.extend(secret_env.iter().cloned());

	let expose = service
		.expose
		.iter()
		.map(|e| {
			let port = e.port as u16;
			ExposeSpec {
				port,
				as_port: e.as_port.map(|p| p as u16).unwrap_or(port),
				to: vec![RouteTarget { global: true }],
			}
		})
		.collect();

	let params = if service.volumes.is_empty() {
		None
	} else {
		Some(ServiceParams {
			storage: service
				.volumes
				.iter()
				.map(|v| {
					(
						v.name.clone(),
						StorageMount {
							mount: v.mount.clone(),
							readonly: v.read_only,
						},
					)
				})
				.collect(),
		})
	};

	ServiceSpec {
		image: service.image.clone(),
		env: if env.is_empty() { None } else { Some(env) },
		expose,
		params,
	}
}

fn resources(service: &ServiceConfig) -> Resources {
	let mut storage = vec![StorageSpec {
		name: None,
		size: service.storage.clone(),
		attributes: None,
	}];
	storage.extend(service.volumes.iter().map(|v| StorageSpec {
		name: Some(v.name.clone()),
		size: v.size.clone(),
		attributes: Some(StorageAttributes {
			persistent: true,
			class: v.class.clone(),
		}),
	}));

	let gpu = service.gpu.as_ref().map(|g| {
		let mut vendor = BTreeMap::new();
		vendor.insert(
			g.vendor.clone(),
			vec![GpuModel {
				model: g.model.clone(),
			}],
		);
		GpuSpec {
			units: g.count,
			attributes: GpuAttributes { vendor },
		}
	});

	Resources {
		cpu: CpuSpec { units: service.cpu },
		memory: MemorySpec {
			size: service.memory.clone(),
		},
		storage,
		gpu,
	}
}

fn price_of(pricing: PricingConfig) -> Price {
	Price {
		denom: pricing.denom,
		amount: pricing.amount,
	}
}
