// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The provider-facing manifest document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MANIFEST_VERSION: &str = "2.0";

/// Name of the single placement group every service is priced under.
pub const PLACEMENT_NAME: &str = "dcloud";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
	pub version: String,
	pub services: BTreeMap<String, ServiceSpec>,
	pub profiles: Profiles,
	/// service -> placement -> deployment
	pub deployment: BTreeMap<String, BTreeMap<String, DeploymentSpec>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
	pub image: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub env: Option<Vec<String>>,
	pub expose: Vec<ExposeSpec>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<ServiceParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposeSpec {
	pub port: u16,
	#[serde(rename = "as")]
	pub as_port: u16,
	pub to: Vec<RouteTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
	pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceParams {
	pub storage: BTreeMap<String, StorageMount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMount {
	pub mount: String,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profiles {
	pub compute: BTreeMap<String, ComputeProfile>,
	pub placement: BTreeMap<String, PlacementProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeProfile {
	pub resources: Resources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
	pub cpu: CpuSpec,
	pub memory: MemorySpec,
	pub storage: Vec<StorageSpec>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gpu: Option<GpuSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSpec {
	pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySpec {
	pub size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	pub size: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attributes: Option<StorageAttributes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageAttributes {
	pub persistent: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuSpec {
	pub units: u32,
	pub attributes: GpuAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuAttributes {
	/// vendor -> accepted models
	pub vendor: BTreeMap<String, Vec<GpuModel>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuModel {
	pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementProfile {
	/// service -> price
	pub pricing: BTreeMap<String, Price>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
	pub denom: String,
	pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
	pub profile: String,
	pub count: u32,
}

impl Manifest {
	/// Sum of per-service pricing hints, grouped by denom.
	pub fn max_price(&self) -> BTreeMap<String, u64> {
		let mut totals = BTreeMap::new();
		for placement in self.profiles.placement.values() {
			for price in placement.pricing.values() {
				*totals.entry(price.denom.clone()).or_insert(0u64) += price.amount;
			}
		}
		totals
	}

	pub fn service_names(&self) -> impl Iterator<Item = &str> {
		self.services.keys().map(String::as_str)
	}
}

/// A manifest together with its canonical text and content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedManifest {
	pub manifest: Manifest,
	/// Canonical JSON: ordered keys, no insignificant whitespace. Valid YAML.
	pub canonical: String,
	/// Hex SHA-256 of `canonical`.
	pub hash: String,
}
