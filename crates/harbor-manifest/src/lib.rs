// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Converts an application description into a provider-agnostic deployment
//! manifest.
//!
//! [`generate`] is pure: it validates the [`AppConfig`], reports every
//! violation at once, and returns the manifest with its canonical serialized
//! form and SHA-256 hash. The canonical form is compact JSON with sorted keys,
//! which is also a valid YAML document.

pub mod config;
pub mod error;
pub mod generate;
pub mod types;
pub mod validate;

pub use config::{AppConfig, ExposeConfig, GpuConfig, PricingConfig, ServiceConfig, VolumeConfig};
pub use error::{ManifestError, ManifestResult, Violation};
pub use generate::{generate, manifest_hash, to_canonical_json};
pub use types::{GeneratedManifest, Manifest, Price, MANIFEST_VERSION, PLACEMENT_NAME};
pub use validate::{is_allowed_gpu, is_valid_size, validate};
