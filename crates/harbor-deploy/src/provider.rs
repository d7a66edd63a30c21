// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider HTTP API: manifest delivery and lease status.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use harbor_common_http::{retry, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{DeployError, DeployResult};
use crate::types::{LeaseId, ProviderInfo};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseStatus {
	#[serde(default)]
	pub services: BTreeMap<String, ServiceStatus>,
	#[serde(default)]
	pub forwarded_ports: BTreeMap<String, Vec<ForwardedPort>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
	pub name: String,
	#[serde(default)]
	pub available: u32,
	#[serde(default)]
	pub total: u32,
	#[serde(default)]
	pub uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedPort {
	pub host: String,
	pub port: u16,
	#[serde(rename = "externalPort")]
	pub external_port: u16,
	#[serde(default)]
	pub proto: String,
}

impl LeaseStatus {
	/// First reachable URL of an available service, in service-name order.
	///
	/// Ingress URIs win over forwarded ports.
	pub fn service_url(&self) -> Option<String> {
		for (name, service) in &self.services {
			if service.available == 0 {
				continue;
			}
			if let Some(uri) = service.uris.first() {
				return Some(with_scheme(uri));
			}
			if let Some(port) = self.forwarded_ports.get(name).and_then(|p| p.first()) {
				return Some(format!("http://{}:{}", port.host, port.external_port));
			}
		}
		None
	}
}

fn with_scheme(uri: &str) -> String {
	if uri.contains("://") {
		uri.to_string()
	} else {
		format!("http://{uri}")
	}
}

/// Operations against a provider's API.
#[async_trait]
pub trait ProviderApi: Send + Sync {
	/// `PUT {host}/deployment/{dseq}/manifest`. Never retried.
	async fn send_manifest(
		&self,
		provider: &ProviderInfo,
		dseq: u64,
		manifest: &str,
	) -> DeployResult<()>;

	/// `GET {host}/lease/{dseq}/{gseq}/{oseq}/status`.
	async fn lease_status(&self, provider: &ProviderInfo, lease: &LeaseId)
		-> DeployResult<LeaseStatus>;
}

pub struct HttpProviderApi {
	http: reqwest::Client,
	retry: RetryConfig,
}

impl HttpProviderApi {
	pub fn new() -> Result<Self, reqwest::Error> {
		Self::with_timeout(DEFAULT_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
		Ok(Self {
			http: harbor_common_http::new_client_with_timeout(timeout)?,
			retry: RetryConfig::default(),
		})
	}

	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}
}

pub fn manifest_url(host_uri: &str, dseq: u64) -> DeployResult<Url> {
	join(host_uri, &format!("deployment/{dseq}/manifest"))
}

pub fn lease_status_url(host_uri: &str, lease: &LeaseId) -> DeployResult<Url> {
	join(
		host_uri,
		&format!("lease/{}/{}/{}/status", lease.dseq, lease.gseq, lease.oseq),
	)
}

fn join(host_uri: &str, path: &str) -> DeployResult<Url> {
	let base = Url::parse(host_uri).map_err(|e| DeployError::ProviderUnreachable {
		provider: host_uri.to_string(),
		reason: format!("invalid host URI: {e}"),
	})?;
	base.join(path).map_err(|e| DeployError::ProviderUnreachable {
		provider: host_uri.to_string(),
		reason: format!("invalid path: {e}"),
	})
}

#[async_trait]
impl ProviderApi for HttpProviderApi {
	#[instrument(skip(self, manifest), fields(provider = %provider.address))]
	async fn send_manifest(
		&self,
		provider: &ProviderInfo,
		dseq: u64,
		manifest: &str,
	) -> DeployResult<()> {
		let url = manifest_url(&provider.host_uri, dseq)?;
		let response = self
			.http
			.put(url)
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.body(manifest.to_string())
			.send()
			.await
			.map_err(|e| DeployError::ProviderUnreachable {
				provider: provider.address.clone(),
				reason: e.to_string(),
			})?;

		if !response.status().is_success() {
			let status = response.status();
			let body = response.text().await.unwrap_or_default();
			return Err(DeployError::ManifestDeliveryFailed {
				provider: provider.address.clone(),
				reason: format!("{status} - {body}"),
			});
		}

		debug!(dseq, "manifest accepted by provider");
		Ok(())
	}

	async fn lease_status(
		&self,
		provider: &ProviderInfo,
		lease: &LeaseId,
	) -> DeployResult<LeaseStatus> {
		let url = lease_status_url(&provider.host_uri, lease)?;
		retry(&self.retry, || {
			let url = url.clone();
			async move {
				self.http
					.get(url)
					.send()
					.await?
					.error_for_status()?
					.json::<LeaseStatus>()
					.await
			}
		})
		.await
		.map_err(|e| DeployError::ProviderUnreachable {
			provider: provider.address.clone(),
			reason: e.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_string, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn provider(server: &MockServer) -> ProviderInfo {
		ProviderInfo {
			address: "akash1prov".to_string(),
			host_uri: server.uri(),
			attributes: BTreeMap::new(),
			audited_by: vec![],
		}
	}

	fn lease() -> LeaseId {
		LeaseId {
			owner: "akash1owner".to_string(),
			dseq: 42,
			gseq: 1,
			oseq: 1,
			provider: "akash1prov".to_string(),
		}
	}

	fn api() -> HttpProviderApi {
		HttpProviderApi::new().unwrap().with_retry(RetryConfig {
			max_attempts: 2,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
			backoff_factor: 1.0,
			jitter: false,
		})
	}

	#[tokio::test]
	async fn manifest_is_put_to_deployment_path() {
		let server = MockServer::start().await;
		Mock::given(method("PUT"))
			.and(path("/deployment/42/manifest"))
			.and(body_string("{\"version\":\"2.0\"}"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		api()
			.send_manifest(&provider(&server), 42, "{\"version\":\"2.0\"}")
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn rejected_manifest_is_delivery_failure() {
		let server = MockServer::start().await;
		Mock::given(method("PUT"))
			.and(path("/deployment/42/manifest"))
			.respond_with(ResponseTemplate::new(422).set_body_string("bad manifest"))
			.expect(1)
			.mount(&server)
			.await;

		let err = api()
			.send_manifest(&provider(&server), 42, "{}")
			.await
			.unwrap_err();
		match err {
			DeployError::ManifestDeliveryFailed { reason, .. } => {
				assert!(reason.contains("422"));
				assert!(reason.contains("bad manifest"));
			}
			other => panic!("unexpected error {other:?}"),
		}
	}

	#[tokio::test]
	async fn lease_status_parses_uris() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/lease/42/1/1/status"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"services": {
					"web": {"name": "web", "available": 1, "total": 1, "uris": ["web.provider.example"]}
				},
				"forwarded_ports": {}
			})))
			.mount(&server)
			.await;

		let status = api()
			.lease_status(&provider(&server), &lease())
			.await
			.unwrap();
		assert_eq!(
			status.service_url().as_deref(),
			Some("http://web.provider.example")
		);
	}

	#[tokio::test]
	async fn lease_status_retries_server_errors() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/lease/42/1/1/status"))
			.respond_with(ResponseTemplate::new(503))
			.expect(2)
			.mount(&server)
			.await;

		let err = api()
			.lease_status(&provider(&server), &lease())
			.await
			.unwrap_err();
		assert!(matches!(err, DeployError::ProviderUnreachable { .. }));
	}

	#[test]
	fn unavailable_services_have_no_url() {
		let mut status = LeaseStatus::default();
		status.services.insert(
			"web".to_string(),
			ServiceStatus {
				name: "web".to_string(),
				available: 0,
				total: 1,
				uris: vec!["web.example".to_string()],
			},
		);
		assert_eq!(status.service_url(), None);

		status.services.get_mut("web").unwrap().available = 1;
		status.services.get_mut("web").unwrap().uris.clear();
		status.forwarded_ports.insert(
			"web".to_string(),
			vec![ForwardedPort {
				host: "10.0.0.5".to_string(),
				port: 80,
				external_port: 31234,
				proto: "TCP".to_string(),
			}],
		);
		assert_eq!(status.service_url().as_deref(), Some("http://10.0.0.5:31234"));
	}

	#[test]
	fn urls_are_joined_onto_host() {
		assert_eq!(
			manifest_url("https://provider.example:8443", 7)
				.unwrap()
				.as_str(),
			"https://provider.example:8443/deployment/7/manifest"
		);
		assert_eq!(
			lease_status_url("https://provider.example:8443", &lease())
				.unwrap()
				.as_str(),
			"https://provider.example:8443/lease/42/1/1/status"
		);
	}
}
