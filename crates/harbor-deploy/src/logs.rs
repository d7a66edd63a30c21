// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Streaming workload logs from a provider over WebSocket.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

use crate::error::{DeployError, DeployResult};

/// One log line as sent by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogLine {
	/// Service (container) name, empty when the provider sent plain text.
	#[serde(default)]
	pub name: String,
	pub message: String,
}

impl LogLine {
	fn parse(text: &str) -> Self {
		serde_json::from_str(text).unwrap_or_else(|_| LogLine {
			name: String::new(),
			message: text.to_string(),
		})
	}
}

/// `wss://{host}/deployment/{dseq}/logs`, following the scheme of `host_uri`.
pub fn logs_url(host_uri: &str, dseq: u64) -> DeployResult<Url> {
	let unreachable = |reason: String| DeployError::ProviderUnreachable {
		provider: host_uri.to_string(),
		reason,
	};

	let with_scheme = if host_uri.contains("://") {
		host_uri.to_string()
	} else {
		format!("https://{host_uri}")
	};
	let mut url = Url::parse(&with_scheme).map_err(|e| unreachable(e.to_string()))?;
	let scheme = match url.scheme() {
		"http" | "ws" => "ws",
		_ => "wss",
	};
	url.set_scheme(scheme)
		.map_err(|_| unreachable(format!("cannot use scheme {scheme}")))?;
	url.join(&format!("deployment/{dseq}/logs"))
		.map_err(|e| unreachable(e.to_string()))
}

/// Read log lines until the provider closes the stream.
pub async fn stream_logs<F>(url: &Url, mut on_line: F) -> DeployResult<()>
where
	F: FnMut(LogLine),
{
	let unreachable = |reason: String| DeployError::ProviderUnreachable {
		provider: url.host_str().unwrap_or_default().to_string(),
		reason,
	};

	let (ws_stream, _) = connect_async(url.as_str())
		.await
		.map_err(|e| unreachable(e.to_string()))?;
	let (mut write, mut read) = ws_stream.split();

	while let Some(msg) = read.next().await {
		match msg {
			Ok(Message::Text(text)) => on_line(LogLine::parse(&text)),
			Ok(Message::Binary(data)) => on_line(LogLine::parse(&String::from_utf8_lossy(&data))),
			Ok(Message::Ping(data)) => {
				if write.send(Message::Pong(data)).await.is_err() {
					break;
				}
			}
			Ok(Message::Close(_)) => break,
			Ok(_) => {}
			Err(e) => return Err(unreachable(format!("websocket error: {e}"))),
		}
	}

	debug!(url = %url, "log stream closed");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::net::TcpListener;

	#[test]
	fn logs_url_upgrades_scheme() {
		assert_eq!(
			logs_url("https://provider.example:8443", 5)
				.unwrap()
				.as_str(),
			"wss://provider.example:8443/deployment/5/logs"
		);
		assert_eq!(
			logs_url("http://localhost:8080", 5).unwrap().as_str(),
			"ws://localhost:8080/deployment/5/logs"
		);
		assert_eq!(
			logs_url("provider.example", 9).unwrap().as_str(),
			"wss://provider.example/deployment/9/logs"
		);
	}

	#[test]
	fn plain_text_lines_are_kept() {
		assert_eq!(
			LogLine::parse("{\"name\":\"web\",\"message\":\"ready\"}"),
			LogLine {
				name: "web".to_string(),
				message: "ready".to_string()
			}
		);
		assert_eq!(LogLine::parse("raw output").message, "raw output");
	}

	#[tokio::test]
	async fn streams_until_close() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let server = tokio::spawn(async move {
			let (stream, _) = listener.accept().await.unwrap();
			let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
			ws.send(Message::Text(
				"{\"name\":\"web\",\"message\":\"listening on :80\"}".to_string(),
			))
			.await
			.unwrap();
			ws.send(Message::Text("second".to_string())).await.unwrap();
			ws.close(None).await.unwrap();
		});

		let url = logs_url(&format!("http://{addr}"), 3).unwrap();
		let mut lines = Vec::new();
		stream_logs(&url, |line| lines.push(line)).await.unwrap();
		server.await.unwrap();

		assert_eq!(lines.len(), 2);
		assert_eq!(lines[0].name, "web");
		assert_eq!(lines[0].message, "listening on :80");
		assert_eq!(lines[1].message, "second");
	}
}
