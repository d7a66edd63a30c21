// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Payload sanitization applied before any event is written.
//!
//! - values under a sensitive key are replaced with `[REDACTED]`
//! - strings shaped like a raw 32-byte private key keep their first six
//!   characters and mask the rest with `*`
//! - integers that do not fit in an IEEE double without loss become strings

use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

const MAX_DEPTH: usize = 128;
const SENSITIVE_KEY_PARTS: &[&str] = &["key", "secret", "password", "mnemonic"];
const KEEP_PREFIX: usize = 6;
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Returns a sanitized copy of `data`.
pub fn sanitize(data: &Value) -> Value {
	let mut cloned = data.clone();
	sanitize_in_place(&mut cloned);
	cloned
}

pub fn sanitize_in_place(value: &mut Value) {
	sanitize_with_depth(value, 0);
}

pub fn is_sensitive_key(key: &str) -> bool {
	let lower = key.to_ascii_lowercase();
	SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part))
}

/// 64 hex characters, optionally prefixed with `0x`.
pub fn looks_like_private_key(s: &str) -> bool {
	let hex = s.strip_prefix("0x").unwrap_or(s);
	hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn mask_private_key(s: &str) -> String {
	let kept: String = s.chars().take(KEEP_PREFIX).collect();
	let masked = s.chars().count().saturating_sub(KEEP_PREFIX);
	format!("{kept}{}", "*".repeat(masked))
}

fn sanitize_with_depth(value: &mut Value, depth: usize) {
	if depth > MAX_DEPTH {
		*value = Value::String(REDACTED.to_string());
		return;
	}

	match value {
		Value::String(s) => {
			if looks_like_private_key(s) {
				*s = mask_private_key(s);
			}
		}
		Value::Number(n) => {
			let unsafe_int = match (n.as_u64(), n.as_i64()) {
				(Some(u), _) => u > MAX_SAFE_INTEGER,
				(None, Some(i)) => i.unsigned_abs() > MAX_SAFE_INTEGER,
				_ => false,
			};
			if unsafe_int {
				*value = Value::String(n.to_string());
			}
		}
		Value::Array(items) => {
			for item in items {
				sanitize_with_depth(item, depth + 1);
			}
		}
		Value::Object(obj) => {
			for (key, v) in obj.iter_mut() {
				if is_sensitive_key(key) {
					*v = Value::String(REDACTED.to_string());
				} else {
					sanitize_with_depth(v, depth + 1);
				}
			}
		}
		Value::Null | Value::Bool(_) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	const RAW_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

	#[test]
	fn sensitive_keys_are_fully_redacted() {
		let out = sanitize(&json!({
			"privateKey": "abc",
			"Password": {"nested": true},
			"api_secret": 12,
			"MNEMONIC_words": ["a", "b"],
			"address": "akash1xyz",
		}));
		assert_eq!(out["privateKey"], REDACTED);
		assert_eq!(out["Password"], REDACTED);
		assert_eq!(out["api_secret"], REDACTED);
		assert_eq!(out["MNEMONIC_words"], REDACTED);
		assert_eq!(out["address"], "akash1xyz");
	}

	#[test]
	fn raw_key_values_are_partially_masked() {
		let out = sanitize(&json!({"note": RAW_KEY, "prefixed": format!("0x{RAW_KEY}")}));
		let note = out["note"].as_str().unwrap();
		assert_eq!(&note[..6], "4c0883");
		assert_eq!(note.len(), 64);
		assert!(note[6..].chars().all(|c| c == '*'));

		let prefixed = out["prefixed"].as_str().unwrap();
		assert_eq!(&prefixed[..6], "0x4c08");
		assert!(!prefixed.contains(&RAW_KEY[6..]));
	}

	#[test]
	fn non_key_hex_is_left_alone() {
		let short = "deadbeef";
		let out = sanitize(&json!({"tx": short, "hash": "z".repeat(64)}));
		assert_eq!(out["tx"], short);
		assert_eq!(out["hash"], "z".repeat(64));
	}

	#[test]
	fn large_integers_become_strings() {
		let big = (1u64 << 53) + 1;
		let out = sanitize(&json!({"amount": big, "neg": -(big as i64), "small": 42}));
		assert_eq!(out["amount"], json!(big.to_string()));
		assert_eq!(out["neg"], json!((-(big as i64)).to_string()));
		assert_eq!(out["small"], json!(42));
	}

	#[test]
	fn arrays_are_walked() {
		let out = sanitize(&json!([{"seed_password": "x"}, RAW_KEY]));
		assert_eq!(out[0]["seed_password"], REDACTED);
		assert!(out[1].as_str().unwrap().ends_with('*'));
	}

	proptest! {
		#[test]
		fn raw_keys_never_survive(key in "[0-9a-f]{64}", field in "[a-z_]{1,12}") {
			let out = sanitize(&json!({ field.clone(): key.clone(), "list": [key.clone()] }));
			let text = serde_json::to_string(&out).unwrap();
			prop_assert!(!text.contains(&key));
		}

		#[test]
		fn sensitive_values_never_survive(secret in "[A-Za-z0-9]{8,32}", prefix in "[a-z]{0,6}") {
			let field = format!("{prefix}password");
			prop_assume!(!field.contains(&secret) && !REDACTED.contains(&secret));
			let out = sanitize(&json!({ field: secret.clone() }));
			let text = serde_json::to_string(&out).unwrap();
			prop_assert!(!text.contains(&secret));
		}
	}
}
