// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sha2::{Digest, Sha256};

/// Number of hash bytes that make up the account identifier.
pub const ADDRESS_HASH_BYTES: usize = 20;

/// `<prefix>1` followed by the hex of the first 20 bytes of SHA-256(pubkey).
pub fn derive_address(prefix: &str, public_key: &[u8]) -> String {
	let digest = Sha256::digest(public_key);
	format!("{prefix}1{}", hex::encode(&digest[..ADDRESS_HASH_BYTES]))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn address_has_prefix_and_forty_hex_chars() {
		let address = derive_address("akash", &[1u8; 32]);
		let rest = address.strip_prefix("akash1").unwrap();
		assert_eq!(rest.len(), ADDRESS_HASH_BYTES * 2);
		assert!(rest.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn address_is_stable_per_key() {
		assert_eq!(
			derive_address("akash", &[9u8; 32]),
			derive_address("akash", &[9u8; 32])
		);
		assert_ne!(
			derive_address("akash", &[9u8; 32]),
			derive_address("akash", &[8u8; 32])
		);
	}
}
