// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Owned buffer of raw key material.
///
/// Deliberately not `Clone`: a decrypted private key has exactly one owner, and
/// the bytes are wiped when that owner goes out of scope, including on early
/// return through `?` or an unwinding panic.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes {
	inner: Vec<u8>,
}

impl SecretBytes {
	pub fn new(inner: Vec<u8>) -> Self {
		Self { inner }
	}

	/// Copies `bytes` into a fresh secret buffer. The caller remains
	/// responsible for wiping the source.
	pub fn from_slice(bytes: &[u8]) -> Self {
		Self {
			inner: bytes.to_vec(),
		}
	}

	pub fn expose(&self) -> &[u8] {
		&self.inner
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Copies the buffer into a fixed-size array wrapped in `Zeroizing`.
	///
	/// Returns `None` when the length does not match `N`.
	pub fn to_array<const N: usize>(&self) -> Option<zeroize::Zeroizing<[u8; N]>> {
		if self.inner.len() != N {
			return None;
		}
		let mut out = zeroize::Zeroizing::new([0u8; N]);
		out.copy_from_slice(&self.inner);
		Some(out)
	}
}

impl fmt::Debug for SecretBytes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretBytes([REDACTED; {}])", self.inner.len())
	}
}

impl PartialEq for SecretBytes {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl Eq for SecretBytes {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_does_not_leak_bytes() {
		let bytes = SecretBytes::new(vec![0xAB; 4]);
		let debug = format!("{bytes:?}");
		assert_eq!(debug, "SecretBytes([REDACTED; 4])");
		assert!(!debug.contains("171"));
	}

	#[test]
	fn explicit_zeroize_clears_contents() {
		let mut bytes = SecretBytes::new(vec![1, 2, 3]);
		bytes.zeroize();
		assert!(bytes.is_empty());
	}

	#[test]
	fn to_array_checks_length() {
		let bytes = SecretBytes::from_slice(&[9u8; 32]);
		assert!(bytes.to_array::<16>().is_none());
		let arr = bytes.to_array::<32>().unwrap();
		assert_eq!(arr[0], 9);
	}
}
