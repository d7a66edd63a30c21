// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrappers for sensitive values handled by Harbor.
//!
//! Two shapes are provided:
//!
//! - [`Secret<T>`]: a cloneable wrapper for configuration-grade secrets such as
//!   the keychain password or app secrets injected into a manifest.
//! - [`SecretBytes`]: a move-only buffer for raw key material. It cannot be
//!   cloned, and its memory is zeroed when it is dropped, on every exit path.
//!
//! Both print `[REDACTED]` for `Debug` and `Display`, and [`Secret<T>`]
//! serializes as `"[REDACTED]"`.
//!
//! ```
//! use harbor_common_secret::{Secret, SecretBytes};
//!
//! let password = Secret::new("hunter2".to_string());
//! assert_eq!(format!("{password}"), "[REDACTED]");
//! assert_eq!(password.expose(), "hunter2");
//!
//! let key = SecretBytes::new(vec![7u8; 32]);
//! assert_eq!(key.len(), 32);
//! assert_eq!(format!("{key:?}"), "SecretBytes([REDACTED; 32])");
//! ```

mod bytes;
pub mod private_file;

use std::fmt;
use zeroize::Zeroize;

pub use bytes::SecretBytes;
pub use private_file::{remove_if_exists, write_private_file};

/// The placeholder printed in place of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A wrapper that hides its contents from formatting and serialization and
/// zeroes them on drop.
///
/// There is no `Deref`; callers go through [`Secret::expose`] so that secret
/// access is visible at the call site.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Convenience alias for secret strings.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the protected value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	pub fn expose_mut(&mut self) -> &mut T {
		&mut self.inner
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Secret::new(value)
	}
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
