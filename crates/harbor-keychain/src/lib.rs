// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Custody of the password that encrypts local wallet material.
//!
//! [`KeychainStore`] walks a ranked list of [`PasswordBackend`]s: the OS
//! keyring first, then a checksummed keystore file, and finally generates a
//! fresh 256-bit password and persists it to the first backend that accepts
//! it. Every transition is recorded in the security log.

pub mod backend;
pub mod backend_file;
pub mod backend_keyring;
pub mod error;
pub mod store;

pub use backend::{MemoryBackend, PasswordBackend, PasswordSource};
pub use backend_file::FileBackend;
pub use backend_keyring::KeyringBackend;
pub use error::{KeychainError, KeychainResult};
pub use store::{generate_password, KeychainStore, ResolvedPassword, PASSWORD_BYTES};
