// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Monotonic time for polling loops.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
	fn now(&self) -> Instant;

	async fn sleep(&self, duration: Duration);
}

/// Real time backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
	fn now(&self) -> Instant {
		Instant::now()
	}

	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// Simulated time. `sleep` advances the clock instead of waiting, so a
/// polling loop with a 60s timeout finishes instantly and deterministically.
#[derive(Debug)]
pub struct ManualClock {
	origin: Instant,
	elapsed: Mutex<Duration>,
}

impl ManualClock {
	pub fn new() -> Self {
		Self {
			origin: Instant::now(),
			elapsed: Mutex::new(Duration::ZERO),
		}
	}

	pub fn advance(&self, by: Duration) {
		let mut elapsed = match self.elapsed.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		*elapsed += by;
	}

	/// Simulated time since construction.
	pub fn elapsed(&self) -> Duration {
		match self.elapsed.lock() {
			Ok(guard) => *guard,
			Err(poisoned) => *poisoned.into_inner(),
		}
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.origin + self.elapsed()
	}

	async fn sleep(&self, duration: Duration) {
		self.advance(duration);
		tokio::task::yield_now().await;
	}
}
