// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
	value: V,
	expires_at: Instant,
	last_used: Instant,
}

/// Bounded map whose entries expire after a fixed TTL.
///
/// Time is passed in so callers can drive it from a [`crate::clock::Clock`].
/// Expired entries are dropped lazily on lookup and in bulk by [`sweep`].
///
/// [`sweep`]: ExpiringCache::sweep
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
	entries: HashMap<K, Entry<V>>,
	ttl: Duration,
	max_entries: usize,
}

impl<K, V> ExpiringCache<K, V>
where
	K: Eq + Hash + Clone,
	V: Clone,
{
	pub fn new(ttl: Duration, max_entries: usize) -> Self {
		Self {
			entries: HashMap::new(),
			ttl,
			max_entries: max_entries.max(1),
		}
	}

	pub fn insert(&mut self, key: K, value: V, now: Instant) {
		if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
			self.sweep(now);
			if self.entries.len() >= self.max_entries {
				self.evict_lru();
			}
		}

		self.entries.insert(
			key,
			Entry {
				value,
				expires_at: now + self.ttl,
				last_used: now,
			},
		);
	}

	pub fn get(&mut self, key: &K, now: Instant) -> Option<V> {
		match self.entries.get_mut(key) {
			Some(entry) if entry.expires_at > now => {
				entry.last_used = now;
				Some(entry.value.clone())
			}
			Some(_) => {
				self.entries.remove(key);
				None
			}
			None => None,
		}
	}

	/// Drop every expired entry and return how many were removed.
	pub fn sweep(&mut self, now: Instant) -> usize {
		let before = self.entries.len();
		self.entries.retain(|_, entry| entry.expires_at > now);
		before - self.entries.len()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn evict_lru(&mut self) {
		if let Some(oldest) = self
			.entries
			.iter()
			.min_by_key(|(_, entry)| entry.last_used)
			.map(|(k, _)| k.clone())
		{
			self.entries.remove(&oldest);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	const TTL: Duration = Duration::from_secs(60);

	#[test]
	fn hit_then_expire() {
		let t0 = Instant::now();
		let mut cache = ExpiringCache::new(TTL, 10);
		cache.insert("a", true, t0);
		assert_eq!(cache.get(&"a", t0 + Duration::from_secs(59)), Some(true));
		assert_eq!(cache.get(&"a", t0 + TTL), None);
		assert!(cache.is_empty());
	}

	#[test]
	fn sweep_removes_only_expired() {
		let t0 = Instant::now();
		let mut cache = ExpiringCache::new(TTL, 10);
		cache.insert("old", 1, t0);
		cache.insert("new", 2, t0 + Duration::from_secs(30));
		assert_eq!(cache.sweep(t0 + Duration::from_secs(61)), 1);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get(&"new", t0 + Duration::from_secs(61)), Some(2));
	}

	#[test]
	fn full_cache_evicts_least_recently_used() {
		let t0 = Instant::now();
		let mut cache = ExpiringCache::new(TTL, 2);
		cache.insert("a", 1, t0);
		cache.insert("b", 2, t0 + Duration::from_secs(1));
		cache.get(&"a", t0 + Duration::from_secs(2));
		cache.insert("c", 3, t0 + Duration::from_secs(3));

		let now = t0 + Duration::from_secs(4);
		assert_eq!(cache.get(&"b", now), None);
		assert_eq!(cache.get(&"a", now), Some(1));
		assert_eq!(cache.get(&"c", now), Some(3));
	}

	#[test]
	fn full_cache_prefers_dropping_expired_entries() {
		let t0 = Instant::now();
		let mut cache = ExpiringCache::new(TTL, 2);
		cache.insert("stale", 1, t0);
		cache.insert("fresh", 2, t0 + Duration::from_secs(50));
		cache.insert("newest", 3, t0 + Duration::from_secs(70));
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get(&"fresh", t0 + Duration::from_secs(70)), Some(2));
	}

	proptest! {
		#[test]
		fn never_exceeds_capacity(keys in proptest::collection::vec(0u8..32, 0..200), cap in 1usize..16) {
			let t0 = Instant::now();
			let mut cache = ExpiringCache::new(TTL, cap);
			for (i, key) in keys.into_iter().enumerate() {
				cache.insert(key, i, t0 + Duration::from_millis(i as u64));
				prop_assert!(cache.len() <= cap);
			}
		}
	}
}
