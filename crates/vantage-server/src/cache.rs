// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Time-bounded memoization of access decisions.
//!
//! Entries are keyed by (user, KPI) and expire lazily: the computation
//! timestamp is stored alongside the value and checked on read. There is no
//! sweep thread and no invalidation API — a revoked permission or scope may
//! remain effective for up to the TTL. Callers needing immediate consistency
//! resolve through the uncached path instead.
//!
//! Concurrent misses for the same key may recompute redundantly; puts are
//! last-writer-wins, which is safe because any cached value was correct
//! within the staleness budget when computed.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use vantage_core::{AccessDecision, KpiId, UserId};

/// Default time-to-live for cached access decisions.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
	// None caches a NONE decision; a denied resource is as cacheable as a
	// granted one.
	decision: Option<AccessDecision>,
	cached_at: Instant,
}

/// Concurrent TTL cache for resolved access decisions.
#[derive(Debug)]
pub struct ResolutionCache {
	entries: RwLock<HashMap<(UserId, KpiId), CacheEntry>>,
	ttl: Duration,
}

impl Default for ResolutionCache {
	fn default() -> Self {
		Self::new(DEFAULT_TTL)
	}
}

impl ResolutionCache {
	pub fn new(ttl: Duration) -> Self {
		ResolutionCache {
			entries: RwLock::new(HashMap::new()),
			ttl,
		}
	}

	/// The TTL entries are held for.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the cached decision for a key if present and unexpired.
	///
	/// The outer `Option` is hit/miss; the inner one is the decision itself,
	/// where `None` is a cached NONE result.
	pub fn get(&self, user_id: UserId, kpi_id: KpiId) -> Option<Option<AccessDecision>> {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		let entry = entries.get(&(user_id, kpi_id))?;
		if entry.cached_at.elapsed() < self.ttl {
			Some(entry.decision.clone())
		} else {
			None
		}
	}

	/// Stores a decision, overwriting any previous entry for the key.
	pub fn put(&self, user_id: UserId, kpi_id: KpiId, decision: Option<AccessDecision>) {
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		entries.insert(
			(user_id, kpi_id),
			CacheEntry {
				decision,
				cached_at: Instant::now(),
			},
		);
	}

	/// Number of stored entries, expired or not.
	pub fn len(&self) -> usize {
		self
			.entries
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[test]
	fn miss_on_empty_cache() {
		let cache = ResolutionCache::default();
		assert!(cache.get(UserId::generate(), KpiId::generate()).is_none());
	}

	#[test]
	fn hit_within_ttl() {
		let cache = ResolutionCache::default();
		let user_id = UserId::generate();
		let kpi_id = KpiId::generate();

		cache.put(user_id, kpi_id, Some(AccessDecision::Full));
		assert_eq!(cache.get(user_id, kpi_id), Some(Some(AccessDecision::Full)));
	}

	#[test]
	fn caches_none_decisions() {
		let cache = ResolutionCache::default();
		let user_id = UserId::generate();
		let kpi_id = KpiId::generate();

		cache.put(user_id, kpi_id, None);
		// A cached NONE is a hit, not a miss.
		assert_eq!(cache.get(user_id, kpi_id), Some(None));
	}

	#[test]
	fn entry_expires_after_ttl() {
		let cache = ResolutionCache::new(Duration::from_millis(20));
		let user_id = UserId::generate();
		let kpi_id = KpiId::generate();

		cache.put(user_id, kpi_id, Some(AccessDecision::Owner));
		assert!(cache.get(user_id, kpi_id).is_some());

		std::thread::sleep(Duration::from_millis(30));
		assert!(cache.get(user_id, kpi_id).is_none());
	}

	#[test]
	fn put_overwrites_previous_entry() {
		let cache = ResolutionCache::default();
		let user_id = UserId::generate();
		let kpi_id = KpiId::generate();

		cache.put(user_id, kpi_id, Some(AccessDecision::Full));
		cache.put(user_id, kpi_id, None);
		assert_eq!(cache.get(user_id, kpi_id), Some(None));
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn keys_are_per_user_and_resource() {
		let cache = ResolutionCache::default();
		let user_id = UserId::generate();
		let kpi_a = KpiId::generate();
		let kpi_b = KpiId::generate();

		cache.put(user_id, kpi_a, Some(AccessDecision::Full));
		assert!(cache.get(user_id, kpi_b).is_none());
		assert!(cache.get(UserId::generate(), kpi_a).is_none());
	}

	#[test]
	fn concurrent_puts_do_not_corrupt() {
		let cache = Arc::new(ResolutionCache::default());
		let kpi_id = KpiId::generate();

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let cache = Arc::clone(&cache);
				std::thread::spawn(move || {
					let user_id = UserId::generate();
					for _ in 0..100 {
						cache.put(user_id, kpi_id, Some(AccessDecision::Full));
						assert_eq!(cache.get(user_id, kpi_id), Some(Some(AccessDecision::Full)));
					}
				})
			})
			.collect();

		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(cache.len(), 8);
	}
}
