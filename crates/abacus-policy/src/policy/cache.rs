//! Decision cache.
//!
//! Decisions are memoized under a [`CacheKey`]: the organization, the subject
//! and a SHA-256 fingerprint of every context field that can influence the
//! decision. The timestamp is left out of the fingerprint; the evaluator does
//! not cache decisions that depend on the clock.
//!
//! [`DecisionCache`] is the port the evaluator talks to. [`InMemoryDecisionCache`]
//! is the default, process-local implementation backed by a [`moka`] cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use abacus_core::canonical_json;
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::AbacResult;
use crate::policy::context::EvaluationContext;
use crate::policy::engine::EvaluationResult;

// =============================================================================
// Cache key
// =============================================================================

/// Key of a cached decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub organization_id: String,
    pub subject_id: String,
    pub fingerprint: String,
}

impl CacheKey {
    /// Build the key of a context.
    #[must_use]
    pub fn from_context(context: &EvaluationContext) -> Self {
        let mut roles = context.subject.roles.clone();
        roles.sort();
        let mut groups = context.subject.groups.clone();
        groups.sort();

        let material = json!({
            "subject": {
                "id": context.subject.id,
                "roles": roles,
                "groups": groups,
                "attributes": context.subject.attributes,
            },
            "resource": {
                "type": context.resource.resource_type,
                "id": context.resource.id,
                "attributes": context.resource.attributes,
            },
            "action": context.action,
            "environment": {
                "ipAddress": context.environment.ip_address,
                "attributes": context.environment.attributes,
            },
            "organizationId": context.organization_id,
        });

        let digest = Sha256::digest(canonical_json(&material).as_bytes());
        Self {
            organization_id: context.organization_id.clone(),
            subject_id: context.subject.id.clone(),
            fingerprint: hex::encode(digest),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "abac:{}:{}:{}",
            self.organization_id, self.subject_id, self.fingerprint
        )
    }
}

// =============================================================================
// Cache port
// =============================================================================

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Fraction of lookups served from cache.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Decision cache port.
///
/// Failures are never fatal to evaluation: the evaluator logs them and
/// evaluates without the cache.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    /// Look up a decision. Expired entries are misses.
    async fn get(&self, key: &CacheKey) -> AbacResult<Option<EvaluationResult>>;

    /// Store a decision for `ttl`.
    async fn set(&self, key: CacheKey, value: EvaluationResult, ttl: Duration) -> AbacResult<()>;

    /// Drop every decision of a subject in an organization. Returns the number removed.
    async fn invalidate_user(&self, user_id: &str, organization_id: &str) -> AbacResult<usize>;

    /// Drop every decision of an organization. Returns the number removed.
    async fn invalidate_organization(&self, organization_id: &str) -> AbacResult<usize>;

    /// Drop everything.
    async fn clear(&self) -> AbacResult<()>;

    /// Current statistics.
    fn stats(&self) -> CacheStats;
}

// =============================================================================
// In-memory implementation
// =============================================================================

#[derive(Debug, Clone)]
struct CachedDecision {
    result: EvaluationResult,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct DecisionExpiry;

impl Expiry<CacheKey, CachedDecision> for DecisionExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedDecision,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CachedDecision,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Process-local decision cache.
///
/// Safe for concurrent use. Capacity and expiry are enforced by moka during
/// its housekeeping, so a full cache may briefly hold a few extra entries.
#[derive(Debug)]
pub struct InMemoryDecisionCache {
    entries: Cache<CacheKey, CachedDecision>,
    counters: Arc<Counters>,
}

impl InMemoryDecisionCache {
    /// Create a cache holding at most `max_entries` decisions.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let counters = Arc::new(Counters::default());
        let evicted = Arc::clone(&counters);
        let entries = Cache::builder()
            .max_capacity(max_entries.max(1) as u64)
            .expire_after(DecisionExpiry)
            .eviction_listener(move |_key, _value, cause: RemovalCause| {
                if cause.was_evicted() {
                    evicted.evictions.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();
        Self { entries, counters }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    /// Returns `true` if no live entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions and expirations.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    async fn remove_where(&self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let keys: Vec<Arc<CacheKey>> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(key.as_ref()))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key.as_ref()).await.is_some() {
                removed += 1;
            }
        }
        self.counters
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

impl Default for InMemoryDecisionCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DecisionCache for InMemoryDecisionCache {
    async fn get(&self, key: &CacheKey) -> AbacResult<Option<EvaluationResult>> {
        match self.entries.get(key).await {
            Some(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.result))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: CacheKey, value: EvaluationResult, ttl: Duration) -> AbacResult<()> {
        self.entries
            .insert(key, CachedDecision { result: value, ttl })
            .await;
        self.counters.insertions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn invalidate_user(&self, user_id: &str, organization_id: &str) -> AbacResult<usize> {
        let removed = self
            .remove_where(|key| key.subject_id == user_id && key.organization_id == organization_id)
            .await;
        tracing::debug!(user_id = %user_id, organization_id = %organization_id, removed, "Invalidated user decisions");
        Ok(removed)
    }

    async fn invalidate_organization(&self, organization_id: &str) -> AbacResult<usize> {
        let removed = self
            .remove_where(|key| key.organization_id == organization_id)
            .await;
        tracing::debug!(organization_id = %organization_id, removed, "Invalidated organization decisions");
        Ok(removed)
    }

    async fn clear(&self) -> AbacResult<()> {
        self.remove_where(|_| true).await;
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            insertions: self.counters.insertions.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn context(subject: &str, org: &str) -> EvaluationContext {
        EvaluationContext::builder(subject, org)
            .roles(["b", "a"])
            .resource_type("product")
            .action("read")
            .build()
    }

    fn result(allowed: bool) -> EvaluationResult {
        EvaluationResult {
            allowed,
            ..Default::default()
        }
    }

    #[test]
    fn test_key_is_stable_and_ignores_timestamp() {
        let a = context("u-1", "org-1");
        let mut b = a.clone();
        b.environment.timestamp = datetime!(2020-01-01 00:00 UTC);
        b.subject.roles = vec!["a".to_string(), "b".to_string()];
        assert_eq!(CacheKey::from_context(&a), CacheKey::from_context(&b));

        let mut c = a.clone();
        c.action = "delete".to_string();
        assert_ne!(CacheKey::from_context(&a), CacheKey::from_context(&c));

        let key = CacheKey::from_context(&a);
        assert_eq!(key.fingerprint.len(), 64);
        assert!(key.to_string().starts_with("abac:org-1:u-1:"));
    }

    #[tokio::test]
    async fn test_get_set_and_stats() {
        let cache = InMemoryDecisionCache::new(10);
        let key = CacheKey::from_context(&context("u-1", "org-1"));

        assert!(cache.get(&key).await.unwrap().is_none());
        cache
            .set(key.clone(), result(true), Duration::from_secs(60))
            .await
            .unwrap();
        let hit = cache.get(&key).await.unwrap().unwrap();
        assert!(hit.allowed);

        cache.run_pending_tasks().await;
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryDecisionCache::new(10);
        let key = CacheKey::from_context(&context("u-1", "org-1"));
        cache
            .set(key.clone(), result(true), Duration::ZERO)
            .await
            .unwrap();

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.run_pending_tasks().await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidation() {
        let cache = InMemoryDecisionCache::new(10);
        let ttl = Duration::from_secs(60);
        for (subject, org) in [("u-1", "org-1"), ("u-2", "org-1"), ("u-1", "org-2")] {
            cache
                .set(CacheKey::from_context(&context(subject, org)), result(true), ttl)
                .await
                .unwrap();
        }

        assert_eq!(cache.invalidate_user("u-1", "org-1").await.unwrap(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.invalidate_organization("org-1").await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 3);
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let cache = InMemoryDecisionCache::new(2);
        let ttl = Duration::from_secs(60);
        let keys: Vec<CacheKey> = ["u-1", "u-2", "u-3"]
            .iter()
            .map(|s| CacheKey::from_context(&context(s, "org-1")))
            .collect();

        for key in &keys {
            cache.set(key.clone(), result(true), ttl).await.unwrap();
        }
        cache.run_pending_tasks().await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.stats().evictions, 1);
    }
}
