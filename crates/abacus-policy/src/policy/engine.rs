//! Policy evaluation engine.
//!
//! The [`PolicyEvaluator`] is the policy decision point for a single
//! organization. It fetches the candidate policies, runs every one through
//! the [`ConditionMatcher`], and combines the matches with deny-overrides:
//!
//! ```text
//! allowed = no deny matched AND at least one allow matched
//! ```
//!
//! Priority never outweighs a deny. It only fixes the order in which
//! policies are examined, and therefore the order of `reasons`: higher
//! priority first, deny before allow at equal priority, then policy id.
//!
//! Evaluation never fails. Store errors and other unexpected conditions turn
//! into a fail-closed result carrying the error message.
//!
//! Decisions are memoized in an optional [`DecisionCache`]. Cache writes are
//! spawned and not awaited; cache failures only cost a cache miss. A decision
//! is not cached when one of its candidate policies depends on the clock,
//! since the cache key does not cover `environment.timestamp`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::AbacResult;
use crate::policy::cache::{CacheKey, DecisionCache};
use crate::policy::context::EvaluationContext;
use crate::policy::matcher::ConditionMatcher;
use crate::policy::resources::{Policy, PolicyEffect};
use crate::storage::PolicyStore;

/// Default lifetime of a cached decision.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Reason recorded when nothing matched.
pub const NO_MATCHING_POLICIES: &str = "No matching policies found";

// =============================================================================
// Evaluation Result
// =============================================================================

/// Summary of a policy that matched a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPolicy {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub effect: PolicyEffect,
    pub organization_id: String,
}

impl From<&Policy> for MatchedPolicy {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id.clone(),
            name: policy.name.clone(),
            priority: policy.priority,
            effect: policy.effect,
            organization_id: policy.organization_id.clone(),
        }
    }
}

/// Explained outcome of an evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Final decision.
    pub allowed: bool,

    /// Allow policies that matched.
    pub matched_policies: Vec<MatchedPolicy>,

    /// Deny policies that matched.
    pub denied_policies: Vec<MatchedPolicy>,

    /// Human-readable explanation, in evaluation order.
    pub reasons: Vec<String>,

    /// Wall time spent, in milliseconds.
    pub evaluation_time_ms: f64,

    /// Served from the decision cache.
    #[serde(default)]
    pub cached: bool,

    /// Set when the result was produced by a fail-closed error path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    /// A plain deny with one reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            reasons: vec![reason.into()],
            ..Default::default()
        }
    }

    /// A deny produced by an evaluation error.
    #[must_use]
    pub fn fail_closed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            reasons: vec![format!("Evaluation error: {error}")],
            error: Some(error),
            ..Default::default()
        }
    }

    /// Returns `true` if an explicit allow or deny was reached.
    #[must_use]
    pub fn is_decisive(&self) -> bool {
        self.allowed || !self.denied_policies.is_empty()
    }

    /// Returns `true` if this result came from the error path.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    fn stamp(mut self, started: Instant) -> Self {
        self.evaluation_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self
    }
}

// =============================================================================
// Policy Evaluator
// =============================================================================

/// Sort policies into evaluation order.
pub fn sort_policies(policies: &mut [Policy]) {
    policies.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.effect.is_deny().cmp(&a.effect.is_deny()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Evaluates contexts against the policies of their organization.
pub struct PolicyEvaluator {
    store: Arc<dyn PolicyStore>,
    matcher: Arc<ConditionMatcher>,
    cache: Option<Arc<dyn DecisionCache>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEvaluator")
            .field("matcher", &self.matcher)
            .field("cached", &self.cache.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl PolicyEvaluator {
    /// Create an evaluator without a decision cache.
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>, matcher: Arc<ConditionMatcher>) -> Self {
        Self {
            store,
            matcher,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Attach a decision cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn DecisionCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// The attached decision cache.
    #[must_use]
    pub fn cache(&self) -> Option<&Arc<dyn DecisionCache>> {
        self.cache.as_ref()
    }

    /// The condition matcher.
    #[must_use]
    pub fn matcher(&self) -> &Arc<ConditionMatcher> {
        &self.matcher
    }

    /// The policy store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Evaluate a context. Never fails; errors produce a fail-closed result.
    pub async fn evaluate(&self, context: &EvaluationContext) -> EvaluationResult {
        let started = Instant::now();
        let key = self.cache.as_ref().map(|_| CacheKey::from_context(context));

        if let Some(key) = &key
            && let Some(hit) = self.lookup(key).await
        {
            return hit.stamp(started);
        }

        self.evaluate_miss(context, key, started).await
    }

    /// Evaluate many contexts.
    ///
    /// Every cache key is looked up first; only the misses are evaluated, all
    /// concurrently. Results keep the input order.
    pub async fn batch_evaluate(&self, contexts: &[EvaluationContext]) -> Vec<EvaluationResult> {
        let started = Instant::now();
        let keys: Vec<Option<CacheKey>> = contexts
            .iter()
            .map(|c| self.cache.as_ref().map(|_| CacheKey::from_context(c)))
            .collect();

        let mut results: Vec<Option<EvaluationResult>> =
            join_all(keys.iter().map(|key| async move {
                match key {
                    Some(key) => self.lookup(key).await.map(|hit| hit.stamp(started)),
                    None => None,
                }
            }))
            .await;

        let misses: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        tracing::debug!(
            total = contexts.len(),
            misses = misses.len(),
            "Batch evaluation"
        );

        let computed = join_all(
            misses
                .iter()
                .map(|&i| self.evaluate_miss(&contexts[i], keys[i].clone(), Instant::now())),
        )
        .await;

        for (i, result) in misses.into_iter().zip(computed) {
            results[i] = Some(result);
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| EvaluationResult::fail_closed("missing batch result")))
            .collect()
    }

    /// Fetch candidate policies and decide, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the policy store error.
    pub async fn evaluate_uncached(
        &self,
        context: &EvaluationContext,
    ) -> AbacResult<EvaluationResult> {
        self.fetch_and_decide(context)
            .await
            .map(|(result, _)| result)
    }

    /// Decide and report whether the decision may be cached.
    async fn fetch_and_decide(
        &self,
        context: &EvaluationContext,
    ) -> AbacResult<(EvaluationResult, bool)> {
        let policies = self
            .store
            .find_applicable_policies(
                &context.organization_id,
                &context.subject.roles,
                Some(&context.subject.id),
            )
            .await?;
        let cacheable = !policies.iter().any(|p| {
            p.is_active
                && p.covers_action(&context.action)
                && p.resources.covers_type(&context.resource.resource_type)
                && p.depends_on_time()
        });
        Ok((self.decide(policies, context), cacheable))
    }

    /// Combine candidate policies for a context with deny-overrides.
    #[must_use]
    pub fn decide(&self, mut policies: Vec<Policy>, context: &EvaluationContext) -> EvaluationResult {
        policies.retain(|p| p.is_active && p.organization_id == context.organization_id);
        sort_policies(&mut policies);

        let document = context.variable_document();
        let mut result = EvaluationResult::default();

        for policy in &policies {
            if !self
                .matcher
                .matches_with_document(policy, context, &document)
            {
                continue;
            }

            tracing::debug!(
                policy_id = %policy.id,
                effect = %policy.effect,
                priority = policy.priority,
                action = %context.action,
                resource_type = %context.resource.resource_type,
                "Policy matched"
            );

            match policy.effect {
                PolicyEffect::Allow => {
                    result.reasons.push(format!(
                        "Allowed by policy '{}' ({})",
                        policy.name, policy.id
                    ));
                    result.matched_policies.push(MatchedPolicy::from(policy));
                }
                PolicyEffect::Deny => {
                    result.reasons.push(format!(
                        "Denied by policy '{}' ({})",
                        policy.name, policy.id
                    ));
                    result.denied_policies.push(MatchedPolicy::from(policy));
                }
            }
        }

        result.allowed = result.denied_policies.is_empty() && !result.matched_policies.is_empty();

        if result.matched_policies.is_empty() && result.denied_policies.is_empty() {
            result.reasons.push(NO_MATCHING_POLICIES.to_string());
        } else if !result.denied_policies.is_empty() && !result.matched_policies.is_empty() {
            result.reasons.push(format!(
                "Deny overrides {} matching allow polic{}",
                result.matched_policies.len(),
                if result.matched_policies.len() == 1 { "y" } else { "ies" }
            ));
        }

        result
    }

    async fn lookup(&self, key: &CacheKey) -> Option<EvaluationResult> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(mut hit)) => {
                tracing::trace!(cache_key = %key, "Decision cache hit");
                hit.cached = true;
                Some(hit)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, cache_key = %key, "Decision cache lookup failed");
                None
            }
        }
    }

    async fn evaluate_miss(
        &self,
        context: &EvaluationContext,
        key: Option<CacheKey>,
        started: Instant,
    ) -> EvaluationResult {
        match self.fetch_and_decide(context).await {
            Ok((result, cacheable)) => {
                let result = result.stamp(started);
                match key {
                    Some(key) if cacheable => self.store_in_cache(key, result.clone()).await,
                    Some(key) => {
                        tracing::trace!(cache_key = %key, "Time-dependent decision not cached");
                    }
                    None => {}
                }
                result
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    category = %e.category(),
                    subject_id = %context.subject.id,
                    organization_id = %context.organization_id,
                    action = %context.action,
                    resource_type = %context.resource.resource_type,
                    "Policy evaluation failed, denying"
                );
                EvaluationResult::fail_closed(e.to_string()).stamp(started)
            }
        }
    }

    /// Write a decision without making the caller wait.
    async fn store_in_cache(&self, key: CacheKey, result: EvaluationResult) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let ttl = self.cache_ttl;

        let write = async move {
            if let Err(e) = cache.set(key, result, ttl).await {
                tracing::warn!(error = %e, "Decision cache write failed");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(write);
            }
            Err(_) => write.await,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AbacError;
    use crate::policy::cache::InMemoryDecisionCache;
    use crate::policy::resources::{
        PolicyInput, ResourceCriteria, SubjectCriteria, TimeWindow,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;
    use time::macros::datetime;

    struct MockPolicyStore {
        policies: RwLock<Vec<Policy>>,
        calls: AtomicUsize,
        fail: AtomicBool,
        failing_org: RwLock<Option<String>>,
    }

    impl MockPolicyStore {
        fn new(policies: Vec<Policy>) -> Self {
            Self {
                policies: RwLock::new(policies),
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                failing_org: RwLock::new(None),
            }
        }

        fn fail_for(&self, organization_id: &str) {
            *self.failing_org.write().unwrap() = Some(organization_id.to_string());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PolicyStore for MockPolicyStore {
        async fn find_applicable_policies(
            &self,
            organization_id: &str,
            _roles: &[String],
            _user_id: Option<&str>,
        ) -> AbacResult<Vec<Policy>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst)
                || self.failing_org.read().unwrap().as_deref() == Some(organization_id)
            {
                return Err(AbacError::storage("store unavailable"));
            }
            self.find_by_organization(organization_id).await
        }

        async fn find_by_organization(&self, organization_id: &str) -> AbacResult<Vec<Policy>> {
            Ok(self
                .policies
                .read()
                .unwrap()
                .iter()
                .filter(|p| p.organization_id == organization_id)
                .cloned()
                .collect())
        }
    }

    fn policy(id: &str, effect: PolicyEffect, priority: i32, action: &str) -> Policy {
        PolicyInput {
            name: format!("policy {id}"),
            effect,
            priority,
            subjects: SubjectCriteria {
                roles: vec!["user".to_string()],
                ..Default::default()
            },
            resources: ResourceCriteria {
                types: vec!["product".to_string()],
                ..Default::default()
            },
            actions: vec![action.to_string()],
            organization_id: "org-1".to_string(),
            ..Default::default()
        }
        .into_policy(id.to_string(), None)
    }

    fn context(action: &str) -> EvaluationContext {
        EvaluationContext::builder("user-1", "org-1")
            .role("user")
            .resource_type("product")
            .action(action)
            .timestamp(datetime!(2024-05-01 18:00 UTC))
            .build()
    }

    fn evaluator(store: Arc<MockPolicyStore>) -> PolicyEvaluator {
        PolicyEvaluator::new(store, Arc::new(ConditionMatcher::new()))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_allow_when_allow_matches() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        let result = evaluator(store).evaluate(&context("read")).await;

        assert!(result.allowed);
        assert_eq!(result.matched_policies.len(), 1);
        assert!(result.denied_policies.is_empty());
        assert!(result.reasons[0].contains("p-1"));
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn test_default_deny_without_matches() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        let result = evaluator(store).evaluate(&context("delete")).await;

        assert!(!result.allowed);
        assert!(!result.is_decisive());
        assert_eq!(result.reasons, vec![NO_MATCHING_POLICIES.to_string()]);
    }

    #[tokio::test]
    async fn test_deny_overrides_higher_priority_allow() {
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("allow-high", PolicyEffect::Allow, 1000, "read"),
            policy("allow-mid", PolicyEffect::Allow, 500, "read"),
            policy("deny-low", PolicyEffect::Deny, 0, "read"),
        ]));
        let result = evaluator(store).evaluate(&context("read")).await;

        assert!(!result.allowed);
        assert_eq!(result.matched_policies.len(), 2);
        assert_eq!(result.denied_policies.len(), 1);
        assert!(result.is_decisive());
    }

    #[tokio::test]
    async fn test_time_window_deny_after_hours() {
        let mut after_hours = policy("deny-night", PolicyEffect::Deny, 40, "delete");
        after_hours.conditions.time_window = Some(TimeWindow {
            start: "17:00".to_string(),
            end: "09:00".to_string(),
            days: None,
            timezone: None,
        });
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("allow-delete", PolicyEffect::Allow, 50, "delete"),
            after_hours,
        ]));
        let evaluator = evaluator(store);

        let result = evaluator.evaluate(&context("delete")).await;
        assert!(!result.allowed);
        assert_eq!(result.denied_policies.len(), 1);
        assert_eq!(result.matched_policies.len(), 1);

        let mut daytime = context("delete");
        daytime.environment.timestamp = datetime!(2024-05-01 12:00 UTC);
        assert!(evaluator.evaluate(&daytime).await.allowed);
    }

    #[tokio::test]
    async fn test_time_window_decision_not_served_from_cache() {
        let mut after_hours = policy("deny-night", PolicyEffect::Deny, 40, "delete");
        after_hours.conditions.time_window = Some(TimeWindow {
            start: "17:00".to_string(),
            end: "09:00".to_string(),
            days: None,
            timezone: None,
        });
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("allow-delete", PolicyEffect::Allow, 50, "delete"),
            after_hours,
        ]));
        let cache = Arc::new(InMemoryDecisionCache::new(100));
        let evaluator = evaluator(store.clone()).with_cache(cache.clone(), DEFAULT_CACHE_TTL);

        let mut noon = context("delete");
        noon.environment.timestamp = datetime!(2024-05-01 12:00 UTC);
        assert!(evaluator.evaluate(&noon).await.allowed);
        settle().await;

        let evening = evaluator.evaluate(&context("delete")).await;
        assert!(!evening.allowed);
        assert!(!evening.cached);
        assert_eq!(evening.denied_policies.len(), 1);
        assert_eq!(store.calls(), 2);
        assert_eq!(cache.stats().insertions, 0);
    }

    #[tokio::test]
    async fn test_reason_order_follows_priority() {
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("b-allow", PolicyEffect::Allow, 10, "read"),
            policy("a-allow", PolicyEffect::Allow, 10, "read"),
            policy("c-deny", PolicyEffect::Deny, 10, "read"),
            policy("d-allow", PolicyEffect::Allow, 90, "read"),
        ]));
        let result = evaluator(store).evaluate(&context("read")).await;

        let ids: Vec<&str> = result
            .matched_policies
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["d-allow", "a-allow", "b-allow"]);
        assert!(result.reasons[0].contains("d-allow"));
        assert!(result.reasons[1].contains("c-deny"));
    }

    #[tokio::test]
    async fn test_inactive_and_foreign_policies_ignored() {
        let mut inactive = policy("inactive", PolicyEffect::Deny, 10, "read");
        inactive.is_active = false;
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("allow", PolicyEffect::Allow, 10, "read"),
            inactive,
        ]));
        assert!(evaluator(store).evaluate(&context("read")).await.allowed);
    }

    #[tokio::test]
    async fn test_repeated_evaluation_is_idempotent() {
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("allow", PolicyEffect::Allow, 10, "read"),
            policy("deny", PolicyEffect::Deny, 5, "read"),
        ]));
        let evaluator = evaluator(store);
        let first = evaluator.evaluate(&context("read")).await;
        let second = evaluator.evaluate(&context("read")).await;

        assert_eq!(first.allowed, second.allowed);
        assert_eq!(first.matched_policies, second.matched_policies);
        assert_eq!(first.denied_policies, second.denied_policies);
        assert_eq!(first.reasons, second.reasons);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        store.fail.store(true, Ordering::SeqCst);
        let result = evaluator(store).evaluate(&context("read")).await;

        assert!(!result.allowed);
        assert!(result.matched_policies.is_empty());
        assert!(result.denied_policies.is_empty());
        assert!(result.is_error());
        assert!(result.reasons[0].starts_with("Evaluation error"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        let cache = Arc::new(InMemoryDecisionCache::new(100));
        let evaluator = evaluator(store.clone()).with_cache(cache.clone(), DEFAULT_CACHE_TTL);

        let first = evaluator.evaluate(&context("read")).await;
        settle().await;
        let second = evaluator.evaluate(&context("read")).await;

        assert!(first.allowed && second.allowed);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(store.calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_expired_cache_entry_reevaluates() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        let cache = Arc::new(InMemoryDecisionCache::new(100));
        let evaluator = evaluator(store.clone()).with_cache(cache, Duration::ZERO);

        evaluator.evaluate(&context("read")).await;
        settle().await;
        let second = evaluator.evaluate(&context("read")).await;

        assert!(!second.cached);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_error_results_are_not_cached() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        let cache = Arc::new(InMemoryDecisionCache::new(100));
        let evaluator = evaluator(store.clone()).with_cache(cache.clone(), DEFAULT_CACHE_TTL);

        store.fail.store(true, Ordering::SeqCst);
        assert!(evaluator.evaluate(&context("read")).await.is_error());
        settle().await;
        assert!(cache.is_empty());

        store.fail.store(false, Ordering::SeqCst);
        assert!(evaluator.evaluate(&context("read")).await.allowed);
    }

    #[tokio::test]
    async fn test_batch_evaluate_preserves_order_and_uses_cache() {
        let store = Arc::new(MockPolicyStore::new(vec![policy(
            "p-1",
            PolicyEffect::Allow,
            10,
            "read",
        )]));
        let cache = Arc::new(InMemoryDecisionCache::new(100));
        let evaluator = evaluator(store.clone()).with_cache(cache, DEFAULT_CACHE_TTL);

        evaluator.evaluate(&context("read")).await;
        settle().await;
        assert_eq!(store.calls(), 1);

        let results = evaluator
            .batch_evaluate(&[context("delete"), context("read"), context("update")])
            .await;

        assert_eq!(results.len(), 3);
        assert!(!results[0].allowed);
        assert!(results[1].allowed);
        assert!(results[1].cached);
        assert!(!results[2].allowed);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_failure_isolated() {
        let mut other_org = policy("p-2", PolicyEffect::Allow, 10, "read");
        other_org.organization_id = "org-2".to_string();
        let store = Arc::new(MockPolicyStore::new(vec![
            policy("p-1", PolicyEffect::Allow, 10, "read"),
            other_org,
        ]));
        store.fail_for("org-2");
        let evaluator = evaluator(store.clone());

        let mut failing = context("read");
        failing.organization_id = "org-2".to_string();
        let results = evaluator
            .batch_evaluate(&[context("read"), failing, context("delete")])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].allowed);
        assert!(!results[0].is_error());
        assert!(!results[1].allowed);
        assert!(results[1].is_error());
        assert!(results[1].reasons[0].starts_with("Evaluation error"));
        assert!(!results[2].allowed);
        assert!(!results[2].is_error());
        assert_eq!(results[2].reasons, vec![NO_MATCHING_POLICIES.to_string()]);
    }

    #[test]
    fn test_sort_policies() {
        let mut policies = vec![
            policy("b", PolicyEffect::Allow, 5, "read"),
            policy("a", PolicyEffect::Deny, 5, "read"),
            policy("c", PolicyEffect::Allow, 50, "read"),
        ];
        sort_policies(&mut policies);
        let ids: Vec<&str> = policies.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
