//! Condition matching for policy evaluation.
//!
//! The [`ConditionMatcher`] decides whether a single [`Policy`] applies to an
//! [`EvaluationContext`]. All checks are pure. A policy matches only when
//! every declared criterion matches:
//!
//! 1. action (literal or `*`)
//! 2. subject criteria (users, roles, groups, attribute predicates)
//! 3. resource criteria (types, ids, attribute predicates)
//! 4. conditions (time window, IP allow/deny lists, locations, then custom hooks)
//!
//! Malformed criteria never raise: they simply do not match.
//!
//! # Usage
//!
//! ```ignore
//! use abacus_policy::policy::matcher::ConditionMatcher;
//!
//! let matcher = ConditionMatcher::new();
//! if matcher.matches(&policy, &context) {
//!     // policy applies
//! }
//! ```

pub mod attributes;
pub mod network;
pub mod time_window;
pub mod variables;

use std::collections::HashMap;
use std::sync::Arc;

use abacus_core::resolve_in_map;
use moka::sync::Cache;
use regex::Regex;
use serde_json::{Map, Value};

use crate::policy::context::EvaluationContext;
use crate::policy::resources::{Policy, PolicyConditions, ResourceCriteria, SubjectCriteria};

pub use attributes::compare;
pub use variables::substitute;

/// Environment attribute holding the request location.
pub const LOCATION_ATTRIBUTE: &str = "location";

// =============================================================================
// Regex cache
// =============================================================================

/// Patterns kept by a default [`RegexCache`].
pub const DEFAULT_REGEX_CACHE_CAPACITY: u64 = 1024;

/// Compiled regular expressions keyed by pattern source.
///
/// Bounded, since patterns are cached after variable substitution and a
/// pattern built from `${subject.id}` differs per subject.
#[derive(Debug)]
pub struct RegexCache {
    cache: Cache<String, Regex>,
}

impl RegexCache {
    /// Create a cache with [`DEFAULT_REGEX_CACHE_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGEX_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` compiled patterns.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity.max(1)),
        }
    }

    /// Test `text` against `pattern`. Invalid patterns never match.
    #[must_use]
    pub fn is_match(&self, pattern: &str, text: &str) -> bool {
        self.get_or_compile(pattern)
            .is_some_and(|re| re.is_match(text))
    }

    /// Number of cached patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.iter().count()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_compile(&self, pattern: &str) -> Option<Regex> {
        if let Some(re) = self.cache.get(pattern) {
            return Some(re);
        }

        let re = Regex::new(pattern).ok()?;
        self.cache.insert(pattern.to_string(), re.clone());
        Some(re)
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Custom condition hooks
// =============================================================================

/// A named predicate referenced from `conditions.custom`.
///
/// The arguments have already had their `${…}` variables substituted.
pub trait CustomConditionHook: Send + Sync {
    /// Returns `true` if the condition holds for the context.
    fn evaluate(&self, args: &Value, context: &EvaluationContext) -> bool;
}

impl<F> CustomConditionHook for F
where
    F: Fn(&Value, &EvaluationContext) -> bool + Send + Sync,
{
    fn evaluate(&self, args: &Value, context: &EvaluationContext) -> bool {
        self(args, context)
    }
}

// =============================================================================
// Condition matcher
// =============================================================================

/// Matches policies against evaluation contexts.
#[derive(Default)]
pub struct ConditionMatcher {
    regexes: RegexCache,
    hooks: HashMap<String, Arc<dyn CustomConditionHook>>,
}

impl std::fmt::Debug for ConditionMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionMatcher")
            .field("regexes", &self.regexes.len())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConditionMatcher {
    /// Create a matcher without custom hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom condition hook under `name`.
    #[must_use]
    pub fn with_hook(mut self, name: impl Into<String>, hook: Arc<dyn CustomConditionHook>) -> Self {
        self.hooks.insert(name.into(), hook);
        self
    }

    /// Returns `true` if a hook named `name` is registered.
    #[must_use]
    pub fn has_hook(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Shared regex cache.
    #[must_use]
    pub fn regexes(&self) -> &RegexCache {
        &self.regexes
    }

    /// Check whether `policy` applies to `context`.
    #[must_use]
    pub fn matches(&self, policy: &Policy, context: &EvaluationContext) -> bool {
        let document = context.variable_document();
        self.matches_with_document(policy, context, &document)
    }

    /// Same as [`matches`](Self::matches) with a precomputed variable document.
    #[must_use]
    pub fn matches_with_document(
        &self,
        policy: &Policy,
        context: &EvaluationContext,
        document: &Value,
    ) -> bool {
        if !policy.covers_action(&context.action) {
            tracing::trace!(policy_id = %policy.id, action = %context.action, "Action not covered");
            return false;
        }
        if !self.matches_subject(&policy.subjects, context, document) {
            tracing::trace!(policy_id = %policy.id, "Subject criteria not met");
            return false;
        }
        if !self.matches_resource(&policy.resources, context, document) {
            tracing::trace!(policy_id = %policy.id, "Resource criteria not met");
            return false;
        }
        if !self.matches_conditions(&policy.conditions, context, document) {
            tracing::trace!(policy_id = %policy.id, "Conditions not met");
            return false;
        }
        true
    }

    /// Check subject criteria. Declaring nothing matches nobody.
    #[must_use]
    pub fn matches_subject(
        &self,
        criteria: &SubjectCriteria,
        context: &EvaluationContext,
        document: &Value,
    ) -> bool {
        if criteria.is_empty() {
            return false;
        }
        let subject = &context.subject;

        if !criteria.users.is_empty() && !list_contains(&criteria.users, &subject.id) {
            return false;
        }
        if !criteria.roles.is_empty()
            && !subject.roles.iter().any(|r| list_contains(&criteria.roles, r))
            && !criteria.roles.iter().any(|r| r == "*")
        {
            return false;
        }
        if !criteria.groups.is_empty()
            && !subject.groups.iter().any(|g| list_contains(&criteria.groups, g))
            && !criteria.groups.iter().any(|g| g == "*")
        {
            return false;
        }

        self.matches_attributes(&criteria.attributes, &subject.attributes, document)
    }

    /// Check resource criteria. Declaring nothing matches nothing.
    #[must_use]
    pub fn matches_resource(
        &self,
        criteria: &ResourceCriteria,
        context: &EvaluationContext,
        document: &Value,
    ) -> bool {
        if criteria.is_empty() {
            return false;
        }
        let resource = &context.resource;

        if !criteria.covers_type(&resource.resource_type) {
            return false;
        }
        if !criteria.ids.is_empty() {
            let id_matches = resource
                .id
                .as_deref()
                .is_some_and(|id| list_contains(&criteria.ids, id));
            if !id_matches {
                return false;
            }
        }

        self.matches_attributes(&criteria.attributes, &resource.attributes, document)
    }

    /// Check every attribute predicate against an attribute map.
    #[must_use]
    pub fn matches_attributes(
        &self,
        predicates: &Map<String, Value>,
        attributes: &Map<String, Value>,
        document: &Value,
    ) -> bool {
        predicates.iter().all(|(path, expected)| {
            let actual = resolve_in_map(attributes, path);
            let expected = substitute(expected, document);
            compare(actual, &expected, &self.regexes)
        })
    }

    /// Check the condition block. Custom hooks run last.
    #[must_use]
    pub fn matches_conditions(
        &self,
        conditions: &PolicyConditions,
        context: &EvaluationContext,
        document: &Value,
    ) -> bool {
        if let Some(window) = &conditions.time_window
            && !window.contains(context.environment.timestamp)
        {
            return false;
        }

        let ip = context.environment.ip_address.as_deref();
        if !conditions.ip_addresses.is_empty()
            && !ip.is_some_and(|ip| network::ip_in_list(&conditions.ip_addresses, ip))
        {
            return false;
        }
        if let Some(ip) = ip
            && network::ip_in_list(&conditions.blocked_ips, ip)
        {
            return false;
        }

        if !conditions.locations.is_empty() {
            let location = context
                .environment
                .attributes
                .get(LOCATION_ATTRIBUTE)
                .and_then(Value::as_str);
            if !location.is_some_and(|l| list_contains(&conditions.locations, l)) {
                return false;
            }
        }

        conditions.custom.iter().all(|(name, args)| {
            let Some(hook) = self.hooks.get(name) else {
                tracing::warn!(condition = %name, "Unregistered custom condition, treating as not met");
                return false;
            };
            hook.evaluate(&substitute(args, document), context)
        })
    }
}

fn list_contains(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item == "*" || item == value)
}
