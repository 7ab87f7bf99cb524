//! The access-control decision engine.
//!
//! Components, leaves first:
//!
//! - [`matcher`] - pure predicate evaluation of one policy against one context
//! - [`engine`] - the single-organization evaluator with deny-overrides combining
//! - [`cache`] - fingerprint-keyed decision cache with TTL and invalidation
//! - [`hierarchy`] - ancestor-chain and cross-organization evaluation
//! - [`ability`] - capability and field-permission compilation per user
//! - [`fields`] - payload filtering with audit events
//!
//! Around them sit the policy model ([`resources`]), the evaluation input
//! ([`context`]), write-path attribute validation ([`attributes`]) and policy
//! administration ([`admin`], [`reload`]).
//!
//! # Evaluation Context
//!
//! ```ignore
//! use abacus_policy::policy::{EvaluationContext, PolicyEvaluator};
//!
//! let context = EvaluationContext::builder("user-1", "org-1")
//!     .role("manager")
//!     .resource_type("order")
//!     .resource_attribute("ownerId", "user-1")
//!     .action("update")
//!     .build();
//!
//! let result = evaluator.evaluate(&context).await;
//! if !result.allowed {
//!     for reason in &result.reasons {
//!         println!("{reason}");
//!     }
//! }
//! ```
//!
//! # Combining
//!
//! A decision is an allow only if at least one allow policy matched and no
//! deny policy matched. Priority orders the explanation, never the outcome.

pub mod ability;
pub mod admin;
pub mod attributes;
pub mod cache;
pub mod context;
pub mod engine;
pub mod fields;
pub mod hierarchy;
pub mod matcher;
pub mod reload;
pub mod resources;

#[cfg(test)]
pub(crate) mod testing;

pub use ability::{
    Ability, AbilityCompiler, AbilitySource, AbilityUser, CapabilityRule, CompileOptions,
    CompiledAbility, FieldAccess,
};
pub use admin::PolicyManager;
pub use attributes::AttributeValidator;
pub use cache::{CacheKey, CacheStats, DecisionCache, InMemoryDecisionCache};
pub use context::{
    EnvironmentContext, EvaluationContext, EvaluationContextBuilder, ResourceContext,
    SubjectContext,
};
pub use engine::{EvaluationResult, MatchedPolicy, PolicyEvaluator};
pub use fields::{
    FieldAccessActor, FieldFilter, FieldPermissionSet, FieldPermissions, filter_for_read,
    filter_for_write,
};
pub use hierarchy::HierarchicalEvaluator;
pub use matcher::{ConditionMatcher, CustomConditionHook};
pub use reload::{PolicyChange, PolicyChangeNotifier};
pub use resources::{
    AttributeCategory, AttributeDefinition, AttributeRules, AttributeValidationError,
    AttributeValueType, AuditRecord, Policy, PolicyConditions, PolicyEffect, PolicyInput,
    PolicySet, PolicySetInput, PolicyUpdate, ResourceCriteria, SubjectCriteria, TimeWindow,
    ValidationError, WeekdaySpec,
};
