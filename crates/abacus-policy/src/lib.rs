//! # abacus-policy
//!
//! Attribute-based access-control decision engine.
//!
//! This crate provides:
//! - Policy model and validation
//! - Condition matching with `${…}` variables, operators, time windows and IP rules
//! - Deny-overrides policy evaluation with an explained result
//! - Decision caching with TTL and per-user/per-organization invalidation
//! - Organization hierarchy and cross-organization evaluation
//! - Ability and field-permission compilation, payload filtering and audit
//! - Policy administration with change notifications
//!
//! ## Modules
//!
//! - [`policy`] - the decision engine
//! - [`storage`] - ports for the policy store, organization tree, role assignments and attribute catalog
//! - [`service`] - the [`AccessControlService`] facade
//! - [`error`] - error types

pub mod error;
pub mod policy;
pub mod service;
pub mod storage;

pub use error::{AbacError, ErrorCategory};
pub use policy::{
    Ability, AbilityCompiler, AbilitySource, AbilityUser, CacheKey, CacheStats, CapabilityRule,
    CompileOptions, CompiledAbility, ConditionMatcher, CustomConditionHook, DecisionCache,
    EnvironmentContext, EvaluationContext, EvaluationContextBuilder, EvaluationResult,
    FieldAccess, FieldAccessActor, FieldFilter, FieldPermissionSet, FieldPermissions,
    HierarchicalEvaluator, InMemoryDecisionCache, MatchedPolicy, Policy, PolicyChange,
    PolicyChangeNotifier, PolicyEffect, PolicyEvaluator, PolicyInput, PolicyManager, PolicySet,
    PolicySetInput, PolicyUpdate, ResourceContext, SubjectContext,
};
pub use service::{AccessControlService, AccessControlServiceBuilder, WarmUpOperation};
pub use storage::{
    AttributeCatalog, Organization, OrganizationHierarchy, PolicyRepository, PolicyStore,
    RoleAssignment, RoleAssignmentProvider,
};

/// Type alias for engine results.
pub type AbacResult<T> = Result<T, AbacError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use abacus_policy::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AbacResult;
    pub use crate::error::{AbacError, ErrorCategory};
    pub use crate::policy::{
        AbilityUser, CompileOptions, CompiledAbility, EvaluationContext, EvaluationResult,
        FieldAccess, FieldAccessActor, FieldPermissionSet, Policy, PolicyEffect, PolicyInput,
    };
    pub use crate::service::{AccessControlService, WarmUpOperation};
    pub use crate::storage::{
        AttributeCatalog, Organization, OrganizationHierarchy, PolicyRepository, PolicyStore,
        RoleAssignmentProvider,
    };
}
