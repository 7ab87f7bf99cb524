//! Persisted policy-model resources.
//!
//! - [`Policy`] - a single allow/deny rule with subject, resource and condition criteria
//! - [`PolicySet`] - a prioritized grouping of policies within an organization
//! - [`AttributeDefinition`] - catalog entry used for write-path attribute validation

mod attribute;
mod policy;
mod policy_set;

pub use attribute::{
    AttributeCategory, AttributeDefinition, AttributeRules, AttributeValidationError,
    AttributeValueType,
};
pub use policy::{
    AuditRecord, Policy, PolicyConditions, PolicyEffect, PolicyInput, PolicyUpdate,
    ResourceCriteria, SubjectCriteria, TimeWindow, ValidationError, WeekdaySpec,
};
pub use policy_set::{PolicySet, PolicySetInput};
