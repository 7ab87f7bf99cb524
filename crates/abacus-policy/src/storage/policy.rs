//! Policy storage traits.
//!
//! [`PolicyStore`] is the read side used during evaluation and ability
//! compilation. [`PolicyRepository`] adds the writes used by policy
//! administration. Policies are never hard-deleted; deactivation is an update.

use async_trait::async_trait;

use crate::AbacResult;
use crate::policy::resources::{Policy, PolicySet};

/// Read access to policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Find policies that may apply to a subject in an organization.
    ///
    /// Implementations may over-approximate: the evaluator re-checks every
    /// criterion. They must not omit a policy that could match the given
    /// roles or user id. Inactive policies may be included.
    async fn find_applicable_policies(
        &self,
        organization_id: &str,
        roles: &[String],
        user_id: Option<&str>,
    ) -> AbacResult<Vec<Policy>>;

    /// List every policy of an organization, active or not.
    async fn find_by_organization(&self, organization_id: &str) -> AbacResult<Vec<Policy>>;
}

/// Persistence of policies and policy sets.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Get a policy by id.
    async fn get(&self, id: &str) -> AbacResult<Option<Policy>>;

    /// Insert a new policy.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the id is taken.
    async fn insert(&self, policy: &Policy) -> AbacResult<Policy>;

    /// Replace an existing policy.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the policy does not exist.
    async fn update(&self, policy: &Policy) -> AbacResult<Policy>;

    /// List every policy of an organization, active or not.
    async fn list(&self, organization_id: &str) -> AbacResult<Vec<Policy>>;

    /// Get a policy set by id.
    async fn get_policy_set(&self, id: &str) -> AbacResult<Option<PolicySet>>;

    /// Insert a new policy set.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the id is taken.
    async fn insert_policy_set(&self, set: &PolicySet) -> AbacResult<PolicySet>;

    /// List the policy sets of an organization.
    async fn list_policy_sets(&self, organization_id: &str) -> AbacResult<Vec<PolicySet>>;
}
