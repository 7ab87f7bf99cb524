//! Policy administration.
//!
//! [`PolicyManager`] is the only writer of policies. Every mutation is
//! validated, stamped, persisted through the [`PolicyRepository`], then
//! followed by a coarse invalidation of the organization's cached decisions
//! and a [`PolicyChange`] broadcast. Policies are never hard-deleted.

use std::sync::Arc;

use abacus_core::generate_id;

use crate::policy::cache::DecisionCache;
use crate::policy::reload::{PolicyChange, PolicyChangeNotifier};
use crate::policy::resources::{Policy, PolicyInput, PolicySet, PolicySetInput, PolicyUpdate};
use crate::storage::PolicyRepository;
use crate::{AbacError, AbacResult};

/// Creates, updates and deactivates policies and policy sets.
pub struct PolicyManager {
    repository: Arc<dyn PolicyRepository>,
    cache: Option<Arc<dyn DecisionCache>>,
    notifier: Arc<PolicyChangeNotifier>,
}

impl PolicyManager {
    #[must_use]
    pub fn new(repository: Arc<dyn PolicyRepository>) -> Self {
        Self {
            repository,
            cache: None,
            notifier: Arc::new(PolicyChangeNotifier::default()),
        }
    }

    /// Invalidate this cache on every mutation.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Broadcast changes on a shared notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<PolicyChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<PolicyChangeNotifier> {
        &self.notifier
    }

    /// Create a policy at version 1.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid input or an unknown policy set, and
    /// repository errors.
    pub async fn create_policy(&self, input: PolicyInput, actor: Option<&str>) -> AbacResult<Policy> {
        input.validate()?;
        if let Some(set_id) = &input.policy_set_id {
            self.check_policy_set(set_id, &input.organization_id).await?;
        }

        let policy = self
            .repository
            .insert(&input.into_policy(generate_id(), actor))
            .await?;

        tracing::info!(
            policy_id = %policy.id,
            organization_id = %policy.organization_id,
            effect = %policy.effect,
            "Policy created"
        );
        self.after_mutation(PolicyChange::Created {
            policy_id: policy.id.clone(),
            organization_id: policy.organization_id.clone(),
        })
        .await;
        Ok(policy)
    }

    /// Apply a partial update.
    ///
    /// The version is bumped only when the effect, criteria, actions or
    /// conditions change.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `Validation` if the updated
    /// policy is invalid, and repository errors.
    pub async fn update_policy(
        &self,
        id: &str,
        update: PolicyUpdate,
        actor: Option<&str>,
    ) -> AbacResult<Policy> {
        let current = self.get_policy(id).await?;
        let mut next = update.apply_to(&current);
        next.validate()?;

        if let Some(set_id) = &next.policy_set_id
            && current.policy_set_id.as_ref() != Some(set_id)
        {
            self.check_policy_set(set_id, &next.organization_id).await?;
        }

        if current.semantically_differs(&next) {
            next.version = current.version.saturating_add(1);
        }
        next.audit.touch(actor);

        let policy = self.repository.update(&next).await?;

        tracing::info!(
            policy_id = %policy.id,
            organization_id = %policy.organization_id,
            version = policy.version,
            "Policy updated"
        );
        self.after_mutation(PolicyChange::Updated {
            policy_id: policy.id.clone(),
            organization_id: policy.organization_id.clone(),
            version: policy.version,
        })
        .await;
        Ok(policy)
    }

    /// Soft-delete a policy.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and repository errors.
    pub async fn deactivate_policy(&self, id: &str, actor: Option<&str>) -> AbacResult<Policy> {
        let mut policy = self.get_policy(id).await?;
        if !policy.is_active {
            return Ok(policy);
        }
        policy.is_active = false;
        policy.audit.touch(actor);

        let policy = self.repository.update(&policy).await?;

        tracing::info!(
            policy_id = %policy.id,
            organization_id = %policy.organization_id,
            "Policy deactivated"
        );
        self.after_mutation(PolicyChange::Deactivated {
            policy_id: policy.id.clone(),
            organization_id: policy.organization_id.clone(),
        })
        .await;
        Ok(policy)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn get_policy(&self, id: &str) -> AbacResult<Policy> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AbacError::not_found("Policy", id))
    }

    /// Every policy of an organization, active or not.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn list_policies(&self, organization_id: &str) -> AbacResult<Vec<Policy>> {
        self.repository.list(organization_id).await
    }

    /// # Errors
    ///
    /// Returns `Validation` for invalid input and repository errors.
    pub async fn create_policy_set(
        &self,
        input: PolicySetInput,
        actor: Option<&str>,
    ) -> AbacResult<PolicySet> {
        input.validate()?;
        let set = self
            .repository
            .insert_policy_set(&input.into_policy_set(generate_id(), actor))
            .await?;

        tracing::info!(
            policy_set_id = %set.id,
            organization_id = %set.organization_id,
            "Policy set created"
        );
        self.after_mutation(PolicyChange::PolicySetCreated {
            policy_set_id: set.id.clone(),
            organization_id: set.organization_id.clone(),
        })
        .await;
        Ok(set)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn get_policy_set(&self, id: &str) -> AbacResult<PolicySet> {
        self.repository
            .get_policy_set(id)
            .await?
            .ok_or_else(|| AbacError::not_found("PolicySet", id))
    }

    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn list_policy_sets(&self, organization_id: &str) -> AbacResult<Vec<PolicySet>> {
        self.repository.list_policy_sets(organization_id).await
    }

    async fn check_policy_set(&self, set_id: &str, organization_id: &str) -> AbacResult<()> {
        match self.repository.get_policy_set(set_id).await? {
            Some(set) if set.organization_id == organization_id => Ok(()),
            Some(_) => Err(AbacError::validation(format!(
                "Policy set {set_id} belongs to another organization"
            ))),
            None => Err(AbacError::validation(format!(
                "Policy set {set_id} does not exist"
            ))),
        }
    }

    async fn after_mutation(&self, change: PolicyChange) {
        if let Some(cache) = &self.cache {
            match cache.invalidate_organization(change.organization_id()).await {
                Ok(removed) => tracing::debug!(
                    organization_id = %change.organization_id(),
                    removed,
                    "Cached decisions invalidated"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    organization_id = %change.organization_id(),
                    "Failed to invalidate cached decisions"
                ),
            }
        }
        self.notifier.notify(change);
    }
}
