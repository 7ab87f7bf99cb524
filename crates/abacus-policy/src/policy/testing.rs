//! Test doubles shared by the unit tests of this crate.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::policy::resources::{
    Policy, PolicyEffect, PolicyInput, ResourceCriteria, SubjectCriteria,
};
use crate::storage::{Organization, OrganizationHierarchy, PolicyStore};
use crate::{AbacError, AbacResult};

/// Policy store over a vector, with a call counter and a failure switch.
#[derive(Default)]
pub struct StubPolicyStore {
    policies: RwLock<Vec<Policy>>,
    calls: AtomicUsize,
    failing_org: RwLock<Option<String>>,
    fail_all: AtomicBool,
}

impl StubPolicyStore {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self {
            policies: RwLock::new(policies),
            ..Default::default()
        }
    }

    pub fn push(&self, policy: Policy) {
        self.policies.write().unwrap().push(policy);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_for(&self, organization_id: &str) {
        *self.failing_org.write().unwrap() = Some(organization_id.to_string());
    }
}

#[async_trait]
impl PolicyStore for StubPolicyStore {
    async fn find_applicable_policies(
        &self,
        organization_id: &str,
        _roles: &[String],
        _user_id: Option<&str>,
    ) -> AbacResult<Vec<Policy>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst)
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

/// Hierarchy over a fixed list of organizations.
#[derive(Default)]
pub struct StubHierarchy {
    organizations: Vec<Organization>,
}

impl StubHierarchy {
    pub fn new(organizations: Vec<Organization>) -> Self {
        Self { organizations }
    }
}

#[async_trait]
impl OrganizationHierarchy for StubHierarchy {
    async fn get_ancestors(&self, organization_id: &str) -> AbacResult<Vec<Organization>> {
        let mut ancestors = Vec::new();
        let mut current = self.get_organization(organization_id).await?;
        while let Some(parent_id) = current.and_then(|o| o.parent_id) {
            current = self.get_organization(&parent_id).await?;
            if let Some(parent) = &current {
                ancestors.push(parent.clone());
            }
        }
        Ok(ancestors)
    }

    async fn get_organization(&self, organization_id: &str) -> AbacResult<Option<Organization>> {
        Ok(self
            .organizations
            .iter()
            .find(|o| o.id == organization_id)
            .cloned())
    }
}

pub fn organization(id: &str, name: &str, parent: Option<&str>) -> Organization {
    Organization {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent.map(str::to_string),
    }
}

/// A policy for role `user` over `resource_type` in `organization_id`.
pub fn role_policy(
    id: &str,
    organization_id: &str,
    effect: PolicyEffect,
    resource_type: &str,
    actions: &[&str],
) -> Policy {
    PolicyInput {
        name: format!("policy {id}"),
        effect,
        priority: 10,
        subjects: SubjectCriteria {
            roles: vec!["user".to_string()],
            ..Default::default()
        },
        resources: ResourceCriteria {
            types: vec![resource_type.to_string()],
            ..Default::default()
        },
        actions: actions.iter().map(|a| (*a).to_string()).collect(),
        organization_id: organization_id.to_string(),
        ..Default::default()
    }
    .into_policy(id.to_string(), None)
}
