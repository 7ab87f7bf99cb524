use std::collections::HashSet;

use abacus_policy::storage::{Organization, OrganizationHierarchy};
use abacus_policy::{AbacError, AbacResult};
use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;

/// Upper bound on the ancestor walk, far above any real tree.
const MAX_ANCESTORS: usize = 256;

/// In-memory organization tree.
#[derive(Debug, Default)]
pub struct MemoryOrganizationHierarchy {
    organizations: PapayaHashMap<String, Organization>,
}

impl MemoryOrganizationHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tree from a flat list of organizations.
    pub fn with_organizations(organizations: impl IntoIterator<Item = Organization>) -> Self {
        let hierarchy = Self::new();
        for organization in organizations {
            hierarchy.insert(organization);
        }
        hierarchy
    }

    /// Add or replace an organization.
    pub fn insert(&self, organization: Organization) {
        self.organizations
            .pin()
            .insert(organization.id.clone(), organization);
    }

    pub fn len(&self) -> usize {
        self.organizations.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrganizationHierarchy for MemoryOrganizationHierarchy {
    async fn get_ancestors(&self, organization_id: &str) -> AbacResult<Vec<Organization>> {
        let guard = self.organizations.pin();
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([organization_id.to_string()]);
        let mut parent_id = guard
            .get(organization_id)
            .and_then(|o| o.parent_id.clone());

        while let Some(id) = parent_id {
            if !seen.insert(id.clone()) || ancestors.len() >= MAX_ANCESTORS {
                return Err(AbacError::hierarchy(format!(
                    "Cycle in organization tree above {organization_id} at {id}"
                )));
            }
            let Some(parent) = guard.get(id.as_str()) else {
                tracing::warn!(
                    organization_id = %organization_id,
                    missing_parent = %id,
                    "Organization parent not found, truncating ancestor chain"
                );
                break;
            };
            parent_id = parent.parent_id.clone();
            ancestors.push(parent.clone());
        }

        Ok(ancestors)
    }

    async fn get_organization(&self, organization_id: &str) -> AbacResult<Option<Organization>> {
        Ok(self.organizations.pin().get(organization_id).cloned())
    }
}
