//! Organization hierarchy provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AbacResult;

/// A node of the organization tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Read access to the organization tree.
#[async_trait]
pub trait OrganizationHierarchy: Send + Sync {
    /// Ancestors of an organization, nearest first. The organization itself is not included.
    async fn get_ancestors(&self, organization_id: &str) -> AbacResult<Vec<Organization>>;

    /// Look up one organization.
    async fn get_organization(&self, organization_id: &str) -> AbacResult<Option<Organization>>;
}
