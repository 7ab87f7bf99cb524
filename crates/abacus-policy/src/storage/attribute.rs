//! Attribute catalog.

use async_trait::async_trait;

use crate::AbacResult;
use crate::policy::resources::{AttributeCategory, AttributeDefinition};

/// Read access to attribute definitions.
#[async_trait]
pub trait AttributeCatalog: Send + Sync {
    /// Resolve the definition of `key` for an organization.
    ///
    /// An organization-scoped definition shadows a system-wide one with the
    /// same key. `None` organization sees only system-wide definitions.
    async fn resolve_definition(
        &self,
        key: &str,
        organization_id: Option<&str>,
    ) -> AbacResult<Option<AttributeDefinition>>;

    /// Every definition of a category visible to an organization, shadowing applied.
    async fn list_definitions(
        &self,
        category: AttributeCategory,
        organization_id: Option<&str>,
    ) -> AbacResult<Vec<AttributeDefinition>>;
}
