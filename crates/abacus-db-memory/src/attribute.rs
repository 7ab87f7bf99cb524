use abacus_policy::AbacResult;
use abacus_policy::policy::resources::{AttributeCategory, AttributeDefinition};
use abacus_policy::storage::AttributeCatalog;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory attribute catalog.
///
/// Definitions with an `organization_id` are visible only to that
/// organization and shadow a system-wide definition with the same key.
#[derive(Debug, Default)]
pub struct MemoryAttributeCatalog {
    definitions: RwLock<Vec<AttributeDefinition>>,
}

impl MemoryAttributeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the definition with the same key and scope.
    pub async fn define(&self, definition: AttributeDefinition) {
        let mut guard = self.definitions.write().await;
        guard.retain(|d| !(d.key == definition.key && d.organization_id == definition.organization_id));
        guard.push(definition);
    }
}

fn visible(
    definitions: &[AttributeDefinition],
    organization_id: Option<&str>,
) -> Vec<AttributeDefinition> {
    let mut scoped: Vec<AttributeDefinition> = definitions
        .iter()
        .filter(|d| d.organization_id.is_some() && d.organization_id.as_deref() == organization_id)
        .cloned()
        .collect();
    let system: Vec<AttributeDefinition> = definitions
        .iter()
        .filter(|d| d.organization_id.is_none() && !scoped.iter().any(|s| s.key == d.key))
        .cloned()
        .collect();
    scoped.extend(system);
    scoped
}

#[async_trait]
impl AttributeCatalog for MemoryAttributeCatalog {
    async fn resolve_definition(
        &self,
        key: &str,
        organization_id: Option<&str>,
    ) -> AbacResult<Option<AttributeDefinition>> {
        let guard = self.definitions.read().await;
        Ok(visible(&guard, organization_id)
            .into_iter()
            .find(|d| d.key == key))
    }

    async fn list_definitions(
        &self,
        category: AttributeCategory,
        organization_id: Option<&str>,
    ) -> AbacResult<Vec<AttributeDefinition>> {
        let guard = self.definitions.read().await;
        Ok(visible(&guard, organization_id)
            .into_iter()
            .filter(|d| d.category == category)
            .collect())
    }
}
