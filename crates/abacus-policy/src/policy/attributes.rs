//! Write-path attribute validation against the attribute catalog.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::AbacResult;
use crate::policy::resources::AttributeCategory;
use crate::storage::AttributeCatalog;

/// Validates attribute maps before they are stored on subjects or resources.
///
/// Attributes without a definition are accepted as-is. Evaluation never
/// consults the catalog.
pub struct AttributeValidator {
    catalog: Arc<dyn AttributeCatalog>,
}

impl AttributeValidator {
    #[must_use]
    pub fn new(catalog: Arc<dyn AttributeCatalog>) -> Self {
        Self { catalog }
    }

    /// Validate `attributes` of one category for an organization.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for the first attribute that violates its
    /// definition or a required attribute that is missing, and catalog
    /// errors as-is.
    pub async fn validate(
        &self,
        category: AttributeCategory,
        attributes: &Map<String, Value>,
        organization_id: Option<&str>,
    ) -> AbacResult<()> {
        for (key, value) in attributes {
            let Some(definition) = self
                .catalog
                .resolve_definition(key, organization_id)
                .await?
            else {
                continue;
            };
            if definition.category != category {
                continue;
            }
            definition.validate_value(Some(value))?;
        }

        for definition in self
            .catalog
            .list_definitions(category, organization_id)
            .await?
        {
            if definition.validation.required && !attributes.contains_key(&definition.key) {
                definition.validate_value(None)?;
            }
        }

        tracing::trace!(
            category = ?category,
            attributes = attributes.len(),
            "Attributes validated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AbacError;
    use crate::policy::resources::{AttributeDefinition, AttributeRules, AttributeValueType};
    use async_trait::async_trait;
    use serde_json::json;

    struct StubCatalog(Vec<AttributeDefinition>);

    impl StubCatalog {
        fn visible(&self, organization_id: Option<&str>) -> Vec<AttributeDefinition> {
            let mut visible: Vec<AttributeDefinition> = self
                .0
                .iter()
                .filter(|d| d.organization_id.is_some() && d.organization_id.as_deref() == organization_id)
                .cloned()
                .collect();
            for system in self.0.iter().filter(|d| d.organization_id.is_none()) {
                if !visible.iter().any(|d| d.key == system.key) {
                    visible.push(system.clone());
                }
            }
            visible
        }
    }

    #[async_trait]
    impl AttributeCatalog for StubCatalog {
        async fn resolve_definition(
            &self,
            key: &str,
            organization_id: Option<&str>,
        ) -> AbacResult<Option<AttributeDefinition>> {
            Ok(self
                .visible(organization_id)
                .into_iter()
                .find(|d| d.key == key))
        }

        async fn list_definitions(
            &self,
            category: AttributeCategory,
            organization_id: Option<&str>,
        ) -> AbacResult<Vec<AttributeDefinition>> {
            Ok(self
                .visible(organization_id)
                .into_iter()
                .filter(|d| d.category == category)
                .collect())
        }
    }

    fn definition(
        key: &str,
        value_type: AttributeValueType,
        validation: AttributeRules,
        organization_id: Option<&str>,
    ) -> AttributeDefinition {
        AttributeDefinition {
            key: key.to_string(),
            category: AttributeCategory::Subject,
            value_type,
            validation,
            organization_id: organization_id.map(str::to_string),
        }
    }

    fn validator() -> AttributeValidator {
        AttributeValidator::new(Arc::new(StubCatalog(vec![
            definition(
                "department",
                AttributeValueType::String,
                AttributeRules {
                    required: true,
                    ..Default::default()
                },
                None,
            ),
            definition(
                "clearance",
                AttributeValueType::Number,
                AttributeRules {
                    min: Some(1.0),
                    max: Some(5.0),
                    ..Default::default()
                },
                None,
            ),
            definition(
                "clearance",
                AttributeValueType::Number,
                AttributeRules {
                    min: Some(1.0),
                    max: Some(10.0),
                    ..Default::default()
                },
                Some("org-1"),
            ),
        ])))
    }

    fn attributes(value: Value) -> Map<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_valid_and_undefined_attributes_pass() {
        let result = validator()
            .validate(
                AttributeCategory::Subject,
                &attributes(json!({"department": "sales", "clearance": 3, "nickname": "bob"})),
                None,
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_required_attribute() {
        let err = validator()
            .validate(
                AttributeCategory::Subject,
                &attributes(json!({"clearance": 3})),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AbacError::Validation { .. }));
        assert!(err.to_string().contains("department"));
    }

    #[tokio::test]
    async fn test_organization_definition_shadows_system() {
        let validator = validator();
        let value = attributes(json!({"department": "sales", "clearance": 8}));

        assert!(
            validator
                .validate(AttributeCategory::Subject, &value, None)
                .await
                .is_err()
        );
        assert!(
            validator
                .validate(AttributeCategory::Subject, &value, Some("org-1"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_other_category_is_not_checked() {
        let result = validator()
            .validate(
                AttributeCategory::Resource,
                &attributes(json!({"clearance": "high"})),
                None,
            )
            .await;
        assert!(result.is_ok());
    }
}
