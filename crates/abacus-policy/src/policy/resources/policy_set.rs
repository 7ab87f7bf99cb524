//! Policy set resource type.

use serde::{Deserialize, Serialize};

use super::policy::{AuditRecord, PRIORITY_RANGE, ValidationError};

/// A prioritized grouping of policies within an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySet {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub organization_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub audit: AuditRecord,
}

fn default_active() -> bool {
    true
}

/// Input for creating a policy set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySetInput {
    pub name: String,
    pub description: Option<String>,
    pub organization_id: String,
    pub priority: i32,
}

impl PolicySetInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.organization_id.trim().is_empty() {
            return Err(ValidationError::MissingField("organizationId"));
        }
        if !PRIORITY_RANGE.contains(&self.priority) {
            return Err(ValidationError::InvalidPriority(self.priority));
        }
        Ok(())
    }

    /// Build a new active policy set.
    #[must_use]
    pub fn into_policy_set(self, id: String, actor: Option<&str>) -> PolicySet {
        PolicySet {
            id,
            name: self.name,
            description: self.description,
            organization_id: self.organization_id,
            priority: self.priority,
            is_active: true,
            audit: AuditRecord::created(actor),
        }
    }
}
