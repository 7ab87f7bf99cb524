//! Role assignment provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AbacResult;

fn default_active() -> bool {
    true
}

/// A role granted to a user within one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub role: String,
    pub organization_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub valid_from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub valid_to: Option<OffsetDateTime>,
}

impl RoleAssignment {
    /// Create an active, unbounded assignment.
    #[must_use]
    pub fn new(role: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            organization_id: organization_id.into(),
            priority: 0,
            is_active: true,
            valid_from: None,
            valid_to: None,
        }
    }

    /// Returns `true` if the assignment is active and `valid_from <= now < valid_to`.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.is_active
            && self.valid_from.is_none_or(|from| from <= now)
            && self.valid_to.is_none_or(|to| now < to)
    }
}

/// Read access to role assignments.
#[async_trait]
pub trait RoleAssignmentProvider: Send + Sync {
    /// Every assignment of a user in an organization, valid or not.
    async fn find_assignments(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AbacResult<Vec<RoleAssignment>>;
}

/// Role names of the valid assignments in `organization_id`, highest priority first, deduplicated.
#[must_use]
pub fn effective_roles(
    assignments: &[RoleAssignment],
    organization_id: &str,
    now: OffsetDateTime,
) -> Vec<String> {
    let mut valid: Vec<&RoleAssignment> = assignments
        .iter()
        .filter(|a| a.organization_id == organization_id && a.is_valid_at(now))
        .collect();
    valid.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut roles: Vec<String> = Vec::with_capacity(valid.len());
    for assignment in valid {
        if !roles.contains(&assignment.role) {
            roles.push(assignment.role.clone());
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_validity_window() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let mut assignment = RoleAssignment::new("manager", "org-1");
        assert!(assignment.is_valid_at(now));

        assignment.valid_from = Some(datetime!(2024-06-01 00:00 UTC));
        assert!(!assignment.is_valid_at(now));

        assignment.valid_from = Some(datetime!(2024-01-01 00:00 UTC));
        assignment.valid_to = Some(now);
        assert!(!assignment.is_valid_at(now));

        assignment.valid_to = None;
        assignment.is_active = false;
        assert!(!assignment.is_valid_at(now));
    }

    #[test]
    fn test_effective_roles_order_and_dedup() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let mut user = RoleAssignment::new("user", "org-1");
        user.priority = 1;
        let mut admin = RoleAssignment::new("admin", "org-1");
        admin.priority = 10;
        let mut expired = RoleAssignment::new("auditor", "org-1");
        expired.valid_to = Some(datetime!(2024-01-01 00:00 UTC));
        let other_org = RoleAssignment::new("owner", "org-2");
        let duplicate = RoleAssignment::new("user", "org-1");

        let roles = effective_roles(&[user, admin, expired, other_org, duplicate], "org-1", now);
        assert_eq!(roles, vec!["admin".to_string(), "user".to_string()]);
    }
}
