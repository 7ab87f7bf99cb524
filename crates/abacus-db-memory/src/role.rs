use std::collections::HashMap;

use abacus_policy::AbacResult;
use abacus_policy::storage::{RoleAssignment, RoleAssignmentProvider};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory role assignments, keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryRoleAssignments {
    assignments: RwLock<HashMap<String, Vec<RoleAssignment>>>,
}

impl MemoryRoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role to a user.
    pub async fn assign(&self, user_id: impl Into<String>, assignment: RoleAssignment) {
        self.assignments
            .write()
            .await
            .entry(user_id.into())
            .or_default()
            .push(assignment);
    }

    /// Drop every assignment of a user in an organization. Returns how many were removed.
    pub async fn revoke_all(&self, user_id: &str, organization_id: &str) -> usize {
        let mut guard = self.assignments.write().await;
        let Some(assignments) = guard.get_mut(user_id) else {
            return 0;
        };
        let before = assignments.len();
        assignments.retain(|a| a.organization_id != organization_id);
        before - assignments.len()
    }
}

#[async_trait]
impl RoleAssignmentProvider for MemoryRoleAssignments {
    async fn find_assignments(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AbacResult<Vec<RoleAssignment>> {
        let guard = self.assignments.read().await;
        Ok(guard
            .get(user_id)
            .map(|assignments| {
                assignments
                    .iter()
                    .filter(|a| a.organization_id == organization_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assign_find_revoke() {
        let roles = MemoryRoleAssignments::new();
        roles.assign("u-1", RoleAssignment::new("manager", "org-1")).await;
        roles.assign("u-1", RoleAssignment::new("user", "org-2")).await;

        let found = roles.find_assignments("u-1", "org-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, "manager");
        assert!(roles.find_assignments("u-2", "org-1").await.unwrap().is_empty());

        assert_eq!(roles.revoke_all("u-1", "org-1").await, 1);
        assert!(roles.find_assignments("u-1", "org-1").await.unwrap().is_empty());
        assert_eq!(roles.find_assignments("u-1", "org-2").await.unwrap().len(), 1);
    }
}
