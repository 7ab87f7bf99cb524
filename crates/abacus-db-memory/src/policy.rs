use abacus_policy::storage::{PolicyRepository, PolicyStore};
use abacus_policy::{AbacError, AbacResult, Policy, PolicySet};
use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;

/// In-memory policy store using papaya lock-free HashMap.
///
/// Implements both the read port used by evaluation and the repository used
/// by policy administration, so one instance can back a whole service.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: PapayaHashMap<String, Policy>,
    sets: PapayaHashMap<String, PolicySet>,
}

impl MemoryPolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with policies. Later duplicates replace earlier ones.
    pub fn with_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
        let store = Self::new();
        {
            let guard = store.policies.pin();
            for policy in policies {
                guard.insert(policy.id.clone(), policy);
            }
        }
        store
    }

    /// Seed a policy set without validation.
    pub fn put_policy_set(&self, set: PolicySet) {
        self.sets.pin().insert(set.id.clone(), set);
    }

    /// Number of stored policies, active or not.
    pub fn len(&self) -> usize {
        self.policies.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, predicate: impl Fn(&Policy) -> bool) -> Vec<Policy> {
        let guard = self.policies.pin();
        let mut policies: Vec<Policy> = guard
            .iter()
            .map(|(_, policy)| policy)
            .filter(|policy| predicate(policy))
            .cloned()
            .collect();
        policies.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        policies
    }
}

/// Whether a policy's user and role lists leave room for this subject.
fn may_apply(policy: &Policy, roles: &[String], user_id: Option<&str>) -> bool {
    let subjects = &policy.subjects;
    let users_ok = subjects.users.is_empty()
        || subjects
            .users
            .iter()
            .any(|u| u == "*" || Some(u.as_str()) == user_id);
    let roles_ok = subjects.roles.is_empty()
        || subjects
            .roles
            .iter()
            .any(|r| r == "*" || roles.contains(r));
    users_ok && roles_ok
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn find_applicable_policies(
        &self,
        organization_id: &str,
        roles: &[String],
        user_id: Option<&str>,
    ) -> AbacResult<Vec<Policy>> {
        Ok(self.collect(|p| {
            p.is_active && p.organization_id == organization_id && may_apply(p, roles, user_id)
        }))
    }

    async fn find_by_organization(&self, organization_id: &str) -> AbacResult<Vec<Policy>> {
        Ok(self.collect(|p| p.organization_id == organization_id))
    }
}

#[async_trait]
impl PolicyRepository for MemoryPolicyStore {
    async fn get(&self, id: &str) -> AbacResult<Option<Policy>> {
        Ok(self.policies.pin().get(id).cloned())
    }

    async fn insert(&self, policy: &Policy) -> AbacResult<Policy> {
        let guard = self.policies.pin();
        match guard.try_insert(policy.id.clone(), policy.clone()) {
            Ok(inserted) => Ok(inserted.clone()),
            Err(_) => Err(AbacError::conflict(format!(
                "Policy {} already exists",
                policy.id
            ))),
        }
    }

    async fn update(&self, policy: &Policy) -> AbacResult<Policy> {
        let guard = self.policies.pin();
        if !guard.contains_key(policy.id.as_str()) {
            return Err(AbacError::not_found("Policy", &policy.id));
        }
        guard.insert(policy.id.clone(), policy.clone());
        Ok(policy.clone())
    }

    async fn list(&self, organization_id: &str) -> AbacResult<Vec<Policy>> {
        self.find_by_organization(organization_id).await
    }

    async fn get_policy_set(&self, id: &str) -> AbacResult<Option<PolicySet>> {
        Ok(self.sets.pin().get(id).cloned())
    }

    async fn insert_policy_set(&self, set: &PolicySet) -> AbacResult<PolicySet> {
        let guard = self.sets.pin();
        match guard.try_insert(set.id.clone(), set.clone()) {
            Ok(inserted) => Ok(inserted.clone()),
            Err(_) => Err(AbacError::conflict(format!(
                "Policy set {} already exists",
                set.id
            ))),
        }
    }

    async fn list_policy_sets(&self, organization_id: &str) -> AbacResult<Vec<PolicySet>> {
        let guard = self.sets.pin();
        let mut sets: Vec<PolicySet> = guard
            .iter()
            .map(|(_, set)| set)
            .filter(|set| set.organization_id == organization_id)
            .cloned()
            .collect();
        sets.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(sets)
    }
}
