//! Ability compilation.
//!
//! An [`Ability`] is a flat, serializable list of [`CapabilityRule`]s, each
//! an `(action, resource type, optional conditions)` tuple that grants or
//! (when `inverted`) forbids. It answers `can(action, type, resource?)`
//! without touching the policy store, so the surrounding application can
//! compile one per request and use it for every check and every response it
//! shapes.
//!
//! The [`AbilityCompiler`] derives an ability from the policies that apply to
//! a user:
//!
//! 1. A super-admin gets `manage all` and no field restrictions.
//! 2. Effective roles come from the role assignment provider (valid
//!    assignments only, highest priority first). A user without any role is
//!    compiled as a plain `user`.
//! 3. Every active policy whose subject criteria and condition block match
//!    the user becomes one rule per `(action, resource type)` pair. Resource
//!    attribute predicates become rule conditions with `${…}` variables
//!    resolved against the user where possible.
//! 4. Field permissions of the matching policies are unioned per resource
//!    type; denied fields are then removed from the readable and writable
//!    sets.
//! 5. If no policy matched, built-in role defaults apply.
//!
//! `manage` stands for any action and `all` for any resource type.

use std::collections::BTreeSet;
use std::sync::Arc;

use abacus_config::AbilityConfig;
use abacus_core::resolve_in_map;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;

use crate::AbacResult;
use crate::policy::context::{EnvironmentContext, EvaluationContext, SubjectContext};
use crate::policy::fields::{FieldPermissionSet, FieldPermissions, merge_field_permissions};
use crate::policy::matcher::{ConditionMatcher, RegexCache, compare, substitute};
use crate::policy::resources::{Policy, PolicyEffect};
use crate::storage::{PolicyStore, RoleAssignmentProvider, effective_roles};

/// Action that stands for every action.
pub const MANAGE_ACTION: &str = "manage";

/// Resource type that stands for every resource type.
pub const ALL_RESOURCES: &str = "all";

/// Role used when a user holds no role in the organization.
pub const FALLBACK_ROLE: &str = "user";

// =============================================================================
// Capability rules
// =============================================================================

/// One grant or denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRule {
    pub action: String,
    pub resource_type: String,
    /// `true` for a denial.
    #[serde(default)]
    pub inverted: bool,
    /// Predicates over the resource's attributes, same syntax as policy attribute criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Map<String, Value>>,
    /// Policy the rule was compiled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

impl CapabilityRule {
    #[must_use]
    pub fn allow(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            inverted: false,
            conditions: None,
            policy_id: None,
        }
    }

    #[must_use]
    pub fn deny(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            inverted: true,
            ..Self::allow(action, resource_type)
        }
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Map<String, Value>) -> Self {
        self.conditions = (!conditions.is_empty()).then_some(conditions);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    /// Returns `true` if the rule speaks about `action` on `resource_type`.
    #[must_use]
    pub fn covers(&self, action: &str, resource_type: &str) -> bool {
        (self.action == MANAGE_ACTION || self.action == action)
            && (self.resource_type == ALL_RESOURCES || self.resource_type == resource_type)
    }

    fn matches_resource(&self, resource: &Value, regexes: &RegexCache) -> bool {
        let Some(conditions) = &self.conditions else {
            return true;
        };
        let Some(attributes) = resource.as_object() else {
            return false;
        };
        conditions
            .iter()
            .all(|(path, expected)| compare(resolve_in_map(attributes, path), expected, regexes))
    }
}

/// A compiled set of capability rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub rules: Vec<CapabilityRule>,
}

impl Ability {
    #[must_use]
    pub fn new(rules: Vec<CapabilityRule>) -> Self {
        Self { rules }
    }

    /// Check a capability.
    ///
    /// With a `resource`, conditional rules apply only if their conditions
    /// hold for it. Without one the check is type-level: a conditional grant
    /// counts, a conditional denial does not. Any applicable denial wins.
    #[must_use]
    pub fn can(&self, action: &str, resource_type: &str, resource: Option<&Value>) -> bool {
        let regexes = RegexCache::new();
        let mut allowed = false;

        for rule in self.rules.iter().filter(|r| r.covers(action, resource_type)) {
            let applies = match resource {
                Some(resource) => rule.matches_resource(resource, &regexes),
                None => !rule.inverted || rule.conditions.is_none(),
            };
            if !applies {
                continue;
            }
            if rule.inverted {
                return false;
            }
            allowed = true;
        }

        allowed
    }

    #[must_use]
    pub fn cannot(&self, action: &str, resource_type: &str, resource: Option<&Value>) -> bool {
        !self.can(action, resource_type, resource)
    }

    /// Returns `true` if no rule was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// =============================================================================
// Compilation
// =============================================================================

/// The user an ability is compiled for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbilityUser {
    pub id: String,
    /// Roles known to the caller. Used only when no role assignment provider is configured.
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub attributes: Map<String, Value>,
    pub is_super_admin: bool,
}

impl AbilityUser {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Options of a compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Environment the condition blocks are checked against. Defaults to now, no IP.
    pub environment: Option<EnvironmentContext>,
}

/// Where the rules of a compiled ability came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilitySource {
    SuperAdmin,
    Policies,
    RoleDefaults,
}

/// Result of [`AbilityCompiler::compile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledAbility {
    pub ability: Ability,
    pub field_permissions: FieldPermissions,
    /// Effective roles the ability was compiled with.
    pub roles: Vec<String>,
    pub source: AbilitySource,
}

/// Outcome of a field-aware capability check.
///
/// The field lists are present only when the action is allowed and the
/// resource type carries field permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAccess {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writable_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_fields: Option<Vec<String>>,
}

impl FieldAccess {
    #[must_use]
    pub fn denied() -> Self {
        Self::default()
    }
}

impl CompiledAbility {
    #[must_use]
    pub fn can(&self, action: &str, resource_type: &str, resource: Option<&Value>) -> bool {
        self.ability.can(action, resource_type, resource)
    }

    /// Field permissions for one resource type.
    #[must_use]
    pub fn field_permissions_for(&self, resource_type: &str) -> Option<&FieldPermissionSet> {
        self.field_permissions.get(resource_type)
    }

    /// Check a capability and report the field lists that go with it.
    #[must_use]
    pub fn field_access(
        &self,
        action: &str,
        resource_type: &str,
        resource: Option<&Value>,
    ) -> FieldAccess {
        if !self.can(action, resource_type, resource) {
            return FieldAccess::denied();
        }
        let Some(set) = self.field_permissions_for(resource_type) else {
            return FieldAccess {
                allowed: true,
                ..Default::default()
            };
        };
        let listed = |fields: &BTreeSet<String>| -> Option<Vec<String>> {
            (!fields.is_empty()).then(|| fields.iter().cloned().collect())
        };
        FieldAccess {
            allowed: true,
            readable_fields: listed(&set.readable),
            writable_fields: listed(&set.writable),
            denied_fields: listed(&set.denied),
        }
    }
}

/// Compiles abilities from the policy store.
pub struct AbilityCompiler {
    store: Arc<dyn PolicyStore>,
    role_assignments: Option<Arc<dyn RoleAssignmentProvider>>,
    matcher: Arc<ConditionMatcher>,
    config: AbilityConfig,
}

impl AbilityCompiler {
    #[must_use]
    pub fn new(
        store: Arc<dyn PolicyStore>,
        matcher: Arc<ConditionMatcher>,
        config: AbilityConfig,
    ) -> Self {
        Self {
            store,
            role_assignments: None,
            matcher,
            config,
        }
    }

    /// Resolve roles through a role assignment provider instead of `AbilityUser::roles`.
    #[must_use]
    pub fn with_role_assignments(mut self, provider: Arc<dyn RoleAssignmentProvider>) -> Self {
        self.role_assignments = Some(provider);
        self
    }

    /// Compile the ability of `user` in `organization_id`.
    ///
    /// # Errors
    ///
    /// Returns role assignment or policy store errors.
    pub async fn compile(
        &self,
        user: &AbilityUser,
        organization_id: &str,
        options: &CompileOptions,
    ) -> AbacResult<CompiledAbility> {
        if user.is_super_admin || self.is_super_admin_role(&user.roles) {
            return Ok(self.super_admin(user.roles.clone()));
        }

        let environment = options.environment.clone().unwrap_or_default();
        let Some(roles) = self
            .resolve_roles(user, organization_id, environment.timestamp)
            .await?
        else {
            return Ok(self.non_member(user, organization_id));
        };
        if self.is_super_admin_role(&roles) {
            return Ok(self.super_admin(roles));
        }

        let mut policies = self
            .store
            .find_applicable_policies(organization_id, &roles, Some(&user.id))
            .await?;
        policies.retain(|p| p.is_active && p.organization_id == organization_id);
        crate::policy::engine::sort_policies(&mut policies);

        let context = EvaluationContext {
            subject: SubjectContext {
                id: user.id.clone(),
                roles: roles.clone(),
                groups: user.groups.clone(),
                attributes: user.attributes.clone(),
            },
            resource: Default::default(),
            action: String::new(),
            environment,
            organization_id: organization_id.to_string(),
        };
        let document = context.variable_document();

        let mut rules = Vec::new();
        let mut field_permissions = FieldPermissions::new();
        for policy in &policies {
            if !self
                .matcher
                .matches_subject(&policy.subjects, &context, &document)
                || !self
                    .matcher
                    .matches_conditions(&policy.conditions, &context, &document)
            {
                continue;
            }
            rules.extend(policy_rules(policy, &document));
            merge_field_permissions(&mut field_permissions, &policy.field_permissions);
        }

        let source = if rules.is_empty() && self.config.role_defaults_enabled {
            tracing::debug!(
                user_id = %user.id,
                organization_id = %organization_id,
                roles = ?roles,
                "No applicable policies, using role defaults"
            );
            rules = roles
                .iter()
                .flat_map(|role| self.role_defaults(role, &user.id, organization_id))
                .collect();
            AbilitySource::RoleDefaults
        } else {
            AbilitySource::Policies
        };

        for set in field_permissions.values_mut() {
            set.normalize();
        }

        tracing::debug!(
            user_id = %user.id,
            organization_id = %organization_id,
            rules = rules.len(),
            source = ?source,
            "Ability compiled"
        );

        Ok(CompiledAbility {
            ability: Ability::new(rules),
            field_permissions,
            roles,
            source,
        })
    }

    /// Effective roles in the organization, or `None` without membership.
    async fn resolve_roles(
        &self,
        user: &AbilityUser,
        organization_id: &str,
        now: OffsetDateTime,
    ) -> AbacResult<Option<Vec<String>>> {
        let roles = match &self.role_assignments {
            Some(provider) => {
                let assignments = provider.find_assignments(&user.id, organization_id).await?;
                effective_roles(&assignments, organization_id, now)
            }
            None => user.roles.clone(),
        };
        Ok((!roles.is_empty()).then_some(roles))
    }

    /// A user without roles in the organization gets the built-in
    /// [`FALLBACK_ROLE`] rules only. Organization policies written for that
    /// role are not consulted.
    fn non_member(&self, user: &AbilityUser, organization_id: &str) -> CompiledAbility {
        tracing::debug!(
            user_id = %user.id,
            organization_id = %organization_id,
            "No role in organization, using fallback role defaults"
        );
        let rules = if self.config.role_defaults_enabled {
            self.role_defaults(FALLBACK_ROLE, &user.id, organization_id)
        } else {
            Vec::new()
        };
        CompiledAbility {
            ability: Ability::new(rules),
            field_permissions: FieldPermissions::new(),
            roles: vec![FALLBACK_ROLE.to_string()],
            source: AbilitySource::RoleDefaults,
        }
    }

    fn is_super_admin_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| *r == self.config.super_admin_role)
    }

    fn super_admin(&self, roles: Vec<String>) -> CompiledAbility {
        CompiledAbility {
            ability: Ability::new(vec![CapabilityRule::allow(MANAGE_ACTION, ALL_RESOURCES)]),
            field_permissions: FieldPermissions::new(),
            roles,
            source: AbilitySource::SuperAdmin,
        }
    }

    /// Built-in rules of a role. Unknown roles grant nothing.
    fn role_defaults(&self, role: &str, user_id: &str, organization_id: &str) -> Vec<CapabilityRule> {
        let owned_by = |key: &str, value: &str| {
            let mut conditions = Map::new();
            conditions.insert(key.to_string(), json!(value));
            conditions
        };

        match role {
            "admin" => vec![
                CapabilityRule::allow(MANAGE_ACTION, ALL_RESOURCES),
                CapabilityRule::deny("delete", "organization")
                    .with_conditions(owned_by("id", organization_id)),
            ],
            "manager" => {
                let mut rules: Vec<CapabilityRule> = self
                    .config
                    .core_resources
                    .iter()
                    .flat_map(|resource| {
                        ["read", "create", "update"]
                            .into_iter()
                            .map(move |action| CapabilityRule::allow(action, resource.as_str()))
                    })
                    .collect();
                rules.push(CapabilityRule::allow("read", "user"));
                rules
            }
            "user" => vec![
                CapabilityRule::allow("read", "product"),
                CapabilityRule::allow("read", "order").with_conditions(owned_by("userId", user_id)),
                CapabilityRule::allow("create", "order")
                    .with_conditions(owned_by("userId", user_id)),
                CapabilityRule::allow("read", "user").with_conditions(owned_by("id", user_id)),
            ],
            other => {
                tracing::warn!(role = %other, "Unknown role ignored for defaults");
                Vec::new()
            }
        }
    }
}

/// Rules contributed by one matching policy.
fn policy_rules(policy: &Policy, document: &Value) -> Vec<CapabilityRule> {
    let mut conditions: Map<String, Value> = policy
        .resources
        .attributes
        .iter()
        .map(|(path, expected)| (path.clone(), substitute(expected, document)))
        .collect();
    if !policy.resources.ids.is_empty() && !policy.resources.ids.iter().any(|id| id == "*") {
        conditions.insert("id".to_string(), json!({ "in": policy.resources.ids }));
    }

    let actions: Vec<&str> = if policy.actions.iter().any(|a| a == "*") {
        vec![MANAGE_ACTION]
    } else {
        policy.actions.iter().map(String::as_str).collect()
    };
    let types: Vec<&str> = if policy.resources.types.is_empty()
        || policy.resources.types.iter().any(|t| t == "*")
    {
        vec![ALL_RESOURCES]
    } else {
        policy.resources.types.iter().map(String::as_str).collect()
    };

    let mut rules = Vec::with_capacity(actions.len() * types.len());
    for action in &actions {
        for resource_type in &types {
            let rule = match policy.effect {
                PolicyEffect::Allow => CapabilityRule::allow(*action, *resource_type),
                PolicyEffect::Deny => CapabilityRule::deny(*action, *resource_type),
            };
            rules.push(
                rule.with_conditions(conditions.clone())
                    .with_policy(policy.id.clone()),
            );
        }
    }
    rules
}
