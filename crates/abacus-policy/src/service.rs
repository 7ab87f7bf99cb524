//! Access-control service facade.
//!
//! [`AccessControlService`] wires the decision engine to its collaborators
//! and exposes the operations a transport layer calls: decisions (single,
//! hierarchical, cross-organization, batch), ability compilation, field
//! filtering, cache administration and attribute validation.
//!
//! ```ignore
//! let service = AccessControlService::builder(store.clone())
//!     .config(config)
//!     .hierarchy(organizations)
//!     .role_assignments(roles)
//!     .audit_sink(audit)
//!     .repository(store)
//!     .build()?;
//!
//! let decision = service.evaluate_with_hierarchy(&context).await;
//! ```

use std::sync::Arc;

use abacus_config::EngineConfig;
use abacus_core::{AuditEvent, AuditEventKind, AuditSink, NoopAuditSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::AbacResult;
use crate::policy::ability::{
    AbilityCompiler, AbilityUser, CompileOptions, CompiledAbility, FieldAccess,
};
use crate::policy::admin::PolicyManager;
use crate::policy::attributes::AttributeValidator;
use crate::policy::cache::{CacheStats, DecisionCache, InMemoryDecisionCache};
use crate::policy::context::{
    EnvironmentContext, EvaluationContext, ResourceContext, SubjectContext,
};
use crate::policy::engine::{EvaluationResult, PolicyEvaluator};
use crate::policy::fields::{FieldAccessActor, FieldFilter, FieldPermissionSet};
use crate::policy::hierarchy::HierarchicalEvaluator;
use crate::policy::matcher::{ConditionMatcher, CustomConditionHook};
use crate::policy::reload::{PolicyChange, PolicyChangeNotifier};
use crate::policy::resources::AttributeCategory;
use crate::storage::{
    AttributeCatalog, Organization, OrganizationHierarchy, PolicyRepository, PolicyStore,
    RoleAssignmentProvider, effective_roles,
};

/// One `(resource type, action)` pair to pre-compute for a user.
///
/// A warmed decision is only reused by a request whose context fingerprints
/// the same, so `resource_id` and `attributes` should mirror what real
/// requests send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmUpOperation {
    pub resource_type: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl WarmUpOperation {
    #[must_use]
    pub fn new(resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            action: action.into(),
            resource_id: None,
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Hierarchy used when none is configured: every organization is a root.
struct FlatHierarchy;

#[async_trait]
impl OrganizationHierarchy for FlatHierarchy {
    async fn get_ancestors(&self, _organization_id: &str) -> AbacResult<Vec<Organization>> {
        Ok(Vec::new())
    }

    async fn get_organization(&self, _organization_id: &str) -> AbacResult<Option<Organization>> {
        Ok(None)
    }
}

// =============================================================================
// Service
// =============================================================================

/// The access-control engine with all collaborators attached.
pub struct AccessControlService {
    config: EngineConfig,
    evaluator: Arc<PolicyEvaluator>,
    hierarchy: HierarchicalEvaluator,
    compiler: AbilityCompiler,
    field_filter: FieldFilter,
    audit: Arc<dyn AuditSink>,
    cache: Option<Arc<dyn DecisionCache>>,
    role_assignments: Option<Arc<dyn RoleAssignmentProvider>>,
    attributes: Option<AttributeValidator>,
    manager: Option<PolicyManager>,
    notifier: Arc<PolicyChangeNotifier>,
}

impl AccessControlService {
    /// Start building a service over a policy store.
    #[must_use]
    pub fn builder(store: Arc<dyn PolicyStore>) -> AccessControlServiceBuilder {
        AccessControlServiceBuilder::new(store)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn evaluator(&self) -> &Arc<PolicyEvaluator> {
        &self.evaluator
    }

    // -------------------------------------------------------------------------
    // Decisions
    // -------------------------------------------------------------------------

    /// Decide within the context's organization only.
    pub async fn evaluate(&self, context: &EvaluationContext) -> EvaluationResult {
        let result = self.evaluator.evaluate(context).await;
        self.audit_decision(context, &result);
        result
    }

    /// Decide along the organization ancestor chain.
    pub async fn evaluate_with_hierarchy(&self, context: &EvaluationContext) -> EvaluationResult {
        let result = self.hierarchy.evaluate_with_hierarchy(context).await;
        self.audit_decision(context, &result);
        result
    }

    /// Decide an access from the context's organization into another one.
    pub async fn evaluate_cross_organization(
        &self,
        context: &EvaluationContext,
        target_organization_id: &str,
    ) -> EvaluationResult {
        let result = self
            .hierarchy
            .evaluate_cross_organization(context, target_organization_id)
            .await;
        self.audit_decision(context, &result);
        result
    }

    /// Decide many contexts; results keep the input order.
    pub async fn batch_evaluate(&self, contexts: &[EvaluationContext]) -> Vec<EvaluationResult> {
        let results = self.evaluator.batch_evaluate(contexts).await;
        for (context, result) in contexts.iter().zip(&results) {
            self.audit_decision(context, result);
        }
        results
    }

    // -------------------------------------------------------------------------
    // Abilities and fields
    // -------------------------------------------------------------------------

    /// Compile the capabilities and field permissions of a user.
    ///
    /// # Errors
    ///
    /// Returns policy store or role assignment errors.
    pub async fn compile_ability(
        &self,
        user: &AbilityUser,
        organization_id: &str,
        options: &CompileOptions,
    ) -> AbacResult<CompiledAbility> {
        self.compiler.compile(user, organization_id, options).await
    }

    /// Check one capability and return the field lists that go with it.
    ///
    /// Fails closed: a compilation error yields a denial without field lists.
    pub async fn can_with_fields(
        &self,
        user: &AbilityUser,
        action: &str,
        resource_type: &str,
        resource: Option<&Value>,
        organization_id: &str,
    ) -> FieldAccess {
        match self
            .compiler
            .compile(user, organization_id, &CompileOptions::default())
            .await
        {
            Ok(ability) => ability.field_access(action, resource_type, resource),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id = %user.id,
                    organization_id = %organization_id,
                    "Ability compilation failed, denying"
                );
                FieldAccess::denied()
            }
        }
    }

    /// Strip unreadable fields from an outbound payload.
    #[must_use]
    pub fn filter_for_read(
        &self,
        resource_type: &str,
        data: &Value,
        permissions: Option<&FieldPermissionSet>,
        actor: &FieldAccessActor,
    ) -> Value {
        self.field_filter
            .filter_for_read(resource_type, data, permissions, actor)
    }

    /// Strip unwritable fields from an inbound payload.
    #[must_use]
    pub fn filter_for_write(
        &self,
        resource_type: &str,
        data: &Value,
        permissions: Option<&FieldPermissionSet>,
        actor: &FieldAccessActor,
    ) -> Value {
        self.field_filter
            .filter_for_write(resource_type, data, permissions, actor)
    }

    // -------------------------------------------------------------------------
    // Cache
    // -------------------------------------------------------------------------

    /// Drop cached decisions of one organization, or all of them.
    ///
    /// # Errors
    ///
    /// Returns cache errors.
    pub async fn clear_cache(&self, organization_id: Option<&str>) -> AbacResult<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        match organization_id {
            Some(organization_id) => {
                let removed = cache.invalidate_organization(organization_id).await?;
                tracing::info!(organization_id = %organization_id, removed, "Decision cache cleared");
            }
            None => {
                cache.clear().await?;
                tracing::info!("Decision cache cleared");
            }
        }
        Ok(())
    }

    /// Drop cached decisions of one user in one organization.
    ///
    /// # Errors
    ///
    /// Returns cache errors.
    pub async fn invalidate_user_cache(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> AbacResult<usize> {
        match &self.cache {
            Some(cache) => cache.invalidate_user(user_id, organization_id).await,
            None => Ok(0),
        }
    }

    /// Cache statistics. All zero when caching is disabled.
    #[must_use]
    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    /// Pre-compute decisions of a user so the next requests hit the cache.
    ///
    /// Best-effort: roles come from the role assignment provider, and the
    /// warmed subject carries no groups or attributes. Requests that send
    /// more than that fingerprint differently and miss; use
    /// [`Self::warm_up_subject_cache`] for those. Without a role assignment
    /// provider nothing is warmed. Returns the number of decisions computed.
    ///
    /// # Errors
    ///
    /// Returns role assignment errors.
    pub async fn warm_up_user_cache(
        &self,
        user_id: &str,
        organization_id: &str,
        operations: &[WarmUpOperation],
    ) -> AbacResult<usize> {
        if self.cache.is_none() || operations.is_empty() {
            return Ok(0);
        }
        let Some(provider) = &self.role_assignments else {
            tracing::debug!(
                user_id = %user_id,
                organization_id = %organization_id,
                "No role assignment provider, skipping cache warm-up"
            );
            return Ok(0);
        };

        let environment = EnvironmentContext::default();
        let assignments = provider.find_assignments(user_id, organization_id).await?;
        let subject = SubjectContext {
            id: user_id.to_string(),
            roles: effective_roles(&assignments, organization_id, environment.timestamp),
            ..Default::default()
        };
        Ok(self
            .warm_up_subject_cache(&subject, &environment, organization_id, operations)
            .await)
    }

    /// Pre-compute decisions for an exact subject and environment.
    ///
    /// The contexts are built from `subject`, `environment` and each
    /// operation, so a later request with the same fields hits the cache.
    /// Decisions that depend on the clock are computed but not cached.
    pub async fn warm_up_subject_cache(
        &self,
        subject: &SubjectContext,
        environment: &EnvironmentContext,
        organization_id: &str,
        operations: &[WarmUpOperation],
    ) -> usize {
        if self.cache.is_none() || operations.is_empty() {
            return 0;
        }

        let contexts: Vec<EvaluationContext> = operations
            .iter()
            .map(|op| EvaluationContext {
                subject: subject.clone(),
                resource: ResourceContext {
                    resource_type: op.resource_type.clone(),
                    id: op.resource_id.clone(),
                    attributes: op.attributes.clone(),
                },
                action: op.action.clone(),
                environment: environment.clone(),
                organization_id: organization_id.to_string(),
            })
            .collect();

        let warmed = self.evaluator.batch_evaluate(&contexts).await.len();
        tracing::info!(
            user_id = %subject.id,
            organization_id = %organization_id,
            warmed,
            "Decision cache warmed"
        );
        warmed
    }

    // -------------------------------------------------------------------------
    // Administration
    // -------------------------------------------------------------------------

    /// Validate attributes against the attribute catalog. Without a catalog everything passes.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid attributes and catalog errors.
    pub async fn validate_attributes(
        &self,
        category: AttributeCategory,
        attributes: &Map<String, Value>,
        organization_id: Option<&str>,
    ) -> AbacResult<()> {
        match &self.attributes {
            Some(validator) => {
                validator
                    .validate(category, attributes, organization_id)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Policy administration, available when a repository was configured.
    #[must_use]
    pub fn manager(&self) -> Option<&PolicyManager> {
        self.manager.as_ref()
    }

    /// Subscribe to policy changes made through [`Self::manager`].
    #[must_use]
    pub fn subscribe_policy_changes(&self) -> tokio::sync::broadcast::Receiver<PolicyChange> {
        self.notifier.subscribe()
    }

    fn audit_decision(&self, context: &EvaluationContext, result: &EvaluationResult) {
        if result.allowed || !self.config.audit.enabled || !self.config.audit.log_denied_decisions
        {
            return;
        }
        let event = AuditEvent::new(
            AuditEventKind::AccessDenied,
            json!({
                "action": context.action,
                "resourceId": context.resource.id,
                "reasons": result.reasons,
                "deniedPolicies": result
                    .denied_policies
                    .iter()
                    .map(|p| p.id.as_str())
                    .collect::<Vec<_>>(),
                "error": result.error,
            }),
        )
        .with_organization(&context.organization_id)
        .with_subject(&context.subject.id)
        .with_resource_type(&context.resource.resource_type);
        self.audit.publish(event);
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`AccessControlService`].
pub struct AccessControlServiceBuilder {
    store: Arc<dyn PolicyStore>,
    config: EngineConfig,
    cache: Option<Arc<dyn DecisionCache>>,
    hierarchy: Option<Arc<dyn OrganizationHierarchy>>,
    role_assignments: Option<Arc<dyn RoleAssignmentProvider>>,
    attribute_catalog: Option<Arc<dyn AttributeCatalog>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    repository: Option<Arc<dyn PolicyRepository>>,
    hooks: Vec<(String, Arc<dyn CustomConditionHook>)>,
}

impl AccessControlServiceBuilder {
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            cache: None,
            hierarchy: None,
            role_assignments: None,
            attribute_catalog: None,
            audit_sink: None,
            repository: None,
            hooks: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this cache instead of an in-memory one. Ignored when caching is disabled.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn hierarchy(mut self, hierarchy: Arc<dyn OrganizationHierarchy>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    #[must_use]
    pub fn role_assignments(mut self, provider: Arc<dyn RoleAssignmentProvider>) -> Self {
        self.role_assignments = Some(provider);
        self
    }

    #[must_use]
    pub fn attribute_catalog(mut self, catalog: Arc<dyn AttributeCatalog>) -> Self {
        self.attribute_catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Enable policy administration.
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn PolicyRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Register a custom condition hook.
    #[must_use]
    pub fn custom_condition(
        mut self,
        name: impl Into<String>,
        hook: Arc<dyn CustomConditionHook>,
    ) -> Self {
        self.hooks.push((name.into(), hook));
        self
    }

    /// Assemble the service.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid.
    pub fn build(self) -> AbacResult<AccessControlService> {
        self.config.validate()?;
        let config = self.config;

        let matcher = Arc::new(
            self.hooks
                .into_iter()
                .fold(ConditionMatcher::new(), |matcher, (name, hook)| {
                    matcher.with_hook(name, hook)
                }),
        );

        let cache: Option<Arc<dyn DecisionCache>> = config.cache.enabled.then(|| {
            self.cache.unwrap_or_else(|| {
                Arc::new(InMemoryDecisionCache::new(config.cache.max_entries))
                    as Arc<dyn DecisionCache>
            })
        });

        let mut evaluator = PolicyEvaluator::new(self.store.clone(), matcher.clone());
        if let Some(cache) = &cache {
            evaluator = evaluator.with_cache(cache.clone(), config.cache.ttl);
        }
        let evaluator = Arc::new(evaluator);

        let hierarchy = HierarchicalEvaluator::new(
            evaluator.clone(),
            self.hierarchy
                .unwrap_or_else(|| Arc::new(FlatHierarchy) as Arc<dyn OrganizationHierarchy>),
            config.hierarchy.clone(),
        );

        let mut compiler = AbilityCompiler::new(self.store, matcher, config.ability.clone());
        if let Some(provider) = &self.role_assignments {
            compiler = compiler.with_role_assignments(provider.clone());
        }

        let audit = self
            .audit_sink
            .unwrap_or_else(|| Arc::new(NoopAuditSink) as Arc<dyn AuditSink>);
        let field_filter = FieldFilter::new(audit.clone(), config.audit.clone());

        let notifier = Arc::new(PolicyChangeNotifier::default());
        let manager = self.repository.map(|repository| {
            let manager = PolicyManager::new(repository).with_notifier(notifier.clone());
            match &cache {
                Some(cache) => manager.with_cache(cache.clone()),
                None => manager,
            }
        });

        tracing::debug!(
            cache_enabled = cache.is_some(),
            hierarchy_enabled = config.hierarchy.enabled,
            administration = manager.is_some(),
            "Access control service built"
        );

        Ok(AccessControlService {
            config,
            evaluator,
            hierarchy,
            compiler,
            field_filter,
            audit,
            cache,
            role_assignments: self.role_assignments,
            attributes: self.attribute_catalog.map(AttributeValidator::new),
            manager,
            notifier,
        })
    }
}
