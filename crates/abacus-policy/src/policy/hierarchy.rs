//! Organization hierarchy evaluation.
//!
//! Policies of an ancestor organization apply to its descendants when the
//! descendant itself has no opinion. The walk stops at the first explicit
//! decision:
//!
//! ```text
//! own organization ── deny ──▶ deny
//!        │           allow ──▶ allow
//!        ▼ no match
//! parent ─────────── deny ──▶ deny  ("... inherited from <parent name>")
//!        │           allow ──▶ allow
//!        ▼ no match
//! grandparent ... ──────────▶ deny  ("No matching policies found in hierarchy")
//! ```
//!
//! A deny at the originating organization is therefore never overridden by
//! an ancestor.

use std::sync::Arc;
use std::time::Instant;

use abacus_config::HierarchyConfig;

use crate::policy::context::{
    EvaluationContext, SOURCE_ORGANIZATION_ATTRIBUTE, TARGET_ORGANIZATION_ATTRIBUTE,
};
use crate::policy::engine::{EvaluationResult, PolicyEvaluator};
use crate::storage::OrganizationHierarchy;

/// Reason recorded when no organization of the chain decided.
pub const NO_MATCH_IN_HIERARCHY: &str = "No matching policies found in hierarchy";

/// Evaluates along the organization ancestor chain.
pub struct HierarchicalEvaluator {
    evaluator: Arc<PolicyEvaluator>,
    hierarchy: Arc<dyn OrganizationHierarchy>,
    config: HierarchyConfig,
}

impl HierarchicalEvaluator {
    #[must_use]
    pub fn new(
        evaluator: Arc<PolicyEvaluator>,
        hierarchy: Arc<dyn OrganizationHierarchy>,
        config: HierarchyConfig,
    ) -> Self {
        Self {
            evaluator,
            hierarchy,
            config,
        }
    }

    /// The single-organization evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &Arc<PolicyEvaluator> {
        &self.evaluator
    }

    /// Evaluate at the context's organization, then up its ancestors until a decision.
    pub async fn evaluate_with_hierarchy(&self, context: &EvaluationContext) -> EvaluationResult {
        let started = Instant::now();
        let local = self.evaluator.evaluate(context).await;

        if local.is_decisive() || local.is_error() || !self.config.enabled {
            return local;
        }

        let ancestors = match self.hierarchy.get_ancestors(&context.organization_id).await {
            Ok(ancestors) => ancestors,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    organization_id = %context.organization_id,
                    "Failed to load organization ancestors, denying"
                );
                return with_elapsed(EvaluationResult::fail_closed(e.to_string()), started);
            }
        };

        for ancestor in ancestors
            .iter()
            .filter(|a| a.id != context.organization_id)
            .take(self.config.max_depth)
        {
            let inherited = context.inherited_at(&ancestor.id);
            let mut result = self.evaluator.evaluate(&inherited).await;

            if result.is_error() {
                tracing::warn!(
                    organization_id = %context.organization_id,
                    ancestor_id = %ancestor.id,
                    "Ancestor evaluation failed, stopping hierarchy walk"
                );
                return with_elapsed(result, started);
            }

            if !result.denied_policies.is_empty() {
                tracing::debug!(
                    organization_id = %context.organization_id,
                    ancestor_id = %ancestor.id,
                    "Denied by ancestor organization"
                );
                result.reasons.push(format!(
                    "Access denied by policy inherited from {} ({})",
                    ancestor.name, ancestor.id
                ));
                return with_elapsed(result, started);
            }

            if result.allowed {
                tracing::debug!(
                    organization_id = %context.organization_id,
                    ancestor_id = %ancestor.id,
                    "Allowed by ancestor organization"
                );
                result.reasons.push(format!(
                    "Access allowed by policy inherited from {} ({})",
                    ancestor.name, ancestor.id
                ));
                return with_elapsed(result, started);
            }
        }

        with_elapsed(EvaluationResult::deny(NO_MATCH_IN_HIERARCHY), started)
    }

    /// Evaluate an access that crosses from the context's organization into `target_organization_id`.
    ///
    /// Both sides must allow. The source side sees the target id in
    /// `resource.attributes.targetOrganizationId`; the target side sees the
    /// source id in `subject.attributes.sourceOrganizationId`.
    pub async fn evaluate_cross_organization(
        &self,
        context: &EvaluationContext,
        target_organization_id: &str,
    ) -> EvaluationResult {
        let started = Instant::now();
        let source_organization_id = context.organization_id.clone();

        let mut source_context = context.clone();
        source_context.resource.attributes.insert(
            TARGET_ORGANIZATION_ATTRIBUTE.to_string(),
            target_organization_id.into(),
        );
        let mut source = self.evaluate_with_hierarchy(&source_context).await;
        if !source.allowed {
            source.reasons.push(format!(
                "Cross-organization access denied by source organization {source_organization_id}"
            ));
            return with_elapsed(source, started);
        }

        let mut target_context = context.clone();
        target_context.organization_id = target_organization_id.to_string();
        target_context.subject.attributes.insert(
            SOURCE_ORGANIZATION_ATTRIBUTE.to_string(),
            source_organization_id.clone().into(),
        );
        let mut target = self.evaluate_with_hierarchy(&target_context).await;
        if !target.allowed {
            target.reasons.push(format!(
                "Cross-organization access denied by target organization {target_organization_id}"
            ));
            return with_elapsed(target, started);
        }

        let mut combined = source;
        combined.matched_policies.extend(target.matched_policies);
        combined.reasons.extend(target.reasons);
        combined.cached = combined.cached && target.cached;
        with_elapsed(combined, started)
    }
}

fn with_elapsed(mut result: EvaluationResult, started: Instant) -> EvaluationResult {
    result.evaluation_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    result
}
