use std::sync::Arc;

use abacus_config::EngineConfig;
use abacus_core::AuditBroadcaster;
use abacus_db_memory::{MemoryOrganizationHierarchy, MemoryPolicyStore};
use abacus_policy::{AccessControlService, EvaluationContext};
use anyhow::Result;

use crate::cli::{CheckArgs, OutputFormat};
use crate::fixtures::{load_organizations, load_policies, read_json};
use crate::output::print_decision;

pub async fn run(args: &CheckArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let policies = load_policies(&args.policies)?;
    let context: EvaluationContext = read_json(&args.context)?;
    tracing::debug!(
        policies = policies.len(),
        organization_id = %context.organization_id,
        action = %context.action,
        "Checking access"
    );

    let audit = Arc::new(AuditBroadcaster::with_capacity(
        config.audit.channel_capacity,
    ));
    let mut audit_events = audit.subscribe();

    let mut builder = AccessControlService::builder(Arc::new(MemoryPolicyStore::with_policies(
        policies,
    )))
    .config(config)
    .audit_sink(audit);
    if let Some(path) = &args.orgs {
        let organizations = load_organizations(path)?;
        builder = builder.hierarchy(Arc::new(MemoryOrganizationHierarchy::with_organizations(
            organizations,
        )));
    }
    let service = builder.build()?;

    let result = match (&args.target_org, args.hierarchy) {
        (Some(target), _) => service.evaluate_cross_organization(&context, target).await,
        (None, true) => service.evaluate_with_hierarchy(&context).await,
        (None, false) => service.evaluate(&context).await,
    };

    while let Ok(event) = audit_events.try_recv() {
        tracing::info!(
            event = event.name(),
            subject_id = ?event.subject_id,
            organization_id = ?event.organization_id,
            payload = %event.payload,
            "Audit"
        );
    }

    print_decision(&result, format)
}
