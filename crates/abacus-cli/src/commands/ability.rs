use std::sync::Arc;

use abacus_config::EngineConfig;
use abacus_db_memory::{MemoryPolicyStore, MemoryRoleAssignments};
use abacus_policy::{AbilityUser, AccessControlService, CompileOptions};
use anyhow::Result;

use crate::cli::{AbilityArgs, OutputFormat};
use crate::fixtures::{load_policies, load_role_assignments, read_json};
use crate::output::print_ability;

pub async fn run(args: &AbilityArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let policies = load_policies(&args.policies)?;
    let user: AbilityUser = read_json(&args.user)?;
    if user.id.trim().is_empty() {
        anyhow::bail!("{}: user id is required", args.user.display());
    }

    let mut builder = AccessControlService::builder(Arc::new(MemoryPolicyStore::with_policies(
        policies,
    )))
    .config(config);
    if let Some(path) = &args.roles {
        let assignments = MemoryRoleAssignments::new();
        for assignment in load_role_assignments(path)? {
            assignments.assign(user.id.clone(), assignment).await;
        }
        builder = builder.role_assignments(Arc::new(assignments));
    }
    let service = builder.build()?;

    let compiled = service
        .compile_ability(&user, &args.org, &CompileOptions::default())
        .await?;
    tracing::debug!(
        user_id = %user.id,
        organization_id = %args.org,
        rules = compiled.ability.rules.len(),
        "Ability compiled"
    );

    print_ability(&compiled, format)
}
