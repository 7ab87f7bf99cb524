use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "abacus")]
#[command(about = "Abacus CLI - validate policies and run access decisions offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine configuration file (defaults to ./abacus.toml when present)
    #[arg(short, long, global = true, env = "ABACUS_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every policy in a JSON file
    Validate(ValidateArgs),
    /// Decide one access request
    Check(CheckArgs),
    /// Compile the capabilities and field permissions of a user
    Ability(AbilityArgs),
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// JSON array of policies
    pub policies: PathBuf,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// JSON array of policies
    #[arg(long)]
    pub policies: PathBuf,
    /// Evaluation context (subject, resource, action, environment, organizationId)
    #[arg(long)]
    pub context: PathBuf,
    /// JSON array of organizations forming the hierarchy
    #[arg(long)]
    pub orgs: Option<PathBuf>,
    /// Fall back to policies inherited from ancestor organizations
    #[arg(long)]
    pub hierarchy: bool,
    /// Evaluate as a cross-organization access into this organization
    #[arg(long, conflicts_with = "hierarchy")]
    pub target_org: Option<String>,
}

#[derive(clap::Args)]
pub struct AbilityArgs {
    /// JSON array of policies
    #[arg(long)]
    pub policies: PathBuf,
    /// User document (id, roles, groups, attributes, isSuperAdmin)
    #[arg(long)]
    pub user: PathBuf,
    /// Organization to compile the ability for
    #[arg(long)]
    pub org: String,
    /// JSON array of role assignments for the user
    #[arg(long)]
    pub roles: Option<PathBuf>,
}
