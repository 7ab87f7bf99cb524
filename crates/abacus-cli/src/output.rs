use abacus_policy::{CompiledAbility, EvaluationResult};
use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

/// Outcome of validating one entry of a policy file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_validation(reports: &[ValidationReport], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&reports),
        OutputFormat::Table => {
            if reports.is_empty() {
                println!("No policies found.");
                return Ok(());
            }
            let mut builder = Builder::default();
            builder.push_record(["#", "ID", "Name", "Result"]);
            for report in reports {
                let result = match &report.error {
                    None => "ok".to_string(),
                    Some(error) => error.clone(),
                };
                builder.push_record([
                    report.index.to_string(),
                    report.id.clone().unwrap_or_else(|| "-".to_string()),
                    report.name.clone().unwrap_or_else(|| "-".to_string()),
                    result,
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));
            Ok(())
        }
    }
}

pub fn print_decision(result: &EvaluationResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            let verdict = if result.allowed {
                "ALLOW".green().bold()
            } else {
                "DENY".red().bold()
            };
            println!(
                "{} {} ({:.3} ms{})",
                "Decision:".cyan(),
                verdict,
                result.evaluation_time_ms,
                if result.cached { ", cached" } else { "" }
            );

            if !result.matched_policies.is_empty() || !result.denied_policies.is_empty() {
                let mut builder = Builder::default();
                builder.push_record(["Effect", "ID", "Name", "Priority", "Organization"]);
                for (label, policies) in [
                    ("allow", &result.matched_policies),
                    ("deny", &result.denied_policies),
                ] {
                    for policy in policies {
                        builder.push_record([
                            label.to_string(),
                            policy.id.clone(),
                            policy.name.clone(),
                            policy.priority.to_string(),
                            policy.organization_id.clone(),
                        ]);
                    }
                }
                println!("{}", builder.build().with(Style::rounded()));
            }

            for reason in &result.reasons {
                println!("  {} {reason}", "-".dimmed());
            }
            if let Some(error) = &result.error {
                println!("{} {error}", "Error:".red());
            }
            Ok(())
        }
    }
}

pub fn print_ability(compiled: &CompiledAbility, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(compiled),
        OutputFormat::Table => {
            println!(
                "{} {}  {} {}",
                "Roles:".cyan(),
                if compiled.roles.is_empty() {
                    "-".to_string()
                } else {
                    compiled.roles.join(", ")
                },
                "Source:".cyan(),
                serde_json::to_value(compiled.source)?
                    .as_str()
                    .unwrap_or_default()
            );

            if compiled.ability.is_empty() {
                println!("No capabilities.");
            } else {
                let mut builder = Builder::default();
                builder.push_record(["Rule", "Action", "Resource", "Conditions", "Policy"]);
                for rule in &compiled.ability.rules {
                    let conditions = match &rule.conditions {
                        Some(conditions) => serde_json::to_string(conditions)?,
                        None => "-".to_string(),
                    };
                    builder.push_record([
                        if rule.inverted { "cannot" } else { "can" }.to_string(),
                        rule.action.clone(),
                        rule.resource_type.clone(),
                        conditions,
                        rule.policy_id.clone().unwrap_or_else(|| "-".to_string()),
                    ]);
                }
                println!("{}", builder.build().with(Style::rounded()));
            }

            if !compiled.field_permissions.is_empty() {
                let join = |fields: &std::collections::BTreeSet<String>| {
                    if fields.is_empty() {
                        "*".to_string()
                    } else {
                        fields.iter().cloned().collect::<Vec<_>>().join(", ")
                    }
                };
                let mut builder = Builder::default();
                builder.push_record(["Resource", "Readable", "Writable", "Denied"]);
                for (resource_type, set) in &compiled.field_permissions {
                    builder.push_record([
                        resource_type.clone(),
                        join(&set.readable),
                        join(&set.writable),
                        if set.denied.is_empty() {
                            "-".to_string()
                        } else {
                            set.denied.iter().cloned().collect::<Vec<_>>().join(", ")
                        },
                    ]);
                }
                println!("{}", builder.build().with(Style::rounded()));
            }
            Ok(())
        }
    }
}
