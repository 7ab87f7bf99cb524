use std::collections::HashSet;

use abacus_policy::Policy;
use anyhow::Result;
use colored::Colorize;
use serde_json::Value;

use crate::cli::{OutputFormat, ValidateArgs};
use crate::fixtures::read_policy_entries;
use crate::output::{ValidationReport, print_error, print_success, print_validation};

pub fn run(args: &ValidateArgs, format: OutputFormat) -> Result<()> {
    let reports = validate_entries(read_policy_entries(&args.policies)?);
    print_validation(&reports, format)?;

    let invalid = reports.iter().filter(|r| !r.valid).count();
    if invalid > 0 {
        print_error(&format!(
            "{} of {} policies invalid",
            invalid.to_string().red(),
            reports.len()
        ));
        anyhow::bail!("Validation failed for {}", args.policies.display());
    }
    print_success(&format!("{} policies valid", reports.len()));
    Ok(())
}

fn validate_entries(entries: Vec<Value>) -> Vec<ValidationReport> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let field = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
            let id = field("id");
            let name = field("name");

            let error = match serde_json::from_value::<Policy>(entry) {
                Err(e) => Some(format!("Malformed policy: {e}")),
                Ok(policy) => match policy.validate() {
                    Err(e) => Some(e.to_string()),
                    Ok(()) if !seen.insert(policy.id.clone()) => {
                        Some(format!("Duplicate policy id: {}", policy.id))
                    }
                    Ok(()) => None,
                },
            };

            ValidationReport {
                index,
                id,
                name,
                valid: error.is_none(),
                error,
            }
        })
        .collect()
}
