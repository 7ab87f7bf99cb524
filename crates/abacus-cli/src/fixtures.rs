//! JSON fixture loading.

use std::fs;
use std::path::Path;

use abacus_policy::{Organization, Policy, RoleAssignment};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Raw entries of a policy file. Accepts a bare array or `{"policies": [...]}`.
pub fn read_policy_entries(path: &Path) -> Result<Vec<Value>> {
    match read_json::<Value>(path)? {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut object) => match object.remove("policies") {
            Some(Value::Array(entries)) => Ok(entries),
            _ => anyhow::bail!(
                "{}: expected an array of policies or an object with a \"policies\" array",
                path.display()
            ),
        },
        _ => anyhow::bail!("{}: expected an array of policies", path.display()),
    }
}

/// Load and validate every policy in a file. The first invalid policy aborts loading.
pub fn load_policies(path: &Path) -> Result<Vec<Policy>> {
    read_policy_entries(path)?
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let policy: Policy = serde_json::from_value(entry)
                .with_context(|| format!("Policy #{index} in {}", path.display()))?;
            policy
                .validate()
                .with_context(|| format!("Policy {} is invalid", policy.id))?;
            Ok(policy)
        })
        .collect()
}

pub fn load_organizations(path: &Path) -> Result<Vec<Organization>> {
    read_json(path)
}

pub fn load_role_assignments(path: &Path) -> Result<Vec<RoleAssignment>> {
    read_json(path)
}
