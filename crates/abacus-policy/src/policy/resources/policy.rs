//! Policy resource type.
//!
//! # Example
//!
//! ```ignore
//! use abacus_policy::policy::resources::{PolicyEffect, PolicyInput, ResourceCriteria, SubjectCriteria};
//!
//! let input = PolicyInput {
//!     name: "Managers read own-org products".to_string(),
//!     effect: PolicyEffect::Allow,
//!     priority: 100,
//!     subjects: SubjectCriteria {
//!         roles: vec!["manager".to_string()],
//!         ..Default::default()
//!     },
//!     resources: ResourceCriteria {
//!         types: vec!["product".to_string()],
//!         ..Default::default()
//!     },
//!     actions: vec!["read".to_string()],
//!     organization_id: "org-1".to_string(),
//!     ..Default::default()
//! };
//!
//! input.validate()?;
//! ```

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::policy::fields::FieldPermissionSet;
use crate::policy::matcher::attributes::{is_regex_literal, operator_name};
use crate::policy::matcher::time_window::{parse_clock, parse_offset};

/// Inclusive priority range accepted at create/update time.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 0..=1000;

// =============================================================================
// Effect
// =============================================================================

/// Outcome a matching policy contributes to the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// Grant access.
    #[default]
    Allow,
    /// Deny access. Any matching deny overrides every allow.
    Deny,
}

impl PolicyEffect {
    /// Returns the wire name of the effect.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    /// Returns `true` for [`PolicyEffect::Deny`].
    #[must_use]
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }
}

impl std::fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Criteria
// =============================================================================

/// Who a policy applies to.
///
/// Every non-empty category must match (AND). `*` in a list matches any value.
/// A criteria block that declares nothing matches nobody.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectCriteria {
    /// Subject ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,

    /// Role names (any role matches).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Group names (any group matches).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Attribute predicates keyed by dot path into the subject attributes.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl SubjectCriteria {
    /// Returns `true` if no criterion is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.roles.is_empty()
            && self.groups.is_empty()
            && self.attributes.is_empty()
    }
}

/// Which resources a policy applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceCriteria {
    /// Resource types.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,

    /// Resource ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,

    /// Attribute predicates keyed by dot path into the resource attributes.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl ResourceCriteria {
    /// Returns `true` if no criterion is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.ids.is_empty() && self.attributes.is_empty()
    }

    /// Returns `true` if the criteria can match `resource_type`.
    ///
    /// Criteria without a type list are type-agnostic.
    #[must_use]
    pub fn covers_type(&self, resource_type: &str) -> bool {
        self.types.is_empty() || self.types.iter().any(|t| t == "*" || t == resource_type)
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Environmental conditions that must all hold for a policy to match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConditions {
    /// Time-of-day window tested against `environment.timestamp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,

    /// Allowed client addresses: exact, `*` glob or CIDR.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,

    /// Blocked client addresses: exact, `*` glob or CIDR.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_ips: Vec<String>,

    /// Allowed values of `environment.attributes.location`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,

    /// Custom predicates by hook name. Evaluated last.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
}

impl PolicyConditions {
    /// Returns `true` if no condition is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time_window.is_none()
            && self.ip_addresses.is_empty()
            && self.blocked_ips.is_empty()
            && self.locations.is_empty()
            && self.custom.is_empty()
    }
}

/// A daily time window, `HH:MM` to `HH:MM`.
///
/// `start` is inclusive and `end` exclusive. A window whose start is later
/// than its end wraps midnight.
///
/// Only `UTC` and fixed offsets are understood. IANA zone names such as
/// `Europe/Berlin` are rejected when the policy is validated, so a window
/// does not follow daylight-saving changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    /// Window start, `HH:MM`.
    pub start: String,

    /// Window end, `HH:MM`.
    pub end: String,

    /// Days the window is open. Absent means every day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<WeekdaySpec>>,

    /// `UTC` or a fixed offset such as `+02:00`. Absent means UTC.
    /// Zone names are not accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// A day of week, either `0..=6` (Sunday = 0) or an English day name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeekdaySpec {
    /// Numeric day, Sunday = 0.
    Index(u8),
    /// Full or three-letter day name, case-insensitive.
    Name(String),
}

impl WeekdaySpec {
    /// Resolve to a [`time::Weekday`].
    #[must_use]
    pub fn to_weekday(&self) -> Option<time::Weekday> {
        use time::Weekday::*;
        match self {
            Self::Index(i) => match i {
                0 => Some(Sunday),
                1 => Some(Monday),
                2 => Some(Tuesday),
                3 => Some(Wednesday),
                4 => Some(Thursday),
                5 => Some(Friday),
                6 => Some(Saturday),
                _ => None,
            },
            Self::Name(name) => match name.to_ascii_lowercase().as_str() {
                "sun" | "sunday" => Some(Sunday),
                "mon" | "monday" => Some(Monday),
                "tue" | "tuesday" => Some(Tuesday),
                "wed" | "wednesday" => Some(Wednesday),
                "thu" | "thursday" => Some(Thursday),
                "fri" | "friday" => Some(Friday),
                "sat" | "saturday" => Some(Saturday),
                _ => None,
            },
        }
    }
}

// =============================================================================
// Audit record
// =============================================================================

/// Creation and modification stamps embedded in persisted entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl AuditRecord {
    /// Stamp a new record.
    #[must_use]
    pub fn created(actor: Option<&str>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor.map(str::to_string),
            updated_by: actor.map(str::to_string),
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, actor: Option<&str>) {
        self.updated_at = OffsetDateTime::now_utc();
        self.updated_by = actor.map(str::to_string);
    }
}

impl Default for AuditRecord {
    fn default() -> Self {
        Self::created(None)
    }
}

// =============================================================================
// Policy
// =============================================================================

fn default_active() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

/// A persisted access-control policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub effect: PolicyEffect,

    /// Significance, `0..=1000`. Higher is evaluated first.
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub subjects: SubjectCriteria,

    #[serde(default)]
    pub resources: ResourceCriteria,

    /// Action names, `*` for any action.
    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default, skip_serializing_if = "PolicyConditions::is_empty")]
    pub conditions: PolicyConditions,

    pub organization_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_set_id: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Incremented whenever effect, subjects, resources, actions or conditions change.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Field permissions keyed by resource type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_permissions: BTreeMap<String, FieldPermissionSet>,

    #[serde(default)]
    pub audit: AuditRecord,
}

impl Policy {
    /// Returns `true` if the policy lists `action` or `*`.
    #[must_use]
    pub fn covers_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == "*" || a == action)
    }

    /// Validate the policy for persistence.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        validate_parts(PolicyParts {
            name: &self.name,
            priority: self.priority,
            subjects: &self.subjects,
            resources: &self.resources,
            actions: &self.actions,
            conditions: &self.conditions,
            organization_id: &self.organization_id,
            field_permissions: &self.field_permissions,
        })
    }

    /// Returns `true` if `other` differs in a way that changes decisions.
    #[must_use]
    pub fn semantically_differs(&self, other: &Policy) -> bool {
        self.effect != other.effect
            || self.subjects != other.subjects
            || self.resources != other.resources
            || self.actions != other.actions
            || self.conditions != other.conditions
    }

    /// Returns `true` if the outcome can change with `environment.timestamp`.
    #[must_use]
    pub fn depends_on_time(&self) -> bool {
        self.conditions.time_window.is_some()
            || self.subjects.attributes.values().any(mentions_timestamp)
            || self.resources.attributes.values().any(mentions_timestamp)
    }
}

fn mentions_timestamp(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("${environment.timestamp"),
        Value::Array(items) => items.iter().any(mentions_timestamp),
        Value::Object(map) => map.values().any(mentions_timestamp),
        _ => false,
    }
}

/// Input for creating a policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyInput {
    pub name: String,
    pub description: Option<String>,
    pub effect: PolicyEffect,
    pub priority: i32,
    pub subjects: SubjectCriteria,
    pub resources: ResourceCriteria,
    pub actions: Vec<String>,
    pub conditions: PolicyConditions,
    pub organization_id: String,
    pub policy_set_id: Option<String>,
    pub field_permissions: BTreeMap<String, FieldPermissionSet>,
}

impl PolicyInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_parts(PolicyParts {
            name: &self.name,
            priority: self.priority,
            subjects: &self.subjects,
            resources: &self.resources,
            actions: &self.actions,
            conditions: &self.conditions,
            organization_id: &self.organization_id,
            field_permissions: &self.field_permissions,
        })
    }

    /// Build a new active policy at version 1.
    #[must_use]
    pub fn into_policy(self, id: String, actor: Option<&str>) -> Policy {
        Policy {
            id,
            name: self.name,
            description: self.description,
            effect: self.effect,
            priority: self.priority,
            subjects: self.subjects,
            resources: self.resources,
            actions: self.actions,
            conditions: self.conditions,
            organization_id: self.organization_id,
            policy_set_id: self.policy_set_id,
            is_active: true,
            version: 1,
            field_permissions: self.field_permissions,
            audit: AuditRecord::created(actor),
        }
    }
}

/// Partial update of a policy. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub effect: Option<PolicyEffect>,
    pub priority: Option<i32>,
    pub subjects: Option<SubjectCriteria>,
    pub resources: Option<ResourceCriteria>,
    pub actions: Option<Vec<String>>,
    pub conditions: Option<PolicyConditions>,
    pub policy_set_id: Option<String>,
    pub field_permissions: Option<BTreeMap<String, FieldPermissionSet>>,
}

impl PolicyUpdate {
    /// Apply the update to a copy of `policy`. Version and audit stamps are untouched.
    #[must_use]
    pub fn apply_to(self, policy: &Policy) -> Policy {
        let mut next = policy.clone();
        if let Some(name) = self.name {
            next.name = name;
        }
        if let Some(description) = self.description {
            next.description = Some(description);
        }
        if let Some(effect) = self.effect {
            next.effect = effect;
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(subjects) = self.subjects {
            next.subjects = subjects;
        }
        if let Some(resources) = self.resources {
            next.resources = resources;
        }
        if let Some(actions) = self.actions {
            next.actions = actions;
        }
        if let Some(conditions) = self.conditions {
            next.conditions = conditions;
        }
        if let Some(policy_set_id) = self.policy_set_id {
            next.policy_set_id = Some(policy_set_id);
        }
        if let Some(field_permissions) = self.field_permissions {
            next.field_permissions = field_permissions;
        }
        next
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Policy validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("At least one {0} criterion is required")]
    MissingCriteria(&'static str),

    #[error("Invalid priority: {0}. Must be between 0 and 1000")]
    InvalidPriority(i32),

    #[error("Invalid IP pattern: {0}")]
    InvalidCidr(String),

    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("Invalid field permissions: {0}")]
    InvalidFieldPermissions(String),
}

struct PolicyParts<'a> {
    name: &'a str,
    priority: i32,
    subjects: &'a SubjectCriteria,
    resources: &'a ResourceCriteria,
    actions: &'a [String],
    conditions: &'a PolicyConditions,
    organization_id: &'a str,
    field_permissions: &'a BTreeMap<String, FieldPermissionSet>,
}

fn validate_parts(parts: PolicyParts<'_>) -> Result<(), ValidationError> {
    if parts.name.trim().is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if parts.organization_id.trim().is_empty() {
        return Err(ValidationError::MissingField("organizationId"));
    }
    if parts.subjects.is_empty() {
        return Err(ValidationError::MissingCriteria("subject"));
    }
    if parts.resources.is_empty() {
        return Err(ValidationError::MissingCriteria("resource"));
    }
    if parts.actions.iter().all(|a| a.trim().is_empty()) {
        return Err(ValidationError::MissingCriteria("action"));
    }
    if !PRIORITY_RANGE.contains(&parts.priority) {
        return Err(ValidationError::InvalidPriority(parts.priority));
    }

    for value in parts
        .subjects
        .attributes
        .values()
        .chain(parts.resources.attributes.values())
    {
        validate_patterns(value)?;
    }

    validate_conditions(parts.conditions)?;

    for (resource_type, set) in parts.field_permissions {
        if resource_type.trim().is_empty() {
            return Err(ValidationError::InvalidFieldPermissions(
                "resource type must not be empty".to_string(),
            ));
        }
        let blank = set
            .readable
            .iter()
            .chain(&set.writable)
            .chain(&set.denied)
            .any(|f| f.trim().is_empty());
        if blank {
            return Err(ValidationError::InvalidFieldPermissions(format!(
                "empty field name for {resource_type}"
            )));
        }
    }

    Ok(())
}

fn validate_conditions(conditions: &PolicyConditions) -> Result<(), ValidationError> {
    if let Some(window) = &conditions.time_window {
        for clock in [&window.start, &window.end] {
            if parse_clock(clock).is_none() {
                return Err(ValidationError::InvalidTimeWindow(clock.clone()));
            }
        }
        if let Some(days) = &window.days
            && let Some(bad) = days.iter().find(|d| d.to_weekday().is_none())
        {
            return Err(ValidationError::InvalidTimeWindow(format!(
                "unknown day {bad:?}"
            )));
        }
        if let Some(tz) = &window.timezone
            && parse_offset(tz).is_none()
        {
            return Err(ValidationError::InvalidTimezone(tz.clone()));
        }
    }

    for pattern in conditions.ip_addresses.iter().chain(&conditions.blocked_ips) {
        if pattern.contains('/') {
            pattern
                .parse::<ipnetwork::IpNetwork>()
                .map_err(|_| ValidationError::InvalidCidr(pattern.clone()))?;
        } else if pattern.trim().is_empty() {
            return Err(ValidationError::InvalidCidr(pattern.clone()));
        }
    }

    Ok(())
}

/// Check that every literal regular expression in a predicate compiles.
fn validate_patterns(value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::String(s) if is_regex_literal(s) && !s.contains("${") => {
            compile_check(&s[1..s.len() - 1])
        }
        Value::Object(map) => {
            for (key, operand) in map {
                if matches!(operator_name(key), Some("regex")) {
                    if let Value::String(pattern) = operand
                        && !pattern.contains("${")
                    {
                        let body = if is_regex_literal(pattern) {
                            &pattern[1..pattern.len() - 1]
                        } else {
                            pattern.as_str()
                        };
                        compile_check(body)?;
                    }
                } else {
                    validate_patterns(operand)?;
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(validate_patterns),
        _ => Ok(()),
    }
}

fn compile_check(pattern: &str) -> Result<(), ValidationError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidRegex(pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_input() -> PolicyInput {
        PolicyInput {
            name: "Read products".to_string(),
            effect: PolicyEffect::Allow,
            priority: 100,
            subjects: SubjectCriteria {
                roles: vec!["user".to_string()],
                ..Default::default()
            },
            resources: ResourceCriteria {
                types: vec!["product".to_string()],
                ..Default::default()
            },
            actions: vec!["read".to_string()],
            organization_id: "org-1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_input() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_depends_on_time() {
        let policy = valid_input().into_policy("p-1".to_string(), None);
        assert!(!policy.depends_on_time());

        let mut windowed = policy.clone();
        windowed.conditions.time_window = Some(TimeWindow {
            start: "09:00".to_string(),
            end: "17:00".to_string(),
            days: None,
            timezone: None,
        });
        assert!(windowed.depends_on_time());

        let mut variable = policy;
        variable.resources.attributes.insert(
            "validFrom".to_string(),
            json!({"lte": "${environment.timestamp}"}),
        );
        assert!(variable.depends_on_time());
    }

    #[test]
    fn test_missing_criteria() {
        let mut input = valid_input();
        input.subjects = SubjectCriteria::default();
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingCriteria("subject"))
        );

        let mut input = valid_input();
        input.resources = ResourceCriteria::default();
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingCriteria("resource"))
        );

        let mut input = valid_input();
        input.actions.clear();
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingCriteria("action"))
        );
    }

    #[test]
    fn test_priority_range() {
        let mut input = valid_input();
        input.priority = 1001;
        assert_eq!(input.validate(), Err(ValidationError::InvalidPriority(1001)));

        input.priority = -1;
        assert_eq!(input.validate(), Err(ValidationError::InvalidPriority(-1)));

        input.priority = 1000;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_invalid_conditions() {
        let mut input = valid_input();
        input.conditions.ip_addresses = vec!["10.0.0.0/99".to_string()];
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidCidr(_))
        ));

        let mut input = valid_input();
        input.conditions.time_window = Some(TimeWindow {
            start: "25:00".to_string(),
            end: "09:00".to_string(),
            days: None,
            timezone: None,
        });
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidTimeWindow(_))
        ));

        let mut input = valid_input();
        input.conditions.time_window = Some(TimeWindow {
            start: "17:00".to_string(),
            end: "09:00".to_string(),
            days: None,
            timezone: Some("Mars/Olympus".to_string()),
        });
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_invalid_regex_in_attributes() {
        let mut input = valid_input();
        input
            .resources
            .attributes
            .insert("sku".to_string(), json!("/[unclosed/"));
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidRegex(_))
        ));

        let mut input = valid_input();
        input
            .resources
            .attributes
            .insert("sku".to_string(), json!({"$regex": "(abc"}));
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidRegex(_))
        ));
    }

    #[test]
    fn test_update_detects_semantic_change() {
        let policy = valid_input().into_policy("p-1".to_string(), Some("admin"));
        assert_eq!(policy.version, 1);
        assert!(policy.is_active);

        let renamed = PolicyUpdate {
            name: Some("Renamed".to_string()),
            priority: Some(10),
            ..Default::default()
        }
        .apply_to(&policy);
        assert!(!policy.semantically_differs(&renamed));

        let flipped = PolicyUpdate {
            effect: Some(PolicyEffect::Deny),
            ..Default::default()
        }
        .apply_to(&policy);
        assert!(policy.semantically_differs(&flipped));
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: Policy = serde_json::from_value(json!({
            "id": "p-1",
            "name": "Deny after hours",
            "effect": "deny",
            "priority": 40,
            "subjects": {"roles": ["user"]},
            "resources": {"types": ["order"]},
            "actions": ["delete"],
            "conditions": {"timeWindow": {"start": "17:00", "end": "09:00", "days": [1, "fri"]}},
            "organizationId": "org-1"
        }))
        .unwrap();

        assert!(policy.is_active);
        assert_eq!(policy.version, 1);
        assert!(policy.effect.is_deny());
        assert!(policy.validate().is_ok());
        let days = policy.conditions.time_window.unwrap().days.unwrap();
        assert_eq!(days[0].to_weekday(), Some(time::Weekday::Monday));
        assert_eq!(days[1].to_weekday(), Some(time::Weekday::Friday));
    }

    #[test]
    fn test_covers_action_and_type() {
        let mut policy = valid_input().into_policy("p-1".to_string(), None);
        assert!(policy.covers_action("read"));
        assert!(!policy.covers_action("delete"));
        policy.actions = vec!["*".to_string()];
        assert!(policy.covers_action("delete"));

        assert!(policy.resources.covers_type("product"));
        assert!(!policy.resources.covers_type("order"));
    }
}
