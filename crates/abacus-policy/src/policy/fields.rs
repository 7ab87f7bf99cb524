//! Field-level permissions and payload filtering.
//!
//! A [`FieldPermissionSet`] classifies the fields of one resource type into
//! readable, writable and denied sets. Denied always wins. Filtering is
//! shallow: top-level keys of objects (and of each object in an array) are
//! kept or dropped, nested values pass through untouched.
//!
//! [`FieldFilter`] wraps the pure filters and reports sensitive-field access
//! and stripped fields to the audit sink without blocking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use abacus_config::AuditConfig;
use abacus_core::{AuditEvent, AuditEventKind, AuditSink};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Field classification for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldPermissionSet {
    /// Fields that may be read. Empty means every non-denied field.
    pub readable: BTreeSet<String>,
    /// Fields that may be written. Empty means every non-denied field.
    pub writable: BTreeSet<String>,
    /// Fields that may never be read or written.
    pub denied: BTreeSet<String>,
}

impl FieldPermissionSet {
    /// Union another set into this one.
    pub fn merge(&mut self, other: &FieldPermissionSet) {
        self.readable.extend(other.readable.iter().cloned());
        self.writable.extend(other.writable.iter().cloned());
        self.denied.extend(other.denied.iter().cloned());
    }

    /// Drop denied fields from the readable and writable sets.
    pub fn normalize(&mut self) {
        let denied = &self.denied;
        self.readable.retain(|f| !denied.contains(f));
        self.writable.retain(|f| !denied.contains(f));
    }

    /// Returns `true` if `field` may be read.
    #[must_use]
    pub fn can_read(&self, field: &str) -> bool {
        !self.denied.contains(field) && (self.readable.is_empty() || self.readable.contains(field))
    }

    /// Returns `true` if `field` may be written.
    #[must_use]
    pub fn can_write(&self, field: &str) -> bool {
        !self.denied.contains(field) && (self.writable.is_empty() || self.writable.contains(field))
    }
}

/// Field permissions of every resource type, keyed by type.
pub type FieldPermissions = BTreeMap<String, FieldPermissionSet>;

/// Merge `source` into `target`, type by type.
pub fn merge_field_permissions(target: &mut FieldPermissions, source: &FieldPermissions) {
    for (resource_type, set) in source {
        target.entry(resource_type.clone()).or_default().merge(set);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    fn allows(self, permissions: &FieldPermissionSet, field: &str) -> bool {
        match self {
            Self::Read => permissions.can_read(field),
            Self::Write => permissions.can_write(field),
        }
    }
}

/// Strip fields the caller may not read. `None` passes data through.
#[must_use]
pub fn filter_for_read(data: &Value, permissions: Option<&FieldPermissionSet>) -> Value {
    filter(data, permissions, Direction::Read, &mut BTreeSet::new())
}

/// Strip fields the caller may not write. `None` passes data through.
#[must_use]
pub fn filter_for_write(data: &Value, permissions: Option<&FieldPermissionSet>) -> Value {
    filter(data, permissions, Direction::Write, &mut BTreeSet::new())
}

fn filter(
    data: &Value,
    permissions: Option<&FieldPermissionSet>,
    direction: Direction,
    removed: &mut BTreeSet<String>,
) -> Value {
    let Some(permissions) = permissions else {
        return data.clone();
    };
    match data {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| filter(item, Some(permissions), direction, removed))
                .collect(),
        ),
        Value::Object(map) => {
            let mut kept = Map::with_capacity(map.len());
            for (key, value) in map {
                if direction.allows(permissions, key) {
                    kept.insert(key.clone(), value.clone());
                } else {
                    removed.insert(key.clone());
                }
            }
            Value::Object(kept)
        }
        other => other.clone(),
    }
}

fn top_level_keys(data: &Value, out: &mut BTreeSet<String>) {
    match data {
        Value::Array(items) => items.iter().for_each(|item| top_level_keys(item, out)),
        Value::Object(map) => out.extend(map.keys().cloned()),
        _ => {}
    }
}

/// Who is reading or writing, for audit purposes.
#[derive(Debug, Clone, Default)]
pub struct FieldAccessActor {
    pub subject_id: Option<String>,
    pub organization_id: Option<String>,
}

/// Field filter that publishes audit events.
#[derive(Clone)]
pub struct FieldFilter {
    sink: Arc<dyn AuditSink>,
    config: AuditConfig,
}

impl std::fmt::Debug for FieldFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldFilter")
            .field("enabled", &self.config.enabled)
            .finish()
    }
}

impl FieldFilter {
    /// Create a filter publishing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        Self { sink, config }
    }

    /// Filter an outbound payload.
    #[must_use]
    pub fn filter_for_read(
        &self,
        resource_type: &str,
        data: &Value,
        permissions: Option<&FieldPermissionSet>,
        actor: &FieldAccessActor,
    ) -> Value {
        self.apply(resource_type, data, permissions, actor, Direction::Read)
    }

    /// Filter an inbound payload.
    #[must_use]
    pub fn filter_for_write(
        &self,
        resource_type: &str,
        data: &Value,
        permissions: Option<&FieldPermissionSet>,
        actor: &FieldAccessActor,
    ) -> Value {
        self.apply(resource_type, data, permissions, actor, Direction::Write)
    }

    fn apply(
        &self,
        resource_type: &str,
        data: &Value,
        permissions: Option<&FieldPermissionSet>,
        actor: &FieldAccessActor,
        direction: Direction,
    ) -> Value {
        let mut removed = BTreeSet::new();
        let filtered = filter(data, permissions, direction, &mut removed);

        if !self.config.enabled {
            return filtered;
        }

        let mut touched = BTreeSet::new();
        top_level_keys(&filtered, &mut touched);
        let sensitive: Vec<&String> = touched
            .iter()
            .filter(|field| self.config.is_sensitive(resource_type, field))
            .collect();

        if !sensitive.is_empty() {
            self.publish(
                AuditEventKind::SensitiveFieldAccess,
                resource_type,
                actor,
                json!({ "operation": direction.as_str(), "fields": sensitive }),
            );
        }

        if !removed.is_empty() {
            tracing::debug!(
                resource_type = %resource_type,
                operation = direction.as_str(),
                fields = ?removed,
                "Fields stripped by field permissions"
            );
            self.publish(
                AuditEventKind::FieldAccessDenied,
                resource_type,
                actor,
                json!({ "operation": direction.as_str(), "fields": removed }),
            );
        }

        filtered
    }

    fn publish(
        &self,
        kind: AuditEventKind,
        resource_type: &str,
        actor: &FieldAccessActor,
        payload: Value,
    ) {
        let mut event = AuditEvent::new(kind, payload).with_resource_type(resource_type);
        if let Some(subject_id) = &actor.subject_id {
            event = event.with_subject(subject_id.clone());
        }
        if let Some(organization_id) = &actor.organization_id {
            event = event.with_organization(organization_id.clone());
        }
        self.sink.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abacus_core::AuditBroadcaster;

    fn set(readable: &[&str], writable: &[&str], denied: &[&str]) -> FieldPermissionSet {
        FieldPermissionSet {
            readable: readable.iter().map(|s| s.to_string()).collect(),
            writable: writable.iter().map(|s| s.to_string()).collect(),
            denied: denied.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_read_filter_with_readable_list() {
        let perms = set(&["id", "name", "price"], &[], &["costPrice"]);
        let data = json!({
            "id": 1, "name": "Widget", "price": 9.5, "costPrice": 3.0, "description": "x"
        });
        assert_eq!(
            filter_for_read(&data, Some(&perms)),
            json!({"id": 1, "name": "Widget", "price": 9.5})
        );
    }

    #[test]
    fn test_denied_wins_over_readable() {
        let perms = set(&["id", "costPrice"], &[], &["costPrice"]);
        let out = filter_for_read(&json!({"id": 1, "costPrice": 3}), Some(&perms));
        assert_eq!(out, json!({"id": 1}));
    }

    #[test]
    fn test_read_filter_without_readable_list() {
        let perms = set(&[], &[], &["secret"]);
        let out = filter_for_read(&json!({"a": 1, "b": 2, "secret": 3}), Some(&perms));
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_arrays_and_nested_values() {
        let perms = set(&["id", "meta"], &[], &[]);
        let data = json!([
            {"id": 1, "meta": {"secret": true}, "x": 1},
            {"id": 2},
            "scalar"
        ]);
        assert_eq!(
            filter_for_read(&data, Some(&perms)),
            json!([{"id": 1, "meta": {"secret": true}}, {"id": 2}, "scalar"])
        );
    }

    #[test]
    fn test_passthrough_without_entry() {
        let data = json!({"anything": 1});
        assert_eq!(filter_for_read(&data, None), data);
        assert_eq!(filter_for_write(&data, None), data);
    }

    #[test]
    fn test_write_filter_uses_writable() {
        let perms = set(&["id", "name"], &["name"], &["id"]);
        let out = filter_for_write(&json!({"id": 1, "name": "n", "price": 2}), Some(&perms));
        assert_eq!(out, json!({"name": "n"}));
    }

    #[test]
    fn test_merge_and_normalize() {
        let mut a = set(&["id", "name"], &["name"], &[]);
        a.merge(&set(&["price", "costPrice"], &[], &["costPrice"]));
        a.normalize();
        assert_eq!(a.readable.len(), 3);
        assert!(!a.readable.contains("costPrice"));
        assert!(a.denied.contains("costPrice"));
        assert!(!a.can_read("costPrice"));
        assert!(a.can_write("name"));
        assert!(!a.can_write("price"));
    }

    #[tokio::test]
    async fn test_field_filter_publishes_audit_events() {
        let broadcaster = AuditBroadcaster::new_shared();
        let mut rx = broadcaster.subscribe();
        let filter = FieldFilter::new(broadcaster.clone(), AuditConfig::default());
        let actor = FieldAccessActor {
            subject_id: Some("user-1".to_string()),
            organization_id: Some("org-1".to_string()),
        };

        let perms = set(&[], &[], &["costPrice"]);
        let out = filter.filter_for_read(
            "customer",
            &json!({"name": "A", "ssn": "123", "costPrice": 1}),
            Some(&perms),
            &actor,
        );
        assert_eq!(out, json!({"name": "A", "ssn": "123"}));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, AuditEventKind::SensitiveFieldAccess);
        assert_eq!(first.payload["fields"], json!(["ssn"]));
        assert_eq!(first.subject_id.as_deref(), Some("user-1"));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, AuditEventKind::FieldAccessDenied);
        assert_eq!(second.payload["fields"], json!(["costPrice"]));
        assert_eq!(second.resource_type.as_deref(), Some("customer"));
    }

    #[tokio::test]
    async fn test_field_filter_silent_when_disabled() {
        let broadcaster = AuditBroadcaster::new_shared();
        let mut rx = broadcaster.subscribe();
        let config = AuditConfig {
            enabled: false,
            ..Default::default()
        };
        let filter = FieldFilter::new(broadcaster.clone(), config);

        let _ = filter.filter_for_read(
            "customer",
            &json!({"password": "x"}),
            Some(&set(&[], &[], &["password"])),
            &FieldAccessActor::default(),
        );
        assert!(rx.try_recv().is_err());
    }
}
