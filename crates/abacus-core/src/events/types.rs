//! Audit event types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of audit event emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventKind {
    /// A payload containing sensitive fields was read or written.
    #[serde(rename = "field.sensitive_access")]
    SensitiveFieldAccess,
    /// One or more fields were stripped from a payload by field permissions.
    #[serde(rename = "field.access_denied")]
    FieldAccessDenied,
    /// An access decision was denied.
    #[serde(rename = "access.denied")]
    AccessDenied,
}

impl AuditEventKind {
    /// Returns the wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::SensitiveFieldAccess => "field.sensitive_access",
            AuditEventKind::FieldAccessDenied => "field.access_denied",
            AuditEventKind::AccessDenied => "access.denied",
        }
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured audit notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// What happened.
    pub kind: AuditEventKind,
    /// Organization the event belongs to, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Acting subject, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// Resource type involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Event-specific details.
    pub payload: serde_json::Value,
    /// When the event was created.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl AuditEvent {
    /// Create a new event stamped with the current time.
    pub fn new(kind: AuditEventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            organization_id: None,
            subject_id: None,
            resource_type: None,
            payload,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Set the organization.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Set the acting subject.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Set the resource type.
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Returns the wire name of the event.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}
