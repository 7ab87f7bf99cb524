//! Evaluation context.
//!
//! An [`EvaluationContext`] is the immutable input of a single decision: who
//! is asking, what they want to touch, which action, and under which
//! environment. The surrounding application extracts it from a request.
//!
//! # Example
//!
//! ```ignore
//! use abacus_policy::policy::context::EvaluationContext;
//!
//! let context = EvaluationContext::builder("user-1", "org-1")
//!     .role("manager")
//!     .subject_attribute("organizationId", "org-1")
//!     .resource_type("product")
//!     .resource_attribute("organizationId", "org-1")
//!     .action("read")
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Marker set in `environment.attributes` when evaluating on behalf of a descendant organization.
pub const INHERITED_ATTRIBUTE: &str = "inherited";

/// Originating organization recorded on inherited evaluations.
pub const ORIGINAL_ORGANIZATION_ATTRIBUTE: &str = "originalOrganizationId";

/// Target organization recorded on the source side of a cross-organization evaluation.
pub const TARGET_ORGANIZATION_ATTRIBUTE: &str = "targetOrganizationId";

/// Source organization recorded on the target side of a cross-organization evaluation.
pub const SOURCE_ORGANIZATION_ATTRIBUTE: &str = "sourceOrganizationId";

/// Complete input of one access decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    pub subject: SubjectContext,
    pub resource: ResourceContext,
    pub action: String,
    #[serde(default)]
    pub environment: EnvironmentContext,
    pub organization_id: String,
}

/// The acting subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectContext {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl SubjectContext {
    /// Check if the subject carries a role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// The resource being accessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContext {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Environment of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentContext {
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            ip_address: None,
            attributes: Map::new(),
        }
    }
}

impl EvaluationContext {
    /// Start building a context for `subject_id` in `organization_id`.
    #[must_use]
    pub fn builder(
        subject_id: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> EvaluationContextBuilder {
        EvaluationContextBuilder::new(subject_id, organization_id)
    }

    /// Returns `true` if this evaluation runs on behalf of a descendant organization.
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        self.environment
            .attributes
            .get(INHERITED_ATTRIBUTE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Copy of this context evaluated at `ancestor_id` on behalf of the original organization.
    #[must_use]
    pub fn inherited_at(&self, ancestor_id: &str) -> Self {
        let mut next = self.clone();
        next.environment
            .attributes
            .insert(INHERITED_ATTRIBUTE.to_string(), Value::Bool(true));
        next.environment.attributes.insert(
            ORIGINAL_ORGANIZATION_ATTRIBUTE.to_string(),
            Value::String(self.organization_id.clone()),
        );
        next.organization_id = ancestor_id.to_string();
        next
    }

    /// Build the document `${…}` variables resolve against.
    ///
    /// Subject, resource and environment attributes are lifted next to the
    /// structural fields, so `${subject.organizationId}` and
    /// `${subject.attributes.organizationId}` both resolve. Structural fields
    /// win over attributes of the same name.
    #[must_use]
    pub fn variable_document(&self) -> Value {
        let mut subject = self.subject.attributes.clone();
        subject.insert("id".to_string(), json!(self.subject.id));
        subject.insert("roles".to_string(), json!(self.subject.roles));
        subject.insert("groups".to_string(), json!(self.subject.groups));
        subject.insert(
            "attributes".to_string(),
            Value::Object(self.subject.attributes.clone()),
        );

        let mut resource = self.resource.attributes.clone();
        resource.insert("type".to_string(), json!(self.resource.resource_type));
        if let Some(id) = &self.resource.id {
            resource.insert("id".to_string(), json!(id));
        }
        resource.insert(
            "attributes".to_string(),
            Value::Object(self.resource.attributes.clone()),
        );

        let mut environment = self.environment.attributes.clone();
        environment.insert(
            "timestamp".to_string(),
            self.environment
                .timestamp
                .format(&Rfc3339)
                .map_or(Value::Null, Value::String),
        );
        if let Some(ip) = &self.environment.ip_address {
            environment.insert("ipAddress".to_string(), json!(ip));
        }
        environment.insert(
            "attributes".to_string(),
            Value::Object(self.environment.attributes.clone()),
        );

        json!({
            "subject": subject,
            "resource": resource,
            "action": self.action,
            "environment": environment,
            "organizationId": self.organization_id,
        })
    }
}

/// Builder for [`EvaluationContext`].
#[derive(Debug, Clone)]
pub struct EvaluationContextBuilder {
    context: EvaluationContext,
}

impl EvaluationContextBuilder {
    /// Create a builder with empty resource, action and environment.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            context: EvaluationContext {
                subject: SubjectContext {
                    id: subject_id.into(),
                    ..Default::default()
                },
                resource: ResourceContext::default(),
                action: String::new(),
                environment: EnvironmentContext::default(),
                organization_id: organization_id.into(),
            },
        }
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.context.subject.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context
            .subject
            .roles
            .extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.context.subject.groups.push(group.into());
        self
    }

    #[must_use]
    pub fn subject_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .subject
            .attributes
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.context.resource.resource_type = resource_type.into();
        self
    }

    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.context.resource.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn resource_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .resource
            .attributes
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.context.action = action.into();
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.context.environment.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.context.environment.ip_address = Some(ip.into());
        self
    }

    #[must_use]
    pub fn environment_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.context
            .environment
            .attributes
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn build(self) -> EvaluationContext {
        self.context
    }
}
