//! # abacus-core
//!
//! Shared building blocks for the Abacus access-control engine.
//!
//! - [`json_path`] - dot-path traversal and canonical serialization of JSON documents
//! - [`events`] - audit event types and the broadcast audit channel
//! - [`id`] - identifier generation

pub mod events;
pub mod id;
pub mod json_path;

pub use events::{AuditBroadcaster, AuditEvent, AuditEventKind, AuditSink, NoopAuditSink};
pub use id::generate_id;
pub use json_path::{canonical_json, resolve_in_map, resolve_path};
