//! Audit event channel.
//!
//! The engine never writes audit records itself. It publishes [`AuditEvent`]s
//! to an injected [`AuditSink`]; publishing is fire-and-forget and never
//! blocks the caller.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────────┐
//! │ FieldFilter  │ ────────────▶ │ AuditBroadcaster │ ──▶ subscribers
//! │ Service      │               │ (tokio broadcast)│
//! └──────────────┘               └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use abacus_core::events::{AuditBroadcaster, AuditEvent, AuditEventKind, AuditSink};
//!
//! let broadcaster = AuditBroadcaster::new();
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.publish(AuditEvent::new(AuditEventKind::FieldAccessDenied, serde_json::json!({})));
//! assert!(receiver.try_recv().is_ok());
//! ```

pub mod broadcaster;
pub mod types;

pub use broadcaster::{AuditBroadcaster, AuditSink, NoopAuditSink};
pub use types::{AuditEvent, AuditEventKind};
