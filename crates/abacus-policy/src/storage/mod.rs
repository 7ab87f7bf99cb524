//! Storage ports consumed by the engine.
//!
//! This module defines the read interfaces the engine needs from its
//! collaborators:
//!
//! - policies and policy sets ([`PolicyStore`], [`PolicyRepository`])
//! - the organization tree ([`OrganizationHierarchy`])
//! - role assignments ([`RoleAssignmentProvider`])
//! - attribute definitions ([`AttributeCatalog`])
//!
//! # Implementations
//!
//! Implementations are provided in separate crates:
//!
//! - `abacus-db-memory` - in-memory backends for tests and offline tools

pub mod attribute;
pub mod organization;
pub mod policy;
pub mod role;

pub use attribute::AttributeCatalog;
pub use organization::{Organization, OrganizationHierarchy};
pub use policy::{PolicyRepository, PolicyStore};
pub use role::{RoleAssignment, RoleAssignmentProvider, effective_roles};
