//! In-memory collaborators for the Abacus access-control engine.
//!
//! This crate implements every storage port of `abacus-policy` in memory,
//! using papaya lock-free HashMaps for the hot read paths:
//!
//! - [`MemoryPolicyStore`] - policy store and policy repository
//! - [`MemoryOrganizationHierarchy`] - organization tree
//! - [`MemoryRoleAssignments`] - role assignments
//! - [`MemoryAttributeCatalog`] - attribute definitions
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use abacus_db_memory::{MemoryOrganizationHierarchy, MemoryPolicyStore};
//! use abacus_policy::AccessControlService;
//!
//! let store = Arc::new(MemoryPolicyStore::new());
//! let service = AccessControlService::builder(store.clone())
//!     .repository(store)
//!     .hierarchy(Arc::new(MemoryOrganizationHierarchy::new()))
//!     .build()?;
//! ```

pub mod attribute;
pub mod organization;
pub mod policy;
pub mod role;

pub use attribute::MemoryAttributeCatalog;
pub use organization::MemoryOrganizationHierarchy;
pub use policy::MemoryPolicyStore;
pub use role::MemoryRoleAssignments;
