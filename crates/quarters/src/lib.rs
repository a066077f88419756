//! Quarters - staff housing access engine
//!
//! Resolves what a staff member may do in a given property from their base
//! role and per-property overrides, and guards user writes so nobody is left
//! without minimum access in their default property.

pub mod access;
pub mod config;
pub mod snapshot;

pub use access::{
    AccessError, AccessResult, EffectivePermissions, PermissionCatalog, PermissionResolver,
    WriteGuard,
};
pub use config::AccessConfig;
pub use snapshot::AccessSnapshot;
