//! Access Module
//!
//! Role-plus-override permission resolution for multi-property staff housing.
//!
//! A user's effective permissions in one property are the base role's keys,
//! minus that property's deny overrides, plus its grant overrides. Writes that
//! would leave a user without minimum access in their default property are
//! blocked by the [`WriteGuard`].

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod catalog;
pub mod draft;
pub mod error;
pub mod guard;
pub mod overrides;
pub mod resolver;
pub mod role;
pub mod types;
pub mod user;
pub mod validator;


// =============================================================================
// Exports
// =============================================================================

pub use audit::{AuditLogEntry, AuditLogLevel, AuditLogger};
pub use catalog::{PermissionCatalog, PermissionCategory, CATALOG_VERSION, DASHBOARD_VIEW};
pub use draft::{reconcile_drafts, OverrideDraft};
pub use error::{AccessError, AccessResult};
pub use guard::{ChangeKind, WriteGuard};
pub use overrides::{
    dedupe_overrides, InMemoryOverrideStore, OverrideKey, OverrideState, OverrideStore,
    PermissionOverride,
};
pub use resolver::{EffectivePermissions, PermissionResolver, PermissionSource, Resolution};
pub use role::{Role, RoleRegistry, RoleTemplates};
pub use types::{PermissionKey, PropertyId, RoleId, UserId};
pub use user::User;
pub use validator::{
    validate_minimum_access, AccessValidator, RequiredPermission, ValidationResult,
    ValidationRule,
};
