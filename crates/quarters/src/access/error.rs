//! Error types for the access engine
//!
//! Expected-but-unusual conditions (unknown role during resolution, overrides
//! scoped to another property) never surface here; they resolve to values.
//! These errors cover administration-time mistakes and blocked writes.

use thiserror::Error;

use super::guard::ChangeKind;
use super::types::{PropertyId, RoleId, UserId};

/// Result type alias for access operations
pub type AccessResult<T> = Result<T, AccessError>;

/// Error types for access administration and guarded writes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Role id is not registered
    #[error("Role not found: {0}")]
    UnknownRole(RoleId),

    /// Permission key is not part of the catalog
    #[error("Permission key is not in the catalog: {0}")]
    UnknownPermission(String),

    /// A role with this id already exists
    #[error("Role already exists: {0}")]
    DuplicateRole(RoleId),

    /// System roles may only have their permissions edited
    #[error("Role '{name}' is a system role and cannot be {action}")]
    SystemRoleLocked { name: String, action: &'static str },

    /// User id is not known to the caller's snapshot
    #[error("User not found: {0}")]
    UnknownUser(UserId),

    /// Default property must be one of the authorized properties
    #[error("Default property {property_id} is not authorized for user {user_id}")]
    DefaultPropertyNotAuthorized {
        user_id: UserId,
        property_id: PropertyId,
    },

    /// The write would leave the user below the minimum access level
    #[error("Blocked {change} for user {user_id} in property {property_id}: {message}")]
    MinimumAccess {
        user_id: UserId,
        property_id: PropertyId,
        change: ChangeKind,
        message: String,
    },

    /// A user being created would land below the minimum access level
    #[error("Blocked user creation ({correlation_id}) in property {property_id}: {message}")]
    NewUserMinimumAccess {
        correlation_id: uuid::Uuid,
        property_id: PropertyId,
        message: String,
    },

    /// An unsaved draft was used where a persisted user id is required
    #[error("Override draft {0} has not been reconciled with a saved user")]
    UnresolvedDraft(uuid::Uuid),
}

impl AccessError {
    /// Property the failure points the operator at, if any
    pub fn property_id(&self) -> Option<PropertyId> {
        match self {
            Self::MinimumAccess { property_id, .. }
            | Self::NewUserMinimumAccess { property_id, .. }
            | Self::DefaultPropertyNotAuthorized { property_id, .. } => Some(*property_id),
            _ => None,
        }
    }

    /// Whether this error blocks a write because of the access policy
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::MinimumAccess { .. } | Self::NewUserMinimumAccess { .. }
        )
    }
}
