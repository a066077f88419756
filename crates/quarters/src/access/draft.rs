//! Override drafts
//!
//! Overrides authored while creating a user exist before the user has a
//! persisted id. They carry a correlation id instead and are reconciled into
//! saved records once the user row is written.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AccessError, AccessResult};
use super::overrides::PermissionOverride;
use super::types::{PermissionKey, PropertyId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OverrideDraft {
    #[serde(rename_all = "camelCase")]
    Unsaved {
        correlation_id: Uuid,
        property_id: PropertyId,
        permission_key: PermissionKey,
        is_allowed: bool,
    },
    #[serde(rename_all = "camelCase")]
    Saved {
        user_id: UserId,
        property_id: PropertyId,
        permission_key: PermissionKey,
        is_allowed: bool,
    },
}

impl OverrideDraft {
    pub fn unsaved(
        correlation_id: Uuid,
        property_id: PropertyId,
        key: impl Into<PermissionKey>,
        is_allowed: bool,
    ) -> Self {
        Self::Unsaved {
            correlation_id,
            property_id,
            permission_key: key.into(),
            is_allowed,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }

    pub fn property_id(&self) -> PropertyId {
        match self {
            Self::Unsaved { property_id, .. } | Self::Saved { property_id, .. } => *property_id,
        }
    }

    pub fn permission_key(&self) -> &PermissionKey {
        match self {
            Self::Unsaved { permission_key, .. } | Self::Saved { permission_key, .. } => {
                permission_key
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        match self {
            Self::Unsaved { is_allowed, .. } | Self::Saved { is_allowed, .. } => *is_allowed,
        }
    }

    /// Whether this is an unsaved draft authored under `correlation_id`
    pub fn belongs_to(&self, correlation_id: Uuid) -> bool {
        matches!(self, Self::Unsaved { correlation_id: own, .. } if *own == correlation_id)
    }

    /// Attach the persisted user id if this draft belongs to `correlation_id`
    ///
    /// Saved drafts and drafts for other correlation ids are returned as is.
    pub fn reconcile(self, correlation_id: Uuid, user_id: UserId) -> Self {
        match self {
            Self::Unsaved {
                correlation_id: own,
                property_id,
                permission_key,
                is_allowed,
            } if own == correlation_id => Self::Saved {
                user_id,
                property_id,
                permission_key,
                is_allowed,
            },
            other => other,
        }
    }

    /// Convert a saved draft into a store record
    pub fn into_override(self) -> AccessResult<PermissionOverride> {
        match self {
            Self::Saved {
                user_id,
                property_id,
                permission_key,
                is_allowed,
            } => Ok(PermissionOverride {
                user_id,
                property_id,
                permission_key,
                is_allowed,
            }),
            Self::Unsaved { correlation_id, .. } => {
                Err(AccessError::UnresolvedDraft(correlation_id))
            }
        }
    }
}

impl From<PermissionOverride> for OverrideDraft {
    fn from(record: PermissionOverride) -> Self {
        Self::Saved {
            user_id: record.user_id,
            property_id: record.property_id,
            permission_key: record.permission_key,
            is_allowed: record.is_allowed,
        }
    }
}

/// Reconcile a batch of drafts and convert them into records
///
/// Fails on the first draft still unsaved after reconciliation, leaving the
/// caller to decide whether to retry.
pub fn reconcile_drafts(
    drafts: impl IntoIterator<Item = OverrideDraft>,
    correlation_id: Uuid,
    user_id: UserId,
) -> AccessResult<Vec<PermissionOverride>> {
    drafts
        .into_iter()
        .map(|d| d.reconcile(correlation_id, user_id).into_override())
        .collect()
}
