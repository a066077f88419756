//! Override Store Module
//!
//! Per-user, per-property, per-permission exceptions to a user's role.
//!
//! At most one record exists per `(user, property, permission)` triple. A
//! later write for the same triple replaces the earlier one and no history is
//! kept. The tri-state control presented per permission maps onto the store:
//! - `Inherit`: no record, the role decides
//! - `Grant`: record with `is_allowed = true`
//! - `Deny`: record with `is_allowed = false`

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::{PermissionKey, PropertyId, UserId};

/// Override record
///
/// Serialized as `{ userId, propertyId, permissionKey, isAllowed }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverride {
    pub user_id: UserId,
    pub property_id: PropertyId,
    pub permission_key: PermissionKey,
    pub is_allowed: bool,
}

impl PermissionOverride {
    pub fn grant(
        user_id: UserId,
        property_id: PropertyId,
        key: impl Into<PermissionKey>,
    ) -> Self {
        Self {
            user_id,
            property_id,
            permission_key: key.into(),
            is_allowed: true,
        }
    }

    pub fn deny(user_id: UserId, property_id: PropertyId, key: impl Into<PermissionKey>) -> Self {
        Self {
            user_id,
            property_id,
            permission_key: key.into(),
            is_allowed: false,
        }
    }

    pub fn key(&self) -> OverrideKey {
        OverrideKey {
            user_id: self.user_id,
            property_id: self.property_id,
            permission_key: self.permission_key.clone(),
        }
    }

    pub fn state(&self) -> OverrideState {
        if self.is_allowed {
            OverrideState::Grant
        } else {
            OverrideState::Deny
        }
    }
}

/// Uniqueness key of an override record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverrideKey {
    pub user_id: UserId,
    pub property_id: PropertyId,
    pub permission_key: PermissionKey,
}

/// Tri-state value of the per-permission, per-property control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideState {
    #[default]
    Inherit,
    Grant,
    Deny,
}

impl OverrideState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::Grant => "grant",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for OverrideState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OverrideState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inherit" => Ok(Self::Inherit),
            "grant" | "allow" => Ok(Self::Grant),
            "deny" => Ok(Self::Deny),
            other => Err(format!(
                "unknown override state '{}': expected inherit, grant or deny",
                other
            )),
        }
    }
}

/// Reduce an override list to one record per triple
///
/// The last record for a triple wins; it keeps the position of the first.
pub fn dedupe_overrides(
    overrides: impl IntoIterator<Item = PermissionOverride>,
) -> Vec<PermissionOverride> {
    let mut by_key: IndexMap<OverrideKey, PermissionOverride> = IndexMap::new();
    for record in overrides {
        by_key.insert(record.key(), record);
    }
    by_key.into_values().collect()
}

/// Storage of override records
///
/// Implementations must enforce the one-record-per-triple invariant and
/// serialize writes per triple.
pub trait OverrideStore: Send + Sync {
    /// Create or replace the record for its triple, returning the replaced one
    fn upsert(&self, record: PermissionOverride) -> Option<PermissionOverride>;

    /// Delete the record for a triple, returning it if present
    fn remove(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: &PermissionKey,
    ) -> Option<PermissionOverride>;

    fn get(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: &PermissionKey,
    ) -> Option<PermissionOverride>;

    /// Every record for a user across all properties
    fn for_user(&self, user_id: UserId) -> Vec<PermissionOverride>;

    fn all(&self) -> Vec<PermissionOverride>;

    fn for_user_property(
        &self,
        user_id: UserId,
        property_id: PropertyId,
    ) -> Vec<PermissionOverride> {
        self.for_user(user_id)
            .into_iter()
            .filter(|o| o.property_id == property_id)
            .collect()
    }

    fn state_of(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: &PermissionKey,
    ) -> OverrideState {
        self.get(user_id, property_id, key)
            .map(|o| o.state())
            .unwrap_or_default()
    }

    /// Apply a tri-state selection
    ///
    /// `Inherit` deletes the record; `Grant` and `Deny` create or replace it.
    /// Returns the record that was there before.
    fn set_state(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: PermissionKey,
        state: OverrideState,
    ) -> Option<PermissionOverride> {
        match state {
            OverrideState::Inherit => self.remove(user_id, property_id, &key),
            OverrideState::Grant => {
                self.upsert(PermissionOverride::grant(user_id, property_id, key))
            }
            OverrideState::Deny => self.upsert(PermissionOverride::deny(user_id, property_id, key)),
        }
    }
}

/// In-memory override store
///
/// Records are keyed by their triple; the lock serializes concurrent editors
/// and the last write for a triple wins.
#[derive(Debug, Default)]
pub struct InMemoryOverrideStore {
    records: RwLock<IndexMap<OverrideKey, PermissionOverride>>,
}

impl InMemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records, collapsing repeated triples to the last one
    pub fn from_records(records: impl IntoIterator<Item = PermissionOverride>) -> Self {
        let store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn key_of(user_id: UserId, property_id: PropertyId, key: &PermissionKey) -> OverrideKey {
        OverrideKey {
            user_id,
            property_id,
            permission_key: key.clone(),
        }
    }
}

impl OverrideStore for InMemoryOverrideStore {
    fn upsert(&self, record: PermissionOverride) -> Option<PermissionOverride> {
        let previous = self.records.write().insert(record.key(), record.clone());
        tracing::debug!(
            user_id = %record.user_id,
            property_id = %record.property_id,
            permission = %record.permission_key,
            state = %record.state(),
            replaced = previous.is_some(),
            "Override written"
        );
        previous
    }

    fn remove(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: &PermissionKey,
    ) -> Option<PermissionOverride> {
        let removed = self
            .records
            .write()
            .shift_remove(&Self::key_of(user_id, property_id, key));
        if removed.is_some() {
            tracing::debug!(
                user_id = %user_id,
                property_id = %property_id,
                permission = %key,
                "Override removed"
            );
        }
        removed
    }

    fn get(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: &PermissionKey,
    ) -> Option<PermissionOverride> {
        self.records
            .read()
            .get(&Self::key_of(user_id, property_id, key))
            .cloned()
    }

    fn for_user(&self, user_id: UserId) -> Vec<PermissionOverride> {
        self.records
            .read()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<PermissionOverride> {
        self.records.read().values().cloned().collect()
    }
}
