//! Permission Resolver Module
//!
//! Combines a user's base role with their per-property overrides into the
//! effective permission set for one `(user, property)` pair.
//!
//! Resolution order:
//! 1. Super-admins get the full catalog; nothing else is consulted
//! 2. Start from a copy of the base role's permissions (unknown role: empty)
//! 3. Keep only overrides scoped to the target property
//! 4. Deny pass: remove every denied key
//! 5. Grant pass: add every granted key
//!
//! The grant pass runs after the deny pass over the whole list, so when a
//! caller supplies both a deny and a grant for the same key and property the
//! grant wins regardless of list order. The override store normally prevents
//! such pairs from existing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::catalog::PermissionCatalog;
use super::draft::OverrideDraft;
use super::overrides::PermissionOverride;
use super::role::Role;
use super::types::{PermissionKey, PropertyId, RoleId};
use super::user::User;

/// Effective permission set for one user in one property
///
/// Derived and ephemeral. Iteration order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectivePermissions {
    keys: HashSet<PermissionKey>,
}

impl EffectivePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionKey> {
        self.keys.iter()
    }

    /// Keys in lexical order, for display
    pub fn sorted(&self) -> Vec<&PermissionKey> {
        let mut keys: Vec<_> = self.keys.iter().collect();
        keys.sort();
        keys
    }

    pub fn into_set(self) -> HashSet<PermissionKey> {
        self.keys
    }
}

impl<K: Into<PermissionKey>> FromIterator<K> for EffectivePermissions {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Where a key's final state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSource {
    /// Super-admin bypass
    SuperAdmin,
    /// Inherited from the base role
    Role,
    /// Forced on by a grant override
    Granted,
    /// Forced off by a deny override
    Denied,
}

/// Resolution result with per-key provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub permissions: EffectivePermissions,
    /// Every key the role or an override touched, denied keys included
    pub sources: IndexMap<PermissionKey, PermissionSource>,
    /// False when the base role id was not found (fail-closed)
    pub role_found: bool,
}

impl Resolution {
    pub fn source_of(&self, key: &str) -> Option<PermissionSource> {
        self.sources.get(key).copied()
    }
}

/// Permission resolver
///
/// Pure and stateless apart from the injected catalog; safe to share across
/// threads and call concurrently.
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'c> {
    catalog: &'c PermissionCatalog,
}

impl Default for PermissionResolver<'static> {
    fn default() -> Self {
        Self::new(PermissionCatalog::builtin())
    }
}

impl<'c> PermissionResolver<'c> {
    pub fn new(catalog: &'c PermissionCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'c PermissionCatalog {
        self.catalog
    }

    /// Effective permissions for a role in one property
    ///
    /// `overrides` may hold records for other properties; they are ignored.
    /// An unknown `base_role_id` yields an empty set.
    pub fn compute_effective(
        &self,
        base_role_id: RoleId,
        property_id: PropertyId,
        overrides: &[PermissionOverride],
        all_roles: &[Role],
        is_super_admin: bool,
    ) -> EffectivePermissions {
        self.explain(base_role_id, property_id, overrides, all_roles, is_super_admin)
            .permissions
    }

    /// Same as [`compute_effective`](Self::compute_effective), keeping the
    /// source of every key
    pub fn explain(
        &self,
        base_role_id: RoleId,
        property_id: PropertyId,
        overrides: &[PermissionOverride],
        all_roles: &[Role],
        is_super_admin: bool,
    ) -> Resolution {
        let scoped: Vec<(&PermissionKey, bool)> = overrides
            .iter()
            .filter(|o| o.property_id == property_id)
            .map(|o| (&o.permission_key, o.is_allowed))
            .collect();

        let resolution = self.fold(base_role_id, &scoped, all_roles, is_super_admin);
        tracing::debug!(
            role_id = %base_role_id,
            property_id = %property_id,
            overrides = scoped.len(),
            effective = resolution.permissions.len(),
            super_admin = is_super_admin,
            "Resolved effective permissions"
        );
        resolution
    }

    /// Resolve for a user record
    ///
    /// Overrides owned by other users are ignored along with those scoped to
    /// other properties.
    pub fn resolve_for_user(
        &self,
        user: &User,
        property_id: PropertyId,
        overrides: &[PermissionOverride],
        all_roles: &[Role],
    ) -> Resolution {
        let own: Vec<PermissionOverride> = overrides
            .iter()
            .filter(|o| o.user_id == user.id)
            .cloned()
            .collect();
        self.explain(user.role_id, property_id, &own, all_roles, user.is_super_admin)
    }

    /// Resolve for a user that has not been saved yet
    ///
    /// Only unsaved drafts authored under `correlation_id` take part.
    pub fn compute_effective_for_drafts(
        &self,
        base_role_id: RoleId,
        property_id: PropertyId,
        drafts: &[OverrideDraft],
        correlation_id: Uuid,
        all_roles: &[Role],
        is_super_admin: bool,
    ) -> EffectivePermissions {
        let scoped: Vec<(&PermissionKey, bool)> = drafts
            .iter()
            .filter(|d| d.belongs_to(correlation_id) && d.property_id() == property_id)
            .map(|d| (d.permission_key(), d.is_allowed()))
            .collect();
        self.fold(base_role_id, &scoped, all_roles, is_super_admin)
            .permissions
    }

    fn fold(
        &self,
        base_role_id: RoleId,
        scoped: &[(&PermissionKey, bool)],
        all_roles: &[Role],
        is_super_admin: bool,
    ) -> Resolution {
        if is_super_admin {
            return Resolution {
                permissions: self.catalog.keys().cloned().collect(),
                sources: self
                    .catalog
                    .keys()
                    .map(|k| (k.clone(), PermissionSource::SuperAdmin))
                    .collect(),
                role_found: true,
            };
        }

        let Some(role) = all_roles.iter().find(|r| r.id == base_role_id) else {
            tracing::warn!(role_id = %base_role_id, "Base role not found, denying all permissions");
            return Resolution {
                permissions: EffectivePermissions::new(),
                sources: IndexMap::new(),
                role_found: false,
            };
        };

        let mut effective: HashSet<PermissionKey> = role.permissions.iter().cloned().collect();
        let mut sources: IndexMap<PermissionKey, PermissionSource> = role
            .permissions
            .iter()
            .map(|k| (k.clone(), PermissionSource::Role))
            .collect();

        // Deny pass
        for (key, _) in scoped.iter().filter(|(_, allowed)| !*allowed) {
            effective.remove(*key);
            sources.insert((*key).clone(), PermissionSource::Denied);
        }

        // Grant pass
        for (key, _) in scoped.iter().filter(|(_, allowed)| *allowed) {
            effective.insert((*key).clone());
            sources.insert((*key).clone(), PermissionSource::Granted);
        }

        Resolution {
            permissions: EffectivePermissions { keys: effective },
            sources,
            role_found: true,
        }
    }
}
