//! Role Module
//!
//! Roles are named, reusable bundles of permission keys and form the
//! coarse-grained baseline for every user. This module holds the role record,
//! the registry the administration layer edits through, and the built-in
//! role templates.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::catalog::{PermissionCatalog, DASHBOARD_VIEW};
use super::error::{AccessError, AccessResult};
use super::types::{PermissionKey, RoleId};

/// Role record
///
/// Serialized as `{ id, name, permissions, isSystem }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub permissions: IndexSet<PermissionKey>,
    #[serde(default)]
    pub is_system: bool,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions: IndexSet::new(),
            is_system: false,
        }
    }

    pub fn with_permissions<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PermissionKey>,
    {
        self.permissions = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.contains(key)
    }

    /// Check every key of the role against the catalog
    pub fn validate(&self, catalog: &PermissionCatalog) -> AccessResult<()> {
        for key in &self.permissions {
            if !catalog.contains(key.as_str()) {
                return Err(AccessError::UnknownPermission(key.to_string()));
            }
        }
        Ok(())
    }
}

/// Role registry
///
/// Owned by the administration layer. Keeps insertion order so listings are
/// stable. System roles may have their permissions edited but cannot be
/// renamed or removed.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: Vec<Role>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in role templates
    pub fn with_templates(catalog: &PermissionCatalog) -> Self {
        Self {
            roles: RoleTemplates::all(catalog),
        }
    }

    /// Build a registry from externally supplied roles, validating each one
    pub fn from_roles(
        roles: impl IntoIterator<Item = Role>,
        catalog: &PermissionCatalog,
    ) -> AccessResult<Self> {
        let mut registry = Self::new();
        for role in roles {
            registry.insert(role, catalog)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, role: Role, catalog: &PermissionCatalog) -> AccessResult<()> {
        if self.get(role.id).is_some() {
            return Err(AccessError::DuplicateRole(role.id));
        }
        role.validate(catalog)?;
        tracing::debug!(role_id = %role.id, role = %role.name, "Registered role");
        self.roles.push(role);
        Ok(())
    }

    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn get_or_error(&self, id: RoleId) -> AccessResult<&Role> {
        self.get(id).ok_or(AccessError::UnknownRole(id))
    }

    pub fn as_slice(&self) -> &[Role] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn rename(&mut self, id: RoleId, name: impl Into<String>) -> AccessResult<()> {
        let role = self.get_mut(id)?;
        if role.is_system {
            return Err(AccessError::SystemRoleLocked {
                name: role.name.clone(),
                action: "renamed",
            });
        }
        role.name = name.into();
        Ok(())
    }

    /// Replace a role's permissions; allowed for system roles too
    pub fn set_permissions<I, K>(
        &mut self,
        id: RoleId,
        keys: I,
        catalog: &PermissionCatalog,
    ) -> AccessResult<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<PermissionKey>,
    {
        let permissions: IndexSet<PermissionKey> = keys.into_iter().map(Into::into).collect();
        if let Some(unknown) = permissions.iter().find(|k| !catalog.contains(k.as_str())) {
            return Err(AccessError::UnknownPermission(unknown.to_string()));
        }
        self.get_mut(id)?.permissions = permissions;
        Ok(())
    }

    pub fn remove(&mut self, id: RoleId) -> AccessResult<Role> {
        let pos = self
            .roles
            .iter()
            .position(|r| r.id == id)
            .ok_or(AccessError::UnknownRole(id))?;
        if self.roles[pos].is_system {
            return Err(AccessError::SystemRoleLocked {
                name: self.roles[pos].name.clone(),
                action: "deleted",
            });
        }
        Ok(self.roles.remove(pos))
    }

    fn get_mut(&mut self, id: RoleId) -> AccessResult<&mut Role> {
        self.roles
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(AccessError::UnknownRole(id))
    }
}

/// Built-in role templates
///
/// Every template carries the dashboard permission.
pub struct RoleTemplates;

impl RoleTemplates {
    pub const ADMINISTRATOR: RoleId = RoleId(1);
    pub const HOUSING_MANAGER: RoleId = RoleId(2);
    pub const MAINTENANCE_COORDINATOR: RoleId = RoleId(3);
    pub const FRONT_DESK: RoleId = RoleId(4);
    pub const VIEWER: RoleId = RoleId(5);

    /// Every catalog key; system role
    pub fn administrator(catalog: &PermissionCatalog) -> Role {
        Role::new(Self::ADMINISTRATOR, "Administrator")
            .with_permissions(catalog.keys().cloned())
            .system()
    }

    pub fn housing_manager() -> Role {
        Role::new(Self::HOUSING_MANAGER, "Housing Manager").with_permissions([
            DASHBOARD_VIEW,
            "DASHBOARD.ANALYTICS",
            "EMPLOYEE.VIEW",
            "EMPLOYEE.CREATE",
            "EMPLOYEE.EDIT",
            "ROOM.VIEW",
            "ROOM.CREATE",
            "ROOM.EDIT",
            "ROOM.ASSIGN",
            "BUILDING.VIEW",
            "BUILDING.EDIT",
            "MAINTENANCE.VIEW",
            "RESERVATION.VIEW",
            "RESERVATION.CREATE",
            "RESERVATION.EDIT",
            "RESERVATION.CANCEL",
            "report.view.housing",
            "report.view.occupancy",
            "report.export",
        ])
    }

    pub fn maintenance_coordinator() -> Role {
        Role::new(Self::MAINTENANCE_COORDINATOR, "Maintenance Coordinator").with_permissions([
            DASHBOARD_VIEW,
            "ROOM.VIEW",
            "BUILDING.VIEW",
            "MAINTENANCE.VIEW",
            "MAINTENANCE.CREATE",
            "MAINTENANCE.EDIT",
            "MAINTENANCE.CLOSE",
            "report.view.maintenance",
        ])
    }

    pub fn front_desk() -> Role {
        Role::new(Self::FRONT_DESK, "Front Desk").with_permissions([
            DASHBOARD_VIEW,
            "EMPLOYEE.VIEW",
            "ROOM.VIEW",
            "RESERVATION.VIEW",
            "RESERVATION.CREATE",
            "MAINTENANCE.CREATE",
        ])
    }

    pub fn viewer() -> Role {
        Role::new(Self::VIEWER, "Viewer").with_permissions([
            DASHBOARD_VIEW,
            "EMPLOYEE.VIEW",
            "ROOM.VIEW",
            "BUILDING.VIEW",
            "RESERVATION.VIEW",
        ])
    }

    pub fn all(catalog: &PermissionCatalog) -> Vec<Role> {
        vec![
            Self::administrator(catalog),
            Self::housing_manager(),
            Self::maintenance_coordinator(),
            Self::front_desk(),
            Self::viewer(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> &'static PermissionCatalog {
        PermissionCatalog::builtin()
    }

    #[test]
    fn test_role_serde_shape() {
        let role = Role::new(RoleId(9), "Night Shift").with_permissions([DASHBOARD_VIEW]);
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 9,
                "name": "Night Shift",
                "permissions": ["DASHBOARD.VIEW"],
                "isSystem": false
            })
        );
    }

    #[test]
    fn test_role_deserialize_defaults() {
        let role: Role = serde_json::from_str(r#"{"id": 4, "name": "Temp"}"#).unwrap();
        assert!(role.permissions.is_empty());
        assert!(!role.is_system);
    }

    #[test]
    fn test_templates_only_use_catalog_keys() {
        for role in RoleTemplates::all(catalog()) {
            role.validate(catalog()).unwrap();
            assert!(role.has_permission(DASHBOARD_VIEW), "{} lacks dashboard", role.name);
        }
    }

    #[test]
    fn test_administrator_is_system_and_complete() {
        let admin = RoleTemplates::administrator(catalog());
        assert!(admin.is_system);
        assert_eq!(admin.permissions.len(), catalog().len());
    }

    #[test]
    fn test_insert_rejects_unknown_key() {
        let mut registry = RoleRegistry::new();
        let role = Role::new(RoleId(10), "Bad").with_permissions(["ROOM.TELEPORT"]);
        assert_eq!(
            registry.insert(role, catalog()),
            Err(AccessError::UnknownPermission("ROOM.TELEPORT".to_string()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut registry = RoleRegistry::with_templates(catalog());
        let dup = Role::new(RoleTemplates::VIEWER, "Other viewer");
        assert_eq!(
            registry.insert(dup, catalog()),
            Err(AccessError::DuplicateRole(RoleTemplates::VIEWER))
        );
    }

    #[test]
    fn test_system_role_cannot_be_renamed_or_removed() {
        let mut registry = RoleRegistry::with_templates(catalog());
        assert!(matches!(
            registry.rename(RoleTemplates::ADMINISTRATOR, "Root"),
            Err(AccessError::SystemRoleLocked { action: "renamed", .. })
        ));
        assert!(matches!(
            registry.remove(RoleTemplates::ADMINISTRATOR),
            Err(AccessError::SystemRoleLocked { action: "deleted", .. })
        ));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_system_role_permissions_are_editable() {
        let mut registry = RoleRegistry::with_templates(catalog());
        registry
            .set_permissions(RoleTemplates::ADMINISTRATOR, [DASHBOARD_VIEW], catalog())
            .unwrap();
        let admin = registry.get(RoleTemplates::ADMINISTRATOR).unwrap();
        assert_eq!(admin.permissions.len(), 1);
    }

    #[test]
    fn test_rename_and_remove_regular_role() {
        let mut registry = RoleRegistry::with_templates(catalog());
        registry.rename(RoleTemplates::VIEWER, "Read Only").unwrap();
        assert_eq!(registry.get(RoleTemplates::VIEWER).unwrap().name, "Read Only");

        let removed = registry.remove(RoleTemplates::VIEWER).unwrap();
        assert_eq!(removed.id, RoleTemplates::VIEWER);
        assert!(registry.get(RoleTemplates::VIEWER).is_none());
        assert_eq!(
            registry.remove(RoleTemplates::VIEWER),
            Err(AccessError::UnknownRole(RoleTemplates::VIEWER))
        );
    }
}
