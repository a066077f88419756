//! Permission Catalog Module
//!
//! The closed set of permission keys the application understands. The
//! catalog is versioned with the source: there is no runtime registration,
//! and the resolver never infers membership from role or override data.
//!
//! The built-in catalog is built once per process and handed to the resolver
//! and validator by reference.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::error::{AccessError, AccessResult};
use super::types::PermissionKey;

/// Version of the built-in catalog table
pub const CATALOG_VERSION: &str = "2024.3";

/// Permission every user needs to reach the application at all
pub const DASHBOARD_VIEW: &str = "DASHBOARD.VIEW";

/// UI-facing grouping of permission keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    Dashboard,
    Employees,
    Rooms,
    Buildings,
    Maintenance,
    Reservations,
    Reports,
    Administration,
}

impl PermissionCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Employees => "Employees",
            Self::Rooms => "Rooms",
            Self::Buildings => "Buildings",
            Self::Maintenance => "Maintenance",
            Self::Reservations => "Reservations",
            Self::Reports => "Reports",
            Self::Administration => "Administration",
        }
    }
}

// Report keys predate the UPPER.DOT convention and keep their lower-case form.
const BUILTIN_ENTRIES: &[(&str, PermissionCategory)] = &[
    (DASHBOARD_VIEW, PermissionCategory::Dashboard),
    ("DASHBOARD.ANALYTICS", PermissionCategory::Dashboard),
    ("EMPLOYEE.VIEW", PermissionCategory::Employees),
    ("EMPLOYEE.CREATE", PermissionCategory::Employees),
    ("EMPLOYEE.EDIT", PermissionCategory::Employees),
    ("EMPLOYEE.DELETE", PermissionCategory::Employees),
    ("ROOM.VIEW", PermissionCategory::Rooms),
    ("ROOM.CREATE", PermissionCategory::Rooms),
    ("ROOM.EDIT", PermissionCategory::Rooms),
    ("ROOM.DELETE", PermissionCategory::Rooms),
    ("ROOM.ASSIGN", PermissionCategory::Rooms),
    ("BUILDING.VIEW", PermissionCategory::Buildings),
    ("BUILDING.CREATE", PermissionCategory::Buildings),
    ("BUILDING.EDIT", PermissionCategory::Buildings),
    ("BUILDING.DELETE", PermissionCategory::Buildings),
    ("MAINTENANCE.VIEW", PermissionCategory::Maintenance),
    ("MAINTENANCE.CREATE", PermissionCategory::Maintenance),
    ("MAINTENANCE.EDIT", PermissionCategory::Maintenance),
    ("MAINTENANCE.CLOSE", PermissionCategory::Maintenance),
    ("RESERVATION.VIEW", PermissionCategory::Reservations),
    ("RESERVATION.CREATE", PermissionCategory::Reservations),
    ("RESERVATION.EDIT", PermissionCategory::Reservations),
    ("RESERVATION.CANCEL", PermissionCategory::Reservations),
    ("report.view.housing", PermissionCategory::Reports),
    ("report.view.occupancy", PermissionCategory::Reports),
    ("report.view.maintenance", PermissionCategory::Reports),
    ("report.export", PermissionCategory::Reports),
    ("USER.VIEW", PermissionCategory::Administration),
    ("USER.MANAGE", PermissionCategory::Administration),
    ("ROLE.MANAGE", PermissionCategory::Administration),
    ("PROPERTY.MANAGE", PermissionCategory::Administration),
    ("settings.manage", PermissionCategory::Administration),
];

static BUILTIN: Lazy<PermissionCatalog> =
    Lazy::new(|| PermissionCatalog::new(CATALOG_VERSION, BUILTIN_ENTRIES.iter().copied()));

/// Permission Catalog
///
/// Immutable once built. Iteration follows insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCatalog {
    version: String,
    entries: IndexMap<PermissionKey, PermissionCategory>,
}

impl PermissionCatalog {
    /// Build a catalog from `(key, category)` pairs
    ///
    /// A repeated key keeps its first position and category.
    pub fn new<'a>(
        version: impl Into<String>,
        entries: impl IntoIterator<Item = (&'a str, PermissionCategory)>,
    ) -> Self {
        let mut map = IndexMap::new();
        for (key, category) in entries {
            map.entry(PermissionKey::from(key)).or_insert(category);
        }
        Self {
            version: version.into(),
            entries: map,
        }
    }

    /// The catalog compiled into this build
    pub fn builtin() -> &'static PermissionCatalog {
        &BUILTIN
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Every key in catalog order
    pub fn all_permissions(&self) -> IndexSet<PermissionKey> {
        self.entries.keys().cloned().collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn category_of(&self, key: &str) -> Option<PermissionCategory> {
        self.entries.get(key).copied()
    }

    /// Look up a key, failing for anything outside the catalog
    pub fn validate_key(&self, key: &str) -> AccessResult<PermissionKey> {
        self.entries
            .get_key_value(key)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| AccessError::UnknownPermission(key.to_string()))
    }

    /// Keys grouped by category
    ///
    /// Categories appear in the order their first key appears in the catalog.
    pub fn grouped(&self) -> Vec<(PermissionCategory, Vec<&PermissionKey>)> {
        let mut groups: IndexMap<PermissionCategory, Vec<&PermissionKey>> = IndexMap::new();
        for (key, category) in &self.entries {
            groups.entry(*category).or_default().push(key);
        }
        groups.into_iter().collect()
    }
}
