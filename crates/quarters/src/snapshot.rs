//! Access snapshots
//!
//! A snapshot bundles roles, users and overrides into one file so the engine
//! can be driven offline. YAML or JSON is picked by file extension.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::access::{
    dedupe_overrides, AccessError, AccessResult, InMemoryOverrideStore, OverrideStore,
    PermissionCatalog, PermissionOverride, Role, RoleRegistry, User, UserId,
};
use crate::config::AccessConfig;

pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Yaml,
    Json,
}

impl SnapshotFormat {
    /// `.json` means JSON, anything else YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SnapshotFormat::Json,
            _ => SnapshotFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSnapshot {
    pub version: String,
    /// Empty means "use the configured roles"
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub overrides: Vec<PermissionOverride>,
}

impl Default for AccessSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            roles: Vec::new(),
            users: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

impl AccessSnapshot {
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_overrides(
        mut self,
        overrides: impl IntoIterator<Item = PermissionOverride>,
    ) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// Load a snapshot, collapsing duplicate override triples
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
        let mut snapshot: Self = match SnapshotFormat::from_path(path) {
            SnapshotFormat::Json => serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse snapshot: {:?}", path))?,
            SnapshotFormat::Yaml => serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse snapshot: {:?}", path))?,
        };

        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "Unsupported snapshot version {} in {:?} (expected {})",
                snapshot.version,
                path,
                SNAPSHOT_VERSION
            );
        }

        let before = snapshot.overrides.len();
        snapshot.overrides = dedupe_overrides(std::mem::take(&mut snapshot.overrides));
        if snapshot.overrides.len() != before {
            tracing::warn!(
                path = ?path,
                dropped = before - snapshot.overrides.len(),
                "Snapshot held duplicate overrides; kept the last record per triple"
            );
        }
        Ok(snapshot)
    }

    /// Write the snapshot through a temp file and rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create snapshot directory: {:?}", dir))?;
        }

        let body = match SnapshotFormat::from_path(path) {
            SnapshotFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?
            }
            SnapshotFormat::Yaml => {
                serde_yaml::to_string(self).context("Failed to serialize snapshot")?
            }
        };

        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = std::path::PathBuf::from(temp_name);
        fs::write(&temp_path, body)
            .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename temp file to: {:?}", path))?;
        tracing::debug!(path = ?path, overrides = self.overrides.len(), "Saved snapshot");
        Ok(())
    }

    pub fn user(&self, id: UserId) -> AccessResult<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or(AccessError::UnknownUser(id))
    }

    /// Snapshot roles if present, otherwise the configured ones
    pub fn role_registry(
        &self,
        config: &AccessConfig,
        catalog: &PermissionCatalog,
    ) -> AccessResult<RoleRegistry> {
        if self.roles.is_empty() {
            config.role_registry(catalog)
        } else {
            RoleRegistry::from_roles(self.roles.iter().cloned(), catalog)
        }
    }

    pub fn override_store(&self) -> InMemoryOverrideStore {
        InMemoryOverrideStore::from_records(self.overrides.iter().cloned())
    }

    /// Replace the override list with the contents of a store
    pub fn sync_overrides(&mut self, store: &dyn OverrideStore) {
        self.overrides = store.all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{OverrideState, PermissionKey, PropertyId, RoleId, RoleTemplates};
    use tempfile::TempDir;
    use test_case::test_case;

    fn sample() -> AccessSnapshot {
        AccessSnapshot::default()
            .with_user(User::new(UserId(1), RoleTemplates::VIEWER, PropertyId(1)))
            .with_user(
                User::new(UserId(2), RoleTemplates::FRONT_DESK, PropertyId(1))
                    .with_authorized_properties([PropertyId(2)]),
            )
            .with_overrides([
                PermissionOverride::grant(UserId(1), PropertyId(1), "ROOM.EDIT"),
                PermissionOverride::deny(UserId(2), PropertyId(2), "report.view.housing"),
            ])
    }

    #[test_case("snapshot.yaml", SnapshotFormat::Yaml ; "yaml")]
    #[test_case("snapshot.yml", SnapshotFormat::Yaml ; "yml")]
    #[test_case("snapshot.JSON", SnapshotFormat::Json ; "json uppercase")]
    #[test_case("snapshot", SnapshotFormat::Yaml ; "no extension")]
    fn test_format_from_path(name: &str, expected: SnapshotFormat) {
        assert_eq!(SnapshotFormat::from_path(Path::new(name)), expected);
    }

    #[test_case("snapshot.yaml" ; "yaml")]
    #[test_case("snapshot.json" ; "json")]
    fn test_save_and_load_preserves_content(name: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        let snapshot = sample().with_roles([RoleTemplates::viewer()]);

        snapshot.save(&path).unwrap();
        assert_eq!(AccessSnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["overrides"][0]["permissionKey"], "ROOM.EDIT");
        assert_eq!(json["overrides"][0]["isAllowed"], true);
        assert_eq!(json["users"][1]["authorizedProperties"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_load_dedupes_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup.json");
        let snapshot = AccessSnapshot::default().with_overrides([
            PermissionOverride::grant(UserId(1), PropertyId(1), "ROOM.EDIT"),
            PermissionOverride::deny(UserId(1), PropertyId(1), "ROOM.EDIT"),
        ]);
        snapshot.save(&path).unwrap();

        let loaded = AccessSnapshot::load(&path).unwrap();
        assert_eq!(loaded.overrides.len(), 1);
        assert!(!loaded.overrides[0].is_allowed);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.yaml");
        fs::write(&path, "version: \"0.9.0\"\n").unwrap();
        let err = AccessSnapshot::load(&path).unwrap_err();
        assert!(err.to_string().contains("0.9.0"));
    }

    #[test]
    fn test_unknown_user() {
        assert_eq!(
            sample().user(UserId(99)),
            Err(AccessError::UnknownUser(UserId(99)))
        );
        assert_eq!(sample().user(UserId(2)).unwrap().role_id, RoleTemplates::FRONT_DESK);
    }

    #[test]
    fn test_role_registry_prefers_snapshot_roles() {
        let catalog = PermissionCatalog::builtin();
        let config = AccessConfig::default();
        assert_eq!(sample().role_registry(&config, catalog).unwrap().len(), 5);

        let custom = sample().with_roles([Role::new(RoleId(40), "Night Porter")]);
        let registry = custom.role_registry(&config, catalog).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(RoleId(40)).is_some());
    }

    #[test]
    fn test_sync_overrides_from_store() {
        let mut snapshot = sample();
        let store = snapshot.override_store();
        store.set_state(
            UserId(1),
            PropertyId(1),
            PermissionKey::from("ROOM.EDIT"),
            OverrideState::Inherit,
        );
        snapshot.sync_overrides(&store);
        assert_eq!(snapshot.overrides.len(), 1);
        assert_eq!(snapshot.overrides[0].user_id, UserId(2));
    }
}
