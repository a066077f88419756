//! Access configuration
//!
//! YAML file carrying the role set, the mandatory permission list and the
//! audit settings. Lookup order:
//! 1. Explicit path (`--config`)
//! 2. `QUARTERS_CONFIG` environment variable
//! 3. `<platform config dir>/quarters/config.yaml`
//! 4. Built-in defaults
//!
//! The first two must point at an existing file. The platform file is
//! optional.

use anyhow::{Context, Result};
use etcetera::{choose_app_strategy, AppStrategy, AppStrategyArgs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::access::{
    AccessError, AccessResult, AccessValidator, AuditLogLevel, AuditLogger, PermissionCatalog,
    PermissionKey, Role, RoleRegistry, WriteGuard, DASHBOARD_VIEW,
};

pub const CONFIG_ENV_VAR: &str = "QUARTERS_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const CONFIG_VERSION: &str = "1.0.0";

/// Audit section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub level: AuditLogLevel,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: AuditLogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub version: String,
    /// Keys every user must hold in their default property
    pub minimum_access: Vec<PermissionKey>,
    pub audit: AuditConfig,
    /// Replaces the built-in role templates when non-empty
    pub roles: Vec<Role>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            minimum_access: vec![PermissionKey::from(DASHBOARD_VIEW)],
            audit: AuditConfig::default(),
            roles: Vec::new(),
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Environment(PathBuf),
    UserConfigDir(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserConfigDir(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::Environment(p) => write!(f, "{} (${})", p.display(), CONFIG_ENV_VAR),
            ConfigSource::UserConfigDir(p) => write!(f, "{}", p.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Default configuration file location for this platform
pub fn default_config_path() -> Result<PathBuf> {
    let strategy = choose_app_strategy(AppStrategyArgs {
        top_level_domain: "org".to_string(),
        author: "Quarters".to_string(),
        app_name: "quarters".to_string(),
    })
    .context("Failed to determine the platform config directory")?;
    Ok(strategy.config_dir().join(CONFIG_FILE_NAME))
}

impl AccessConfig {
    /// Resolve and load the configuration
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let config = Self::load_file(path)?;
            return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
        }

        if let Some(value) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(value);
            let config = Self::load_file(&path)
                .with_context(|| format!("{} points at an unusable file", CONFIG_ENV_VAR))?;
            return Ok((config, ConfigSource::Environment(path)));
        }

        match default_config_path() {
            Ok(path) if path.exists() => {
                let config = Self::load_file(&path)?;
                Ok((config, ConfigSource::UserConfigDir(path)))
            }
            Ok(_) => Ok((Self::default(), ConfigSource::Defaults)),
            Err(e) => {
                tracing::debug!("No platform config directory: {:#}", e);
                Ok((Self::default(), ConfigSource::Defaults))
            }
        }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {:?}", path))?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::debug!(path = ?path, roles = config.roles.len(), "Loaded access config");
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse access config")
    }

    /// Write the configuration, replacing any existing file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
        }

        let temp_path = path.with_extension("yaml.tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
        serde_yaml::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write config: {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename temp file to: {:?}", path))?;
        Ok(())
    }

    /// Check the mandatory keys and roles against the catalog
    pub fn validate(&self, catalog: &PermissionCatalog) -> AccessResult<()> {
        for key in &self.minimum_access {
            catalog.validate_key(key.as_str())?;
        }
        self.role_registry(catalog).map(|_| ())
    }

    /// Configured roles, or the built-in templates when none are configured
    pub fn role_registry(&self, catalog: &PermissionCatalog) -> AccessResult<RoleRegistry> {
        if self.roles.is_empty() {
            Ok(RoleRegistry::with_templates(catalog))
        } else {
            RoleRegistry::from_roles(self.roles.iter().cloned(), catalog)
        }
    }

    pub fn validator(&self) -> AccessValidator {
        AccessValidator::from_required(self.minimum_access.iter().cloned())
    }

    pub fn audit_logger(&self) -> AuditLogger {
        let mut logger = AuditLogger::new(self.audit.level);
        if !self.audit.enabled {
            logger.disable();
        }
        logger
    }

    /// Write guard wired with this configuration's validator and audit logger
    pub fn write_guard<'c>(&self, catalog: &'c PermissionCatalog) -> AccessResult<WriteGuard<'c>> {
        if let Some(unknown) = self
            .minimum_access
            .iter()
            .find(|k| !catalog.contains(k.as_str()))
        {
            return Err(AccessError::UnknownPermission(unknown.to_string()));
        }
        Ok(WriteGuard::new(catalog)
            .with_validator(self.validator())
            .with_audit_logger(self.audit_logger()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleId;
    use serial_test::serial;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
version: "1.0.0"
minimum_access:
  - DASHBOARD.VIEW
  - ROOM.VIEW
audit:
  enabled: false
  level: warn
roles:
  - id: 1
    name: Site Lead
    permissions: [DASHBOARD.VIEW, ROOM.VIEW, report.view.housing]
    isSystem: true
  - id: 2
    name: Cleaner
    permissions: [DASHBOARD.VIEW, MAINTENANCE.VIEW]
"#;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = AccessConfig::default();
        assert_eq!(config.minimum_access, vec![PermissionKey::from(DASHBOARD_VIEW)]);
        assert!(config.audit.enabled);
        assert!(config.roles.is_empty());

        let registry = config.role_registry(PermissionCatalog::builtin()).unwrap();
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_parse_sample() {
        let config = AccessConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.audit.level, AuditLogLevel::Warn);
        assert!(!config.audit_logger().is_enabled());
        assert_eq!(config.validator().rule_names(), vec!["DASHBOARD.VIEW", "ROOM.VIEW"]);

        let registry = config.role_registry(PermissionCatalog::builtin()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(RoleId(1)).unwrap().is_system);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AccessConfig::from_yaml_str("audit:\n  level: debug\n").unwrap();
        assert_eq!(config.audit.level, AuditLogLevel::Debug);
        assert!(config.audit.enabled);
        assert_eq!(config.minimum_access.len(), 1);
    }

    #[test]
    fn test_unknown_keys_fail_validation() {
        let config = AccessConfig::from_yaml_str("minimum_access: [ROOM.FLY]\n").unwrap();
        assert_eq!(
            config.validate(PermissionCatalog::builtin()),
            Err(AccessError::UnknownPermission("ROOM.FLY".to_string()))
        );
        assert!(config.write_guard(PermissionCatalog::builtin()).is_err());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.yaml", "roles: [ {id: }\n");
        let err = AccessConfig::load_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.yaml"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = AccessConfig::from_yaml_str(SAMPLE).unwrap();
        config.save(&path).unwrap();
        assert_eq!(AccessConfig::load_file(&path).unwrap(), config);
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    #[serial]
    fn test_explicit_path_beats_env() {
        let dir = TempDir::new().unwrap();
        let explicit = write(&dir, "explicit.yaml", "audit:\n  level: error\n");
        let env = write(&dir, "env.yaml", "audit:\n  level: debug\n");

        temp_env::with_var(CONFIG_ENV_VAR, Some(&env), || {
            let (config, source) = AccessConfig::load(Some(&explicit)).unwrap();
            assert_eq!(config.audit.level, AuditLogLevel::Error);
            assert_eq!(source, ConfigSource::Explicit(explicit.clone()));
        });
    }

    #[test]
    #[serial]
    fn test_env_var_is_used_without_explicit_path() {
        let dir = TempDir::new().unwrap();
        let env = write(&dir, "env.yaml", "audit:\n  level: debug\n");

        temp_env::with_var(CONFIG_ENV_VAR, Some(&env), || {
            let (config, source) = AccessConfig::load(None).unwrap();
            assert_eq!(config.audit.level, AuditLogLevel::Debug);
            assert_eq!(source, ConfigSource::Environment(env.clone()));
        });
    }

    #[test]
    #[serial]
    fn test_missing_env_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        temp_env::with_var(CONFIG_ENV_VAR, Some(&missing), || {
            assert!(AccessConfig::load(None).is_err());
        });
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_platform_dir_then_defaults() {
        let dir = TempDir::new().unwrap();
        temp_env::with_vars(
            [
                (CONFIG_ENV_VAR, None),
                ("XDG_CONFIG_HOME", Some(dir.path().as_os_str())),
            ],
            || {
                let (config, source) = AccessConfig::load(None).unwrap();
                assert_eq!(source, ConfigSource::Defaults);
                assert_eq!(config, AccessConfig::default());

                let path = default_config_path().unwrap();
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, "audit:\n  enabled: false\n").unwrap();

                let (config, source) = AccessConfig::load(None).unwrap();
                assert_eq!(source, ConfigSource::UserConfigDir(path));
                assert!(!config.audit.enabled);
            },
        );
    }
}
