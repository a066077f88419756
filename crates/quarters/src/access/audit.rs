//! Audit Logging Module
//!
//! Structured audit records for resolutions, validations and override edits,
//! emitted through `tracing`.
//!
//! Features:
//! - Level threshold (Debug, Info, Warn, Error)
//! - Enable/disable toggle
//! - Entries are serialized to JSON and attached as a single field
//! - Logging failures never reach the caller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::guard::ChangeKind;
use super::overrides::OverrideState;
use super::resolver::{EffectivePermissions, Resolution};
use super::types::{PermissionKey, PropertyId, UserId};
use super::validator::ValidationResult;

/// Audit log level
///
/// Each level includes messages of higher severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditLogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl AuditLogLevel {
    /// Whether a message at `message_level` passes this threshold
    pub fn should_log(&self, message_level: AuditLogLevel) -> bool {
        message_level.priority() >= self.priority()
    }

    fn priority(&self) -> u8 {
        match self {
            AuditLogLevel::Debug => 0,
            AuditLogLevel::Info => 1,
            AuditLogLevel::Warn => 2,
            AuditLogLevel::Error => 3,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: AuditLogLevel,
    /// e.g. "resolution", "validation", "override_change"
    pub event_type: String,
    pub user_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    /// Whether the audited operation succeeded or was allowed
    pub outcome: Option<bool>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AuditLogEntry {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: AuditLogLevel::Info,
            event_type: event_type.into(),
            user_id: None,
            property_id: None,
            outcome: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_level(mut self, level: AuditLogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_property(mut self, property_id: PropertyId) -> Self {
        self.property_id = Some(property_id);
        self
    }

    pub fn with_outcome(mut self, outcome: bool) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn add_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), value);
        }
        self
    }
}

/// Audit logger
#[derive(Debug, Clone)]
pub struct AuditLogger {
    level: AuditLogLevel,
    enabled: bool,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(AuditLogLevel::Info)
    }
}

impl AuditLogger {
    pub fn new(level: AuditLogLevel) -> Self {
        Self {
            level,
            enabled: true,
        }
    }

    /// Logger that records nothing
    pub fn disabled() -> Self {
        Self {
            level: AuditLogLevel::Info,
            enabled: false,
        }
    }

    pub fn level(&self) -> AuditLogLevel {
        self.level
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_level(&mut self, level: AuditLogLevel) {
        self.level = level;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Record an entry
    ///
    /// Returns whether the entry passed the toggle and threshold and was
    /// emitted. Serialization failures are swallowed.
    pub fn log(&self, entry: AuditLogEntry) -> bool {
        self.try_log(entry).unwrap_or(false)
    }

    fn try_log(&self, entry: AuditLogEntry) -> Result<bool, serde_json::Error> {
        if !self.enabled || !self.level.should_log(entry.level) {
            return Ok(false);
        }

        let entry_json = serde_json::to_string(&entry)?;
        let user_id = entry.user_id.map(|id| id.0);
        let property_id = entry.property_id.map(|id| id.0);

        match entry.level {
            AuditLogLevel::Debug => tracing::debug!(
                event_type = %entry.event_type,
                user_id = ?user_id,
                property_id = ?property_id,
                outcome = ?entry.outcome,
                audit_entry = %entry_json,
                "Access audit"
            ),
            AuditLogLevel::Info => tracing::info!(
                event_type = %entry.event_type,
                user_id = ?user_id,
                property_id = ?property_id,
                outcome = ?entry.outcome,
                audit_entry = %entry_json,
                "Access audit"
            ),
            AuditLogLevel::Warn => tracing::warn!(
                event_type = %entry.event_type,
                user_id = ?user_id,
                property_id = ?property_id,
                outcome = ?entry.outcome,
                audit_entry = %entry_json,
                "Access audit"
            ),
            AuditLogLevel::Error => tracing::error!(
                event_type = %entry.event_type,
                user_id = ?user_id,
                property_id = ?property_id,
                outcome = ?entry.outcome,
                audit_entry = %entry_json,
                "Access audit"
            ),
        }

        Ok(true)
    }

    /// Debug-level record of a resolution
    pub fn log_resolution(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        resolution: &Resolution,
    ) -> bool {
        self.log(
            AuditLogEntry::new("resolution")
                .with_level(AuditLogLevel::Debug)
                .with_user(user_id)
                .with_property(property_id)
                .with_outcome(resolution.role_found)
                .add_metadata("effective", resolution.permissions.sorted()),
        )
    }

    /// Validation outcome; failures are logged at Warn
    pub fn log_validation(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        change: ChangeKind,
        result: &ValidationResult,
    ) -> bool {
        let level = if result.valid {
            AuditLogLevel::Info
        } else {
            AuditLogLevel::Warn
        };
        self.log(
            AuditLogEntry::new("validation")
                .with_level(level)
                .with_user(user_id)
                .with_property(property_id)
                .with_outcome(result.valid)
                .add_metadata("change", change.to_string())
                .add_metadata("error", &result.error),
        )
    }

    /// Validation of a user that has no id yet, keyed by its correlation id
    pub fn log_new_user_validation(
        &self,
        correlation_id: Uuid,
        property_id: PropertyId,
        effective: &EffectivePermissions,
        result: &ValidationResult,
    ) -> bool {
        let level = if result.valid {
            AuditLogLevel::Info
        } else {
            AuditLogLevel::Warn
        };
        self.log(
            AuditLogEntry::new("validation")
                .with_level(level)
                .with_property(property_id)
                .with_outcome(result.valid)
                .add_metadata("change", ChangeKind::Create.to_string())
                .add_metadata("correlation_id", correlation_id)
                .add_metadata("effective", effective.sorted())
                .add_metadata("error", &result.error),
        )
    }

    pub fn log_override_change(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        key: &PermissionKey,
        previous: OverrideState,
        current: OverrideState,
    ) -> bool {
        self.log(
            AuditLogEntry::new("override_change")
                .with_user(user_id)
                .with_property(property_id)
                .with_outcome(true)
                .add_metadata("permission", key)
                .add_metadata("previous", previous)
                .add_metadata("state", current),
        )
    }
}
