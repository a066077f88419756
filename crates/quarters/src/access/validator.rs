//! Access Validator Module
//!
//! Policy checks over a resolved permission set. The only built-in rule is
//! that `DASHBOARD.VIEW` must be present, so every saved user has somewhere
//! to land after signing in.
//!
//! Rules are pluggable through [`ValidationRule`]; an [`AccessValidator`]
//! runs them in order and reports the first failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::catalog::DASHBOARD_VIEW;
use super::resolver::EffectivePermissions;
use super::types::PermissionKey;

/// Outcome of a validation
///
/// Serialized as `{ valid, error }` with `error: null` on success. Callers
/// should branch on `valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// A single mandatory-access rule
pub trait ValidationRule: Send + Sync + fmt::Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// `Err(message)` when the effective set violates the rule
    fn check(&self, effective: &EffectivePermissions) -> Result<(), String>;
}

/// Requires one permission key to be present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredPermission {
    key: PermissionKey,
}

impl RequiredPermission {
    pub fn new(key: impl Into<PermissionKey>) -> Self {
        Self { key: key.into() }
    }

    pub fn dashboard() -> Self {
        Self::new(DASHBOARD_VIEW)
    }

    pub fn key(&self) -> &PermissionKey {
        &self.key
    }
}

impl ValidationRule for RequiredPermission {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    fn check(&self, effective: &EffectivePermissions) -> Result<(), String> {
        if effective.contains(self.key.as_str()) {
            Ok(())
        } else if self.key.as_str() == DASHBOARD_VIEW {
            Err(
                "User must have at least Dashboard View access in their default property. \
                 Adjust the role, overrides or default property."
                    .to_string(),
            )
        } else {
            Err(format!(
                "User is missing the mandatory permission {} in their default property",
                self.key
            ))
        }
    }
}

/// Ordered list of validation rules
#[derive(Debug, Clone)]
pub struct AccessValidator {
    rules: Vec<Arc<dyn ValidationRule>>,
}

impl Default for AccessValidator {
    fn default() -> Self {
        Self::new().with_rule(RequiredPermission::dashboard())
    }
}

impl AccessValidator {
    /// Validator with no rules; accepts every set
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// One [`RequiredPermission`] rule per key, in order
    ///
    /// An empty list falls back to the dashboard rule.
    pub fn from_required<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PermissionKey>,
    {
        let validator = keys
            .into_iter()
            .fold(Self::new(), |v, k| v.with_rule(RequiredPermission::new(k)));
        if validator.rules.is_empty() {
            Self::default()
        } else {
            validator
        }
    }

    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, effective: &EffectivePermissions) -> ValidationResult {
        for rule in &self.rules {
            if let Err(message) = rule.check(effective) {
                tracing::debug!(rule = rule.name(), "Minimum access rule failed");
                return ValidationResult::failed(message);
            }
        }
        ValidationResult::ok()
    }
}

/// Validate against the built-in rule set
pub fn validate_minimum_access(effective: &EffectivePermissions) -> ValidationResult {
    AccessValidator::default().validate(effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> EffectivePermissions {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_dashboard_present_is_valid() {
        let result = validate_minimum_access(&set(&["DASHBOARD.VIEW", "ROOM.VIEW"]));
        assert_eq!(result, ValidationResult::ok());
    }

    #[test]
    fn test_dashboard_missing_is_invalid() {
        let result = validate_minimum_access(&set(&["ROOM.VIEW"]));
        assert!(!result.valid);
        assert!(result.error.is_some_and(|e| e.contains("Dashboard View")));
    }

    #[test]
    fn test_empty_set_is_invalid() {
        assert!(!validate_minimum_access(&EffectivePermissions::new()).valid);
    }

    #[test]
    fn test_key_match_is_case_sensitive() {
        assert!(!validate_minimum_access(&set(&["dashboard.view"])).valid);
    }

    #[test]
    fn test_result_serializes_null_error() {
        let json = serde_json::to_value(ValidationResult::ok()).unwrap();
        assert_eq!(json, serde_json::json!({ "valid": true, "error": null }));
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let validator = AccessValidator::from_required(["DASHBOARD.VIEW", "ROOM.VIEW"]);
        assert_eq!(validator.rule_names(), vec!["DASHBOARD.VIEW", "ROOM.VIEW"]);

        let result = validator.validate(&set(&["DASHBOARD.VIEW"]));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("ROOM.VIEW"));

        assert!(validator.validate(&set(&["DASHBOARD.VIEW", "ROOM.VIEW"])).valid);
    }

    #[test]
    fn test_empty_required_list_falls_back_to_dashboard() {
        let validator = AccessValidator::from_required(Vec::<String>::new());
        assert_eq!(validator.rule_names(), vec![DASHBOARD_VIEW]);
    }

    #[derive(Debug)]
    struct MaxSize(usize);

    impl ValidationRule for MaxSize {
        fn name(&self) -> &str {
            "max_size"
        }

        fn check(&self, effective: &EffectivePermissions) -> Result<(), String> {
            if effective.len() <= self.0 {
                Ok(())
            } else {
                Err(format!("too many permissions: {}", effective.len()))
            }
        }
    }

    #[test]
    fn test_custom_rule() {
        let validator = AccessValidator::default().with_rule(MaxSize(1));
        assert!(validator.validate(&set(&["DASHBOARD.VIEW"])).valid);
        let result = validator.validate(&set(&["DASHBOARD.VIEW", "ROOM.VIEW"]));
        assert_eq!(result.error.as_deref(), Some("too many permissions: 2"));
    }
}
