//! Write Guard Module
//!
//! Every user-affecting write (create, edit, role change, default property
//! change, override change) must leave the user with minimum access in their
//! default property. The guard resolves the *prospective* state, runs the
//! validator and returns a structured error naming the user and property
//! when the write has to be blocked. Nothing is written unless the check
//! passes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::audit::AuditLogger;
use super::catalog::PermissionCatalog;
use super::draft::OverrideDraft;
use super::error::{AccessError, AccessResult};
use super::overrides::{OverrideState, OverrideStore, PermissionOverride};
use super::resolver::{EffectivePermissions, PermissionResolver};
use super::role::Role;
use super::types::{PermissionKey, PropertyId, RoleId};
use super::user::User;
use super::validator::AccessValidator;

/// Kind of write being guarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Edit,
    RoleChange,
    DefaultPropertyChange,
    OverrideChange,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ChangeKind::Create => "user creation",
            ChangeKind::Edit => "user edit",
            ChangeKind::RoleChange => "role change",
            ChangeKind::DefaultPropertyChange => "default property change",
            ChangeKind::OverrideChange => "override change",
        };
        f.write_str(text)
    }
}

/// Minimum access guard for user writes
#[derive(Debug, Clone)]
pub struct WriteGuard<'c> {
    resolver: PermissionResolver<'c>,
    validator: AccessValidator,
    audit: AuditLogger,
}

impl<'c> WriteGuard<'c> {
    pub fn new(catalog: &'c PermissionCatalog) -> Self {
        Self {
            resolver: PermissionResolver::new(catalog),
            validator: AccessValidator::default(),
            audit: AuditLogger::default(),
        }
    }

    pub fn with_validator(mut self, validator: AccessValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn resolver(&self) -> &PermissionResolver<'c> {
        &self.resolver
    }

    pub fn validator(&self) -> &AccessValidator {
        &self.validator
    }

    /// Check a user as it would look after the write
    ///
    /// `user` and `overrides` describe the prospective state. Returns the
    /// effective set in the default property when the write may proceed.
    pub fn check(
        &self,
        user: &User,
        change: ChangeKind,
        overrides: &[PermissionOverride],
        roles: &[Role],
    ) -> AccessResult<EffectivePermissions> {
        user.check_default_property()?;

        let resolution = self
            .resolver
            .resolve_for_user(user, user.property_id, overrides, roles);
        self.audit
            .log_resolution(user.id, user.property_id, &resolution);

        let result = self.validator.validate(&resolution.permissions);
        self.audit
            .log_validation(user.id, user.property_id, change, &result);

        if result.valid {
            return Ok(resolution.permissions);
        }

        let message = result.error.unwrap_or_default();
        tracing::warn!(
            user_id = %user.id,
            property_id = %user.property_id,
            change = %change,
            "Blocked write below minimum access"
        );
        Err(AccessError::MinimumAccess {
            user_id: user.id,
            property_id: user.property_id,
            change,
            message,
        })
    }

    /// Check a user that has not been saved yet
    ///
    /// Only unsaved drafts authored under `correlation_id` are applied.
    pub fn check_new_user(
        &self,
        correlation_id: Uuid,
        role_id: RoleId,
        property_id: PropertyId,
        is_super_admin: bool,
        drafts: &[OverrideDraft],
        roles: &[Role],
    ) -> AccessResult<EffectivePermissions> {
        let effective = self.resolver.compute_effective_for_drafts(
            role_id,
            property_id,
            drafts,
            correlation_id,
            roles,
            is_super_admin,
        );
        let result = self.validator.validate(&effective);
        self.audit
            .log_new_user_validation(correlation_id, property_id, &effective, &result);
        if result.valid {
            return Ok(effective);
        }

        tracing::warn!(
            correlation_id = %correlation_id,
            property_id = %property_id,
            "Blocked user creation below minimum access"
        );
        Err(AccessError::NewUserMinimumAccess {
            correlation_id,
            property_id,
            message: result.error.unwrap_or_default(),
        })
    }

    /// Apply a tri-state override selection if the result stays valid
    ///
    /// Grant and deny require a catalog key; inherit clears any stored key,
    /// including ones a newer catalog no longer lists. On success returns
    /// the state the triple had before; on failure the store is left
    /// untouched.
    pub fn set_override_state<S>(
        &self,
        store: &S,
        user: &User,
        property_id: PropertyId,
        key: &str,
        state: OverrideState,
        roles: &[Role],
    ) -> AccessResult<OverrideState>
    where
        S: OverrideStore + ?Sized,
    {
        let key = match state {
            OverrideState::Inherit => PermissionKey::from(key),
            OverrideState::Grant | OverrideState::Deny => {
                self.resolver.catalog().validate_key(key)?
            }
        };

        let mut prospective: Vec<PermissionOverride> = store
            .for_user(user.id)
            .into_iter()
            .filter(|o| !(o.property_id == property_id && o.permission_key == key))
            .collect();
        if let Some(record) = Self::record_for(user, property_id, &key, state) {
            prospective.push(record);
        }
        self.check(user, ChangeKind::OverrideChange, &prospective, roles)?;

        let previous = store
            .set_state(user.id, property_id, key.clone(), state)
            .map(|o| o.state())
            .unwrap_or_default();
        self.audit
            .log_override_change(user.id, property_id, &key, previous, state);
        Ok(previous)
    }

    fn record_for(
        user: &User,
        property_id: PropertyId,
        key: &PermissionKey,
        state: OverrideState,
    ) -> Option<PermissionOverride> {
        match state {
            OverrideState::Inherit => None,
            OverrideState::Grant => Some(PermissionOverride::grant(
                user.id,
                property_id,
                key.clone(),
            )),
            OverrideState::Deny => Some(PermissionOverride::deny(
                user.id,
                property_id,
                key.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::catalog::DASHBOARD_VIEW;
    use crate::access::overrides::InMemoryOverrideStore;
    use crate::access::role::RoleTemplates;
    use crate::access::types::UserId;

    const HOME: PropertyId = PropertyId(1);
    const AWAY: PropertyId = PropertyId(2);

    fn guard() -> WriteGuard<'static> {
        WriteGuard::new(PermissionCatalog::builtin()).with_audit_logger(AuditLogger::disabled())
    }

    fn roles() -> Vec<Role> {
        let mut roles = RoleTemplates::all(PermissionCatalog::builtin());
        roles.push(Role::new(RoleId(20), "No Dashboard").with_permissions(["ROOM.VIEW"]));
        roles
    }

    fn viewer() -> User {
        User::new(UserId(7), RoleTemplates::VIEWER, HOME).with_authorized_properties([AWAY])
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::RoleChange.to_string(), "role change");
        assert_eq!(ChangeKind::Create.to_string(), "user creation");
    }

    #[test]
    fn test_valid_user_passes() {
        let effective = guard()
            .check(&viewer(), ChangeKind::Edit, &[], &roles())
            .unwrap();
        assert!(effective.contains(DASHBOARD_VIEW));
    }

    #[test]
    fn test_role_change_dropping_dashboard_is_blocked() {
        let mut user = viewer();
        user.role_id = RoleId(20);
        let err = guard()
            .check(&user, ChangeKind::RoleChange, &[], &roles())
            .unwrap_err();
        match err {
            AccessError::MinimumAccess {
                user_id,
                property_id,
                change,
                ..
            } => {
                assert_eq!(user_id, UserId(7));
                assert_eq!(property_id, HOME);
                assert_eq!(change, ChangeKind::RoleChange);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_deny_in_other_property_does_not_block() {
        let overrides = [PermissionOverride::deny(UserId(7), AWAY, DASHBOARD_VIEW)];
        guard()
            .check(&viewer(), ChangeKind::OverrideChange, &overrides, &roles())
            .unwrap();
    }

    #[test]
    fn test_default_property_change_is_checked_in_new_property() {
        let mut user = viewer();
        user.property_id = AWAY;
        let overrides = [PermissionOverride::deny(UserId(7), AWAY, DASHBOARD_VIEW)];
        let err = guard()
            .check(&user, ChangeKind::DefaultPropertyChange, &overrides, &roles())
            .unwrap_err();
        assert_eq!(err.property_id(), Some(AWAY));
    }

    #[test]
    fn test_unauthorized_default_property_is_rejected() {
        let mut user = viewer();
        user.property_id = PropertyId(99);
        assert!(matches!(
            guard().check(&user, ChangeKind::DefaultPropertyChange, &[], &roles()),
            Err(AccessError::DefaultPropertyNotAuthorized { .. })
        ));
    }

    #[test]
    fn test_grant_rescues_role_without_dashboard() {
        let mut user = viewer();
        user.role_id = RoleId(20);
        let overrides = [PermissionOverride::grant(UserId(7), HOME, DASHBOARD_VIEW)];
        guard()
            .check(&user, ChangeKind::RoleChange, &overrides, &roles())
            .unwrap();
    }

    #[test]
    fn test_new_user_with_drafts() {
        let cid = Uuid::new_v4();
        let drafts = vec![OverrideDraft::unsaved(cid, HOME, DASHBOARD_VIEW, true)];
        guard()
            .check_new_user(cid, RoleId(20), HOME, false, &drafts, &roles())
            .unwrap();

        let err = guard()
            .check_new_user(Uuid::new_v4(), RoleId(20), HOME, false, &drafts, &roles())
            .unwrap_err();
        assert!(err.is_policy_violation());
        assert_eq!(err.property_id(), Some(HOME));
    }

    #[test]
    fn test_set_override_state_blocks_without_writing() {
        let store = InMemoryOverrideStore::new();
        let result = guard().set_override_state(
            &store,
            &viewer(),
            HOME,
            DASHBOARD_VIEW,
            OverrideState::Deny,
            &roles(),
        );
        assert!(matches!(result, Err(AccessError::MinimumAccess { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_override_state_applies_and_reports_previous() {
        let store = InMemoryOverrideStore::new();
        let g = guard();
        let user = viewer();

        let previous = g
            .set_override_state(&store, &user, HOME, "ROOM.EDIT", OverrideState::Grant, &roles())
            .unwrap();
        assert_eq!(previous, OverrideState::Inherit);

        let previous = g
            .set_override_state(&store, &user, HOME, "ROOM.EDIT", OverrideState::Deny, &roles())
            .unwrap();
        assert_eq!(previous, OverrideState::Grant);
        assert_eq!(store.len(), 1);

        let previous = g
            .set_override_state(&store, &user, HOME, "ROOM.EDIT", OverrideState::Inherit, &roles())
            .unwrap();
        assert_eq!(previous, OverrideState::Deny);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_override_state_rejects_unknown_key() {
        let store = InMemoryOverrideStore::new();
        assert_eq!(
            guard().set_override_state(
                &store,
                &viewer(),
                HOME,
                "ROOM.TELEPORT",
                OverrideState::Grant,
                &roles()
            ),
            Err(AccessError::UnknownPermission("ROOM.TELEPORT".to_string()))
        );
    }

    #[test]
    fn test_inherit_clears_key_missing_from_catalog() {
        let store = InMemoryOverrideStore::from_records([PermissionOverride::grant(
            UserId(7),
            HOME,
            "LEGACY.KEY",
        )]);
        let g = guard();
        let user = viewer();

        assert_eq!(
            g.set_override_state(&store, &user, HOME, "LEGACY.KEY", OverrideState::Grant, &roles()),
            Err(AccessError::UnknownPermission("LEGACY.KEY".to_string()))
        );
        assert_eq!(store.len(), 1);

        let previous = g
            .set_override_state(&store, &user, HOME, "LEGACY.KEY", OverrideState::Inherit, &roles())
            .unwrap();
        assert_eq!(previous, OverrideState::Grant);
        assert!(store.is_empty());
    }

    #[test]
    fn test_inherit_blocked_when_grant_is_only_dashboard_source() {
        let store = InMemoryOverrideStore::from_records([PermissionOverride::grant(
            UserId(7),
            HOME,
            DASHBOARD_VIEW,
        )]);
        let mut user = viewer();
        user.role_id = RoleId(20);
        let result = guard().set_override_state(
            &store,
            &user,
            HOME,
            DASHBOARD_VIEW,
            OverrideState::Inherit,
            &roles(),
        );
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
    }
}
