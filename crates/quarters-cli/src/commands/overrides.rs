//! `override set` and `override list`

use anyhow::Result;
use console::style;
use std::io::Write;
use std::path::Path;

use quarters::access::{OverrideState, OverrideStore, PropertyId, UserId};

use super::{CommandContext, Outcome};

pub struct SetArgs<'a> {
    pub snapshot: &'a Path,
    pub user: UserId,
    pub property: PropertyId,
    pub permission: &'a str,
    pub state: OverrideState,
}

/// Apply a tri-state selection through the write guard
///
/// The snapshot is rewritten only when the guard lets the change through.
pub fn set(ctx: &CommandContext, args: SetArgs<'_>, out: &mut dyn Write) -> Result<Outcome> {
    let (mut snapshot, roles) = ctx.load_snapshot(args.snapshot)?;
    let guard = ctx.config.write_guard(ctx.catalog)?;
    let user = snapshot.user(args.user)?.clone();
    let store = snapshot.override_store();

    let previous = match guard.set_override_state(
        &store,
        &user,
        args.property,
        args.permission,
        args.state,
        roles.as_slice(),
    ) {
        Ok(previous) => previous,
        Err(e) if e.is_policy_violation() => {
            writeln!(out, "{} {}", style("blocked:").red().bold(), e)?;
            return Ok(Outcome::Failure);
        }
        Err(e) => return Err(e.into()),
    };

    snapshot.sync_overrides(&store);
    snapshot.save(args.snapshot)?;
    writeln!(
        out,
        "user {} property {} {}: {} -> {}",
        user.id, args.property, args.permission, previous, args.state
    )?;
    Ok(Outcome::Success)
}

/// Show a user's overrides in tri-state form
pub fn list(
    ctx: &CommandContext,
    snapshot_path: &Path,
    user: UserId,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let (snapshot, _) = ctx.load_snapshot(snapshot_path)?;
    let user = snapshot.user(user)?;
    let mut records = snapshot.override_store().for_user(user.id);
    records.sort_by(|a, b| {
        (a.property_id, &a.permission_key).cmp(&(b.property_id, &b.permission_key))
    });

    if records.is_empty() {
        writeln!(out, "user {} has no overrides", user.id)?;
    }
    for record in records {
        writeln!(
            out,
            "property {}  {:<28} {}",
            record.property_id,
            record.permission_key,
            record.state()
        )?;
    }
    Ok(Outcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, output, snapshot_file};
    use quarters::snapshot::AccessSnapshot;
    use tempfile::TempDir;

    fn set_args<'a>(
        path: &'a Path,
        permission: &'static str,
        state: OverrideState,
    ) -> SetArgs<'a> {
        SetArgs {
            snapshot: path,
            user: UserId(1),
            property: PropertyId(1),
            permission,
            state,
        }
    }

    #[test]
    fn test_set_rewrites_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_file(&dir, "s.yaml");
        let mut buf = Vec::new();
        let outcome = set(
            &context(),
            set_args(&path, "ROOM.EDIT", OverrideState::Inherit),
            &mut buf,
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Success);
        assert!(output(buf).contains("grant -> inherit"));

        let saved = AccessSnapshot::load(&path).unwrap();
        assert!(saved.overrides.iter().all(|o| o.user_id != UserId(1)));
    }

    #[test]
    fn test_blocked_change_leaves_snapshot_alone() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_file(&dir, "s.json");
        let before = std::fs::read_to_string(&path).unwrap();

        let mut buf = Vec::new();
        let outcome = set(
            &context(),
            set_args(&path, "DASHBOARD.VIEW", OverrideState::Deny),
            &mut buf,
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Failure);
        assert!(output(buf).contains("blocked"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_unknown_permission_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_file(&dir, "s.yaml");
        let mut buf = Vec::new();
        let err = set(
            &context(),
            set_args(&path, "dashboard.view", OverrideState::Grant),
            &mut buf,
        )
        .unwrap_err();
        assert!(err.to_string().contains("dashboard.view"));
    }

    #[test]
    fn test_list() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_file(&dir, "s.yaml");
        let mut buf = Vec::new();
        list(&context(), &path, UserId(2), &mut buf).unwrap();
        let text = output(buf);
        assert!(text.contains("DASHBOARD.VIEW"));
        assert!(text.contains("deny"));
    }
}
