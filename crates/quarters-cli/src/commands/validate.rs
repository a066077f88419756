use anyhow::Result;
use console::style;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use quarters::access::{AccessError, ChangeKind, PropertyId, User, UserId};

use super::{CommandContext, Outcome};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserReport {
    user_id: UserId,
    property_id: PropertyId,
    valid: bool,
    error: Option<String>,
}

/// Check minimum access for one user or every user in the snapshot
///
/// Exits with failure when any user fails.
pub fn run(
    ctx: &CommandContext,
    snapshot_path: &Path,
    user: Option<UserId>,
    json: bool,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let (snapshot, roles) = ctx.load_snapshot(snapshot_path)?;
    let guard = ctx.config.write_guard(ctx.catalog)?;

    let users: Vec<&User> = match user {
        Some(id) => vec![snapshot.user(id)?],
        None => snapshot.users.iter().collect(),
    };

    let reports: Vec<UserReport> = users
        .into_iter()
        .map(|user| {
            let outcome =
                guard.check(user, ChangeKind::Edit, &snapshot.overrides, roles.as_slice());
            UserReport {
                user_id: user.id,
                property_id: user.property_id,
                valid: outcome.is_ok(),
                error: outcome.err().map(|e| match e {
                    AccessError::MinimumAccess { message, .. } => message,
                    other => other.to_string(),
                }),
            }
        })
        .collect();
    let failures = reports.iter().filter(|r| !r.valid).count();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&reports)?)?;
    } else {
        for report in &reports {
            match &report.error {
                None => writeln!(
                    out,
                    "{} user {} (property {})",
                    style("ok").green(),
                    report.user_id,
                    report.property_id
                )?,
                Some(error) => writeln!(
                    out,
                    "{} user {} (property {}): {}",
                    style("FAIL").red().bold(),
                    report.user_id,
                    report.property_id,
                    error
                )?,
            }
        }
        writeln!(out, "{} checked, {} failed", reports.len(), failures)?;
    }

    Ok(if failures == 0 {
        Outcome::Success
    } else {
        Outcome::Failure
    })
}
