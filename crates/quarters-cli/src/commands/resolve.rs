//! `resolve` and `explain`

use anyhow::Result;
use console::style;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use quarters::access::{PermissionResolver, PermissionSource, PropertyId, Resolution, UserId};

use super::{CommandContext, Outcome};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplainedKey<'a> {
    key: &'a str,
    source: PermissionSource,
    effective: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveReport<'a> {
    user_id: UserId,
    property_id: PropertyId,
    role_found: bool,
    permissions: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<ExplainedKey<'a>>>,
}

pub struct ResolveArgs<'a> {
    pub snapshot: &'a Path,
    pub user: UserId,
    /// Defaults to the user's default property
    pub property: Option<PropertyId>,
    pub explain: bool,
    pub json: bool,
}

pub fn run(ctx: &CommandContext, args: ResolveArgs<'_>, out: &mut dyn Write) -> Result<Outcome> {
    let (snapshot, roles) = ctx.load_snapshot(args.snapshot)?;
    let user = snapshot.user(args.user)?;
    let property_id = args.property.unwrap_or(user.property_id);

    if !user.is_authorized_for(property_id) {
        tracing::warn!(
            user_id = %user.id,
            property_id = %property_id,
            "User is not authorized for this property"
        );
    }

    let resolver = PermissionResolver::new(ctx.catalog);
    let resolution =
        resolver.resolve_for_user(user, property_id, &snapshot.overrides, roles.as_slice());
    ctx.config
        .audit_logger()
        .log_resolution(user.id, property_id, &resolution);

    if args.json {
        let report = ResolveReport {
            user_id: user.id,
            property_id,
            role_found: resolution.role_found,
            permissions: resolution
                .permissions
                .sorted()
                .into_iter()
                .map(|k| k.as_str())
                .collect(),
            sources: args.explain.then(|| explained(&resolution)),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(Outcome::Success);
    }

    writeln!(
        out,
        "User {} in property {} ({} permissions)",
        user.id,
        property_id,
        resolution.permissions.len()
    )?;
    if !resolution.role_found {
        writeln!(
            out,
            "{} role {} not found, no access",
            style("warning:").yellow().bold(),
            user.role_id
        )?;
    }

    if args.explain {
        for entry in explained(&resolution) {
            let line = format!("  {:<28} {}", entry.key, source_label(entry.source));
            if entry.effective {
                writeln!(out, "{}", line)?;
            } else {
                writeln!(out, "{}", style(line).dim())?;
            }
        }
    } else {
        for key in resolution.permissions.sorted() {
            writeln!(out, "  {}", key)?;
        }
    }
    Ok(Outcome::Success)
}

fn explained(resolution: &Resolution) -> Vec<ExplainedKey<'_>> {
    let mut entries: Vec<ExplainedKey<'_>> = resolution
        .sources
        .iter()
        .map(|(key, source)| ExplainedKey {
            key: key.as_str(),
            source: *source,
            effective: resolution.permissions.contains(key.as_str()),
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(b.key));
    entries
}

fn source_label(source: PermissionSource) -> &'static str {
    match source {
        PermissionSource::SuperAdmin => "super-admin",
        PermissionSource::Role => "role",
        PermissionSource::Granted => "granted",
        PermissionSource::Denied => "denied",
    }
}
