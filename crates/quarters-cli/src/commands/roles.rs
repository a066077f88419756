use anyhow::{Context, Result};
use console::style;
use std::io::Write;

use super::{CommandContext, Outcome};

/// List the configured roles, or the built-in templates
pub fn run(ctx: &CommandContext, json: bool, out: &mut dyn Write) -> Result<Outcome> {
    let registry = ctx
        .config
        .role_registry(ctx.catalog)
        .context("Invalid roles in access config")?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(registry.as_slice())?)?;
        return Ok(Outcome::Success);
    }

    for role in registry.as_slice() {
        let marker = if role.is_system { " [system]" } else { "" };
        writeln!(
            out,
            "{} {}{} ({} permissions)",
            style(role.id).dim(),
            style(&role.name).bold(),
            marker,
            role.permissions.len()
        )?;
        for key in &role.permissions {
            writeln!(out, "    {}", key)?;
        }
    }
    Ok(Outcome::Success)
}
