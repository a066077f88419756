use anyhow::Result;
use console::style;
use serde::Serialize;
use std::io::Write;

use quarters::access::PermissionCategory;

use super::{CommandContext, Outcome};

#[derive(Serialize)]
struct CatalogEntry<'a> {
    key: &'a str,
    category: PermissionCategory,
}

#[derive(Serialize)]
struct CatalogReport<'a> {
    version: &'a str,
    permissions: Vec<CatalogEntry<'a>>,
}

pub fn run(ctx: &CommandContext, json: bool, out: &mut dyn Write) -> Result<Outcome> {
    let catalog = ctx.catalog;
    let groups = catalog.grouped();

    if json {
        let report = CatalogReport {
            version: catalog.version(),
            permissions: groups
                .iter()
                .flat_map(|(category, keys)| {
                    keys.iter().map(|k| CatalogEntry {
                        key: k.as_str(),
                        category: *category,
                    })
                })
                .collect(),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(Outcome::Success);
    }

    writeln!(
        out,
        "Permission catalog {} ({} keys)",
        catalog.version(),
        catalog.len()
    )?;
    for (category, keys) in groups {
        writeln!(out)?;
        writeln!(out, "{}", style(category.label()).bold())?;
        for key in keys {
            writeln!(out, "  {}", key)?;
        }
    }
    Ok(Outcome::Success)
}
