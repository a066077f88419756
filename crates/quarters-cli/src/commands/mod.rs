//! Subcommand implementations
//!
//! Each command writes its report to the supplied writer and returns an
//! [`Outcome`]; errors bubble up to `main` as `anyhow::Error`.

pub mod catalog;
pub mod overrides;
pub mod resolve;
pub mod roles;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;

use quarters::access::{PermissionCatalog, RoleRegistry};
use quarters::config::AccessConfig;
use quarters::snapshot::AccessSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failure => ExitCode::FAILURE,
        }
    }
}

/// Shared state for every command
pub struct CommandContext {
    pub config: AccessConfig,
    pub catalog: &'static PermissionCatalog,
}

impl CommandContext {
    pub fn new(config: AccessConfig) -> Self {
        Self {
            config,
            catalog: PermissionCatalog::builtin(),
        }
    }

    /// Load a snapshot together with the roles it resolves against
    pub fn load_snapshot(&self, path: &Path) -> Result<(AccessSnapshot, RoleRegistry)> {
        let snapshot = AccessSnapshot::load(path)?;
        let roles = snapshot
            .role_registry(&self.config, self.catalog)
            .with_context(|| format!("Invalid roles in {:?}", path))?;
        Ok((snapshot, roles))
    }
}
