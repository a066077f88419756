//! Quarters CLI
//!
//! Inspect the permission catalog and roles, resolve and explain a user's
//! effective permissions from a snapshot file, validate minimum access and
//! edit overrides through the write guard.
//!
//! # Configuration
//!
//! 1. `--config PATH`
//! 2. `QUARTERS_CONFIG`
//! 3. `<platform config dir>/quarters/config.yaml`
//! 4. Built-in defaults

mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use quarters::access::{OverrideState, PropertyId, UserId};
use quarters::config::AccessConfig;

use commands::{overrides, resolve, CommandContext, Outcome};

#[derive(Parser, Debug)]
#[command(name = "quarters")]
#[command(version, about = "Staff housing access resolution", long_about = None)]
struct Cli {
    /// Access config file (also: QUARTERS_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the permission catalog by category
    Catalog {
        #[arg(long)]
        json: bool,
    },

    /// List configured roles (built-in templates when none are configured)
    Roles {
        #[arg(long)]
        json: bool,
    },

    /// Print a user's effective permissions in one property
    Resolve(SubjectArgs),

    /// Like `resolve`, with the source of every key
    Explain(SubjectArgs),

    /// Check minimum access in each user's default property
    Validate {
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        /// Only check this user
        #[arg(long)]
        user: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Edit per-property overrides
    #[command(subcommand)]
    Override(OverrideCommand),
}

#[derive(clap::Args, Debug)]
struct SubjectArgs {
    #[arg(long, value_name = "FILE")]
    snapshot: PathBuf,

    #[arg(long)]
    user: i64,

    /// Property to resolve in (default: the user's default property)
    #[arg(long)]
    property: Option<i64>,

    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum OverrideCommand {
    /// Set one override to inherit, grant or deny
    Set {
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        #[arg(long)]
        user: i64,

        #[arg(long)]
        property: i64,

        #[arg(long, value_name = "KEY")]
        permission: String,

        #[arg(long)]
        state: OverrideState,
    },

    /// Show a user's overrides
    List {
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        #[arg(long)]
        user: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug, cli.verbose, cli.json_logs);

    match run(cli) {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    let (config, source) = AccessConfig::load(cli.config.as_deref())?;
    tracing::info!(source = %source, "Using access config");

    let ctx = CommandContext::new(config);
    ctx.config
        .validate(ctx.catalog)
        .with_context(|| format!("Invalid access config: {}", source))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let outcome = match cli.command {
        Command::Catalog { json } => commands::catalog::run(&ctx, json, &mut out)?,
        Command::Roles { json } => commands::roles::run(&ctx, json, &mut out)?,
        Command::Resolve(args) => resolve::run(&ctx, subject(&args, false), &mut out)?,
        Command::Explain(args) => resolve::run(&ctx, subject(&args, true), &mut out)?,
        Command::Validate {
            snapshot,
            user,
            json,
        } => commands::validate::run(&ctx, &snapshot, user.map(UserId), json, &mut out)?,
        Command::Override(OverrideCommand::Set {
            snapshot,
            user,
            property,
            permission,
            state,
        }) => overrides::set(
            &ctx,
            overrides::SetArgs {
                snapshot: &snapshot,
                user: UserId(user),
                property: PropertyId(property),
                permission: &permission,
                state,
            },
            &mut out,
        )?,
        Command::Override(OverrideCommand::List { snapshot, user }) => {
            overrides::list(&ctx, &snapshot, UserId(user), &mut out)?
        }
    };

    out.flush()?;
    Ok(outcome)
}

fn subject(args: &SubjectArgs, explain: bool) -> resolve::ResolveArgs<'_> {
    resolve::ResolveArgs {
        snapshot: &args.snapshot,
        user: UserId(args.user),
        property: args.property.map(PropertyId),
        explain,
        json: args.json,
    }
}
