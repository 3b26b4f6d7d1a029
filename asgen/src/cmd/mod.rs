//! Command line surface.

use crate::engine::Engine;
use anyhow::{Context, Result};
use asgen_config::Config;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;
use std::fmt;
use std::path::PathBuf;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Marker for failures caused by the invocation rather than the
/// generator; `main` maps it to exit code 1.
#[derive(Debug)]
pub struct UserError(pub String);

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UserError {}

pub fn user_error(msg: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(UserError(msg.into()))
}

/// Generate AppStream catalog metadata from distribution repositories.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
pub struct Args {
    /// Set the logging level. One of [off|error|warn|info|debug|trace].
    /// You can also leave this unset and use the RUST_LOG env variable.
    #[clap(long = "log-level", global = true)]
    pub log_level: Option<LevelFilter>,

    /// Shorthand for --log-level debug.
    #[clap(long, global = true)]
    pub verbose: bool,

    /// Workspace directory holding the databases and default exports.
    #[clap(short = 'w', long = "workspace", global = true)]
    pub workspace: Option<PathBuf>,

    /// Path to asgen-config.json. Defaults to the workspace directory,
    /// then the current directory.
    #[clap(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Process everything, ignoring change detection and cached results.
    #[clap(long, global = true)]
    pub force: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process a suite and publish its catalog data.
    Run {
        suite: String,
        section: Option<String>,
    },

    /// Re-publish catalog data from the stores without processing.
    Publish {
        suite: String,
        section: Option<String>,
    },

    /// Drop store entries and media no retained suite references.
    Cleanup,

    /// Remove all stored data for the packages of a suite.
    RemoveFound { suite: String },

    /// Forget stored data for packages matching a pkid prefix.
    Forget { pkid_prefix: String },

    /// Show stored information about one package.
    Info { pkid: String },
}

/// Use the flag if present, or else `RUST_LOG`, or else the default.
pub fn init_logger(args: &Args) {
    let level = if args.verbose {
        Some(LevelFilter::Debug)
    } else {
        args.log_level
    };
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            Builder::from_default_env().init();
        }
        _ => {
            Builder::new()
                .filter(None, level.unwrap_or(DEFAULT_LEVEL_FILTER))
                .init();
        }
    }
}

pub fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let engine = Engine::new(config).context("unable to initialize the engine")?;

    match &args.command {
        Command::Run { suite, section } => engine.run(suite, section.as_deref()),
        Command::Publish { suite, section } => engine.publish(suite, section.as_deref()),
        Command::Cleanup => engine.cleanup(),
        Command::RemoveFound { suite } => engine.remove_found(suite),
        Command::Forget { pkid_prefix } => engine.forget(pkid_prefix),
        Command::Info { pkid } => engine.info(pkid),
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let path = args
        .config
        .clone()
        .or_else(|| {
            args.workspace
                .as_ref()
                .map(|w| w.join("asgen-config.json"))
                .filter(|p| p.is_file())
        })
        .unwrap_or_else(|| PathBuf::from("asgen-config.json"));

    let mut config = Config::load(&path, args.workspace.as_deref())
        .map_err(|e| user_error(e.to_string()))?;
    config.force = args.force;
    Ok(config)
}
