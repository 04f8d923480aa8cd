mod cli;
mod commands;
mod config;
mod django;
mod engine;
mod error;
mod paths;
mod progress;
mod runner;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Manifest file for this invocation
    pub manifest: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        manifest: paths::manifest_path(cli.manifest.as_deref()),
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, args),
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Status(args) => commands::status::run(&ctx, args),
        Command::Database { url, path } => commands::database::run(&url, &path),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "djdeploy", &mut io::stdout());
            Ok(())
        }
    }
}
