//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Push-style application deploys with atomic activation and rollback
#[derive(Parser)]
#[command(
    name = "hoist",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Package the project and deploy it to the target host
    Deploy(commands::deploy::DeployArgs),

    /// Show version
    Version,

    #[command(hide = true, name = "_remote")]
    Remote(commands::remote::RemoteArgs),
}

impl Cli {
    /// Execute the CLI command and return the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<i32> {
        let Cli {
            no_color,
            quiet,
            json,
            command,
            ..
        } = self;
        match command {
            Command::Deploy(args) => {
                let ctx = OutputContext::new(no_color, quiet);
                commands::deploy::run(&ctx, &args, json).await?;
                Ok(0)
            }
            Command::Version => {
                let ctx = OutputContext::new(no_color, quiet);
                commands::version::run(&ctx, json);
                Ok(0)
            }
            Command::Remote(args) => commands::remote::run(&args, no_color, quiet).await,
        }
    }
}
