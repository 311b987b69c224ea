use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fortress")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Run a schematic of env, data and script orders", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write log records to this file instead of stderr
    #[arg(short = 'l', long, global = true, env = "FORTRESS_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute every order in a schematic
    Run(RunArgs),

    /// Show the order a schematic would execute in, without running it
    Plan(PlanArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct SchematicArg {
    /// Schematic file path or http(s) URL
    #[arg(short, long, env = "FORTRESS_SCHEMATIC")]
    pub schematic: String,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SchematicArg,

    /// Stop at the first failing order not marked ignore-fail
    #[arg(long, env = "FORTRESS_HALT_ON_FAILURE")]
    pub halt_on_failure: bool,

    /// Leave generated script files on disk
    #[arg(long, env = "FORTRESS_KEEP_SCRIPTS")]
    pub keep_scripts: bool,

    /// Only restore variables that held a non-empty value before a script
    #[arg(long)]
    pub legacy_restore: bool,

    /// Print the run outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SchematicArg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "fortress",
            "-vv",
            "run",
            "-s",
            "app.toml",
            "--halt-on-failure",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.source.schematic, "app.toml");
                assert!(args.halt_on_failure);
                assert!(args.json);
                assert!(!args.legacy_restore);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_plan_requires_schematic() {
        assert!(Cli::try_parse_from(["fortress", "plan"]).is_err());
    }
}
