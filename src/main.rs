mod cli;
mod schematic;
mod ui;

use anyhow::{Context as _, Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, PlanArgs, RunArgs};
use orderkit::{
    BoxedOrder, EngineOptions, FailurePolicy, NoProgress, RestorePolicy, SystemEnvironment,
};
use schematic::{Schematic, Source};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Run(args) => run(&ctx, &args),
        Command::Plan(args) => plan(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "fortress", &mut io::stdout());
            Ok(())
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None);

    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Could not open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Load a schematic and build its orders
fn load(ctx: &Context, location: &str) -> Result<(EngineOptions, Vec<BoxedOrder>)> {
    let source = Source::parse(location);
    if !ctx.quiet {
        ui::info(&format!("Loading schematic {location}"));
    }
    log::debug!("schematic source: {source:?}");

    let schematic = Schematic::load(&source)?;
    let options = schematic.options();
    let orders = schematic
        .into_orders()
        .with_context(|| format!("Invalid schematic: {location}"))?;

    if orders.is_empty() && !ctx.quiet {
        ui::warn("Schematic declares no orders");
    }
    Ok((options, orders))
}

fn run(ctx: &Context, args: &RunArgs) -> Result<()> {
    let (mut options, orders) = load(ctx, &args.source.schematic)?;
    apply_flags(&mut options, args);

    if ctx.verbose > 0 && !args.json {
        ui::kv("failure", &format!("{:?}", options.failure));
        ui::kv("restore", &format!("{:?}", options.restore));
        ui::kv("keep scripts", &options.keep_scripts.to_string());
    }

    let outcome = if args.json {
        orderkit::execute(orders, &mut SystemEnvironment, &options, &mut NoProgress)?
    } else {
        let mut progress = ui::ConsoleProgress::new(ctx.verbose, ctx.quiet);
        orderkit::execute(orders, &mut SystemEnvironment, &options, &mut progress)?
    };

    let summary = outcome.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&ui::outcome_json(&outcome))?);
    } else {
        ui::print_summary(&summary, outcome.halted_by());
        if options.keep_scripts && !ctx.quiet {
            ui::dim("Generated scripts were left on disk");
        }
    }

    if !summary.is_success() {
        bail!(
            "{} of {} orders failed",
            summary.failed,
            summary.executed
        );
    }
    Ok(())
}

/// Command-line flags only ever tighten the schematic's settings
fn apply_flags(options: &mut EngineOptions, args: &RunArgs) {
    if args.halt_on_failure {
        options.failure = FailurePolicy::Halt;
    }
    if args.keep_scripts {
        options.keep_scripts = true;
    }
    if args.legacy_restore {
        options.restore = RestorePolicy::Legacy;
    }
}

fn plan(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let (_, mut orders) = load(ctx, &args.source.schematic)?;
    orderkit::validate_ids(&orders)?;
    orderkit::sort_orders(&mut orders);
    ui::print_plan(&orders);
    Ok(())
}
