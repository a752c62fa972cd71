#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::CommandContext;
use evalpath_core::ErrorCode;
use output::{
    CliError, OutputMode, Reported, render_error, report, report_unhandled, resolve_output_mode,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "ep",
    author,
    version,
    about = "ep: resumable evaluation progress engine",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Record store path. Overrides `EVALPATH_DB` and user config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Dataset JSON with the level-2 item pool and level-3 dependencies.
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Show navigation state",
        long_about = "Show the derived navigation state of a user's flow.",
        after_help = "EXAMPLES:\n    # Level-2 flow\n    ep state --user ana\n\n    # Level-3 flow for one target\n    ep state --user ana --target org/app --json"
    )]
    State(cmd::state::StateArgs),

    #[command(
        next_help_heading = "Progress",
        about = "Complete a screen",
        long_about = "Record a screen as completed (or skipped with --skip). Completing the selection screen generates the plan.",
        after_help = "EXAMPLES:\n    # Select items and generate the plan\n    ep complete selection --user ana --data '{\"selectedItems\": [\"tokio\", \"serde\"]}'\n\n    # Answer a comparison\n    ep complete comparison_0 --user ana --data '{\"choice\": \"A\"}'"
    )]
    Complete(cmd::complete::CompleteArgs),

    #[command(
        next_help_heading = "Progress",
        about = "Skip a screen",
        after_help = "EXAMPLES:\n    ep skip comparison_2 --user ana"
    )]
    Skip(cmd::complete::SkipArgs),

    #[command(
        next_help_heading = "Progress",
        about = "Focus a reachable screen",
        long_about = "Move focus to a completed, skipped, in-progress or current screen.",
        after_help = "EXAMPLES:\n    ep navigate instructions --user ana"
    )]
    Navigate(cmd::navigate::NavigateArgs),

    #[command(
        next_help_heading = "Progress",
        about = "Append more comparisons",
        long_about = "Generate additional comparisons for an existing plan without duplicating earlier pairs.",
        after_help = "EXAMPLES:\n    ep more --user ana --count 5"
    )]
    More(cmd::more::MoreArgs),

    #[command(
        next_help_heading = "Tools",
        about = "Generate comparison pairs from a file",
        after_help = "EXAMPLES:\n    ep pairs --items deps.json --count 5 --seed 7 --json"
    )]
    Pairs(cmd::pairs::PairsArgs),

    #[command(
        next_help_heading = "Tools",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    ep completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EVALPATH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "evalpath=debug,info"
        } else {
            "evalpath=info,warn"
        })
    });

    let format = env::var("EVALPATH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let fallback = resolve_output_mode(cli.format, cli.json, "text");

    match run(&cli, fallback) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is::<Reported>() => ExitCode::FAILURE,
        Err(err) => {
            if let Err(render_err) = render_error(fallback, &CliError::new(format!("{err:#}"))) {
                eprintln!("error: {err:#} ({render_err})");
            }
            ExitCode::FAILURE
        }
    }
}

/// Every failure leaves here already rendered, except ones that occur
/// before an output mode is known.
fn run(cli: &Cli, fallback: OutputMode) -> anyhow::Result<()> {
    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let project_root = env::current_dir()?;
    let ctx = CommandContext::resolve(
        &project_root,
        cli.format,
        cli.json,
        cli.db.clone(),
        cli.dataset.clone(),
    )
    .map_err(|err| {
        report(
            fallback,
            &CliError::new(format!("{err:#}")).with_code(ErrorCode::InvalidConfig),
        )
    })?;
    debug!(store = %ctx.store_path.display(), "resolved record store");

    let result = match &cli.command {
        Commands::State(args) => cmd::state::run_state(args, &ctx),
        Commands::Complete(args) => cmd::complete::run_complete(args, &ctx),
        Commands::Skip(args) => cmd::complete::run_skip(args, &ctx),
        Commands::Navigate(args) => cmd::navigate::run_navigate(args, &ctx),
        Commands::More(args) => cmd::more::run_more(args, &ctx),
        Commands::Pairs(args) => cmd::pairs::run_pairs(args, &ctx),
        Commands::Completions(_) => Ok(()),
    };
    result.map_err(|err| report_unhandled(ctx.output, err))
}
