use std::{io::IsTerminal, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand, ValueHint};
use pixant_cli::{CliError, RunConfig, run, write_excitation};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Adjoint topology optimizer for pixelated antennas"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize a design
    Run(RunArgs),

    /// Write the excitation signal defined by a run file
    Excitation(ExcitationArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Run file (TOML)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Continue after the last complete iteration in the ledger
    #[arg(long)]
    resume: bool,
}

#[derive(Args)]
struct ExcitationArgs {
    /// Run file (TOML)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Destination signal file
    #[arg(long, value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match try_main(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(command: Command) -> Result<(), CliError> {
    match command {
        Command::Run(args) => {
            let config = RunConfig::load(&args.config)?;
            let summary = run(&config, args.resume)?;
            if let Some((index, power)) = summary.progress.best_power() {
                info!(index, power, "highest received power");
            }
            Ok(())
        }
        Command::Excitation(args) => {
            let config = RunConfig::load(&args.config)?;
            let (time_step, duration) = write_excitation(&config, &args.output)?;
            info!(
                output = %args.output.display(),
                time_step,
                duration,
                "wrote excitation"
            );
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}
