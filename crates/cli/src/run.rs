use std::{fs, path::Path};

use pixant_core::Observer;
use pixant_ledger::{FileLedger, resume_point};
use pixant_observers::{DivergenceGuard, ProgressRecorder};
use pixant_oracle::{ExchangeOracle, codec};
use pixant_solvers::descent::{self, Action, Event, Solution};
use tracing::info;

use crate::{CliError, config::RunConfig};

/// The outcome of a run.
#[derive(Debug, Clone)]
pub struct Summary {
    pub solution: Solution,
    pub progress: ProgressRecorder,
}

/// Runs an optimization described by `config`.
///
/// A fresh run truncates the ledger and starts from the configured pattern.
/// With `resume`, the run continues after the last complete iteration in the
/// ledger and appends to it.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, if the ledger cannot be
/// opened or has nothing to resume, or if the optimization fails.
pub fn run(config: &RunConfig, resume: bool) -> Result<Summary, CliError> {
    let grid = config.grid()?;
    let excitation = config.excitation()?;
    let sampling = config.sampling(excitation.as_ref())?;
    let descent_config = config.descent_config(excitation.as_ref())?;

    let exchange_dir = &config.oracle.exchange_dir;
    fs::create_dir_all(exchange_dir).map_err(|e| CliError::io(exchange_dir, e))?;
    let oracle = ExchangeOracle::new(&config.oracle.command, exchange_dir, grid, sampling)
        .with_args(config.oracle.args.iter().cloned());

    info!(
        nx = grid.nx(),
        ny = grid.ny(),
        time_step = sampling.time_step(),
        time_end = sampling.time_end(),
        max_iters = descent_config.max_iters(),
        "starting optimization"
    );

    let mut progress = ProgressRecorder::new();
    let mut guard = config.optimizer.divergence_limit.map(DivergenceGuard::new);
    let observer = |event: &Event<'_>| -> Option<Action> {
        progress.observe(event);
        guard.as_mut().and_then(|g| g.observe(event))
    };

    let ledger_dir = &config.ledger.dir;
    let solution = if resume {
        let point = resume_point(
            ledger_dir,
            grid.len(),
            descent_config.learning_rate(),
            descent_config.decay(),
        )?
        .ok_or_else(|| CliError::NothingToResume {
            dir: ledger_dir.clone(),
        })?;
        let ledger = FileLedger::append_to(ledger_dir)?;
        descent::resume(&oracle, &grid, point, &descent_config, ledger, observer)?
    } else {
        let pattern = config.pattern.build(&grid)?;
        let initial = descent_config.map().primal_from_pattern(&pattern);
        let ledger = FileLedger::create(ledger_dir)?;
        descent::solve(&oracle, &grid, initial, &descent_config, ledger, observer)?
    };

    info!(
        status = ?solution.status,
        iters = solution.iters,
        next_index = solution.next_index,
        "optimization finished"
    );

    Ok(Summary {
        solution,
        progress,
    })
}

/// Writes the synthesized excitation of `config` as a simulator signal file.
///
/// Returns the time step and duration of the signal.
///
/// # Errors
///
/// Returns an error if the run file defines no excitation, if synthesis fails,
/// or if the file cannot be written.
pub fn write_excitation(config: &RunConfig, output: &Path) -> Result<(f64, f64), CliError> {
    let excitation = config.excitation()?.ok_or(CliError::MissingExcitation)?;
    fs::write(output, codec::encode_waveform(&excitation.waveform))
        .map_err(|e| CliError::io(output, e))?;
    Ok((excitation.time_step, excitation.duration))
}
