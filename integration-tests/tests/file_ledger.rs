use std::fs;

use approx::assert_relative_eq;
use integration_tests::UniformOracle;
use ndarray::Array1;
use pixant_core::{GridSpec, Observer};
use pixant_ledger::{FileLedger, LogFile, read_history, resume_point};
use pixant_observers::ProgressRecorder;
use pixant_solvers::{
    adam::StepKind,
    convergence::Convergence,
    descent::{self, Action, Config, Event, Status},
    mapping::{ConductivityMap, Mapping},
};
use tempfile::TempDir;

fn grid_7x7() -> GridSpec {
    GridSpec::from_millimeters(7.0, 7.0, 1.0).unwrap()
}

fn linear(max_iters: usize) -> Config {
    Config::new(max_iters, 0.5, 0.9, 0.1)
        .unwrap()
        .with_map(ConductivityMap::copper(Mapping::Linear))
}

#[test]
fn uniform_gradient_run_is_logged_to_disk() {
    let dir = TempDir::new().unwrap();
    let oracle = UniformOracle::steady(49, 1e-10);

    let solution = descent::solve_unobserved(
        &oracle,
        &grid_7x7(),
        Array1::zeros(49),
        &linear(200),
        FileLedger::create(dir.path()).unwrap(),
    )
    .unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert!(solution.iters <= 3);

    let history = read_history(dir.path()).unwrap();
    assert_eq!(history.step.len(), solution.iters);
    assert_eq!(history.primal.len(), solution.iters);
    assert_relative_eq!(history.conductivity[0].get("filter_radius").unwrap(), 1.75);
    assert_relative_eq!(
        history.step.last().unwrap().get("rms_step").unwrap(),
        5.8e-3,
        max_relative = 1e-9
    );
    assert!(history.primal[0].values.iter().all(|p| *p == 0.0));

    let power = fs::read_to_string(LogFile::Power.path_in(dir.path())).unwrap();
    assert_eq!(power.lines().collect::<Vec<_>>(), vec!["2"; solution.iters]);

    // Only the first iteration went through Adam.
    let adam = fs::read_to_string(LogFile::Adam.path_in(dir.path())).unwrap();
    assert_eq!(adam.matches("Iteration").count(), 1);
    assert!(adam.starts_with("Iteration0, t=1, m_hat="));
}

#[test]
fn sign_flip_converges_by_oscillation() {
    let oracle = UniformOracle::flipping(49, 1e-6);
    let mut progress = ProgressRecorder::new();

    let solution = descent::solve(
        &oracle,
        &grid_7x7(),
        Array1::zeros(49),
        &linear(200),
        pixant_core::MemoryLedger::new(),
        |event: &Event<'_>| -> Option<Action> { progress.observe(event) },
    )
    .unwrap();

    assert_eq!(solution.status, Status::Converged);
    assert_eq!(solution.next_index, 3);
    assert_eq!(progress.history().len(), 3);
    assert_eq!(progress.history()[0].kind, StepKind::Adam);
    assert_eq!(progress.reversals(), 1);
    assert!(matches!(
        progress.converged(),
        Some(Convergence::Oscillation { count: 2, .. })
    ));
}

#[test]
fn resumed_run_appends_to_the_same_ledger() {
    let dir = TempDir::new().unwrap();
    let grid = grid_7x7();
    let oracle = UniformOracle::steady(49, 1e-6);

    let first = descent::solve_unobserved(
        &oracle,
        &grid,
        Array1::zeros(49),
        &linear(3),
        FileLedger::create(dir.path()).unwrap(),
    )
    .unwrap();
    assert_eq!(first.status, Status::Exhausted);

    let point = resume_point(dir.path(), grid.len(), 0.5, 0.9)
        .unwrap()
        .unwrap();
    assert_eq!(point.index, first.next_index);
    assert_relative_eq!(point.filter_radius, first.filter_radius, epsilon = 1e-12);
    for (a, b) in point.primal.iter().zip(&first.primal) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }

    let second = descent::resume(
        &oracle,
        &grid,
        point,
        &linear(5),
        FileLedger::append_to(dir.path()).unwrap(),
        (),
    )
    .unwrap();
    assert_eq!(second.status, Status::Exhausted);
    assert_eq!(second.iters, 2);

    let history = read_history(dir.path()).unwrap();
    let indices: Vec<_> = history.step.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);

    // Adam restarted on resume: t = 1 again, keyed by the resumed index.
    let adam = fs::read_to_string(LogFile::Adam.path_in(dir.path())).unwrap();
    assert_eq!(adam.matches("t=1,").count(), 2);
    assert!(adam.starts_with("Iteration0, t=1,"));
    assert!(adam.contains("\nIteration3, t=1,"));
}
