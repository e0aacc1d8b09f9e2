use std::{fs, path::Path};

use ndarray::Array1;
use pixant_core::ResumePoint;
use tracing::{debug, warn};

use crate::{
    LedgerError, LogFile,
    entry::{Entry, parse_complete_entries},
};

/// The history logs of a run, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub conductivity: Vec<Entry>,
    pub primal: Vec<Entry>,
    pub gradient: Vec<Entry>,
    pub step: Vec<Entry>,
}

/// Reads the four history logs in `dir`.
///
/// A torn trailing entry left by an interrupted append is dropped from each
/// log.
///
/// # Errors
///
/// Returns an error if a log is missing or malformed before its tail.
pub fn read_history(dir: impl AsRef<Path>) -> Result<History, LedgerError> {
    let dir = dir.as_ref();
    Ok(History {
        conductivity: read_log(dir, LogFile::Conductivity)?,
        primal: read_log(dir, LogFile::Primal)?,
        gradient: read_log(dir, LogFile::Gradient)?,
        step: read_log(dir, LogFile::Step)?,
    })
}

fn read_log(dir: &Path, which: LogFile) -> Result<Vec<Entry>, LedgerError> {
    let path = which.path_in(dir);
    let content = fs::read_to_string(&path).map_err(|e| LedgerError::io(&path, e))?;
    let (entries, torn) = parse_complete_entries(&content).map_err(|e| LedgerError::Parse {
        path: path.clone(),
        line: e.line,
        message: e.message,
    })?;
    if torn {
        warn!(path = %path.display(), "ignoring torn trailing entry");
    }
    Ok(entries)
}

/// Derives where a run continues from the ledger in `dir`.
///
/// The last complete step entry marks the last complete iteration `k`. The
/// run resumes at `k + 1` with primal `primal_k + learning_rate * step_k` and
/// filter radius `radius_k * decay`. Torn trailing entries in any log, such as
/// a half-written iteration `k + 1`, are ignored.
///
/// Returns `None` if the ledger has no complete iteration.
///
/// # Errors
///
/// Returns an error if a log is missing or malformed, or if the entries of
/// the last complete iteration are inconsistent.
pub fn resume_point(
    dir: impl AsRef<Path>,
    cells: usize,
    learning_rate: f64,
    decay: f64,
) -> Result<Option<ResumePoint>, LedgerError> {
    let dir = dir.as_ref();
    let history = read_history(dir)?;

    let Some(step) = history.step.last() else {
        debug!(dir = %dir.display(), "ledger has no complete iteration");
        return Ok(None);
    };
    let index = step.index;

    let step = values(dir, LogFile::Step, step, cells)?;
    let primal_entry = find(dir, LogFile::Primal, &history.primal, index)?;
    let primal = values(dir, LogFile::Primal, primal_entry, cells)?;
    let cond_entry = find(dir, LogFile::Conductivity, &history.conductivity, index)?;
    let radius = cond_entry
        .get("filter_radius")
        .ok_or_else(|| LedgerError::MissingKey {
            path: LogFile::Conductivity.path_in(dir),
            index,
            key: "filter_radius",
        })?;

    Ok(Some(ResumePoint {
        index: index + 1,
        primal: primal + learning_rate * step,
        filter_radius: radius * decay,
    }))
}

fn find<'a>(
    dir: &Path,
    which: LogFile,
    entries: &'a [Entry],
    index: usize,
) -> Result<&'a Entry, LedgerError> {
    entries
        .iter()
        .rev()
        .find(|e| e.index == index)
        .ok_or_else(|| LedgerError::MissingKey {
            path: which.path_in(dir),
            index,
            key: "entry",
        })
}

fn values(
    dir: &Path,
    which: LogFile,
    entry: &Entry,
    cells: usize,
) -> Result<Array1<f64>, LedgerError> {
    if entry.values.len() != cells {
        return Err(LedgerError::Length {
            path: which.path_in(dir),
            index: entry.index,
            expected: cells,
            actual: entry.values.len(),
        });
    }
    Ok(Array1::from_vec(entry.values.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use approx::assert_relative_eq;
    use ndarray::array;
    use pixant_core::{AdamDiagnostics, IterationLedger, IterationRecord};
    use tempfile::tempdir;

    use crate::FileLedger;

    fn record(index: usize, scale: f64) -> IterationRecord {
        let step = array![0.5, -1.0, 0.25] * scale;
        IterationRecord {
            index,
            conductivity: array![1.0e7, 2.9e7, 5.8e7] * scale,
            primal: array![-21.0, 0.0, 1.0 / 3.0],
            gradient: array![1e-9, -2e-9, 3e-9],
            rms_step: pixant_core::metrics::rms(&step),
            step,
            filter_radius: 1.75 * 0.9_f64.powi(i32::try_from(index).unwrap()),
            rms_gradient: 2.16e-9,
            total_power: 4.5,
            adam: (index == 0).then(|| AdamDiagnostics {
                t: 1,
                gradient: array![1.0, 2.0, 3.0],
                m_hat: array![1.0, 2.0, 3.0],
                v_hat: array![1.0, 4.0, 9.0],
            }),
        }
    }

    #[test]
    fn written_records_read_back_exactly() {
        let dir = tempdir().unwrap();
        let mut ledger = FileLedger::create(dir.path()).unwrap();
        let records = [record(0, 1.0), record(1, 0.5)];
        for r in &records {
            ledger.append(r).unwrap();
        }

        let history = read_history(dir.path()).unwrap();

        assert_eq!(history.step.len(), 2);
        for (r, (cond, (primal, (grad, step)))) in records.iter().zip(
            history.conductivity.iter().zip(
                history
                    .primal
                    .iter()
                    .zip(history.gradient.iter().zip(&history.step)),
            ),
        ) {
            assert_eq!(cond.index, r.index);
            assert_eq!(cond.values, r.conductivity.to_vec());
            assert_eq!(cond.get("filter_radius"), Some(r.filter_radius));
            assert_eq!(primal.values, r.primal.to_vec());
            assert!(primal.keys.is_empty());
            assert_eq!(grad.values, r.gradient.to_vec());
            assert_eq!(grad.get("rms_gradient"), Some(r.rms_gradient));
            assert_eq!(step.values, r.step.to_vec());
            assert_eq!(step.get("rms_step"), Some(r.rms_step));
        }

        let power = fs::read_to_string(LogFile::Power.path_in(dir.path())).unwrap();
        assert_eq!(power, "4.5\n4.5\n");

        let adam = fs::read_to_string(LogFile::Adam.path_in(dir.path())).unwrap();
        assert!(adam.starts_with(
            "Iteration0, t=1, m_hat=2, v_hat=4.666666666666667\ngradient=\n[1 2 3]\n"
        ));
        assert_eq!(adam.matches("Iteration").count(), 1);
    }

    #[test]
    fn create_truncates_and_append_to_extends() {
        let dir = tempdir().unwrap();
        {
            let mut ledger = FileLedger::create(dir.path()).unwrap();
            ledger.append(&record(0, 1.0)).unwrap();
        }
        {
            let mut ledger = FileLedger::append_to(dir.path()).unwrap();
            ledger.append(&record(1, 1.0)).unwrap();
        }
        assert_eq!(read_history(dir.path()).unwrap().step.len(), 2);

        FileLedger::create(dir.path()).unwrap();
        assert!(read_history(dir.path()).unwrap().step.is_empty());
    }

    #[test]
    fn resume_point_follows_last_complete_iteration() {
        let dir = tempdir().unwrap();
        let mut ledger = FileLedger::create(dir.path()).unwrap();
        ledger.append(&record(0, 1.0)).unwrap();
        ledger.append(&record(1, 2.0)).unwrap();

        let point = resume_point(dir.path(), 3, 0.5, 0.9).unwrap().unwrap();

        assert_eq!(point.index, 2);
        assert_relative_eq!(point.filter_radius, 1.75 * 0.9 * 0.9);
        // primal + 0.5 * step, with step = [1, -2, 0.5].
        assert_relative_eq!(point.primal[0], -20.5);
        assert_relative_eq!(point.primal[1], -1.0);
        assert_relative_eq!(point.primal[2], 1.0 / 3.0 + 0.25);
    }

    #[test]
    fn resume_point_skips_torn_step_entry() {
        let dir = tempdir().unwrap();
        let mut ledger = FileLedger::create(dir.path()).unwrap();
        ledger.append(&record(0, 1.0)).unwrap();
        drop(ledger);

        let mut step = fs::OpenOptions::new()
            .append(true)
            .open(LogFile::Step.path_in(dir.path()))
            .unwrap();
        write!(step, "Iteration1, rms_step=0.1\n[0.5 -1").unwrap();

        let point = resume_point(dir.path(), 3, 0.5, 0.9).unwrap().unwrap();
        assert_eq!(point.index, 1);
        assert_relative_eq!(point.filter_radius, 1.75 * 0.9);
    }

    #[test]
    fn resume_point_skips_torn_entries_in_every_log() {
        for log in [LogFile::Conductivity, LogFile::Primal, LogFile::Gradient] {
            for tail in ["Iteration1, filter_rad", "Iteration1\n[1.5e", "Iteration1\n"] {
                let dir = tempdir().unwrap();
                let mut ledger = FileLedger::create(dir.path()).unwrap();
                ledger.append(&record(0, 1.0)).unwrap();
                drop(ledger);

                let mut file = fs::OpenOptions::new()
                    .append(true)
                    .open(log.path_in(dir.path()))
                    .unwrap();
                write!(file, "{tail}").unwrap();

                let point = resume_point(dir.path(), 3, 0.5, 0.9).unwrap().unwrap();
                assert_eq!(point.index, 1, "{log:?} with tail {tail:?}");
                assert_relative_eq!(point.filter_radius, 1.75 * 0.9);
                assert_relative_eq!(point.primal[0], -20.75);
            }
        }
    }

    #[test]
    fn damage_before_the_tail_is_an_error() {
        let dir = tempdir().unwrap();
        let mut ledger = FileLedger::create(dir.path()).unwrap();
        ledger.append(&record(0, 1.0)).unwrap();
        ledger.append(&record(1, 1.0)).unwrap();
        drop(ledger);

        let path = LogFile::Primal.path_in(dir.path());
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replacen("-21", "-2x", 1)).unwrap();

        let err = resume_point(dir.path(), 3, 0.5, 0.9).unwrap_err();
        assert!(matches!(err, LedgerError::Parse { line: 2, .. }));
    }

    #[test]
    fn empty_ledger_has_no_resume_point() {
        let dir = tempdir().unwrap();
        FileLedger::create(dir.path()).unwrap();

        assert_eq!(resume_point(dir.path(), 3, 0.5, 0.9).unwrap(), None);
    }

    #[test]
    fn missing_ledger_is_an_error() {
        let dir = tempdir().unwrap();
        let err = resume_point(dir.path().join("nope"), 3, 0.5, 0.9).unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
    }

    #[test]
    fn wrong_grid_size_is_an_error() {
        let dir = tempdir().unwrap();
        let mut ledger = FileLedger::create(dir.path()).unwrap();
        ledger.append(&record(0, 1.0)).unwrap();
        ledger.append(&record(1, 1.0)).unwrap();

        let err = resume_point(dir.path(), 4, 0.5, 0.9).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Length {
                index: 1,
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }
}
