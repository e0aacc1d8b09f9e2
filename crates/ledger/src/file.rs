use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use pixant_core::{IterationLedger, IterationRecord};
use tracing::debug;

use crate::{
    LedgerError,
    entry::{format_header, format_values},
};

/// The files that make up a ledger directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFile {
    Conductivity,
    Primal,
    Gradient,
    Step,
    Adam,
    Power,
}

impl LogFile {
    pub const ALL: [Self; 6] = [
        Self::Conductivity,
        Self::Primal,
        Self::Gradient,
        Self::Step,
        Self::Adam,
        Self::Power,
    ];

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Conductivity => "cond_smoothed_history.txt",
            Self::Primal => "primal_history.txt",
            Self::Gradient => "grad_history.txt",
            Self::Step => "step_history.txt",
            Self::Adam => "adam.txt",
            Self::Power => "total_power.csv",
        }
    }

    /// Returns this file's path inside `dir`.
    #[must_use]
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

struct Log {
    path: PathBuf,
    file: File,
}

impl Log {
    fn open(dir: &Path, which: LogFile, truncate: bool) -> Result<Self, LedgerError> {
        let path = which.path_in(dir);
        let mut options = OpenOptions::new();
        if truncate {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }
        let file = options.open(&path).map_err(|e| LedgerError::io(&path, e))?;
        Ok(Self { path, file })
    }

    /// Writes `text` and waits until it is on disk.
    fn write_durably(&mut self, text: &str) -> Result<(), LedgerError> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_data())
            .map_err(|e| LedgerError::io(&self.path, e))
    }
}

/// A ledger backed by text files in a run directory.
///
/// Every append writes all logs for the record and syncs them before
/// returning.
pub struct FileLedger {
    dir: PathBuf,
    conductivity: Log,
    primal: Log,
    gradient: Log,
    step: Log,
    adam: Log,
    power: Log,
}

impl FileLedger {
    /// Starts a fresh ledger, creating `dir` and truncating existing logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a log cannot be created.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open(dir.as_ref(), true)
    }

    /// Opens an existing ledger for appending, creating missing logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a log cannot be opened.
    pub fn append_to(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open(dir.as_ref(), false)
    }

    fn open(dir: &Path, truncate: bool) -> Result<Self, LedgerError> {
        fs::create_dir_all(dir).map_err(|e| LedgerError::io(dir, e))?;
        debug!(dir = %dir.display(), truncate, "opening ledger");
        Ok(Self {
            dir: dir.to_path_buf(),
            conductivity: Log::open(dir, LogFile::Conductivity, truncate)?,
            primal: Log::open(dir, LogFile::Primal, truncate)?,
            gradient: Log::open(dir, LogFile::Gradient, truncate)?,
            step: Log::open(dir, LogFile::Step, truncate)?,
            adam: Log::open(dir, LogFile::Adam, truncate)?,
            power: Log::open(dir, LogFile::Power, truncate)?,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl IterationLedger for FileLedger {
    type Error = LedgerError;

    fn append(&mut self, record: &IterationRecord) -> Result<(), LedgerError> {
        let index = record.index;

        self.conductivity.write_durably(&entry(
            index,
            &[("filter_radius", record.filter_radius)],
            &format_values(&record.conductivity),
        ))?;
        self.primal
            .write_durably(&entry(index, &[], &format_values(&record.primal)))?;
        self.gradient.write_durably(&entry(
            index,
            &[("rms_gradient", record.rms_gradient)],
            &format_values(&record.gradient),
        ))?;

        if let Some(adam) = &record.adam {
            #[allow(clippy::cast_precision_loss)]
            let t = adam.t as f64;
            let header = format_header(
                index,
                &[
                    ("t", t),
                    ("m_hat", adam.m_hat.mean().unwrap_or(0.0)),
                    ("v_hat", adam.v_hat.mean().unwrap_or(0.0)),
                ],
            );
            self.adam.write_durably(&format!(
                "{header}\ngradient=\n{}\nm_hat=\n{}\nv_hat=\n{}\n",
                format_values(&adam.gradient),
                format_values(&adam.m_hat),
                format_values(&adam.v_hat),
            ))?;
        }

        self.power.write_durably(&format!("{}\n", record.total_power))?;

        // Last, so a complete step entry marks a complete iteration.
        self.step.write_durably(&entry(
            index,
            &[("rms_step", record.rms_step)],
            &format_values(&record.step),
        ))?;

        debug!(index, dir = %self.dir.display(), "appended ledger record");
        Ok(())
    }
}

fn entry(index: usize, keys: &[(&str, f64)], values: &str) -> String {
    format!("{}\n{values}\n", format_header(index, keys))
}
