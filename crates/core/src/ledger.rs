use std::convert::Infallible;

use ndarray::Array1;

/// Adam internals captured on an iteration where Adam produced the step.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamDiagnostics {
    /// Adam's time index `t` (starting at 1).
    pub t: usize,

    /// The primal-space gradient fed to Adam.
    pub gradient: Array1<f64>,

    /// Bias-corrected first moment.
    pub m_hat: Array1<f64>,

    /// Bias-corrected second moment.
    pub v_hat: Array1<f64>,
}

/// A snapshot of one completed optimizer iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// Iteration index, starting at 0.
    pub index: usize,

    /// Smoothed conductivity passed to the oracle.
    pub conductivity: Array1<f64>,

    /// Clipped primal values used this iteration, before the update.
    pub primal: Array1<f64>,

    /// Sensitivity with respect to the smoothed conductivity.
    pub gradient: Array1<f64>,

    /// Step for this iteration: Adam output or the raw gradient, before
    /// learning-rate scaling.
    pub step: Array1<f64>,

    /// Filter radius used this iteration.
    pub filter_radius: f64,

    /// Root-mean-square of `gradient`.
    pub rms_gradient: f64,

    /// Root-mean-square of `step`.
    pub rms_step: f64,

    /// Total absolute power received at the feed during the forward run.
    pub total_power: f64,

    /// Adam internals, or `None` if the plateau guard skipped Adam.
    pub adam: Option<AdamDiagnostics>,
}

/// Append-only storage for iteration records.
///
/// The ledger is the record of a run's progress. Each append must be complete
/// and durable before it returns, so a truncated ledger marks the last fully
/// completed iteration. A failed append aborts the run.
pub trait IterationLedger {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the record could not be stored.
    fn append(&mut self, record: &IterationRecord) -> Result<(), Self::Error>;
}

impl<L: IterationLedger + ?Sized> IterationLedger for &mut L {
    type Error = L::Error;

    fn append(&mut self, record: &IterationRecord) -> Result<(), Self::Error> {
        (**self).append(record)
    }
}

/// A ledger that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    records: Vec<IterationRecord>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<IterationRecord> {
        self.records
    }
}

impl IterationLedger for MemoryLedger {
    type Error = Infallible;

    fn append(&mut self, record: &IterationRecord) -> Result<(), Self::Error> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Where a resumed run picks up.
///
/// Derived from the last complete record of a ledger: the primal after that
/// record's update, the radius after that record's shrink, and the next index.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    /// Index of the next iteration to run.
    pub index: usize,

    /// Primal values for the next iteration.
    pub primal: Array1<f64>,

    /// Filter radius for the next iteration.
    pub filter_radius: f64,
}
