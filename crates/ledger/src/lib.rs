//! Append-only text ledger of optimizer iterations.
//!
//! A run directory holds one log per quantity:
//!
//! | file                        | header                                           |
//! |-----------------------------|--------------------------------------------------|
//! | `cond_smoothed_history.txt` | `Iteration<k>, filter_radius=<r>`                |
//! | `primal_history.txt`        | `Iteration<k>`                                   |
//! | `grad_history.txt`          | `Iteration<k>, rms_gradient=<g>`                 |
//! | `step_history.txt`          | `Iteration<k>, rms_step=<s>`                     |
//! | `adam.txt`                  | `Iteration<k>, t=<t>, m_hat=<mean>, v_hat=<mean>` |
//! | `total_power.csv`           | none, one value per line                         |
//!
//! Each history entry is its header line followed by the field as
//! `[v0 v1 ...]`. The step entry is written last, so the last complete step
//! entry marks the last complete iteration. The ledger can be read back with
//! [`read_history`], and a run can pick up from its last complete iteration
//! with [`resume_point`].

mod entry;
mod error;
mod file;
mod history;

pub use entry::{Entry, EntryError, format_values, parse_complete_entries, parse_entries};
pub use error::LedgerError;
pub use file::{FileLedger, LogFile};
pub use history::{History, read_history, resume_point};
