/// Actions an observer can take during a descent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop after the current iteration.
    ///
    /// The iteration's record is already in the ledger and its update is
    /// kept in the returned design.
    StopEarly,
}
