use ndarray::Array1;

/// How a descent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Converged by oscillation or small step.
    Converged,

    /// Reached the iteration cap. The design is kept.
    Exhausted,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The result of a descent run.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Final driver status.
    pub status: Status,

    /// Primal values after the last update.
    pub primal: Array1<f64>,

    /// Smoothed conductivity of the final primal at the final radius.
    pub conductivity: Array1<f64>,

    /// Filter radius after the last shrink.
    pub filter_radius: f64,

    /// Index the next iteration would have.
    pub next_index: usize,

    /// Iterations run by this call.
    pub iters: usize,

    /// Feed power of the returned design, if it was evaluated after the loop.
    pub final_total_power: Option<f64>,
}
