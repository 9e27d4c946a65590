use ndarray::Array2;
use serde::Serialize;

use crate::environment::{Movement, Pos};
use crate::policy::DetPolicy;

/// Result of running a solver on a grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    /// Utility sweeps performed. Policy iteration counts every evaluation sweep.
    pub iterations: usize,
    /// Utility per cell; wall cells stay at 0.
    pub utilities: Array2<f64>,
    pub policy: DetPolicy,
}

impl Solution {
    pub fn utility(&self, pos: Pos) -> f64 {
        self.utilities[pos.index()]
    }

    pub fn action(&self, pos: Pos) -> Movement {
        self.policy.action(pos)
    }
}
