use ndarray::Array2;
use tracing::{debug, info};

use crate::config::ValueIterationConfig;
use crate::environment::{Env, Pos};
use crate::error::{check_discount, SolverError};
use crate::policy::{greedy_action, DetPolicy};
use crate::solution::Solution;
use crate::sweep::DoubleBuffer;
use crate::trace::AnalysisTrace;

/// Solves the Bellman optimality equation by synchronous sweeps, then reads
/// the greedy policy off the converged utilities.
#[derive(Debug, Clone)]
pub struct ValueIteration {
    discount: f64,
    parallel: bool,
    record_trace: bool,
    analysis: Option<AnalysisTrace>,
}

impl ValueIteration {
    pub fn new(discount: f64) -> Result<Self, SolverError> {
        Ok(ValueIteration {
            discount: check_discount(discount)?,
            parallel: false,
            record_trace: true,
            analysis: None,
        })
    }

    pub fn from_config(config: &ValueIterationConfig) -> Result<Self, SolverError> {
        Ok(Self::new(config.discount)?.parallel(config.parallel))
    }

    /// Spread each sweep over the rayon pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn record_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Utility history of the last solve, when recording was enabled.
    pub fn analysis(&self) -> Option<&AnalysisTrace> {
        self.analysis.as_ref()
    }

    /// Largest per-sweep change at which the utilities are within
    /// `error_bound` of optimal.
    pub fn threshold(&self, error_bound: f64) -> f64 {
        error_bound * (1.0 - self.discount) / self.discount
    }

    pub fn solve(&mut self, env: &Env, error_bound: f64) -> Result<Solution, SolverError> {
        if !(error_bound.is_finite() && error_bound > 0.0) {
            return Err(SolverError::InvalidErrorBound(error_bound));
        }
        let threshold = self.threshold(error_bound);
        let discount = self.discount;
        let mut trace = self.record_trace.then(|| AnalysisTrace::new(env));
        let mut buffers = DoubleBuffer::zeros(env);
        let mut iterations = 0;

        loop {
            let change = buffers.step(env, self.parallel, |pos, prev| {
                bellman_optimality(env, pos, prev, discount)
            });
            iterations += 1;
            if let Some(trace) = trace.as_mut() {
                trace.record(buffers.current());
            }
            debug!(iteration = iterations, max_change = ?change, "value iteration sweep");
            // No active cells means nothing left to converge.
            if change.map_or(true, |c| c < threshold) {
                break;
            }
        }

        info!(iterations, threshold, "value iteration converged");
        self.analysis = trace;
        let utilities = buffers.into_current();
        let policy = Self::optimal_policy(env, &utilities);
        Ok(Solution {
            iterations,
            utilities,
            policy,
        })
    }

    /// Greedy policy for `utilities`.
    pub fn optimal_policy(env: &Env, utilities: &Array2<f64>) -> DetPolicy {
        DetPolicy::greedy(env, utilities)
    }
}

fn bellman_optimality(env: &Env, pos: Pos, utilities: &Array2<f64>, discount: f64) -> f64 {
    if env.is_terminal(pos) {
        return env.reward(pos);
    }
    let (_, best_value) = greedy_action(env, pos, utilities);
    env.reward(pos) + discount * best_value
}
