use ndarray::Array2;
use tracing::{debug, info};

use crate::config::PolicyIterationConfig;
use crate::environment::{Env, Movement};
use crate::error::{check_discount, SolverError};
use crate::policy::{expectation_backup, DetPolicy};
use crate::solution::Solution;
use crate::sweep::DoubleBuffer;
use crate::trace::AnalysisTrace;

/// Every cell starts out moving in this direction.
pub const INITIAL_ACTION: Movement = Movement::Right;

/// Alternates `evaluation_sweeps` rounds of fixed-policy evaluation with a
/// greedy improvement pass, until improvement leaves the policy unchanged.
#[derive(Debug, Clone)]
pub struct PolicyIteration {
    discount: f64,
    evaluation_sweeps: usize,
    parallel: bool,
    record_trace: bool,
    analysis: Option<AnalysisTrace>,
}

impl PolicyIteration {
    pub fn new(discount: f64, evaluation_sweeps: usize) -> Result<Self, SolverError> {
        let discount = check_discount(discount)?;
        if evaluation_sweeps == 0 {
            return Err(SolverError::NoEvaluationSweeps);
        }
        Ok(PolicyIteration {
            discount,
            evaluation_sweeps,
            parallel: false,
            record_trace: true,
            analysis: None,
        })
    }

    pub fn from_config(config: &PolicyIterationConfig) -> Result<Self, SolverError> {
        Ok(Self::new(config.discount, config.evaluation_sweeps)?.parallel(config.parallel))
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn record_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    /// Utility history of the last solve, one entry per evaluation sweep.
    pub fn analysis(&self) -> Option<&AnalysisTrace> {
        self.analysis.as_ref()
    }

    pub fn initial_policy(env: &Env) -> DetPolicy {
        DetPolicy::constant(env, INITIAL_ACTION)
    }

    pub fn solve(&mut self, env: &Env) -> Result<Solution, SolverError> {
        let mut trace = self.record_trace.then(|| AnalysisTrace::new(env));
        let mut buffers = DoubleBuffer::zeros(env);
        let mut policy = Self::initial_policy(env);
        let mut rounds = 0;

        loop {
            self.evaluate_policy(env, &policy, &mut buffers, trace.as_mut());
            rounds += 1;

            let improved = policy.improved(env, buffers.current());
            let changed = improved.differences(&policy, env).len();
            debug!(round = rounds, changed, "policy iteration round");
            if improved == policy {
                break;
            }
            policy = improved;
        }

        let iterations = rounds * self.evaluation_sweeps;
        info!(rounds, iterations, "policy iteration converged");
        self.analysis = trace;
        Ok(Solution {
            iterations,
            utilities: buffers.into_current(),
            policy,
        })
    }

    /// Runs exactly `evaluation_sweeps` expectation sweeps, continuing from
    /// the utilities already in `buffers`.
    fn evaluate_policy(
        &self,
        env: &Env,
        policy: &DetPolicy,
        buffers: &mut DoubleBuffer,
        mut trace: Option<&mut AnalysisTrace>,
    ) {
        let discount = self.discount;
        for _ in 0..self.evaluation_sweeps {
            buffers.step(env, self.parallel, |pos, prev: &Array2<f64>| {
                expectation_backup(env, pos, policy.action(pos), prev, discount)
            });
            if let Some(trace) = trace.as_deref_mut() {
                trace.record(buffers.current());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::environment::Pos;
    use approx::assert_abs_diff_eq;

    fn env(layout: &str) -> Env {
        Env::from_config(&GridConfig::from_layout(layout)).unwrap()
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(matches!(
            PolicyIteration::new(1.0, 10),
            Err(SolverError::InvalidDiscount(_))
        ));
        assert!(matches!(
            PolicyIteration::new(0.9, 0),
            Err(SolverError::NoEvaluationSweeps)
        ));
    }

    #[test]
    fn test_initial_policy_is_constant() {
        let env = env(". #\n. .");
        let policy = PolicyIteration::initial_policy(&env);
        assert!(env
            .iter_all_coordinates()
            .all(|pos| policy.action(pos) == Movement::Right));
    }

    #[test]
    fn test_demo_grid() {
        let env = Env::from_config(&GridConfig::demo()).unwrap();
        let mut solver = PolicyIteration::new(0.99, 100).unwrap();
        let solution = solver.solve(&env).unwrap();
        assert_eq!(solution.iterations, 700);
        assert_abs_diff_eq!(solution.utility(Pos::new(0, 0)), 99.81, epsilon = 0.01);
        // walls keep the initial action
        assert_eq!(solution.action(Pos::new(0, 1)), Movement::Right);
        assert_eq!(solution.utility(Pos::new(0, 1)), 0.0);
    }

    #[test]
    fn test_two_by_two() {
        let env = env("G #\n. .");
        let solution = PolicyIteration::new(0.99, 100).unwrap().solve(&env).unwrap();
        assert_eq!(solution.iterations, 200);
        assert_abs_diff_eq!(solution.utility(Pos::new(0, 0)), 66.35, epsilon = 0.01);
        assert_abs_diff_eq!(solution.utility(Pos::new(1, 0)), 64.89, epsilon = 0.01);
        assert_abs_diff_eq!(solution.utility(Pos::new(1, 1)), 63.61, epsilon = 0.01);
        assert_eq!(solution.action(Pos::new(1, 1)), Movement::Left);
    }

    #[test]
    fn test_all_walls_runs_one_round() {
        let env = env("# #");
        let mut solver = PolicyIteration::new(0.99, 5).unwrap();
        let solution = solver.solve(&env).unwrap();
        assert_eq!(solution.iterations, 5);
        assert!(solution.utilities.iter().all(|&u| u == 0.0));
        assert_eq!(solution.policy, PolicyIteration::initial_policy(&env));
    }

    #[test]
    fn test_walls_stay_zero_after_every_evaluation_sweep() {
        let env = Env::from_config(&GridConfig::demo()).unwrap().with_absorbing_terminals(true);
        let walls: Vec<Pos> = env.iter_all_coordinates().filter(|pos| env.is_wall(*pos)).collect();
        let solver = PolicyIteration::new(0.99, 1).unwrap();
        let policy = PolicyIteration::initial_policy(&env);
        let mut buffers = DoubleBuffer::zeros(&env);
        for _ in 0..50 {
            solver.evaluate_policy(&env, &policy, &mut buffers, None);
            assert!(walls.iter().all(|pos| buffers.current()[pos.index()] == 0.0));
        }
        assert_eq!(buffers.current()[(0, 0)], 1.0);
    }

    #[test]
    fn test_trace_counts_every_evaluation_sweep() {
        let env = env("G . B");
        let mut solver = PolicyIteration::new(0.9, 7).unwrap();
        let solution = solver.solve(&env).unwrap();
        let trace = solver.analysis().unwrap();
        assert_eq!(trace.sweeps(), solution.iterations);
        assert_eq!(solution.iterations % 7, 0);
        assert_eq!(
            trace.series(Pos::new(0, 1)).and_then(|s| s.last().copied()),
            Some(solution.utility(Pos::new(0, 1)))
        );
    }
}
