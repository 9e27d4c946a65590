use ndarray::Array2;
use serde::Serialize;

use crate::environment::{Env, Movement, Pos};
use crate::error::{check_discount, SolverError};
use crate::sweep::DoubleBuffer;

/// Action given to wall cells by greedy extraction; walls are never visited.
pub const WALL_ACTION: Movement = Movement::Down;

// Represents deterministic policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetPolicy {
    pub policy: Array2<Movement>,
}

impl DetPolicy {
    /// Every cell, walls included, mapped to `movement`.
    pub fn constant(env: &Env, movement: Movement) -> Self {
        Self {
            policy: Array2::from_elem(env.size(), movement),
        }
    }

    pub fn action(&self, pos: Pos) -> Movement {
        self.policy[pos.index()]
    }

    pub fn set(&mut self, pos: Pos, movement: Movement) {
        self.policy[pos.index()] = movement;
    }

    /// Greedy policy for a utility grid, walls set to [`WALL_ACTION`].
    pub fn greedy(env: &Env, utilities: &Array2<f64>) -> Self {
        Self::constant(env, WALL_ACTION).improved(env, utilities)
    }

    /// Copy of this policy with every non-wall cell replaced by its greedy action.
    pub fn improved(&self, env: &Env, utilities: &Array2<f64>) -> Self {
        let mut improved = self.clone();
        for pos in env.non_wall_coordinates() {
            let (best_action, _) = greedy_action(env, pos, utilities);
            improved.set(pos, best_action);
        }
        improved
    }

    /// Non-wall cells on which the two policies disagree.
    pub fn differences(&self, other: &DetPolicy, env: &Env) -> Vec<Pos> {
        env.non_wall_coordinates()
            .filter(|pos| self.action(*pos) != other.action(*pos))
            .collect()
    }

    /// Utilities earned by following this policy forever, iterated until no
    /// cell moves by `tolerance` or more in a sweep.
    pub fn evaluate(
        &self,
        env: &Env,
        discount: f64,
        tolerance: f64,
    ) -> Result<Array2<f64>, SolverError> {
        let discount = check_discount(discount)?;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(SolverError::InvalidErrorBound(tolerance));
        }
        let mut buffers = DoubleBuffer::zeros(env);
        loop {
            let change = buffers.step(env, false, |pos, prev| {
                expectation_backup(env, pos, self.action(pos), prev, discount)
            });
            if change.map_or(true, |c| c < tolerance) {
                return Ok(buffers.into_current());
            }
        }
    }
}

/// Best action from `pos` by expected next-state utility, with that utility.
/// Ties go to the earliest action in [`Movement::actions`].
pub fn greedy_action(env: &Env, pos: Pos, utilities: &Array2<f64>) -> (Movement, f64) {
    let mut best_action = Movement::Up;
    let mut best_value = f64::NEG_INFINITY;
    for &movement in env.actions() {
        let value = env.transitions(pos, movement).expected_utility(utilities);
        if value > best_value {
            best_value = value;
            best_action = movement;
        }
    }
    (best_action, best_value)
}

/// Bellman expectation backup for a fixed action: R(s) + γ \sum_{s'} P(s'|s,a) U(s').
pub(crate) fn expectation_backup(
    env: &Env,
    pos: Pos,
    movement: Movement,
    utilities: &Array2<f64>,
    discount: f64,
) -> f64 {
    if env.is_terminal(pos) {
        return env.reward(pos);
    }
    let future = env.transitions(pos, movement).expected_utility(utilities);
    env.reward(pos) + discount * future
}
