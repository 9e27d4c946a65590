//! Slip model P(s' | s, a).
//!
//! The agent moves in the intended direction with probability 0.8 and slips
//! to either perpendicular direction with probability 0.1 each. A move that
//! would leave the grid or enter a wall leaves the agent where it was.

use ndarray::Array2;

use crate::environment::{Env, Movement, Pos};

pub const INTENDED_PROBABILITY: f64 = 0.8;
pub const SLIP_PROBABILITY: f64 = 0.1;

const MAX_OUTCOMES: usize = 3;

/// Distribution over destinations of a single (state, action) pair.
///
/// There are never more than three distinct destinations, so outcomes are
/// stored inline; mass landing on the same cell is merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transitions {
    outcomes: [(Pos, f64); MAX_OUTCOMES],
    len: usize,
}

impl Transitions {
    fn empty() -> Self {
        Transitions {
            outcomes: [(Pos::new(0, 0), 0.0); MAX_OUTCOMES],
            len: 0,
        }
    }

    fn add(&mut self, destination: Pos, probability: f64) {
        let existing = self.outcomes[..self.len]
            .iter_mut()
            .find(|(pos, _)| *pos == destination);
        match existing {
            Some((_, mass)) => *mass += probability,
            None => {
                debug_assert!(self.len < MAX_OUTCOMES);
                self.outcomes[self.len] = (destination, probability);
                self.len += 1;
            }
        }
    }

    /// Number of distinct destinations.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pos, f64)> + '_ {
        self.outcomes[..self.len].iter().copied()
    }

    pub fn probability(&self, destination: Pos) -> f64 {
        self.iter()
            .find(|(pos, _)| *pos == destination)
            .map_or(0.0, |(_, mass)| mass)
    }

    pub fn total(&self) -> f64 {
        self.iter().map(|(_, mass)| mass).sum()
    }

    /// \sum_{s'} P(s' | s, a) * U(s')
    pub fn expected_utility(&self, utilities: &Array2<f64>) -> f64 {
        self.iter()
            .map(|(pos, mass)| mass * utilities[pos.index()])
            .sum()
    }
}

impl Env {
    /// Distribution over resulting states when `movement` is attempted from `pos`.
    ///
    /// A wall origin is allowed. `pos` must lie inside the grid.
    pub fn transitions(&self, pos: Pos, movement: Movement) -> Transitions {
        assert!(
            self.contains(pos),
            "state {} lies outside the {}x{} grid",
            pos,
            self.height(),
            self.width()
        );
        let [first_slip, second_slip] = movement.perpendiculars();
        let mut transitions = Transitions::empty();
        for (direction, probability) in [
            (movement, INTENDED_PROBABILITY),
            (first_slip, SLIP_PROBABILITY),
            (second_slip, SLIP_PROBABILITY),
        ] {
            transitions.add(self.check_movement(pos, direction), probability);
        }
        transitions
    }

    /// Where one step from `pos` lands. The border and walls stop the move.
    pub fn check_movement(&self, pos: Pos, movement: Movement) -> Pos {
        match pos.offset(movement.into_vector()) {
            Some(next) if self.contains(next) && !self.is_wall(next) => next,
            _ => pos,
        }
    }
}
