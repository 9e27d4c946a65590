//! Plain-text views of solver output.

use std::fmt;

use ndarray::Array2;

use crate::environment::{Env, Movement, Pos};
use crate::policy::DetPolicy;

const WALL: char = '█';

pub fn arrow(movement: Movement) -> char {
    match movement {
        Movement::Up    => '⬆',
        Movement::Down  => '⬇',
        Movement::Left  => '⬅',
        Movement::Right => '➡',
    }
}

/// One arrow per cell, walls drawn as blocks.
pub struct PolicyView<'a> {
    pub env: &'a Env,
    pub policy: &'a DetPolicy,
}

impl fmt::Display for PolicyView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.env.height() {
            let line: Vec<String> = (0..self.env.width())
                .map(|col| {
                    let pos = Pos::new(row, col);
                    if self.env.is_wall(pos) {
                        WALL.to_string()
                    } else {
                        arrow(self.policy.action(pos)).to_string()
                    }
                })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// Utilities to two decimals in right-aligned columns.
pub struct UtilityView<'a> {
    pub env: &'a Env,
    pub utilities: &'a Array2<f64>,
}

impl fmt::Display for UtilityView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ((row, col), utility) in self.utilities.indexed_iter() {
            if col > 0 {
                f.write_str(" ")?;
            }
            if self.env.is_wall(Pos::new(row, col)) {
                write!(f, "{:>7}", WALL)?;
            } else {
                write!(f, "{:>7.2}", utility)?;
            }
            if col + 1 == self.env.width() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// `(col,row): value` for every non-wall cell, row by row.
pub struct CellListing<'a> {
    pub env: &'a Env,
    pub utilities: &'a Array2<f64>,
}

impl fmt::Display for CellListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pos in self.env.non_wall_coordinates() {
            writeln!(f, "({},{}): {}", pos.col, pos.row, self.utilities[pos.index()])?;
        }
        Ok(())
    }
}
