//! Grid and solver settings.
//!
//! Configuration is read from JSON. Every solver section is optional and
//! falls back to the defaults below, so a file only needs a `grid` entry:
//!
//! ```json
//! { "grid": { "terrain": [["G", "wall"], ["", ""]] } }
//! ```

use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::environment::Cell;
use crate::error::ConfigError;

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub grid: GridConfig,
    #[serde(default)]
    pub value_iteration: ValueIterationConfig,
    #[serde(default)]
    pub policy_iteration: PolicyIterationConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            grid: GridConfig::demo(),
            value_iteration: ValueIterationConfig::default(),
            policy_iteration: PolicyIterationConfig::default(),
        }
    }
}

/// Terrain layout plus the reward attached to each terrain class.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GridConfig {
    /// One symbol per cell, row by row. See [`Cell::parse`] for the accepted symbols.
    pub terrain: Vec<Vec<String>>,
    #[serde(default)]
    pub rewards: RewardMapping,
    /// Treat goal and penalty cells as episode-ending. Off by default: terminals
    /// are ordinary cells whose successors follow the slip model.
    #[serde(default)]
    pub absorbing_terminals: bool,
}

impl GridConfig {
    pub fn new(terrain: Vec<Vec<String>>) -> Self {
        GridConfig {
            terrain,
            rewards: RewardMapping::default(),
            absorbing_terminals: false,
        }
    }

    /// One row per non-blank line, cells separated by whitespace.
    pub fn from_layout(layout: &str) -> Self {
        let terrain = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect();
        Self::new(terrain)
    }

    /// The 6x6 demonstration grid.
    pub fn demo() -> Self {
        Self::from_layout(
            "G # G . . G
             . B . G # B
             . . B . G .
             . . . B . G
             . # # # B .
             . . . . . .",
        )
    }

    /// Random grid, reproducible for a given seed. Each cell is a wall with
    /// probability 0.25, a goal with 0.15, a penalty with 0.15, and neutral otherwise.
    pub fn random(height: usize, width: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let terrain = (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| {
                        let draw: f64 = rng.gen();
                        let symbol = if draw <= 0.25 {
                            "wall"
                        } else if draw <= 0.4 {
                            "G"
                        } else if draw <= 0.55 {
                            "B"
                        } else {
                            ""
                        };
                        symbol.to_string()
                    })
                    .collect()
            })
            .collect();
        Self::new(terrain)
    }
}

/// Reward collected in a cell, per terrain class.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardMapping {
    pub goal: f64,
    pub penalty: f64,
    pub neutral: f64,
    pub wall: f64,
}

impl Default for RewardMapping {
    fn default() -> Self {
        RewardMapping {
            goal: 1.0,
            penalty: -1.0,
            neutral: -0.04,
            wall: 0.0,
        }
    }
}

impl RewardMapping {
    pub fn reward(&self, cell: Cell) -> f64 {
        match cell {
            Cell::Wall => self.wall,
            Cell::Goal => self.goal,
            Cell::Penalty => self.penalty,
            Cell::Neutral => self.neutral,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for cell in [Cell::Wall, Cell::Goal, Cell::Penalty, Cell::Neutral] {
            if !self.reward(cell).is_finite() {
                return Err(ConfigError::NonFiniteReward { cell });
            }
        }
        Ok(())
    }
}

/// Value iteration settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValueIterationConfig {
    /// Discount factor, strictly between 0 and 1.
    #[serde(default = "default_discount")]
    pub discount: f64,
    /// Fraction of `max_reward` tolerated as utility error.
    #[serde(default = "default_error_scaler")]
    pub error_scaler: f64,
    #[serde(default = "default_max_reward")]
    pub max_reward: f64,
    /// Split each sweep across the rayon thread pool.
    #[serde(default)]
    pub parallel: bool,
}

fn default_discount() -> f64 {
    0.99
}

fn default_error_scaler() -> f64 {
    0.05
}

fn default_max_reward() -> f64 {
    1.0
}

impl Default for ValueIterationConfig {
    fn default() -> Self {
        Self {
            discount: default_discount(),
            error_scaler: default_error_scaler(),
            max_reward: default_max_reward(),
            parallel: false,
        }
    }
}

impl ValueIterationConfig {
    /// Maximum acceptable utility error, in reward units.
    pub fn error_bound(&self) -> f64 {
        self.error_scaler * self.max_reward
    }
}

/// Policy iteration settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PolicyIterationConfig {
    #[serde(default = "default_discount")]
    pub discount: f64,
    /// Evaluation sweeps run per improvement step.
    #[serde(default = "default_evaluation_sweeps")]
    pub evaluation_sweeps: usize,
    #[serde(default)]
    pub parallel: bool,
}

fn default_evaluation_sweeps() -> usize {
    100
}

impl Default for PolicyIterationConfig {
    fn default() -> Self {
        Self {
            discount: default_discount(),
            evaluation_sweeps: default_evaluation_sweeps(),
            parallel: false,
        }
    }
}
