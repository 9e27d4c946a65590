//! Value iteration and policy iteration for grid worlds with slippery movement.
//!
//! ```no_run
//! use gridworld_mdp::{Env, GridConfig, ValueIteration};
//!
//! let env = Env::from_config(&GridConfig::demo())?;
//! let solution = ValueIteration::new(0.99)?.solve(&env, 0.05)?;
//! println!("{} sweeps", solution.iterations);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod policy;
pub mod policy_iteration;
pub mod render;
pub mod solution;
mod sweep;
pub mod trace;
pub mod transition;
pub mod value_iteration;

pub use config::{Config, GridConfig, RewardMapping};
pub use environment::{Cell, Env, Movement, Pos};
pub use error::{ConfigError, RecordError, SolverError};
pub use policy::DetPolicy;
pub use policy_iteration::PolicyIteration;
pub use solution::Solution;
pub use trace::AnalysisTrace;
pub use transition::Transitions;
pub use value_iteration::ValueIteration;
