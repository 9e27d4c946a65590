use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gridworld_mdp::render::{CellListing, PolicyView, UtilityView};
use gridworld_mdp::{
    AnalysisTrace, Config, Env, GridConfig, PolicyIteration, Pos, Solution, ValueIteration,
};

/// Convergence tolerance when scoring a finished policy by exact evaluation.
const EVALUATION_TOLERANCE: f64 = 1e-9;

#[derive(Parser)]
#[command(name = "gridworld-mdp", about = "Solve slippery grid worlds by dynamic programming")]
struct Cli {
    /// JSON configuration file. Defaults to the built-in 6x6 grid.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Replace the configured grid with a random SIZE x SIZE one.
    #[arg(long, global = true, value_name = "SIZE")]
    random: Option<usize>,
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,
    /// Write per-sweep utilities as CSV into this directory.
    #[arg(long, global = true, value_name = "DIR")]
    record_dir: Option<PathBuf>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    ValueIteration {
        #[arg(long)]
        discount: Option<f64>,
        #[arg(long)]
        error_bound: Option<f64>,
        #[arg(long)]
        parallel: bool,
    },
    PolicyIteration {
        #[arg(long)]
        discount: Option<f64>,
        #[arg(long)]
        eval_sweeps: Option<usize>,
        #[arg(long)]
        parallel: bool,
    },
    /// Run both solvers side by side and compare their policies.
    Compare,
}

#[derive(Serialize)]
struct Comparison<'a> {
    value_iteration: &'a Solution,
    policy_iteration: &'a Solution,
    differing_cells: Vec<Pos>,
    max_value_gap: f64,
}

const DEFAULT_LOG_FILTER: &str = "gridworld_mdp=info";

/// Filter from `RUST_LOG`-style directives, or the crate at `info` when unset or invalid.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging() {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(rust_log.as_deref());
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(size) = cli.random {
        let absorbing = config.grid.absorbing_terminals;
        let rewards = config.grid.rewards;
        config.grid = GridConfig::random(size, size, cli.seed);
        config.grid.rewards = rewards;
        config.grid.absorbing_terminals = absorbing;
    }
    Ok(config)
}

fn record(dir: Option<&Path>, name: &str, trace: Option<&AnalysisTrace>) -> Result<(), Box<dyn Error>> {
    if let (Some(dir), Some(trace)) = (dir, trace) {
        let path = dir.join(format!("{}.csv", name));
        trace.write_csv(&path)?;
        info!(path = %path.display(), sweeps = trace.sweeps(), "recorded utility trace");
    }
    Ok(())
}

fn report(title: &str, env: &Env, solution: &Solution) {
    println!("{}", title);
    println!("Number of iterations: {}", solution.iterations);
    print!("{}", CellListing { env, utilities: &solution.utilities });
    println!();
    println!("Policy:");
    print!("{}", PolicyView { env, policy: &solution.policy });
    println!();
    println!("Utilities:");
    print!("{}", UtilityView { env, utilities: &solution.utilities });
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    let env = Env::from_config(&config.grid)?;
    let recording = cli.record_dir.is_some();
    let record_dir = cli.record_dir.as_deref();
    info!(height = env.height(), width = env.width(), "grid loaded");

    match cli.cmd {
        Commands::ValueIteration { discount, error_bound, parallel } => {
            let settings = &mut config.value_iteration;
            if let Some(discount) = discount {
                settings.discount = discount;
            }
            settings.parallel |= parallel;
            let error_bound = error_bound.unwrap_or_else(|| settings.error_bound());

            let mut solver = ValueIteration::from_config(settings)?.record_trace(recording);
            let solution = solver.solve(&env, error_bound)?;
            record(record_dir, "value_iteration", solver.analysis())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&solution)?);
            } else {
                report("Value iteration", &env, &solution);
            }
        }
        Commands::PolicyIteration { discount, eval_sweeps, parallel } => {
            let settings = &mut config.policy_iteration;
            if let Some(discount) = discount {
                settings.discount = discount;
            }
            if let Some(k) = eval_sweeps {
                settings.evaluation_sweeps = k;
            }
            settings.parallel |= parallel;

            let mut solver = PolicyIteration::from_config(settings)?.record_trace(recording);
            let solution = solver.solve(&env)?;
            record(record_dir, "policy_iteration", solver.analysis())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&solution)?);
            } else {
                report("Policy iteration", &env, &solution);
            }
        }
        Commands::Compare => {
            let mut vi = ValueIteration::from_config(&config.value_iteration)?.record_trace(recording);
            let mut pi = PolicyIteration::from_config(&config.policy_iteration)?.record_trace(recording);
            let error_bound = config.value_iteration.error_bound();

            let (vi_result, pi_result) = rayon::join(
                || vi.solve(&env, error_bound),
                || pi.solve(&env),
            );
            let (vi_solution, pi_solution) = (vi_result?, pi_result?);
            record(record_dir, "value_iteration", vi.analysis())?;
            record(record_dir, "policy_iteration", pi.analysis())?;

            let discount = vi.discount();
            let vi_values = vi_solution.policy.evaluate(&env, discount, EVALUATION_TOLERANCE)?;
            let pi_values = pi_solution.policy.evaluate(&env, discount, EVALUATION_TOLERANCE)?;
            let max_value_gap = env
                .non_wall_coordinates()
                .map(|pos| (vi_values[pos.index()] - pi_values[pos.index()]).abs())
                .fold(0.0, f64::max);
            let comparison = Comparison {
                value_iteration: &vi_solution,
                policy_iteration: &pi_solution,
                differing_cells: vi_solution.policy.differences(&pi_solution.policy, &env),
                max_value_gap,
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                println!("Value iteration:  {} iterations", vi_solution.iterations);
                println!("Policy iteration: {} iterations", pi_solution.iterations);
                if comparison.differing_cells.is_empty() {
                    println!("Policies agree on every non-wall cell");
                } else {
                    let cells: Vec<String> = comparison
                        .differing_cells
                        .iter()
                        .map(|pos| pos.to_string())
                        .collect();
                    println!("Policies differ at {}", cells.join(", "));
                }
                println!("Largest gap in policy value: {:.6}", comparison.max_value_gap);
                println!();
                println!("Policy:");
                print!("{}", PolicyView { env: &env, policy: &vi_solution.policy });
            }
        }
    }
    Ok(())
}
