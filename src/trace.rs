//! Per-sweep utility history, for plotting convergence.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use ndarray::Array2;

use crate::environment::{Env, Pos};
use crate::error::RecordError;

/// Utility of every non-wall cell after each sweep. Sweep 0 is the all-zero start.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTrace {
    cells: Vec<Pos>,
    series: Vec<Vec<f64>>,
    sweeps: usize,
}

impl AnalysisTrace {
    pub fn new(env: &Env) -> Self {
        let cells: Vec<Pos> = env.non_wall_coordinates().collect();
        let series = vec![vec![0.0]; cells.len()];
        AnalysisTrace {
            cells,
            series,
            sweeps: 0,
        }
    }

    pub fn record(&mut self, utilities: &Array2<f64>) {
        for (pos, history) in self.cells.iter().zip(self.series.iter_mut()) {
            history.push(utilities[pos.index()]);
        }
        self.sweeps += 1;
    }

    pub fn cells(&self) -> &[Pos] {
        &self.cells
    }

    /// History for one cell, `None` for walls and cells outside the grid.
    pub fn series(&self, pos: Pos) -> Option<&[f64]> {
        let index = self.cells.binary_search(&pos).ok()?;
        Some(&self.series[index])
    }

    /// Recorded sweeps, not counting the initial row.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Writes one column per cell headed `(col,row)` and one row per sweep.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), RecordError> {
        if self.cells.is_empty() {
            return Ok(());
        }
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(
            self.cells
                .iter()
                .map(|pos| format!("({},{})", pos.col, pos.row)),
        )?;
        for sweep in 0..=self.sweeps {
            wtr.write_record(self.series.iter().map(|history| history[sweep].to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), RecordError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_to(File::create(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn env(layout: &str) -> Env {
        Env::from_config(&GridConfig::from_layout(layout)).unwrap()
    }

    #[test]
    fn test_trace_skips_walls() {
        let env = env(". #\nG .");
        let mut trace = AnalysisTrace::new(&env);
        assert_eq!(
            trace.cells(),
            &[Pos::new(0, 0), Pos::new(1, 0), Pos::new(1, 1)]
        );
        let utilities = Array2::from_shape_vec((2, 2), vec![0.5, 9.0, 1.0, -0.25]).unwrap();
        trace.record(&utilities);
        assert_eq!(trace.sweeps(), 1);
        assert_eq!(trace.series(Pos::new(1, 0)), Some(&[0.0, 1.0][..]));
        assert_eq!(trace.series(Pos::new(0, 1)), None);
        assert_eq!(trace.series(Pos::new(5, 5)), None);
    }

    #[test]
    fn test_csv_layout() {
        let env = env(". #\nG .");
        let mut trace = AnalysisTrace::new(&env);
        trace.record(&Array2::from_shape_vec((2, 2), vec![0.5, 0.0, 1.0, -0.25]).unwrap());

        let mut out = Vec::new();
        trace.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["\"(0,0)\",\"(0,1)\",\"(1,1)\"", "0,0,0", "0.5,1,-0.25"]);
    }

    #[test]
    fn test_all_wall_grid_writes_nothing() {
        let env = env("# #");
        let trace = AnalysisTrace::new(&env);
        let mut out = Vec::new();
        trace.write_to(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
