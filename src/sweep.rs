//! Synchronous sweeps over a utility grid.
//!
//! Every cell of a sweep reads the previous sweep's utilities and writes only
//! its own slot of the next grid. Two buffers alternate so no sweep copies
//! the grid.

use ndarray::{Array2, Zip};
use ordered_float::OrderedFloat;

use crate::environment::{Cell, Env, Pos};

pub(crate) struct DoubleBuffer {
    current: Array2<f64>,
    scratch: Array2<f64>,
}

impl DoubleBuffer {
    /// Both buffers start at 0, walls included; wall slots are never written.
    pub(crate) fn zeros(env: &Env) -> Self {
        DoubleBuffer {
            current: Array2::zeros(env.size()),
            scratch: Array2::zeros(env.size()),
        }
    }

    pub(crate) fn current(&self) -> &Array2<f64> {
        &self.current
    }

    pub(crate) fn into_current(self) -> Array2<f64> {
        self.current
    }

    /// Runs one sweep, adopts its result and returns the largest change over
    /// non-wall cells. `None` when there are no non-wall cells.
    pub(crate) fn step<F>(&mut self, env: &Env, parallel: bool, update: F) -> Option<f64>
    where
        F: Fn(Pos, &Array2<f64>) -> f64 + Sync,
    {
        sweep(env, &self.current, &mut self.scratch, parallel, update);
        let change = max_change(env, &self.current, &self.scratch);
        std::mem::swap(&mut self.current, &mut self.scratch);
        change
    }
}

fn sweep<F>(env: &Env, prev: &Array2<f64>, next: &mut Array2<f64>, parallel: bool, update: F)
where
    F: Fn(Pos, &Array2<f64>) -> f64 + Sync,
{
    let cell_update = |(row, col): (usize, usize), out: &mut f64, cell: &Cell| {
        if *cell != Cell::Wall {
            *out = update(Pos::new(row, col), prev);
        }
    };
    let zip = Zip::indexed(next).and(env.map());
    if parallel {
        zip.par_for_each(cell_update);
    } else {
        zip.for_each(cell_update);
    }
}

fn max_change(env: &Env, prev: &Array2<f64>, next: &Array2<f64>) -> Option<f64> {
    let mut largest: Option<OrderedFloat<f64>> = None;
    Zip::from(prev)
        .and(next)
        .and(env.map())
        .for_each(|&old, &new, &cell| {
            if cell != Cell::Wall {
                let change = OrderedFloat((new - old).abs());
                largest = Some(largest.map_or(change, |l| l.max(change)));
            }
        });
    largest.map(OrderedFloat::into_inner)
}
