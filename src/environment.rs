use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{GridConfig, RewardMapping};
use crate::error::ConfigError;

/// Terrain class of a grid cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Wall,
    Goal,
    Penalty,
    Neutral,
}

impl Cell {
    /// Parses a terrain symbol as written in grid configurations.
    ///
    /// Accepted (case-insensitive): `wall`/`#`, `G`/`goal`, `B`/`penalty`,
    /// and `.`/`neutral`/the empty string for neutral ground.
    pub fn parse(symbol: &str) -> Option<Cell> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "wall" | "#" => Some(Cell::Wall),
            "g" | "goal" => Some(Cell::Goal),
            "b" | "penalty" => Some(Cell::Penalty),
            "" | "." | "neutral" => Some(Cell::Neutral),
            _ => None,
        }
    }

    /// Goal and penalty cells, which end an episode when terminals are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, Cell::Goal | Cell::Penalty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cell::Wall => "wall",
            Cell::Goal => "goal",
            Cell::Penalty => "penalty",
            Cell::Neutral => "neutral",
        };
        f.write_str(name)
    }
}

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    Up,
    Down,
    Left,
    Right,
}

/// Fixed action ordering. Greedy extraction breaks ties in favour of the earliest entry.
const ACTIONS: [Movement; 4] = [Movement::Up, Movement::Down, Movement::Left, Movement::Right];

impl Movement {
    /// (row, col) offset of one step in this direction.
    pub fn into_vector(self) -> (isize, isize) {
        match self {
            Movement::Up    => (-1, 0),
            Movement::Down  => ( 1, 0),
            Movement::Left  => ( 0,-1),
            Movement::Right => ( 0, 1),
        }
    }

    pub fn actions() -> &'static [Movement] {
        &ACTIONS
    }

    /// The two slip directions for an intended move `(dr, dc)`:
    /// `(-dc, -dr)` first, then `(dc, dr)`.
    pub fn perpendiculars(self) -> [Movement; 2] {
        match self {
            Movement::Up    => [Movement::Right, Movement::Left],
            Movement::Down  => [Movement::Left, Movement::Right],
            Movement::Left  => [Movement::Down, Movement::Up],
            Movement::Right => [Movement::Up, Movement::Down],
        }
    }
}

/// A grid coordinate, 0-indexed from the top-left corner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }

    #[inline]
    pub fn index(self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Adds a movement vector. `None` when the result would be negative.
    pub fn offset(self, (d_row, d_col): (isize, isize)) -> Option<Pos> {
        Some(Pos {
            row: self.row.checked_add_signed(d_row)?,
            col: self.col.checked_add_signed(d_col)?,
        })
    }

    pub fn manhattan_distance(self, other: Pos) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Immutable grid world: terrain per cell and the reward derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Env {
    map: Array2<Cell>,
    rewards: Array2<f64>,
    absorbing_terminals: bool,
}

impl Env {
    pub fn new(map: Array2<Cell>, rewards: &RewardMapping) -> Result<Self, ConfigError> {
        if map.is_empty() {
            return Err(ConfigError::EmptyGrid);
        }
        rewards.validate()?;
        let reward_grid = map.map(|cell| rewards.reward(*cell));
        Ok(Self {
            map,
            rewards: reward_grid,
            absorbing_terminals: false,
        })
    }

    /// Builds the grid from configuration, rejecting empty or ragged grids and unknown symbols.
    pub fn from_config(config: &GridConfig) -> Result<Self, ConfigError> {
        let height = config.terrain.len();
        let width = config.terrain.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(ConfigError::EmptyGrid);
        }

        let mut cells = Vec::with_capacity(height);
        for (row, symbols) in config.terrain.iter().enumerate() {
            if symbols.len() != width {
                return Err(ConfigError::RaggedRow {
                    row,
                    expected: width,
                    found: symbols.len(),
                });
            }
            let parsed = symbols
                .iter()
                .enumerate()
                .map(|(col, symbol)| {
                    Cell::parse(symbol).ok_or_else(|| ConfigError::UnknownTerrain {
                        symbol: symbol.clone(),
                        row,
                        col,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            cells.push(parsed);
        }

        let map = Array2::from_shape_fn((height, width), |(row, col)| cells[row][col]);
        Ok(Self::new(map, &config.rewards)?.with_absorbing_terminals(config.absorbing_terminals))
    }

    /// When set, goal and penalty cells keep their reward as utility and accrue no future value.
    pub fn with_absorbing_terminals(mut self, absorbing: bool) -> Self {
        self.absorbing_terminals = absorbing;
        self
    }

    pub fn height(&self) -> usize {
        self.map.nrows()
    }

    pub fn width(&self) -> usize {
        self.map.ncols()
    }

    /// (height, width), the shape of every per-cell grid built for this environment.
    pub fn size(&self) -> (usize, usize) {
        self.map.dim()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.row < self.height() && pos.col < self.width()
    }

    pub fn map(&self) -> &Array2<Cell> {
        &self.map
    }

    pub fn cell(&self, pos: Pos) -> Cell {
        self.map[self.checked_index(pos)]
    }

    pub fn reward(&self, pos: Pos) -> f64 {
        self.rewards[self.checked_index(pos)]
    }

    pub fn is_wall(&self, pos: Pos) -> bool {
        self.cell(pos) == Cell::Wall
    }

    pub fn is_terminal(&self, pos: Pos) -> bool {
        self.absorbing_terminals && self.cell(pos).is_terminal()
    }

    pub fn actions(&self) -> &'static [Movement] {
        Movement::actions()
    }

    pub fn iter_all_coordinates(&self) -> EnvIter {
        EnvIter::new(self.height(), self.width())
    }

    pub fn non_wall_coordinates(&self) -> impl Iterator<Item = Pos> + '_ {
        self.iter_all_coordinates().filter(move |pos| !self.is_wall(*pos))
    }

    fn checked_index(&self, pos: Pos) -> (usize, usize) {
        assert!(
            self.contains(pos),
            "state {} lies outside the {}x{} grid",
            pos,
            self.height(),
            self.width()
        );
        pos.index()
    }
}

/// Row-major walk over every coordinate of a grid.
pub struct EnvIter {
    next: Option<Pos>,
    height: usize,
    width: usize,
}

impl EnvIter {
    fn new(height: usize, width: usize) -> EnvIter {
        EnvIter {
            next: (height > 0 && width > 0).then(|| Pos::new(0, 0)),
            height,
            width,
        }
    }
}

impl Iterator for EnvIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        let current = self.next?;
        let following = if current.col + 1 == self.width {
            Pos::new(current.row + 1, 0)
        } else {
            Pos::new(current.row, current.col + 1)
        };
        self.next = (following.row < self.height).then_some(following);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case("wall", Cell::Wall)]
    #[case("#", Cell::Wall)]
    #[case("G", Cell::Goal)]
    #[case("goal", Cell::Goal)]
    #[case("B", Cell::Penalty)]
    #[case("Penalty", Cell::Penalty)]
    #[case("", Cell::Neutral)]
    #[case(".", Cell::Neutral)]
    fn test_parse_symbols(#[case] symbol: &str, #[case] expected: Cell) {
        assert_eq!(Cell::parse(symbol), Some(expected));
    }

    #[test]
    fn test_parse_unknown_symbol() {
        assert_eq!(Cell::parse("lava"), None);
    }

    #[test]
    fn test_perpendiculars_rotate_vector() {
        for &movement in Movement::actions() {
            let (dr, dc) = movement.into_vector();
            let [first, second] = movement.perpendiculars();
            assert_eq!(first.into_vector(), (-dc, -dr));
            assert_eq!(second.into_vector(), (dc, dr));
        }
    }

    #[test]
    fn test_from_config_builds_rewards() {
        let env = Env::from_config(&GridConfig::from_layout("G #\n. B")).unwrap();
        assert_eq!(env.size(), (2, 2));
        assert_eq!(env.cell(Pos::new(0, 1)), Cell::Wall);
        assert!(env.is_wall(Pos::new(0, 1)));
        assert_abs_diff_eq!(env.reward(Pos::new(0, 0)), 1.0);
        assert_abs_diff_eq!(env.reward(Pos::new(0, 1)), 0.0);
        assert_abs_diff_eq!(env.reward(Pos::new(1, 0)), -0.04);
        assert_abs_diff_eq!(env.reward(Pos::new(1, 1)), -1.0);
        assert!(!env.is_terminal(Pos::new(0, 0)));
    }

    #[test]
    fn test_absorbing_terminals() {
        let env = Env::from_config(&GridConfig::from_layout("G B ."))
            .unwrap()
            .with_absorbing_terminals(true);
        assert!(env.is_terminal(Pos::new(0, 0)));
        assert!(env.is_terminal(Pos::new(0, 1)));
        assert!(!env.is_terminal(Pos::new(0, 2)));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let config = GridConfig::new(vec![
            vec!["G".to_string(), "".to_string()],
            vec!["".to_string()],
        ]);
        match Env::from_config(&config) {
            Err(ConfigError::RaggedRow { row, expected, found }) => {
                assert_eq!((row, expected, found), (1, 2, 1));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_unknown_terrain_rejected() {
        let config = GridConfig::from_layout(". . ?");
        match Env::from_config(&config) {
            Err(ConfigError::UnknownTerrain { symbol, row, col }) => {
                assert_eq!(symbol, "?");
                assert_eq!((row, col), (0, 2));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_empty_grid_rejected() {
        assert!(matches!(
            Env::from_config(&GridConfig::new(vec![])),
            Err(ConfigError::EmptyGrid)
        ));
        assert!(matches!(
            Env::from_config(&GridConfig::new(vec![vec![]])),
            Err(ConfigError::EmptyGrid)
        ));
    }

    #[test]
    fn test_non_finite_reward_rejected() {
        let mut config = GridConfig::from_layout("G .");
        config.rewards.goal = f64::INFINITY;
        assert!(matches!(
            Env::from_config(&config),
            Err(ConfigError::NonFiniteReward { cell: Cell::Goal })
        ));
    }

    #[test]
    fn test_iter_all_coordinates_row_major() {
        let env = Env::from_config(&GridConfig::from_layout(". . .\n. # .")).unwrap();
        let all: Vec<Pos> = env.iter_all_coordinates().collect();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], Pos::new(0, 0));
        assert_eq!(all[2], Pos::new(0, 2));
        assert_eq!(all[3], Pos::new(1, 0));
        assert_eq!(all[5], Pos::new(1, 2));
        assert_eq!(env.non_wall_coordinates().count(), 5);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_out_of_bounds_reward_panics() {
        let env = Env::from_config(&GridConfig::from_layout("G .")).unwrap();
        env.reward(Pos::new(1, 0));
    }
}
