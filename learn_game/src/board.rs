use crate::error::GameError;
use crate::players::Marks;
use itertools::Itertools;
use ndarray::prelude::*;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const NUM_CELLS: usize = 9;
pub const CENTER: usize = 4;
pub const CORNERS: [usize; 4] = [0, 2, 6, 8];

#[derive(Debug, PartialEq)]
pub enum IsGameOver {
    InPlay,
    Drawn,
    Win,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Cross,
    Nought,
}

impl Cell {
    pub fn as_char(self) -> char {
        match self {
            Cell::Empty => '-',
            Cell::Cross => 'X',
            Cell::Nought => '0',
        }
    }
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '-' | '_' | ' ' => Some(Cell::Empty),
            'X' | 'x' => Some(Cell::Cross),
            '0' | 'O' | 'o' => Some(Cell::Nought),
            _ => None,
        }
    }
}

impl From<Marks> for Cell {
    fn from(mark: Marks) -> Self {
        match mark {
            Marks::Cross => Cell::Cross,
            Marks::Nought => Cell::Nought,
        }
    }
}

/// A board reduced to its nine cells in row-major order. This is the key of
/// the Q-table; no symmetry reduction is applied.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct StateKey([Cell; NUM_CELLS]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid state key {0:?}: expected 9 cells of 'X', '0' or '-'")]
pub struct ParseStateKeyError(String);

impl StateKey {
    pub fn cells(&self) -> &[Cell; NUM_CELLS] {
        &self.0
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().map(|c| c.as_char()).collect::<String>())
    }
}

impl FromStr for StateKey {
    type Err = ParseStateKeyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cells: Vec<Cell> = s
            .chars()
            .map(Cell::from_char)
            .collect::<Option<Vec<Cell>>>()
            .ok_or_else(|| ParseStateKeyError(s.to_owned()))?;
        let cells: [Cell; NUM_CELLS] = cells
            .try_into()
            .map_err(|_| ParseStateKeyError(s.to_owned()))?;
        Ok(StateKey(cells))
    }
}

impl Serialize for StateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StateKeyVisitor;
        impl<'de> Visitor<'de> for StateKeyVisitor {
            type Value = StateKey;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 9-character board such as \"X-0---X--\"")
            }
            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(StateKeyVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: Array2<Cell>,
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "* * * * *")?;
        for (a, b, c) in self.cells.iter().map(|c| c.as_char()).tuples::<(_, _, _)>() {
            writeln!(f, "* {} {} {} *", a, b, c)?;
        }
        write!(f, "* * * * *")
    }
}

impl From<StateKey> for Board {
    fn from(key: StateKey) -> Self {
        Board {
            cells: Array::from_shape_fn((3, 3), |(row, col)| key.0[row * 3 + col]),
        }
    }
}

fn is_line_of(line: ArrayView1<Cell>, cell: Cell) -> bool {
    line.iter().all(|&c| c == cell)
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: Array::from_elem((3, 3), Cell::Empty),
        }
    }

    pub fn reset(&mut self) {
        self.cells.fill(Cell::Empty);
    }

    fn position(action: usize) -> [usize; 2] {
        [action / 3, action % 3]
    }

    /// Cell at a row-major index, `None` when the index is off the board.
    pub fn cell(&self, action: usize) -> Option<Cell> {
        (action < NUM_CELLS).then(|| self.cells[Self::position(action)])
    }

    pub fn state_key(&self) -> StateKey {
        let mut cells = [Cell::Empty; NUM_CELLS];
        for (slot, &cell) in cells.iter_mut().zip(self.cells.iter()) {
            *slot = cell;
        }
        StateKey(cells)
    }

    /// Indices of the empty cells in ascending order.
    pub fn legal_actions(&self) -> Vec<usize> {
        self.cells
            .indexed_iter()
            .filter(|(_index, &value)| value == Cell::Empty)
            .map(|((row, col), _)| row * 3 + col)
            .collect()
    }

    pub fn count(&self, mark: Marks) -> usize {
        let cell = Cell::from(mark);
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    /// True iff one of the three rows, three columns or two diagonals is
    /// entirely held by `mark`.
    pub fn check_win(&self, mark: Marks) -> bool {
        let cell = Cell::from(mark);
        let anti_diagonal = self.cells.slice(s![.., ..;-1]);
        self.cells.rows().into_iter().any(|row| is_line_of(row, cell))
            || self.cells.columns().into_iter().any(|col| is_line_of(col, cell))
            || is_line_of(self.cells.diag(), cell)
            || is_line_of(anti_diagonal.diag(), cell)
    }

    /// Whether placing `mark` on `action` would complete a line.
    pub fn wins_with(&self, action: usize, mark: Marks) -> bool {
        let mut board = self.clone();
        board.apply_move(action, mark).is_ok() && board.check_win(mark)
    }

    pub fn winner(&self) -> Option<Marks> {
        [Marks::Cross, Marks::Nought]
            .into_iter()
            .find(|&mark| self.check_win(mark))
    }

    pub fn is_full(&self) -> bool {
        !self.cells.iter().any(|&c| c == Cell::Empty)
    }

    /// Full board with no winner. A full board can also be a won board, so
    /// both players are checked.
    pub fn is_draw(&self) -> bool {
        self.is_full() && !self.check_win(Marks::Cross) && !self.check_win(Marks::Nought)
    }

    pub fn is_terminal(&self) -> bool {
        self.winner().is_some() || self.is_full()
    }

    pub fn is_game_over(&self, mark: Marks) -> IsGameOver {
        if self.check_win(mark) {
            IsGameOver::Win
        } else if self.is_full() {
            IsGameOver::Drawn
        } else {
            IsGameOver::InPlay
        }
    }

    /// Places `mark` on an empty cell. Occupied or off-board cells leave the
    /// board untouched.
    pub fn apply_move(&mut self, action: usize, mark: Marks) -> Result<(), GameError> {
        match self.cell(action) {
            Some(Cell::Empty) => {
                self.cells[Self::position(action)] = Cell::from(mark);
                Ok(())
            }
            _ => Err(GameError::IllegalMove { action }),
        }
    }
}
