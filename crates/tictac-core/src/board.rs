//! Board engine: 3×3 grids and the 3×3-of-3×3 meta board.
//!
//! Win detection is one generic routine, [`Grid::winner`], over a 3×3 grid of
//! comparable values. The meta board resolves each sub-board to its winner
//! and feeds those derived tokens through the same routine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{BoardError, InvalidLocation, UnknownVariant};

/// Side length of every grid.
pub const SIZE: usize = 3;

/// The 8 winning lines, scanned in this order: rows, columns, diagonals.
const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

/// A player's mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// Played from seat 0.
    X,
    /// Played from seat 1.
    O,
}

impl Token {
    /// Single-character rendering used in snapshots.
    pub fn as_char(self) -> char {
        match self {
            Self::X => 'X',
            Self::O => 'O',
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One of the two player seats in a room. Seat 0 moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Seat {
    /// Seat 0, plays `X`.
    First,
    /// Seat 1, plays `O`.
    Second,
}

impl Seat {
    /// Both seats, lowest index first.
    pub const ALL: [Seat; 2] = [Seat::First, Seat::Second];

    /// Wire index of the seat.
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    /// The token a player in this seat plays with.
    pub fn token(self) -> Token {
        match self {
            Self::First => Token::X,
            Self::Second => Token::O,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A `(row, col)` position inside one 3×3 grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    row: usize,
    col: usize,
}

impl Cell {
    /// Build a cell, rejecting coordinates outside the grid.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < SIZE && col < SIZE).then_some(Self { row, col })
    }

    /// Row, `0..3`.
    pub fn row(self) -> usize {
        self.row
    }

    /// Column, `0..3`.
    pub fn col(self) -> usize {
        self.col
    }

    /// Every cell in row-major order.
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..SIZE).flat_map(|row| (0..SIZE).map(move |col| Cell { row, col }))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for Cell {
    type Err = InvalidLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidLocation(s.to_owned());
        let (row, col) = s.split_once(',').ok_or_else(invalid)?;
        let row = row.trim().parse().map_err(|_| invalid())?;
        let col = col.trim().parse().map_err(|_| invalid())?;
        Cell::new(row, col).ok_or_else(invalid)
    }
}

/// A 3×3 grid of optional values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid<T> {
    cells: [[Option<T>; SIZE]; SIZE],
}

impl<T: Copy> Default for Grid<T> {
    fn default() -> Self {
        Self {
            cells: [[None; SIZE]; SIZE],
        }
    }
}

impl<T: Copy + PartialEq> Grid<T> {
    /// An empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid by evaluating `f` at every cell.
    pub fn from_fn(mut f: impl FnMut(Cell) -> Option<T>) -> Self {
        let mut grid = Self::default();
        for cell in Cell::all() {
            grid.cells[cell.row][cell.col] = f(cell);
        }
        grid
    }

    /// Value at `cell`, if set.
    pub fn get(&self, cell: Cell) -> Option<T> {
        self.cells[cell.row][cell.col]
    }

    /// Set an empty cell. Occupied cells are never overwritten.
    pub fn place(&mut self, cell: Cell, value: T) -> Result<(), BoardError> {
        let slot = &mut self.cells[cell.row][cell.col];
        if slot.is_some() {
            return Err(BoardError::CellOccupied);
        }
        *slot = Some(value);
        Ok(())
    }

    /// The value filling the first complete line, if any.
    pub fn winner(&self) -> Option<T> {
        LINES.iter().find_map(|&line| {
            let [a, b, c] = line.map(|(row, col)| self.cells[row][col]);
            match a {
                Some(value) if b == Some(value) && c == Some(value) => Some(value),
                _ => None,
            }
        })
    }

    /// True once every cell is set.
    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }
}

impl Grid<Token> {
    /// Rows joined by `/`, empty cells as `.`, e.g. `X.O/.X./..O`.
    pub fn render(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map_or('.', Token::as_char))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A 3×3 grid of sub-boards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaBoard {
    boards: [[Grid<Token>; SIZE]; SIZE],
}

impl MetaBoard {
    /// A meta board with nine empty sub-boards.
    pub fn new() -> Self {
        Self::default()
    }

    /// The sub-board at `board`.
    pub fn sub_board(&self, board: Cell) -> &Grid<Token> {
        &self.boards[board.row][board.col]
    }

    /// Outer grid whose cells are the sub-board winners; undecided and
    /// drawn sub-boards stay empty.
    pub fn derived(&self) -> Grid<Token> {
        Grid::from_fn(|cell| self.sub_board(cell).winner())
    }

    /// Winner of the outer grid.
    pub fn winner(&self) -> Option<Token> {
        self.derived().winner()
    }

    /// True when no sub-board can take another move.
    pub fn is_full(&self) -> bool {
        Cell::all().all(|cell| {
            let sub = self.sub_board(cell);
            sub.winner().is_some() || sub.is_full()
        })
    }

    /// Place `token` at `cell` inside sub-board `board`.
    pub fn play(&mut self, token: Token, board: Cell, cell: Cell) -> Result<(), BoardError> {
        let sub = self.sub_board(board);
        if sub.get(cell).is_some() {
            return Err(BoardError::CellOccupied);
        }
        if sub.winner().is_some() {
            return Err(BoardError::SubBoardDecided);
        }
        if self.winner().is_some() {
            return Err(BoardError::GameOver);
        }
        self.boards[board.row][board.col].place(cell, token)
    }
}

/// Which board shape a room plays on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardVariant {
    /// A single 3×3 grid.
    #[default]
    Classic,
    /// A 3×3 grid of 3×3 sub-boards.
    Meta,
}

impl BoardVariant {
    /// Lowercase name, as used in settings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Meta => "meta",
        }
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "meta" => Ok(Self::Meta),
            _ => Err(UnknownVariant(s.to_owned())),
        }
    }
}

/// Where a move goes: a single cell, or a sub-board plus a cell in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// A cell of a classic board.
    Flat(Cell),
    /// A cell inside one sub-board of a meta board.
    Meta {
        /// Which sub-board.
        board: Cell,
        /// Cell within that sub-board.
        cell: Cell,
    },
}

impl Location {
    /// Parse the location fields of a `PLAY` frame: one `r,c` field for a
    /// flat board, two (`br,bc` then `r,c`) for a meta board.
    pub fn parse(fields: &[&str]) -> Result<Self, InvalidLocation> {
        match fields {
            [cell] => Ok(Self::Flat(cell.parse()?)),
            [board, cell] => Ok(Self::Meta {
                board: board.parse()?,
                cell: cell.parse()?,
            }),
            _ => Err(InvalidLocation(fields.join(":"))),
        }
    }

    /// The wire fields for this location, in `PLAY` order.
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::Flat(cell) => vec![cell.to_string()],
            Self::Meta { board, cell } => vec![board.to_string(), cell.to_string()],
        }
    }

    /// The board shape this location addresses.
    pub fn variant(&self) -> BoardVariant {
        match self {
            Self::Flat(_) => BoardVariant::Classic,
            Self::Meta { .. } => BoardVariant::Meta,
        }
    }
}

/// Overall state of a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Moves are still possible.
    InProgress,
    /// A line has been completed.
    Won,
    /// Full with no winner.
    Draw,
}

/// Serializable view of a board for `STAT` replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    /// Board shape.
    pub variant: BoardVariant,
    /// Overall game state.
    pub status: GameStatus,
    /// Winning token, once there is one.
    pub winner: Option<Token>,
    /// One rendered grid for classic boards; nine, row-major, for meta boards.
    pub grids: Vec<String>,
}

/// A room's game board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Board {
    /// One 3×3 grid.
    Classic(Grid<Token>),
    /// Nine sub-boards.
    Meta(Box<MetaBoard>),
}

impl Board {
    /// An empty board of the given shape.
    pub fn new(variant: BoardVariant) -> Self {
        match variant {
            BoardVariant::Classic => Self::Classic(Grid::new()),
            BoardVariant::Meta => Self::Meta(Box::default()),
        }
    }

    /// Shape of this board.
    pub fn variant(&self) -> BoardVariant {
        match self {
            Self::Classic(_) => BoardVariant::Classic,
            Self::Meta(_) => BoardVariant::Meta,
        }
    }

    /// Token at `location`, or `None` when empty or of the wrong shape.
    pub fn get(&self, location: Location) -> Option<Token> {
        match (self, location) {
            (Self::Classic(grid), Location::Flat(cell)) => grid.get(cell),
            (Self::Meta(meta), Location::Meta { board, cell }) => meta.sub_board(board).get(cell),
            _ => None,
        }
    }

    /// Place `token` at `location`.
    pub fn play(&mut self, token: Token, location: Location) -> Result<(), BoardError> {
        let expected = self.variant();
        match (self, location) {
            (Self::Classic(grid), Location::Flat(cell)) => {
                if grid.get(cell).is_some() {
                    return Err(BoardError::CellOccupied);
                }
                if grid.winner().is_some() {
                    return Err(BoardError::GameOver);
                }
                grid.place(cell, token)
            }
            (Self::Meta(meta), Location::Meta { board, cell }) => meta.play(token, board, cell),
            _ => Err(BoardError::LocationMismatch { expected }),
        }
    }

    /// Winning token, recomputed from the cells.
    pub fn winner(&self) -> Option<Token> {
        match self {
            Self::Classic(grid) => grid.winner(),
            Self::Meta(meta) => meta.winner(),
        }
    }

    /// True when no further move is possible.
    pub fn is_full(&self) -> bool {
        match self {
            Self::Classic(grid) => grid.is_full(),
            Self::Meta(meta) => meta.is_full(),
        }
    }

    /// Won, drawn or still in progress.
    pub fn status(&self) -> GameStatus {
        if self.winner().is_some() {
            GameStatus::Won
        } else if self.is_full() {
            GameStatus::Draw
        } else {
            GameStatus::InProgress
        }
    }

    /// Serializable view for `STAT`.
    pub fn snapshot(&self) -> BoardSnapshot {
        let grids = match self {
            Self::Classic(grid) => vec![grid.render()],
            Self::Meta(meta) => Cell::all().map(|cell| meta.sub_board(cell).render()).collect(),
        };
        BoardSnapshot {
            variant: self.variant(),
            status: self.status(),
            winner: self.winner(),
            grids,
        }
    }
}
