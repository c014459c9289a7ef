//! Board coordinates.
//!
//! A [`Square`] is a zero-based `(x, y)` pair where `x` is the file
//! (`a` = 0) and `y` is the rank (`1` = 0). This matches the `{ x, y }`
//! objects the browser board puts on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of files and ranks on the board.
pub const BOARD_SIZE: u8 = 8;

/// Errors produced when building a [`Square`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SquareError {
    /// One of the coordinates is outside `0..BOARD_SIZE`.
    #[error("square ({x}, {y}) is off the board")]
    OffBoard {
        /// File coordinate.
        x: u8,
        /// Rank coordinate.
        y: u8,
    },

    /// The text is not a square in algebraic notation (e.g. `e4`).
    #[error("invalid square notation: {0:?}")]
    InvalidNotation(String),
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSquare")]
pub struct Square {
    x: u8,
    y: u8,
}

/// Unchecked wire form; converted through [`Square::new`] on decode.
#[derive(Deserialize)]
struct RawSquare {
    x: u8,
    y: u8,
}

impl TryFrom<RawSquare> for Square {
    type Error = SquareError;

    fn try_from(raw: RawSquare) -> Result<Self, Self::Error> {
        Self::new(raw.x, raw.y)
    }
}

impl Square {
    /// Creates a square from zero-based file and rank.
    ///
    /// # Errors
    ///
    /// Returns [`SquareError::OffBoard`] if either coordinate is not in
    /// `0..BOARD_SIZE`.
    pub const fn new(x: u8, y: u8) -> Result<Self, SquareError> {
        if x >= BOARD_SIZE || y >= BOARD_SIZE {
            return Err(SquareError::OffBoard { x, y });
        }
        Ok(Self { x, y })
    }

    /// Zero-based file (`a` = 0).
    #[must_use]
    pub const fn x(self) -> u8 {
        self.x
    }

    /// Zero-based rank (`1` = 0).
    #[must_use]
    pub const fn y(self) -> u8 {
        self.y
    }
}

impl FromStr for Square {
    type Err = SquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SquareError::InvalidNotation(s.to_string());
        let &[file, rank] = s.as_bytes() else {
            return Err(invalid());
        };
        let file = file.to_ascii_lowercase();
        if !(b'a'..b'a' + BOARD_SIZE).contains(&file) || !(b'1'..b'1' + BOARD_SIZE).contains(&rank)
        {
            return Err(invalid());
        }
        Self::new(file - b'a', rank - b'1')
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(b'a' + self.x), char::from(b'1' + self.y))
    }
}
