//! Dungeon map: tiles, the board grid, and level generation

mod board;
mod generation;
mod tile;

pub use board::{Board, LineIter};
pub use generation::{Room, generate};
pub use tile::Tile;
