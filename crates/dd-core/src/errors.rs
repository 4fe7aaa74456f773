//! Error taxonomy for the simulation core
//!
//! Only two conditions are surfaced as errors. Carving outside the map is a
//! programming-contract failure. Failing to find any spawn cell for the
//! player is fatal to level generation. Everything else the spec calls an
//! "error" is an ordinary result: an unreachable pathfinding goal is an
//! empty path, and exhausted monster/item placement is a silent skip.

use thiserror::Error;

/// Fatal simulation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("carve coordinate out of range: ({x}, {y})")]
    OutOfBounds { x: i32, y: i32 },

    #[error("could not find a valid starting position for the player")]
    NoSpawnPosition,
}
