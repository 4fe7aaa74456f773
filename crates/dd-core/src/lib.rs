//! dd-core: Core simulation logic for the Deep Delve roguelike
//!
//! This crate contains all game logic with no I/O dependencies: dungeon
//! generation, visibility, pathfinding, the energy scheduler, combat and
//! status-effect resolution, and monster AI. It is designed to be pure and
//! testable; rendering and input live behind the `Command`/`Snapshot`
//! boundary.

pub mod action;
pub mod combat;
pub mod dungeon;
pub mod effect;
pub mod message;
pub mod monster;
pub mod object;
pub mod path;
pub mod player;
pub mod vision;

mod consts;
mod errors;
mod gameloop;
mod rng;

pub use action::{ActionResult, Command, StatChoice};
pub use consts::*;
pub use errors::GameError;
pub use gameloop::{Game, GlyphView, Snapshot};
pub use rng::GameRng;
