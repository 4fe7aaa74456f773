//! Map tiles

use serde::{Deserialize, Serialize};

use crate::object::Item;

/// A single map tile
///
/// Terrain is two-valued (wall or floor); everything else is gameplay
/// state layered on top. Tiles are reset wholesale on level regeneration,
/// never destroyed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Can actors stand here
    pub passable: bool,

    /// Base display symbol
    pub symbol: char,

    /// Has the player ever seen this tile
    pub revealed: bool,

    /// Has the player walked over this tile
    pub walked: bool,

    /// Is this the level exit
    pub stair: bool,

    /// Items lying here, bottom first
    pub items: Vec<Item>,
}

impl Tile {
    /// Create a floor tile
    pub fn floor() -> Self {
        Self {
            passable: true,
            symbol: ' ',
            revealed: false,
            walked: false,
            stair: false,
            items: Vec::new(),
        }
    }

    /// Create a wall tile
    pub fn wall() -> Self {
        Self {
            passable: false,
            symbol: '#',
            revealed: false,
            walked: false,
            stair: false,
            items: Vec::new(),
        }
    }

    /// Walls (and only walls) block line of sight
    pub fn blocks_sight(&self) -> bool {
        !self.passable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_constructors() {
        let floor = Tile::floor();
        assert!(floor.passable);
        assert!(!floor.blocks_sight());
        assert!(floor.items.is_empty());

        let wall = Tile::wall();
        assert!(!wall.passable);
        assert!(wall.blocks_sight());
        assert_eq!(wall.symbol, '#');
    }
}
