//! Level generation
//!
//! Carves 5-8 non-overlapping rectangular rooms into a solid-wall board and
//! connects them with L-shaped corridors. Each new room links to the
//! previously placed one, or occasionally to a random earlier room, which
//! produces loops. Rooms that find no spot within the attempt budget are
//! skipped; the level degrades to fewer rooms rather than failing.

use serde::{Deserialize, Serialize};

use super::Board;
use crate::errors::GameError;
use crate::rng::GameRng;

const WIDTH_RANGE: (i32, i32) = (5, 10);
const HEIGHT_RANGE: (i32, i32) = (3, 5);
const ATTEMPTS: i32 = 100;

/// A placed room (interior rectangle, walls not included)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Room {
    /// Axis-aligned bounding box overlap, touching edges included
    pub fn overlaps(&self, other: &Room) -> bool {
        !(self.x + self.width < other.x || other.x + other.width < self.x)
            && !(self.y + self.height < other.y || other.y + other.height < self.y)
    }

    /// A random point strictly inside the room
    fn interior_point(&self, rng: &mut GameRng) -> (i32, i32) {
        (
            self.x + rng.range_inclusive(1, self.width - 2),
            self.y + rng.range_inclusive(1, self.height - 2),
        )
    }
}

/// Regenerate the board as a fresh room-and-corridor level
pub fn generate(board: &mut Board, rng: &mut GameRng) -> Result<(), GameError> {
    board.fill_walls();

    let num_rooms = rng.range_inclusive(5, 8);
    let mut rooms: Vec<Room> = Vec::new();

    // How rarely a new room connects to a random earlier room instead of
    // the previous one. Occasionally the whole level is strictly a chain.
    let mut link_chance = rng.dice(2, 10);
    if rng.one_in(7) {
        link_chance = 100;
    }

    for i in 0..num_rooms {
        for _ in 0..ATTEMPTS {
            let width = rng.range_inclusive(WIDTH_RANGE.0, WIDTH_RANGE.1);
            let height = rng.range_inclusive(HEIGHT_RANGE.0, HEIGHT_RANGE.1);
            let room = Room {
                x: rng.range_inclusive(1, board.cols - width - 1),
                y: rng.range_inclusive(1, board.rows - height - 1),
                width,
                height,
            };
            if rooms.iter().any(|r| room.overlaps(r)) {
                continue;
            }
            for dx in 0..width {
                for dy in 0..height {
                    board.carve_at(room.x + dx, room.y + dy)?;
                }
            }
            if i > 0 {
                let mut prev = rooms[rooms.len() - 1];
                if rng.rnd(link_chance) == 1 {
                    prev = *rng.choose(&rooms).unwrap_or(&prev);
                }
                carve_corridor(board, rng, &prev, &room)?;
            }
            rooms.push(room);
            break;
        }
    }
    Ok(())
}

/// Carve an L-shaped corridor between random interior points of two rooms,
/// orientation (horizontal-first vs vertical-first) chosen uniformly
fn carve_corridor(
    board: &mut Board,
    rng: &mut GameRng,
    from: &Room,
    to: &Room,
) -> Result<(), GameError> {
    let (x1, y1) = from.interior_point(rng);
    let (x2, y2) = to.interior_point(rng);
    let dx = if x1 < x2 { 1 } else { -1 };
    let dy = if y1 < y2 { 1 } else { -1 };

    if rng.one_in(2) {
        let mut x = x1;
        while x != x2 {
            board.carve_at(x, y1)?;
            x += dx;
        }
        let mut y = y1;
        while y != y2 {
            board.carve_at(x2, y)?;
            y += dy;
        }
    } else {
        let mut y = y1;
        while y != y2 {
            board.carve_at(x1, y)?;
            y += dy;
        }
        let mut x = x1;
        while x != x2 {
            board.carve_at(x, y2)?;
            x += dx;
        }
    }
    Ok(())
}
