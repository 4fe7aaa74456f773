//! Field-of-view computation
//!
//! Two-phase algorithm. Phase one raycasts a discrete line from the origin
//! to every boundary cell, marking traversed cells visible and stopping at
//! the first sight-blocking cell (which is itself included). Raycasting
//! alone misses wall faces adjacent to visible floor, so phase two walks
//! the orthogonal neighbors of every visible floor cell and admits blocking
//! neighbors that lie in the same or an adjacent quadrant direction from
//! the origin: you can see into a wall corner unless you are strictly
//! around the corner from it.
//!
//! Actors are never sight obstacles; only terrain blocks rays. The origin
//! is always in its own field of view.

use hashbrown::HashSet;

use crate::dungeon::Board;

/// Compute the set of cells visible from `origin`
pub fn compute_fov(board: &Board, origin: (i32, i32)) -> HashSet<(i32, i32)> {
    let mut fov = HashSet::new();
    fov.insert(origin);

    let mut cast = |target: (i32, i32), fov: &mut HashSet<(i32, i32)>| {
        for (x, y) in board.line_between(origin, target, true, false) {
            fov.insert((x, y));
            if board.blocks_sight(x, y) {
                break;
            }
        }
    };

    for x in 0..board.cols {
        cast((x, 0), &mut fov);
        cast((x, board.rows - 1), &mut fov);
    }
    for y in 1..board.rows - 1 {
        cast((0, y), &mut fov);
        cast((board.cols - 1, y), &mut fov);
    }

    // Corner correction pass
    let mut seen: HashSet<(i32, i32)> = HashSet::new();
    let direct: Vec<(i32, i32)> = fov.iter().copied().collect();
    for (x, y) in direct {
        if board.blocks_sight(x, y) {
            continue;
        }
        let dx = x - origin.0;
        let dy = y - origin.1;
        for (xp, yp) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if seen.contains(&(xp, yp)) || fov.contains(&(xp, yp)) {
                continue;
            }
            seen.insert((xp, yp));
            if !board.in_bounds(xp, yp) || !board.blocks_sight(xp, yp) {
                continue;
            }
            let dxp = xp - x;
            let dyp = yp - y;
            let mut visible = false;
            if dx <= 0 && dy <= 0 {
                visible = dxp <= 0 || dyp <= 0;
            }
            if dx >= 0 && dy <= 0 {
                visible = dxp >= 0 || dyp <= 0;
            }
            if dx <= 0 && dy >= 0 {
                visible = dxp <= 0 || dyp >= 0;
            }
            if dx >= 0 && dy >= 0 {
                visible = dxp >= 0 || dyp >= 0;
            }
            if visible {
                fov.insert((xp, yp));
            }
        }
    }

    fov
}
