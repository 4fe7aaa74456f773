//! Monster decision logic
//!
//! Re-evaluated every action slot, in priority order: incapacitated,
//! confused, frightened, aware-with-contact, aware-but-lost, unaware.
//! Awareness comes from passive perception checks on the player's turn or
//! from being attacked; it decays through a tracking countdown that ends
//! with the monster forgetting the player entirely.

use crate::combat::{do_melee_attack, do_ranged_attack};
use crate::effect::EffectKind;
use crate::gameloop::Game;
use crate::monster::MonsterId;
use crate::player::calc_mod;

const DIRS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, 1), (0, -1)];

/// Run one scheduler slot for a monster: credit energy by speed, then act
/// until the energy is spent. An action that spends nothing ends the slot.
pub fn take_turn(game: &mut Game, id: MonsterId) {
    let Some(m) = game.monster_mut(id) else {
        return;
    };
    let speed = m.get_speed();
    m.energy += speed;

    loop {
        let Some(m) = game.monster(id) else {
            return;
        };
        if m.energy <= 0 {
            break;
        }
        let before = m.energy;
        act(game, id);
        let Some(m) = game.monster_mut(id) else {
            return;
        };
        if m.energy == before {
            m.energy = m.energy.min(0);
        }
        if game.player.dead {
            break;
        }
    }
    tick_effects(game, id);
}

/// Count down effect durations and the tracking timer; expiry is announced
/// when the player can see the monster
fn tick_effects(game: &mut Game, id: MonsterId) {
    let Some(m) = game.monster_mut(id) else {
        return;
    };
    m.track_timer -= 1;
    let mut expired = Vec::new();
    let pos = m.pos();
    let name = m.name();
    for (kind, duration) in m.effects.iter_mut() {
        *duration -= 1;
        if *duration <= 0 {
            expired.push(*kind);
        }
    }
    for kind in &expired {
        m.effects.remove(kind);
    }
    for kind in expired {
        if let Some(msg) = kind.monster_expire_msg() {
            game.print_if_sees(pos, format!("The {name} {msg}."));
        }
    }
}

/// Does the monster currently see the player
fn sees_player(game: &Game, id: MonsterId) -> bool {
    if game.player.has_effect(EffectKind::Invisible) {
        return false;
    }
    match game.monster(id) {
        Some(m) => game.player.fov.contains(&m.pos()),
        None => false,
    }
}

/// Can the monster pin down an invisible player's exact position this
/// slot: easy when adjacent, otherwise an occasional opposed check with
/// distance and stillness penalties
fn can_guess_invis(game: &mut Game, id: MonsterId) -> bool {
    let Some(m) = game.monster(id) else {
        return false;
    };
    let wis = m.kind.wis();
    let dist = m.distance_to(game.player.pos());
    if dist <= 1 && game.rng.one_in(4) {
        return true;
    }
    if !game.rng.one_in(6) {
        return false;
    }
    let mut pen = (dist - 2).max(0);
    if !game.player.last_moved {
        pen += 5;
    }
    let guess = game.rng.dice(1, 20) + game.rng.div_rand(wis - 10, 2) - pen;
    let evade = game.rng.dice(1, 20) + game.rng.div_rand(game.player.dexterity - 10, 2);
    guess >= evade
}

/// Pick a random nearby visible cell as the new guess at where the
/// invisible player went
fn guess_rand_invis(game: &mut Game, id: MonsterId) {
    let Some(m) = game.monster(id) else {
        return;
    };
    let (mx, my) = m.pos();
    let (cols, rows) = (game.board.cols, game.board.rows);
    let mut tries = 100;
    while tries > 0 {
        let dx = game.rng.range_inclusive(-2, 2);
        let dy = game.rng.range_inclusive(-2, 2);
        if (dx, dy) == (0, 0) {
            continue;
        }
        let (xp, yp) = (mx + dx, my + dy);
        if xp < 0 || xp >= cols || yp < 0 || yp >= rows {
            continue;
        }
        if game.board.blocks_sight(xp, yp) || !game.board.line_of_sight((mx, my), (xp, yp)) {
            tries -= 1;
        } else {
            if let Some(m) = game.monster_mut(id) {
                m.last_seen = Some((xp, yp));
            }
            return;
        }
    }
}

/// Ranged attacks need a clear line and pass a random gate
fn should_use_ranged(game: &mut Game, id: MonsterId) -> bool {
    let Some(m) = game.monster(id) else {
        return false;
    };
    if !game.board.is_clear_path(m.pos(), game.player.pos()) {
        return false;
    }
    game.rng.x_in_y(2, 5)
}

/// One action slot
fn act(game: &mut Game, id: MonsterId) {
    let (incapacitated, has_confusion, frightened, aware) = {
        let Some(m) = game.monster(id) else {
            return;
        };
        (
            m.is_incapacitated(),
            m.has_effect(EffectKind::Confused),
            m.has_effect(EffectKind::Frightened),
            m.is_aware,
        )
    };
    if incapacitated {
        if let Some(m) = game.monster_mut(id) {
            m.energy = 0;
        }
        return;
    }

    let confused = has_confusion && !game.rng.one_in(4);

    let mut guessplayer = false;
    if aware && game.player.has_effect(EffectKind::Invisible) {
        // Even an unseen player may be pinned down
        guessplayer = can_guess_invis(game, id);
    }

    if confused {
        act_confused(game, id);
    } else if frightened {
        act_frightened(game, id);
    } else if aware && (sees_player(game, id) || guessplayer) {
        act_pursue(game, id);
    } else {
        act_track_or_wander(game, id);
    }
}

/// Confused: stumble in a random direction, possibly bumping into things
fn act_confused(game: &mut Game, id: MonsterId) {
    let first = *game.rng.choose(&DIRS).expect("DIRS is non-empty");
    if !game.try_move_monster(id, first.0, first.1) {
        let second = *game.rng.choose(&DIRS).expect("DIRS is non-empty");
        if !game.try_move_monster(id, second.0, second.1) {
            let Some(m) = game.monster(id) else {
                return;
            };
            let (x, y) = (m.x + second.0, m.y + second.1);
            let name = m.name();
            let speed = m.get_speed();
            let obstacle = if game.board.blocks_sight(x, y) {
                Some("wall")
            } else {
                game.monster_index_at(x, y)
                    .map(|idx| game.monsters[idx].name())
            };
            let pos = game.monster(id).map(|m| m.pos()).unwrap_or((x, y));
            if let Some(obstacle) = obstacle {
                game.print_if_sees(pos, format!("The {name} bumps into the {obstacle}."));
            }
            let cost = game.rng.div_rand(speed, 2);
            if let Some(m) = game.monster_mut(id) {
                m.energy -= cost;
            }
        }
    }
    if let Some(m) = game.monster_mut(id) {
        m.energy = m.energy.min(0);
    }
}

/// Frightened: run from the player, or lash out when cornered
fn act_frightened(game: &mut Game, id: MonsterId) {
    if sees_player(game, id) {
        let mut dirs = DIRS;
        game.rng.shuffle(&mut dirs);
        let (dist, speed) = {
            let Some(m) = game.monster(id) else {
                return;
            };
            (m.distance_to(game.player.pos()), m.get_speed())
        };
        let player_pos = game.player.pos();
        if dist <= 1 && game.rng.one_in(4) {
            // Occasionally bite back before running
            if let Some(m) = game.monster_mut(id) {
                m.energy -= speed;
            }
            do_melee_attack(game, id);
            return;
        }
        let Some(m) = game.monster(id) else {
            return;
        };
        let (mx, my) = m.pos();
        for (dx, dy) in dirs {
            let newdist =
                (mx + dx - player_pos.0).abs() + (my + dy - player_pos.1).abs();
            // Don't move closer to the player
            if newdist >= dist {
                game.try_move_monster(id, dx, dy);
                return;
            }
        }
        // Cornered: sometimes fight instead
        if game.rng.one_in(3) {
            if dist <= 1 {
                let speed = game.monster(id).map(|m| m.get_speed()).unwrap_or(0);
                if let Some(m) = game.monster_mut(id) {
                    m.energy -= speed;
                }
                do_melee_attack(game, id);
            } else if game.monster(id).is_some_and(|m| m.ranged)
                && should_use_ranged(game, id)
            {
                do_ranged_attack(game, id);
            }
        }
    } else {
        let wis = game.monster(id).map(|m| m.kind.wis()).unwrap_or(10);
        let wis_mod = calc_mod(wis, &mut game.rng);
        if game.rng.one_in(2) && game.rng.dice(1, 20) + wis_mod >= 15 {
            if let Some(m) = game.monster_mut(id) {
                m.lose_effect(EffectKind::Frightened);
            }
        }
    }
}

/// Aware with contact: melee when adjacent, ranged behind its gate, else
/// close the distance preferring a step that keeps the player in sight
fn act_pursue(game: &mut Game, id: MonsterId) {
    let player_pos = game.player.pos();
    let Some(idx) = game.monster_index(id) else {
        return;
    };
    game.monsters[idx].last_seen = Some(player_pos);
    game.monsters[idx].reset_track_timer(&mut game.rng);

    let Some(m) = game.monster(id) else {
        return;
    };
    let (mx, my) = m.pos();
    let dist = m.distance_to(player_pos);
    let is_ranged = m.ranged;
    let speed = m.get_speed();

    if dist <= 1 {
        if let Some(m) = game.monster_mut(id) {
            m.energy -= speed;
        }
        do_melee_attack(game, id);
        return;
    }
    if is_ranged && should_use_ranged(game, id) {
        do_ranged_attack(game, id);
        return;
    }

    let xdist = player_pos.0 - mx;
    let ydist = player_pos.1 - my;
    let dx = xdist.signum();
    let dy = ydist.signum();
    if xdist.abs() > ydist.abs() || (xdist.abs() == ydist.abs() && game.rng.one_in(2)) {
        // Choose a direction that doesn't break line of sight
        let maintains = game.player.fov.contains(&(mx + dx, my));
        if !(maintains && game.try_move_monster(id, dx, 0)) {
            game.try_move_monster(id, 0, dy);
        }
    } else {
        let maintains = game.player.fov.contains(&(mx, my + dy));
        if !(maintains && game.try_move_monster(id, 0, dy)) {
            game.try_move_monster(id, dx, 0);
        }
    }
}

/// No contact: follow the last known position while the countdown lasts,
/// otherwise wander with a sticky heading
fn act_track_or_wander(game: &mut Game, id: MonsterId) {
    let Some(m) = game.monster(id) else {
        return;
    };
    let pos = m.pos();
    let last_seen = m.last_seen;

    if game.player.has_effect(EffectKind::Invisible) && Some(pos) == last_seen {
        // Arrived where the invisible player was; guess a nearby spot
        guess_rand_invis(game, id);
    }

    let Some(m) = game.monster(id) else {
        return;
    };
    if let Some(target) = m.last_seen {
        if m.track_timer > 0 {
            let check = if game.player.has_effect(EffectKind::Invisible) {
                let dex_mod = calc_mod(game.player.dexterity, &mut game.rng);
                let wis = game.monster(id).map(|m| m.kind.wis()).unwrap_or(10);
                let wis_mod = calc_mod(wis, &mut game.rng);
                game.rng.dice(1, 20) + dex_mod < 10 + wis_mod
            } else {
                true
            };
            game.monster_path_towards(id, target);
            let Some(m) = game.monster(id) else {
                return;
            };
            if m.pos() == target && check {
                // Reached the spot: a stealth contest decides whether the
                // trail stays warm
                let saw = sees_player(game, id);
                let dex_mod = calc_mod(game.player.dexterity, &mut game.rng);
                let wis = game.monster(id).map(|m| m.kind.wis()).unwrap_or(10);
                let wis_mod = calc_mod(wis, &mut game.rng);
                let keeps_tracking =
                    saw || game.rng.dice(1, 20) + dex_mod < 14 + wis_mod;
                let player_pos = game.player.pos();
                if let Some(m) = game.monster_mut(id) {
                    if keeps_tracking {
                        m.last_seen = Some(player_pos);
                    } else {
                        m.stop_tracking();
                    }
                }
            }
        } else if let Some(m) = game.monster_mut(id) {
            m.stop_tracking();
        }
        return;
    }

    // Idle wandering: mostly keep the current heading, rarely turn
    if game.rng.one_in(5) {
        return;
    }
    let heading = game.monster(id).and_then(|m| m.heading);
    let choose_new = match heading {
        None => true,
        Some(dir) => game.rng.one_in(3) || !game.try_move_monster(id, dir.0, dir.1),
    };
    if !choose_new {
        return;
    }
    match heading {
        None => {
            let mut dirs = DIRS;
            game.rng.shuffle(&mut dirs);
            for d in dirs {
                if game.try_move_monster(id, d.0, d.1) {
                    if let Some(m) = game.monster_mut(id) {
                        m.heading = Some(d);
                    }
                    return;
                }
            }
        }
        Some(dir) => {
            // Turn perpendicular; reverse as a last resort
            let mut dirs: [(i32, i32); 2] = if dir.0 != 0 {
                [(0, 1), (0, -1)]
            } else {
                [(-1, 0), (1, 0)]
            };
            game.rng.shuffle(&mut dirs);
            for d in dirs {
                if game.try_move_monster(id, d.0, d.1) {
                    if let Some(m) = game.monster_mut(id) {
                        m.heading = Some(d);
                    }
                    return;
                }
            }
            if !game.try_move_monster(id, dir.0, dir.1) {
                let rev = (-dir.0, -dir.1);
                game.try_move_monster(id, rev.0, rev.1);
                if let Some(m) = game.monster_mut(id) {
                    m.heading = Some(rev);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dungeon::Tile;
    use crate::monster::{Monster, MonsterKind};
    use crate::rng::GameRng;

    fn arena(seed: u64) -> Game {
        let mut game = Game::new(GameRng::new(seed)).unwrap();
        game.monsters.clear();
        for y in 1..game.board.rows - 1 {
            for x in 1..game.board.cols - 1 {
                *game.board.tile_mut(x, y) = Tile::floor();
            }
        }
        game.player.x = 5;
        game.player.y = 5;
        game.refresh_occupancy();
        game.player.fov = crate::vision::compute_fov(&game.board, (5, 5));
        game
    }

    fn put_monster(game: &mut Game, kind: MonsterKind, x: i32, y: i32) -> MonsterId {
        let id = MonsterId(1000 + game.monsters.len() as u32);
        let mut m = Monster::spawn(id, kind, &mut game.rng);
        m.x = x;
        m.y = y;
        game.board.set_occupied(x, y);
        game.monsters.push(m);
        id
    }

    #[test]
    fn test_incapacitated_monster_skips_turn() {
        let mut game = arena(51);
        let id = put_monster(&mut game, MonsterKind::Ogre, 6, 5);
        game.give_monster_effect(id, EffectKind::Paralyzed, 10);
        let hp_before = game.player.hp;
        take_turn(&mut game, id);
        assert_eq!(game.player.hp, hp_before);
        assert_eq!(game.monster(id).unwrap().pos(), (6, 5));
    }

    #[test]
    fn test_aware_adjacent_monster_attacks() {
        let mut game = arena(53);
        let id = put_monster(&mut game, MonsterKind::Ogre, 6, 5);
        {
            let player_pos = game.player.pos();
            let mut rng = GameRng::new(1);
            game.monster_mut(id).unwrap().alert(player_pos, &mut rng);
        }
        let mut hit = false;
        for _ in 0..40 {
            take_turn(&mut game, id);
            if game.player.hp < 100 {
                hit = true;
                break;
            }
        }
        assert!(hit, "an adjacent aware ogre should land a hit eventually");
    }

    #[test]
    fn test_aware_distant_monster_closes_in() {
        let mut game = arena(55);
        let id = put_monster(&mut game, MonsterKind::Ogre, 15, 8);
        {
            let player_pos = game.player.pos();
            let mut rng = GameRng::new(1);
            game.monster_mut(id).unwrap().alert(player_pos, &mut rng);
        }
        let before = game.monster(id).unwrap().distance_to((5, 5));
        take_turn(&mut game, id);
        let after = game.monster(id).unwrap().distance_to((5, 5));
        assert!(after < before, "pursuing monster should close distance");
    }

    #[test]
    fn test_frightened_monster_keeps_its_distance() {
        let mut game = arena(57);
        let id = put_monster(&mut game, MonsterKind::Ogre, 7, 5);
        game.give_monster_effect(id, EffectKind::Frightened, 100);
        {
            let player_pos = game.player.pos();
            let mut rng = GameRng::new(1);
            game.monster_mut(id).unwrap().alert(player_pos, &mut rng);
        }
        for _ in 0..10 {
            let before = game.monster(id).unwrap().distance_to((5, 5));
            take_turn(&mut game, id);
            let after = game.monster(id).unwrap().distance_to((5, 5));
            assert!(after >= before, "frightened monster moved closer");
        }
    }

    #[test]
    fn test_tracking_expires_to_unaware() {
        let mut game = arena(59);
        // Wall the monster off so it cannot see (or be seen by) the player
        for y in 0..game.board.rows {
            *game.board.tile_mut(15, y) = Tile::wall();
        }
        game.player.fov = crate::vision::compute_fov(&game.board, game.player.pos());
        let id = put_monster(&mut game, MonsterKind::Ogre, 20, 8);
        {
            let m = game.monster_mut(id).unwrap();
            m.is_aware = true;
            m.last_seen = Some((20, 8));
            m.track_timer = 1;
        }
        // The countdown ticks each slot; once it hits zero with no contact
        // the monster must fully reset
        for _ in 0..5 {
            take_turn(&mut game, id);
        }
        let m = game.monster(id).unwrap();
        assert!(!m.is_aware);
        assert!(m.last_seen.is_none());
    }

    #[test]
    fn test_wandering_monster_stays_on_board() {
        let mut game = arena(61);
        let id = put_monster(&mut game, MonsterKind::Bat, 10, 8);
        for _ in 0..200 {
            take_turn(&mut game, id);
            let m = game.monster(id).unwrap();
            assert!(game.board.in_bounds(m.x, m.y));
            assert!(game.board.tile(m.x, m.y).passable);
        }
    }

    #[test]
    fn test_confused_monster_effect_ticks_down() {
        let mut game = arena(63);
        let id = put_monster(&mut game, MonsterKind::Ogre, 10, 8);
        game.give_monster_effect(id, EffectKind::Confused, 3);
        for _ in 0..5 {
            take_turn(&mut game, id);
        }
        assert!(!game.monster(id).unwrap().has_effect(EffectKind::Confused));
    }
}
