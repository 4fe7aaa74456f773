//! Player attacking a monster
//!
//! Advantage when the target is unaware or the player is invisible; sneak
//! attacks ride on a DEX-vs-perception contest plus a weapon-dependent
//! gate, always land, and are guaranteed at least 1d6. A natural 20 hits
//! and confirms a crit with a second check, doubling the damage dice.

use crate::consts::ATTACK_ENERGY_CAP;
use crate::effect::EffectKind;
use crate::gameloop::Game;
use crate::message::Severity;
use crate::monster::MonsterId;
use crate::player::calc_mod;

use super::player_attack_mod;

/// Resolve the player striking toward (dx, dy)
pub fn attack_monster(game: &mut Game, dx: i32, dy: i32) {
    let (x, y) = (game.player.x + dx, game.player.y + dy);
    if !game.monster_at(x, y) {
        game.print("You strike at the air.");
        game.player.energy -= game.player.get_speed();
        return;
    }
    let Some(idx) = game.monster_index_at(x, y) else {
        return;
    };
    let id = game.monsters[idx].id;
    let name = game.monsters[idx].name();
    let target_aware = game.monsters[idx].is_aware;
    let target_asleep = game.monsters[idx].has_effect(EffectKind::Asleep);
    let target_paralyzed = game.monsters[idx].has_effect(EffectKind::Paralyzed);
    let passive_perc = game.monsters[idx].kind.passive_perception();
    let target_ac = game.monsters[idx].kind.ac();

    // Attacks are quicker than movement
    game.player.energy -= game.player.get_speed().min(ATTACK_ENERGY_CAP);

    let mut roll = game.rng.dice(1, 20);
    let adv = !target_aware || game.player.has_effect(EffectKind::Invisible);
    let finesse = game.player.weapon_kind().is_some_and(|w| w.is_finesse());
    let unarmed = game.player.weapon_kind().is_none();

    let dex_mod = calc_mod(game.player.dexterity, &mut game.rng);
    let mut sneak_attack = adv && game.rng.dice(1, 20) + dex_mod >= passive_perc;
    sneak_attack = sneak_attack
        && game
            .rng
            .x_in_y(3 + i32::from(finesse) - i32::from(unarmed), 7);
    if target_asleep {
        sneak_attack = true;
    }

    if adv {
        roll = roll.max(game.rng.dice(1, 20));
    }

    let mut crit = false;
    let mut eff_ac = target_ac;
    if target_paralyzed {
        eff_ac = eff_ac.min(5);
    }
    let modifier = player_attack_mod(&game.player, &mut game.rng);
    let mut hits = if roll == 1 {
        false
    } else if roll == 20 {
        crit = game.rng.dice(1, 20) + modifier >= eff_ac;
        true
    } else {
        roll + modifier >= eff_ac
    };

    if sneak_attack {
        if game.rng.one_in(3) {
            game.print(format!("The {name} is caught off-guard by your sneak attack!"));
        } else {
            game.print(format!("You catch the {name} completely unaware!"));
        }
        hits = true;
    }
    if target_asleep {
        hits = true;
        if let Some(m) = game.monster_mut(id) {
            m.lose_effect(EffectKind::Asleep);
        }
    }
    let player_pos = game.player.pos();
    if let Some(i) = game.monster_index(id) {
        game.monsters[i].alert(player_pos, &mut game.rng);
    }
    // A clean sneak attack stays stealthy
    if !sneak_attack {
        game.player.did_attack = true;
    }

    if !hits {
        game.print(format!("Your attack misses the {name}."));
        return;
    }

    let stat = game.player.attack_stat();
    let mut dam = base_damage_roll(game);
    if crit {
        dam += base_damage_roll(game);
    }
    if sneak_attack {
        dam += sneak_attack_bonus(game, finesse, unarmed);
    }
    dam += game.rng.div_rand(stat - 10, 2);
    if let Some(idx) = game.monster_index(id) {
        dam = game.monsters[idx].apply_armor(dam, &mut game.rng);
    }
    // Sneak attacks always deal at least 1d6
    let min_dam = if sneak_attack { game.rng.dice(1, 6) } else { 0 };
    dam = dam.max(min_dam);

    let (hp_left, max_hp) = {
        let Some(m) = game.monster_mut(id) else {
            return;
        };
        m.hp -= dam;
        (m.hp, m.max_hp)
    };
    if dam > 0 {
        let mut msg = format!("You hit the {name} for {dam} damage.");
        if hp_left > 0 {
            msg.push_str(&format!(" Its HP: {hp_left}/{max_hp}"));
        }
        game.print(msg);
        if crit {
            game.print_sev("Critical!", Severity::Good);
        }
    } else {
        game.print(format!("You hit the {name} but do no damage."));
    }
    if hp_left <= 0 {
        defeated_monster(game, id);
    }
    let fade = game.rng.range_inclusive(0, 6);
    game.player_adjust_effect(EffectKind::Invisible, -fade);
}

/// Weapon dice, or 1d2 unarmed
fn base_damage_roll(game: &mut Game) -> i32 {
    match game.player.weapon_kind() {
        Some(w) => w.roll_damage(&mut game.rng),
        None => game.rng.dice(1, 2),
    }
}

/// Sneak-attack bonus, scaling with level; finesse weapons scale at 4/3,
/// unarmed strikes at a third
fn sneak_attack_bonus(game: &mut Game, finesse: bool, unarmed: bool) -> i32 {
    const SCALE: i32 = 6;
    let mut lev = game.player.level;
    if finesse {
        lev = game.rng.mult_rand_frac(lev, 4, 3);
    }
    let val = game.rng.rnd(lev.max(1));
    let scale_int = 1 + (val - 1) / SCALE;
    let scale_mod = (val - 1) % SCALE;
    let roll = game.rng.dice(1, 6);
    let mut bonus = game.rng.dice(scale_int, 6) + game.rng.mult_rand_frac(roll, scale_mod, SCALE);
    if unarmed {
        bonus = game.rng.div_rand(bonus, 3).max(1);
    }
    bonus
}

/// Bookkeeping for a monster brought to 0 HP: roster and occupancy are
/// updated in the same action, XP awarded, weapon possibly dropped, and
/// the stair placed when the level empties
pub fn defeated_monster(game: &mut Game, id: MonsterId) {
    let Some(idx) = game.monster_index(id) else {
        return;
    };
    let name = game.monsters[idx].name();
    let kind = game.monsters[idx].kind;
    let pos = game.monsters[idx].pos();
    game.print_sev(format!("The {name} dies!"), Severity::Good);

    let before = game.monsters.len();
    game.remove_monster(id);
    let after = game.monsters.len();
    game.player.remove_grapple(id);

    let lev = kind.difficulty() - 1;
    let gain = (6.0 * 2.0_f64.powi(lev))
        .min(30.0 * 1.5_f64.powi(lev))
        .ceil() as i32;
    game.gain_exp(gain);

    if let Some(weapon) = kind.weapon()
        && game.rng.one_in(3)
    {
        let item = crate::object::Item::spawn(
            crate::object::ItemKind::Weapon(weapon),
            &mut game.rng,
        );
        game.print_sev(
            format!("The {name} drops its {}!", item.name()),
            Severity::Good,
        );
        game.board.tile_mut(pos.0, pos.1).items.push(item);
    }

    if before > 0 && after == 0 {
        if game.level == 1 {
            game.print(
                "Level complete! Move onto the stairs marked with a \">\", then descend to the next level.",
            );
        }
        game.place_stair();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dungeon::Tile;
    use crate::monster::{Monster, MonsterKind};
    use crate::rng::GameRng;

    /// A game with an empty roster and a known open arena
    fn arena(seed: u64) -> Game {
        let mut game = Game::new(GameRng::new(seed)).unwrap();
        game.monsters.clear();
        for y in 1..game.board.rows - 1 {
            for x in 1..game.board.cols - 1 {
                *game.board.tile_mut(x, y) = Tile::floor();
            }
        }
        game.refresh_occupancy();
        game.player.x = 5;
        game.player.y = 5;
        game.refresh_occupancy();
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
    fn test_attack_into_empty_air_costs_a_turn() {
        let mut game = arena(1);
        let before = game.player.energy;
        attack_monster(&mut game, 1, 0);
        assert_eq!(game.player.energy, before - game.player.get_speed());
    }

    #[test]
    fn test_attack_cost_is_capped() {
        let mut game = arena(2);
        put_monster(&mut game, MonsterKind::Ogre, 6, 5);
        game.player_gain_effect(EffectKind::Haste, 100);
        assert_eq!(game.player.get_speed(), 60);
        let before = game.player.energy;
        attack_monster(&mut game, 1, 0);
        assert_eq!(game.player.energy, before - ATTACK_ENERGY_CAP);
    }

    #[test]
    fn test_attack_alerts_target() {
        let mut game = arena(3);
        let id = put_monster(&mut game, MonsterKind::Ogre, 6, 5);
        assert!(!game.monster(id).unwrap().is_aware);
        attack_monster(&mut game, 1, 0);
        let m = game.monster(id).unwrap();
        assert!(m.is_aware);
        assert_eq!(m.last_seen, Some((5, 5)));
        assert!(m.track_timer >= 25);
    }

    #[test]
    fn test_kill_removes_monster_and_frees_cell() {
        let mut game = arena(4);
        let id = put_monster(&mut game, MonsterKind::Bat, 6, 5);
        game.monster_mut(id).unwrap().hp = 1;
        // Swing until the bat dies; it has 1 HP so any hit does it
        for _ in 0..100 {
            attack_monster(&mut game, 1, 0);
            if game.monster(id).is_none() {
                break;
            }
        }
        assert!(game.monster(id).is_none());
        assert!(!game.monster_at(6, 5));
        assert!(game.player.exp > 0 || game.player.level > 1);
    }

    #[test]
    fn test_level_clear_places_stair() {
        let mut game = arena(5);
        let id = put_monster(&mut game, MonsterKind::Bat, 6, 5);
        game.monster_mut(id).unwrap().hp = 1;
        for _ in 0..100 {
            attack_monster(&mut game, 1, 0);
            if game.monster(id).is_none() {
                break;
            }
        }
        let has_stair = (0..game.board.rows)
            .any(|y| (0..game.board.cols).any(|x| game.board.tile(x, y).stair));
        assert!(has_stair);
    }

    #[test]
    fn test_sleeping_target_always_hit_and_woken() {
        let mut game = arena(6);
        let id = put_monster(&mut game, MonsterKind::Ogre, 6, 5);
        game.give_monster_effect(id, EffectKind::Asleep, 50);
        let hp_before = game.monster(id).unwrap().hp;
        attack_monster(&mut game, 1, 0);
        let m = game.monster(id).unwrap();
        assert!(!m.has_effect(EffectKind::Asleep));
        // Sneak attacks against sleepers always land for at least 1d6
        assert!(m.hp < hp_before);
    }
}
