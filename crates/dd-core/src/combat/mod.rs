//! Combat resolution
//!
//! d20 rules: natural 1 always misses, natural 20 always hits, otherwise
//! roll + modifier against AC. Advantage and disadvantage are "roll twice,
//! take the better/worse" and never stack; holding both cancels to a flat
//! roll. The closed-form probability functions here are the contract the
//! monster-info display and the tests check against.

mod monster_attack;
mod player_attack;

pub use monster_attack::{
    do_melee_attack, do_ranged_attack, melee_attack_player, modify_damage,
};
pub use player_attack::{attack_monster, defeated_monster};

use crate::effect::EffectKind;
use crate::player::{Player, calc_mod, calc_mod_avg};
use crate::rng::GameRng;

/// Probability that d20 + `modifier` meets DC `dc`. `nat1` forces a miss
/// floor (a 1 always fails), `nat20` a hit ceiling (a 20 always succeeds).
pub fn d20_prob(dc: i32, modifier: f64, nat1: bool, nat20: bool) -> f64 {
    let mut num_over = 21.0 - f64::from(dc) + modifier;
    if nat1 {
        num_over = num_over.min(19.0);
    }
    if nat20 {
        num_over = num_over.max(1.0);
    }
    (num_over / 20.0).clamp(0.0, 1.0)
}

/// Chance of landing a hit against `ac`, rounded to three decimals.
/// Advantage and disadvantage together cancel out.
pub fn to_hit_prob(ac: i32, modifier: f64, mut adv: bool, mut disadv: bool) -> f64 {
    if adv && disadv {
        adv = false;
        disadv = false;
    }
    let mut res = d20_prob(ac, modifier, true, true);
    if adv {
        res = 1.0 - (1.0 - res) * (1.0 - res);
    } else if disadv {
        res *= res;
    }
    (res * 1000.0).round() / 1000.0
}

/// Render a percentage for display, clamping the extremes
pub fn display_prob(perc: f64) -> String {
    if perc <= 0.0 {
        return "0%".to_string();
    }
    if perc >= 100.0 {
        return "100%".to_string();
    }
    if perc <= 0.5 {
        return "<1%".to_string();
    }
    if perc >= 99.5 {
        return ">99%".to_string();
    }
    let rounded = if perc < 50.0 {
        (perc - 0.5).ceil()
    } else {
        (perc + 0.5).floor()
    };
    format!("{}%", rounded as i32)
}

/// The player's dodge bonus to AC: DEX modifier squeezed by the armor's
/// softcap (excess above the cap is quartered), +2 while hasted
pub fn player_ac_bonus(player: &Player, rng: &mut GameRng) -> i32 {
    let mut s = calc_mod(player.dexterity, rng);
    if let Some(armor) = player.armor_kind()
        && let Some(softcap) = armor.dex_softcap()
        && s > softcap
    {
        s = softcap + rng.div_rand(s - softcap, 4);
    }
    if player.has_effect(EffectKind::Haste) {
        s += 2;
    }
    s
}

/// Average-valued AC bonus for probability display
pub fn player_ac_bonus_avg(player: &Player) -> f64 {
    let mut s = calc_mod_avg(player.dexterity);
    if let Some(armor) = player.armor_kind()
        && let Some(softcap) = armor.dex_softcap()
    {
        let softcap = f64::from(softcap);
        if s > softcap {
            s = softcap + (s - softcap) / 4.0;
        }
    }
    if player.has_effect(EffectKind::Haste) {
        s += 2.0;
    }
    s
}

/// The player's attack-roll modifier: attack stat, -2 for a heavy weapon,
/// +2 unarmed
pub fn player_attack_mod(player: &Player, rng: &mut GameRng) -> i32 {
    let mut modifier = calc_mod(player.attack_stat(), rng);
    match player.weapon_kind() {
        Some(w) if w.is_heavy() => modifier -= 2,
        Some(_) => {}
        None => modifier += 2,
    }
    modifier
}

/// Average-valued attack modifier for probability display
pub fn player_attack_mod_avg(player: &Player) -> f64 {
    let mut modifier = calc_mod_avg(player.attack_stat());
    match player.weapon_kind() {
        Some(w) if w.is_heavy() => modifier -= 2.0,
        Some(_) => {}
        None => modifier += 2.0,
    }
    modifier
}
