//! Monster instances and per-kind constant tables
//!
//! The set of monster kinds is closed and known at build time. Stats,
//! attack sets, and special on-hit behavior are constant tables on
//! `MonsterKind`; `strum::EnumIter` is the spawn registry.

pub mod ai;

use std::collections::VecDeque;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::consts::NORMAL_SPEED;
use crate::effect::EffectKind;
use crate::object::WeaponKind;
use crate::rng::GameRng;

/// Unique identifier for monster instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonsterId(pub u32);

/// Side effect riding on a successful hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnHit {
    None,
    /// Grab the player unless a 1-in-`fail_one_in` roll spares them
    Grapple {
        fail_one_in: i32,
        msg: &'static str,
    },
    /// Inject poison: `dice` plus `extra` dice, capped near the damage dealt
    Poison {
        dice: (i32, i32),
        extra: (i32, i32),
    },
    /// Permanently drain up to the damage dealt from max HP
    LifeDrain,
}

/// A single melee attack option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackSpec {
    /// Damage dice as (count, sides)
    pub dmg: (i32, i32),
    /// To-hit bonus
    pub to_hit: i32,
    /// Predicate clause, rendered as "The <name> <verb> ..."
    pub verb: &'static str,
    pub on_hit: OnHit,
}

impl AttackSpec {
    pub const fn new(dmg: (i32, i32), to_hit: i32, verb: &'static str) -> Self {
        Self {
            dmg,
            to_hit,
            verb,
            on_hit: OnHit::None,
        }
    }

    pub const fn with_on_hit(mut self, on_hit: OnHit) -> Self {
        self.on_hit = on_hit;
        self
    }
}

const fn claw_grapple(dmg: (i32, i32), to_hit: i32) -> AttackSpec {
    AttackSpec::new(dmg, to_hit, "claws you").with_on_hit(OnHit::Grapple {
        fail_one_in: 3,
        msg: "grapples you with its claw!",
    })
}

/// One attack slot: a hit routine picks uniformly among the alternatives
pub type AttackGroup = &'static [AttackSpec];

/// Monster kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum MonsterKind {
    Bat,
    Lizard,
    Kobold,
    GiantCrab,
    GiantRat,
    GiantPoisonousSnake,
    Skeleton,
    GiantBat,
    GiantLizard,
    GiantGoat,
    Orc,
    BlackBear,
    BrownBear,
    GiantEagle,
    Ogre,
    PolarBear,
    Rhinoceros,
    Wight,
    Sasquatch,
    GiantScorpion,
    GiantGreenSlime,
}

impl MonsterKind {
    pub const fn name(&self) -> &'static str {
        match self {
            MonsterKind::Bat => "bat",
            MonsterKind::Lizard => "lizard",
            MonsterKind::Kobold => "kobold",
            MonsterKind::GiantCrab => "giant crab",
            MonsterKind::GiantRat => "giant rat",
            MonsterKind::GiantPoisonousSnake => "giant poisonous snake",
            MonsterKind::Skeleton => "skeleton",
            MonsterKind::GiantBat => "giant bat",
            MonsterKind::GiantLizard => "giant lizard",
            MonsterKind::GiantGoat => "giant goat",
            MonsterKind::Orc => "orc",
            MonsterKind::BlackBear => "black bear",
            MonsterKind::BrownBear => "brown bear",
            MonsterKind::GiantEagle => "giant eagle",
            MonsterKind::Ogre => "ogre",
            MonsterKind::PolarBear => "polar bear",
            MonsterKind::Rhinoceros => "rhinoceros",
            MonsterKind::Wight => "wight",
            MonsterKind::Sasquatch => "sasquatch",
            MonsterKind::GiantScorpion => "giant scorpion",
            MonsterKind::GiantGreenSlime => "giant green slime",
        }
    }

    pub const fn symbol(&self) -> char {
        match self {
            MonsterKind::Bat => 'w',
            MonsterKind::Lizard => 'r',
            MonsterKind::Kobold => 'K',
            MonsterKind::GiantCrab => 'C',
            MonsterKind::GiantRat => 'R',
            MonsterKind::GiantPoisonousSnake => 'S',
            MonsterKind::Skeleton => 'F',
            MonsterKind::GiantBat => 'W',
            MonsterKind::GiantLizard => 'L',
            MonsterKind::GiantGoat => 'G',
            MonsterKind::Orc => 'O',
            MonsterKind::BlackBear => 'B',
            MonsterKind::BrownBear => '&',
            MonsterKind::GiantEagle => 'E',
            MonsterKind::Ogre => 'J',
            MonsterKind::PolarBear => 'P',
            MonsterKind::Rhinoceros => 'Y',
            MonsterKind::Wight => 'T',
            MonsterKind::Sasquatch => 'Q',
            MonsterKind::GiantScorpion => 'D',
            MonsterKind::GiantGreenSlime => 'M',
        }
    }

    /// Shallowest dungeon level this kind appears on
    pub const fn min_level(&self) -> i32 {
        match self {
            MonsterKind::Bat | MonsterKind::Lizard => 1,
            MonsterKind::Kobold => 3,
            MonsterKind::GiantCrab => 4,
            MonsterKind::GiantRat => 5,
            MonsterKind::Skeleton => 7,
            MonsterKind::GiantPoisonousSnake | MonsterKind::GiantBat => 8,
            MonsterKind::GiantLizard => 9,
            MonsterKind::GiantGoat | MonsterKind::Orc => 12,
            MonsterKind::BlackBear => 13,
            MonsterKind::BrownBear => 15,
            MonsterKind::GiantEagle => 16,
            MonsterKind::PolarBear => 18,
            MonsterKind::Rhinoceros => 19,
            MonsterKind::Ogre => 20,
            MonsterKind::Wight | MonsterKind::GiantScorpion => 21,
            MonsterKind::Sasquatch => 22,
            MonsterKind::GiantGreenSlime => 24,
        }
    }

    /// Difficulty tier, drives XP reward and polymorph candidacy
    pub const fn difficulty(&self) -> i32 {
        match self {
            MonsterKind::Bat | MonsterKind::Lizard => 1,
            MonsterKind::Kobold | MonsterKind::GiantRat => 2,
            MonsterKind::GiantCrab
            | MonsterKind::GiantPoisonousSnake
            | MonsterKind::Skeleton
            | MonsterKind::GiantBat
            | MonsterKind::GiantLizard => 3,
            MonsterKind::GiantGoat | MonsterKind::Orc | MonsterKind::BlackBear => 4,
            MonsterKind::BrownBear | MonsterKind::GiantEagle => 5,
            MonsterKind::Ogre | MonsterKind::PolarBear | MonsterKind::Rhinoceros => 6,
            MonsterKind::Wight | MonsterKind::Sasquatch | MonsterKind::GiantScorpion => 7,
            MonsterKind::GiantGreenSlime => 8,
        }
    }

    pub const fn base_hp(&self) -> i32 {
        match self {
            MonsterKind::Bat => 3,
            MonsterKind::Lizard => 4,
            MonsterKind::Kobold => 10,
            MonsterKind::GiantRat => 14,
            MonsterKind::GiantCrab => 20,
            MonsterKind::GiantPoisonousSnake => 22,
            MonsterKind::Skeleton | MonsterKind::GiantBat => 26,
            MonsterKind::Orc => 30,
            MonsterKind::GiantLizard
            | MonsterKind::GiantGoat
            | MonsterKind::BlackBear => 38,
            MonsterKind::GiantEagle => 52,
            MonsterKind::BrownBear => 68,
            MonsterKind::PolarBear => 84,
            MonsterKind::Rhinoceros => 90,
            MonsterKind::Wight => 90,
            MonsterKind::GiantScorpion => 98,
            MonsterKind::Ogre | MonsterKind::Sasquatch => 118,
            MonsterKind::GiantGreenSlime => 168,
        }
    }

    pub const fn ac(&self) -> i32 {
        match self {
            MonsterKind::Ogre | MonsterKind::Rhinoceros => 9,
            MonsterKind::Lizard
            | MonsterKind::BrownBear
            | MonsterKind::PolarBear
            | MonsterKind::Sasquatch => 10,
            MonsterKind::GiantGoat | MonsterKind::Orc | MonsterKind::BlackBear => 11,
            MonsterKind::Bat
            | MonsterKind::Kobold
            | MonsterKind::GiantCrab
            | MonsterKind::GiantRat
            | MonsterKind::Skeleton
            | MonsterKind::GiantLizard
            | MonsterKind::Wight
            | MonsterKind::GiantGreenSlime => 12,
            MonsterKind::GiantBat | MonsterKind::GiantEagle => 13,
            MonsterKind::GiantPoisonousSnake => 14,
            MonsterKind::GiantScorpion => 15,
        }
    }

    /// Ranged-attack to-hit bonus
    pub const fn to_hit(&self) -> i32 {
        match self {
            MonsterKind::Bat | MonsterKind::Lizard => 0,
            MonsterKind::GiantCrab
            | MonsterKind::BlackBear
            | MonsterKind::BrownBear => 3,
            MonsterKind::Kobold
            | MonsterKind::GiantRat
            | MonsterKind::Skeleton
            | MonsterKind::GiantBat
            | MonsterKind::GiantLizard
            | MonsterKind::Wight
            | MonsterKind::GiantScorpion
            | MonsterKind::GiantGreenSlime => 4,
            MonsterKind::GiantGoat | MonsterKind::Orc | MonsterKind::GiantEagle => 5,
            MonsterKind::GiantPoisonousSnake
            | MonsterKind::Ogre
            | MonsterKind::Sasquatch => 6,
            MonsterKind::PolarBear | MonsterKind::Rhinoceros => 7,
        }
    }

    pub const fn wis(&self) -> i32 {
        match self {
            MonsterKind::Kobold | MonsterKind::Ogre => 7,
            MonsterKind::Lizard
            | MonsterKind::Skeleton
            | MonsterKind::GiantGreenSlime => 8,
            MonsterKind::GiantCrab | MonsterKind::GiantScorpion => 9,
            MonsterKind::GiantRat
            | MonsterKind::GiantPoisonousSnake
            | MonsterKind::GiantLizard => 10,
            MonsterKind::Orc => 11,
            MonsterKind::Bat
            | MonsterKind::GiantBat
            | MonsterKind::GiantGoat
            | MonsterKind::BlackBear
            | MonsterKind::BrownBear
            | MonsterKind::GiantEagle
            | MonsterKind::Rhinoceros => 12,
            MonsterKind::PolarBear | MonsterKind::Wight => 13,
            MonsterKind::Sasquatch => 16,
        }
    }

    /// Passive perception threshold for stealth contests
    pub const fn passive_perception(&self) -> i32 {
        match self {
            MonsterKind::Kobold | MonsterKind::Ogre => 8,
            MonsterKind::Lizard
            | MonsterKind::GiantCrab
            | MonsterKind::Skeleton
            | MonsterKind::GiantScorpion
            | MonsterKind::GiantGreenSlime => 9,
            MonsterKind::GiantRat
            | MonsterKind::GiantPoisonousSnake
            | MonsterKind::GiantLizard
            | MonsterKind::Orc => 10,
            MonsterKind::Bat
            | MonsterKind::GiantBat
            | MonsterKind::GiantGoat => 11,
            MonsterKind::BlackBear
            | MonsterKind::BrownBear
            | MonsterKind::PolarBear
            | MonsterKind::Rhinoceros
            | MonsterKind::Wight => 13,
            MonsterKind::GiantEagle => 14,
            MonsterKind::Sasquatch => 17,
        }
    }

    /// Escape DC for grapples this kind holds
    pub const fn grapple_dc(&self) -> i32 {
        match self {
            MonsterKind::GiantScorpion => 12,
            MonsterKind::GiantGreenSlime => 19,
            _ => 10,
        }
    }

    /// Armor soak rating
    pub const fn armor(&self) -> i32 {
        match self {
            MonsterKind::Skeleton | MonsterKind::BlackBear | MonsterKind::BrownBear => 1,
            MonsterKind::GiantCrab
            | MonsterKind::Orc
            | MonsterKind::Ogre
            | MonsterKind::PolarBear
            | MonsterKind::Rhinoceros
            | MonsterKind::Wight
            | MonsterKind::Sasquatch => 2,
            _ => 0,
        }
    }

    pub const fn speed(&self) -> i32 {
        match self {
            MonsterKind::Lizard => 20,
            MonsterKind::GiantBat => 60,
            MonsterKind::GiantGoat
            | MonsterKind::BlackBear
            | MonsterKind::BrownBear
            | MonsterKind::PolarBear
            | MonsterKind::Rhinoceros
            | MonsterKind::Sasquatch
            | MonsterKind::GiantScorpion => 40,
            _ => NORMAL_SPEED,
        }
    }

    /// Beasts are valid polymorph targets
    pub const fn is_beast(&self) -> bool {
        !matches!(
            self,
            MonsterKind::Kobold
                | MonsterKind::Skeleton
                | MonsterKind::Orc
                | MonsterKind::Ogre
                | MonsterKind::Sasquatch
        )
    }

    /// Weapon carried and possibly dropped on death
    pub const fn weapon(&self) -> Option<WeaponKind> {
        match self {
            MonsterKind::Kobold => Some(WeaponKind::Dagger),
            MonsterKind::Skeleton => Some(WeaponKind::Shortsword),
            MonsterKind::Orc => Some(WeaponKind::Greataxe),
            MonsterKind::Ogre => Some(WeaponKind::Club),
            _ => None,
        }
    }

    /// Whether individuals of this kind sometimes carry a ranged attack
    pub const fn may_use_ranged(&self) -> bool {
        matches!(
            self,
            MonsterKind::Kobold | MonsterKind::Skeleton | MonsterKind::Orc
        )
    }

    pub const fn ranged_damage(&self) -> (i32, i32) {
        match self {
            MonsterKind::Kobold => (2, 4),
            _ => (2, 6),
        }
    }

    pub const fn attacks(&self) -> &'static [AttackGroup] {
        match self {
            MonsterKind::Bat => BAT_ATTACKS,
            MonsterKind::Lizard => LIZARD_ATTACKS,
            MonsterKind::Kobold => KOBOLD_ATTACKS,
            MonsterKind::GiantCrab => CRAB_ATTACKS,
            MonsterKind::GiantRat => RAT_ATTACKS,
            MonsterKind::GiantPoisonousSnake => SNAKE_ATTACKS,
            MonsterKind::Skeleton => SKELETON_ATTACKS,
            MonsterKind::GiantBat => GIANT_BAT_ATTACKS,
            MonsterKind::GiantLizard => GIANT_LIZARD_ATTACKS,
            MonsterKind::GiantGoat => GOAT_ATTACKS,
            MonsterKind::Orc => ORC_ATTACKS,
            MonsterKind::BlackBear => BLACK_BEAR_ATTACKS,
            MonsterKind::BrownBear => BROWN_BEAR_ATTACKS,
            MonsterKind::GiantEagle => EAGLE_ATTACKS,
            MonsterKind::Ogre => OGRE_ATTACKS,
            MonsterKind::PolarBear => POLAR_BEAR_ATTACKS,
            MonsterKind::Rhinoceros => RHINO_ATTACKS,
            MonsterKind::Wight => WIGHT_ATTACKS,
            MonsterKind::Sasquatch => SASQUATCH_ATTACKS,
            MonsterKind::GiantScorpion => SCORPION_ATTACKS,
            MonsterKind::GiantGreenSlime => SLIME_ATTACKS,
        }
    }
}

const BAT_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((1, 3), 0, "bites you")]];
const LIZARD_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((1, 3), 0, "bites you")]];
const KOBOLD_ATTACKS: &[AttackGroup] =
    &[&[AttackSpec::new((2, 4), 4, "hits you with its dagger")]];
const CRAB_ATTACKS: &[AttackGroup] = &[&[claw_grapple((2, 6), 3)]];
const RAT_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((2, 4), 4, "bites you")]];
const SNAKE_ATTACKS: &[AttackGroup] =
    &[&[AttackSpec::new((2, 4), 6, "bites you").with_on_hit(OnHit::Poison {
        dice: (4, 6),
        extra: (1, 3),
    })]];
const SKELETON_ATTACKS: &[AttackGroup] =
    &[&[AttackSpec::new((2, 6), 4, "hits you with its shortsword")]];
const GIANT_BAT_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((2, 6), 4, "bites you")]];
const GIANT_LIZARD_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((2, 8), 4, "bites you")]];
const GOAT_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((4, 4), 4, "rams you")]];
const ORC_ATTACKS: &[AttackGroup] =
    &[&[AttackSpec::new((2, 12), 3, "hits you with its greataxe")]];
const BLACK_BEAR_ATTACKS: &[AttackGroup] = &[
    &[AttackSpec::new((2, 6), 3, "bites you")],
    &[AttackSpec::new((4, 4), 3, "claws you")],
];
const BROWN_BEAR_ATTACKS: &[AttackGroup] = &[
    &[AttackSpec::new((2, 8), 3, "bites you")],
    &[AttackSpec::new((4, 6), 3, "claws you")],
];
const EAGLE_ATTACKS: &[AttackGroup] = &[
    &[AttackSpec::new((2, 6), 5, "attacks you with its beak")],
    &[AttackSpec::new((4, 6), 5, "attacks you with its talons")],
];
const OGRE_ATTACKS: &[AttackGroup] =
    &[&[AttackSpec::new((2, 6), 6, "hits you with its club")]];
const POLAR_BEAR_ATTACKS: &[AttackGroup] = &[
    &[AttackSpec::new((2, 8), 7, "bites you")],
    &[AttackSpec::new((4, 6), 7, "claws you")],
];
const RHINO_ATTACKS: &[AttackGroup] = &[&[AttackSpec::new((2, 8), 7, "gores you")]];
const WIGHT_ATTACKS: &[AttackGroup] = &[
    &[AttackSpec::new((2, 8), 7, "hits you with its longsword")],
    &[
        AttackSpec::new((2, 8), 7, "hits you with its longsword"),
        AttackSpec::new((2, 6), 4, "uses life drain").with_on_hit(OnHit::LifeDrain),
    ],
];
const SASQUATCH_ATTACKS: &[AttackGroup] = &[
    &[AttackSpec::new((2, 8), 6, "punches you with its fist")],
    &[AttackSpec::new((2, 8), 6, "punches you with its fist")],
];
const SCORPION_ATTACKS: &[AttackGroup] = &[
    &[claw_grapple((2, 8), 4)],
    &[claw_grapple((2, 8), 4)],
    &[AttackSpec::new((2, 10), 4, "stings you").with_on_hit(OnHit::Poison {
        dice: (4, 10),
        extra: (0, 0),
    })],
];
const SLIME_ATTACKS: &[AttackGroup] =
    &[&[AttackSpec::new((6, 8), 6, "attacks you").with_on_hit(OnHit::Grapple {
        fail_one_in: 7,
        msg: "adheres to you and grapples you!",
    })]];

/// Report duplicate display symbols across the closed kind set. Built once
/// at startup and handed to the caller; there is no global warning registry.
pub fn symbol_collisions() -> Vec<String> {
    let mut seen: HashMap<char, MonsterKind> = HashMap::new();
    let mut warnings = Vec::new();
    for kind in MonsterKind::iter() {
        if let Some(other) = seen.get(&kind.symbol()) {
            warnings.push(format!(
                "WARNING: {kind} has same symbol as {other}"
            ));
        } else {
            seen.insert(kind.symbol(), kind);
        }
    }
    warnings
}

/// A monster on the current level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monster {
    pub id: MonsterId,
    pub kind: MonsterKind,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    /// Action budget; credited by speed each round, spent by actions
    pub energy: i32,
    /// This individual carries a ranged attack
    pub ranged: bool,
    pub ranged_dam: (i32, i32),
    /// Where the player was last seen or guessed
    pub last_seen: Option<(i32, i32)>,
    /// Current wandering heading
    pub heading: Option<(i32, i32)>,
    /// Rounds left before abandoned pursuit
    pub track_timer: i32,
    /// Knows the player is around
    pub is_aware: bool,
    /// Rounds until the next passive perception check
    pub check_timer: i32,
    pub effects: HashMap<EffectKind, i32>,
    /// Cached path target and remaining waypoints
    pub path_target: Option<(i32, i32)>,
    pub path: VecDeque<(i32, i32)>,
}

impl Monster {
    /// Create a monster of the given kind at an unplaced position
    pub fn spawn(id: MonsterId, kind: MonsterKind, rng: &mut GameRng) -> Self {
        let ranged = kind.may_use_ranged() && rng.one_in(5);
        Self {
            id,
            kind,
            x: 0,
            y: 0,
            hp: kind.base_hp(),
            max_hp: kind.base_hp(),
            energy: 0,
            ranged,
            ranged_dam: kind.ranged_damage(),
            last_seen: None,
            heading: None,
            track_timer: 0,
            is_aware: false,
            check_timer: 1,
            effects: HashMap::new(),
            path_target: None,
            path: VecDeque::new(),
        }
    }

    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Current speed (energy credited per scheduler round)
    pub fn get_speed(&self) -> i32 {
        self.kind.speed()
    }

    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.effects.contains_key(&kind)
    }

    /// Durations of a re-applied effect simply add up
    pub fn gain_effect(&mut self, kind: EffectKind, duration: i32) {
        *self.effects.entry(kind).or_insert(0) += duration;
    }

    pub fn lose_effect(&mut self, kind: EffectKind) {
        self.effects.remove(&kind);
    }

    pub fn is_incapacitated(&self) -> bool {
        self.effects.keys().any(|e| e.incapacitates())
    }

    pub fn distance_to(&self, pos: (i32, i32)) -> i32 {
        (self.x - pos.0).abs() + (self.y - pos.1).abs()
    }

    pub fn reset_check_timer(&mut self, rng: &mut GameRng) {
        self.check_timer = rng.range_inclusive(1, 3);
    }

    pub fn reset_track_timer(&mut self, rng: &mut GameRng) {
        self.track_timer = rng.range_inclusive(25, 65);
    }

    /// Note the player's position and begin (or refresh) pursuit
    pub fn alert(&mut self, player_pos: (i32, i32), rng: &mut GameRng) {
        self.is_aware = true;
        self.last_seen = Some(player_pos);
        self.reset_track_timer(rng);
    }

    /// Forget the player entirely
    pub fn stop_tracking(&mut self) {
        self.last_seen = None;
        self.track_timer = 0;
        self.is_aware = false;
        self.heading = None;
    }

    /// Random armor soak applied to incoming damage
    pub fn apply_armor(&self, dam: i32, rng: &mut GameRng) -> i32 {
        let cap = rng.mult_rand_frac(self.kind.armor(), 3, 2);
        (dam - rng.range_inclusive(0, cap)).max(0)
    }

    /// Replace this monster with a freshly built one of another kind,
    /// keeping position, identity, effects, and pursuit state
    pub fn polymorph_into(&mut self, kind: MonsterKind, rng: &mut GameRng) {
        let mut next = Monster::spawn(self.id, kind, rng);
        next.x = self.x;
        next.y = self.y;
        next.energy = self.energy;
        next.ranged = false;
        next.last_seen = self.last_seen;
        next.heading = self.heading;
        next.track_timer = self.track_timer;
        next.is_aware = self.is_aware;
        next.check_timer = self.check_timer;
        next.effects = std::mem::take(&mut self.effects);
        next.path_target = self.path_target;
        next.path = std::mem::take(&mut self.path);
        *self = next;
    }
}
