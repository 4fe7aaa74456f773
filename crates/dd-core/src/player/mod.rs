//! Player state
//!
//! Pure stat-block state and queries live here; anything that needs the
//! board, the monster roster, or the message log is driven from `Game`.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::consts::{HP_PER_LEVEL, NORMAL_SPEED, PLAYER_BASE_HP, XP_BASE, XP_PER_LEVEL};
use crate::effect::EffectKind;
use crate::monster::MonsterId;
use crate::object::{ArmorKind, Item, ItemKind, WeaponKind};
use crate::rng::GameRng;

/// A multi-tick player undertaking; interruptible, no partial effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    /// Putting on armor from the inventory slot `item`
    WearArmor { item: usize, time: i32 },
    /// Taking off the equipped armor
    RemoveArmor { time: i32 },
}

impl Activity {
    pub fn time_left(&self) -> i32 {
        match self {
            Activity::WearArmor { time, .. } | Activity::RemoveArmor { time } => *time,
        }
    }

    pub fn tick(&mut self) {
        match self {
            Activity::WearArmor { time, .. } | Activity::RemoveArmor { time } => *time -= 1,
        }
    }
}

/// The player character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    /// Permanent HP drain (life drain); restored slowly
    pub hp_drain: i32,
    /// Poison pool still working through the system
    pub poison: i32,
    pub dead: bool,
    /// Turn counter driving regeneration cadence
    pub ticks: i64,
    pub strength: i32,
    pub dexterity: i32,
    pub exp: i32,
    pub level: i32,
    pub energy: i32,
    pub speed: i32,
    pub effects: HashMap<EffectKind, i32>,
    pub inventory: Vec<Item>,
    /// Index into inventory of the wielded weapon
    pub weapon: Option<usize>,
    /// Index into inventory of the worn armor
    pub armor: Option<usize>,
    /// Monsters currently holding the player
    pub grappled_by: Vec<MonsterId>,
    pub activity: Option<Activity>,
    pub resting: bool,
    /// Attacked something this turn / last turn (stealth penalty)
    pub did_attack: bool,
    pub last_attacked: bool,
    /// Moved this turn / last turn (invisibility guessing)
    pub moved: bool,
    pub last_moved: bool,
    /// Level-up stat choices the input layer still owes us
    pub pending_stat_choices: u32,
    /// Cells currently visible, recomputed on every move
    pub fov: HashSet<(i32, i32)>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            hp: PLAYER_BASE_HP,
            hp_drain: 0,
            poison: 0,
            dead: false,
            ticks: 0,
            strength: 10,
            dexterity: 10,
            exp: 0,
            level: 1,
            energy: NORMAL_SPEED,
            speed: NORMAL_SPEED,
            effects: HashMap::new(),
            inventory: Vec::new(),
            weapon: None,
            armor: None,
            grappled_by: Vec::new(),
            activity: None,
            resting: false,
            did_attack: false,
            last_attacked: false,
            moved: false,
            last_moved: false,
            pending_stat_choices: 0,
            fov: HashSet::new(),
        }
    }

    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.effects.contains_key(&kind)
    }

    /// Max HP after drain
    pub fn max_hp(&self) -> i32 {
        (PLAYER_BASE_HP + (self.level - 1) * HP_PER_LEVEL - self.hp_drain).max(0)
    }

    /// Current speed; doubled by Haste, cut to two thirds by Lethargy
    pub fn get_speed(&self) -> i32 {
        if self.has_effect(EffectKind::Haste) {
            self.speed * 2
        } else if self.has_effect(EffectKind::Lethargy) {
            self.speed * 2 / 3
        } else {
            self.speed
        }
    }

    /// XP required to reach the next level
    pub fn max_exp(&self) -> i32 {
        XP_BASE + (self.level - 1) * XP_PER_LEVEL
    }

    /// The kind of the wielded weapon, if any
    pub fn weapon_kind(&self) -> Option<WeaponKind> {
        self.weapon.and_then(|i| match self.inventory.get(i)?.kind {
            ItemKind::Weapon(k) => Some(k),
            _ => None,
        })
    }

    /// The kind of the worn armor, if any
    pub fn armor_kind(&self) -> Option<ArmorKind> {
        self.armor.and_then(|i| match self.inventory.get(i)?.kind {
            ItemKind::Armor(k) => Some(k),
            _ => None,
        })
    }

    /// The stat an attack roll keys off: STR, or DEX with a finesse weapon
    pub fn attack_stat(&self) -> i32 {
        match self.weapon_kind() {
            Some(w) if w.is_finesse() => self.strength.max(self.dexterity),
            _ => self.strength,
        }
    }

    /// Situational stealth modifier
    pub fn stealth_mod(&self) -> i32 {
        let mut modifier = 0;
        if self.last_attacked {
            modifier -= 5;
        }
        if self.has_effect(EffectKind::Invisible) {
            modifier += 5;
        }
        if let Some(armor) = self.armor_kind() {
            modifier -= armor.stealth_penalty();
        }
        modifier
    }

    /// Remove an item from the inventory, keeping equipment slots straight
    pub fn remove_item(&mut self, index: usize) -> Item {
        let item = self.inventory.remove(index);
        for slot in [&mut self.weapon, &mut self.armor] {
            *slot = match *slot {
                Some(i) if i == index => None,
                Some(i) if i > index => Some(i - 1),
                other => other,
            };
        }
        item
    }

    /// Record a grapple hold; fails if the monster is not adjacent or
    /// already holding on
    pub fn add_grapple(&mut self, id: MonsterId, distance: i32) -> bool {
        if distance > 1 || self.grappled_by.contains(&id) {
            return false;
        }
        self.grappled_by.push(id);
        true
    }

    pub fn remove_grapple(&mut self, id: MonsterId) {
        self.grappled_by.retain(|&m| m != id);
    }

    /// Permanently drain max HP
    pub fn drain(&mut self, amount: i32) {
        if amount <= 0 {
            return;
        }
        self.hp_drain += amount;
        self.hp = self.hp.min(self.max_hp());
        if self.max_hp() <= 0 {
            self.dead = true;
        }
    }
}

/// Ability modifier: (stat - 10) / 2 with randomized rounding
pub fn calc_mod(stat: i32, rng: &mut GameRng) -> i32 {
    rng.div_rand(stat - 10, 2)
}

/// Ability modifier as an exact average (for probability display)
pub fn calc_mod_avg(stat: i32) -> f64 {
    f64::from(stat - 10) / 2.0
}
