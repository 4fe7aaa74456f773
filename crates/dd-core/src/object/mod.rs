//! Items: potions, scrolls, wands, weapons, armor
//!
//! Every item family is a closed kind enum carrying its constant table;
//! behavior dispatch happens on the kind, never through runtime type
//! introspection. An item lives in exactly one place at a time, either a
//! tile's item list or the player's inventory, and is moved, never copied.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::rng::GameRng;

bitflags! {
    /// Weapon handling traits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WeaponFlags: u8 {
        /// May use DEX instead of STR for attack rolls
        const FINESSE = 0x01;
        /// Unwieldy; -2 penalty on attack rolls
        const HEAVY = 0x02;
    }
}

/// Weapon kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum WeaponKind {
    Club,
    Dagger,
    Mace,
    Shortsword,
    Greatclub,
    Battleaxe,
    Glaive,
    Greataxe,
}

impl WeaponKind {
    pub const fn name(&self) -> &'static str {
        match self {
            WeaponKind::Club => "club",
            WeaponKind::Dagger => "dagger",
            WeaponKind::Mace => "mace",
            WeaponKind::Shortsword => "shortsword",
            WeaponKind::Greatclub => "greatclub",
            WeaponKind::Battleaxe => "battleaxe",
            WeaponKind::Glaive => "glaive",
            WeaponKind::Greataxe => "greataxe",
        }
    }

    pub const fn symbol(&self) -> char {
        match self {
            WeaponKind::Club => '!',
            WeaponKind::Dagger => '/',
            WeaponKind::Mace => 'T',
            WeaponKind::Shortsword => 'i',
            WeaponKind::Greatclub => 'P',
            WeaponKind::Battleaxe => 'F',
            WeaponKind::Glaive => 'L',
            WeaponKind::Greataxe => 'G',
        }
    }

    /// Damage dice as (count, sides)
    pub const fn damage(&self) -> (i32, i32) {
        match self {
            WeaponKind::Club => (1, 4),
            WeaponKind::Dagger => (1, 4),
            WeaponKind::Mace => (1, 6),
            WeaponKind::Shortsword => (1, 6),
            WeaponKind::Greatclub => (1, 8),
            WeaponKind::Battleaxe => (1, 9),
            WeaponKind::Glaive => (1, 10),
            WeaponKind::Greataxe => (2, 6),
        }
    }

    pub const fn flags(&self) -> WeaponFlags {
        match self {
            WeaponKind::Dagger | WeaponKind::Shortsword => WeaponFlags::FINESSE,
            WeaponKind::Glaive | WeaponKind::Greataxe => WeaponFlags::HEAVY,
            _ => WeaponFlags::empty(),
        }
    }

    pub const fn is_finesse(&self) -> bool {
        self.flags().contains(WeaponFlags::FINESSE)
    }

    pub const fn is_heavy(&self) -> bool {
        self.flags().contains(WeaponFlags::HEAVY)
    }

    pub fn roll_damage(&self, rng: &mut GameRng) -> i32 {
        let (n, m) = self.damage();
        rng.dice(n, m)
    }
}

/// Armor kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum ArmorKind {
    Leather,
    Hide,
    ChainShirt,
    ScaleMail,
    HalfPlate,
    ChainMail,
    Splint,
    Plate,
}

impl ArmorKind {
    pub const fn name(&self) -> &'static str {
        match self {
            ArmorKind::Leather => "leather armor",
            ArmorKind::Hide => "hide armor",
            ArmorKind::ChainShirt => "chain shirt",
            ArmorKind::ScaleMail => "scale mail",
            ArmorKind::HalfPlate => "half-plate",
            ArmorKind::ChainMail => "chainmail",
            ArmorKind::Splint => "splint armor",
            ArmorKind::Plate => "plate armor",
        }
    }

    pub const fn symbol(&self) -> char {
        match self {
            ArmorKind::Leather => 'L',
            ArmorKind::Hide => 'H',
            ArmorKind::ChainShirt => 'C',
            ArmorKind::ScaleMail => 'M',
            ArmorKind::HalfPlate => 'A',
            ArmorKind::ChainMail => 'I',
            ArmorKind::Splint => 'S',
            ArmorKind::Plate => 'T',
        }
    }

    /// Damage reduction rating
    pub const fn protection(&self) -> i32 {
        match self {
            ArmorKind::Leather => 1,
            ArmorKind::Hide => 2,
            ArmorKind::ChainShirt => 3,
            ArmorKind::ScaleMail => 4,
            ArmorKind::HalfPlate => 5,
            ArmorKind::ChainMail => 6,
            ArmorKind::Splint => 7,
            ArmorKind::Plate => 8,
        }
    }

    /// Penalty to stealth checks while worn
    pub const fn stealth_penalty(&self) -> i32 {
        match self {
            ArmorKind::Leather | ArmorKind::Hide | ArmorKind::ChainShirt => 0,
            ArmorKind::ScaleMail => 2,
            ArmorKind::HalfPlate => 4,
            ArmorKind::ChainMail => 6,
            ArmorKind::Splint => 8,
            ArmorKind::Plate => 10,
        }
    }

    /// Softcap on the DEX bonus to AC while worn; excess above the cap is
    /// quartered rather than cut off
    pub const fn dex_softcap(&self) -> Option<i32> {
        match self {
            ArmorKind::Leather | ArmorKind::Hide => None,
            ArmorKind::ChainShirt => Some(4),
            ArmorKind::ScaleMail => Some(3),
            ArmorKind::HalfPlate => Some(2),
            ArmorKind::ChainMail => Some(1),
            ArmorKind::Splint => Some(0),
            ArmorKind::Plate => Some(-1),
        }
    }
}

/// Potion kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum PotionKind {
    Health,
    Speed,
    Resistance,
    Invisibility,
    Rejuvenation,
}

impl PotionKind {
    pub const fn name(&self) -> &'static str {
        match self {
            PotionKind::Health => "health potion",
            PotionKind::Speed => "speed potion",
            PotionKind::Resistance => "resistance potion",
            PotionKind::Invisibility => "invisibility potion",
            PotionKind::Rejuvenation => "potion of rejuvenation",
        }
    }

    pub const fn symbol(&self) -> char {
        match self {
            PotionKind::Health => 'P',
            PotionKind::Speed => 'S',
            PotionKind::Resistance => 'R',
            PotionKind::Invisibility => 'C',
            PotionKind::Rejuvenation => 'J',
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            PotionKind::Health => {
                "Consuming this potion increases the HP of the one who drinks it."
            }
            PotionKind::Speed => {
                "Consuming this potion temporarily speeds the movement of the one who drinks it. However, once the effect wears off, they will feel lethargic for a short period."
            }
            PotionKind::Resistance => {
                "Consuming this potion temporarily halves all damage taken by the one who drinks it."
            }
            PotionKind::Invisibility => {
                "Consuming this potion makes the one who drinks it temporarily invisible. However, attacking a monster will reduce the duration of this effect."
            }
            PotionKind::Rejuvenation => {
                "Consuming this potion significantly improves regeneration for a short duration."
            }
        }
    }
}

/// Scroll kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum ScrollKind {
    Confusion,
    Sleep,
    Stun,
    Teleportation,
}

impl ScrollKind {
    pub const fn name(&self) -> &'static str {
        match self {
            ScrollKind::Confusion => "scroll of confusion",
            ScrollKind::Sleep => "scroll of sleep",
            ScrollKind::Stun => "scroll of stun",
            ScrollKind::Teleportation => "scroll of teleportation",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            ScrollKind::Confusion => {
                "Reading this scroll may cause nearby monsters to become confused."
            }
            ScrollKind::Sleep => {
                "Reading this scroll may cause some of the nearby monsters to fall asleep."
            }
            ScrollKind::Stun => "Reading this scroll stuns a random amount of nearby monsters.",
            ScrollKind::Teleportation => {
                "Reading this scroll will randomly teleport the one who reads it."
            }
        }
    }
}

/// How a wand's effect travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WandDelivery {
    /// Single projectile toward the chosen target
    Projectile,
    /// Ray affecting everything along the line
    Ray,
}

/// Wand kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum WandKind {
    MagicMissiles,
    Polymorph,
    Fear,
    Lightning,
}

impl WandKind {
    pub const fn name(&self) -> &'static str {
        match self {
            WandKind::MagicMissiles => "wand of magic missiles",
            WandKind::Polymorph => "polymorph wand",
            WandKind::Fear => "wand of fear",
            WandKind::Lightning => "wand of lightning",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            WandKind::MagicMissiles => {
                "This wand can be used to fire magic missiles at creatures, which will always hit."
            }
            WandKind::Polymorph => {
                "This wand can be used to polymorph nearby enemies into something weaker."
            }
            WandKind::Fear => {
                "This wand can be used to make nearby enemies frightened of the player."
            }
            WandKind::Lightning => {
                "This wand can be used to cast lightning bolts, dealing damage to nearby enemies."
            }
        }
    }

    pub const fn delivery(&self) -> WandDelivery {
        match self {
            WandKind::Lightning => WandDelivery::Ray,
            _ => WandDelivery::Projectile,
        }
    }
}

/// An item kind across all families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Potion(PotionKind),
    Scroll(ScrollKind),
    Wand(WandKind),
    Weapon(WeaponKind),
    Armor(ArmorKind),
}

/// An item instance. Only wands carry mutable state (charges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    pub charges: i32,
}

impl Item {
    /// Create an item, rolling wand charges
    pub fn spawn(kind: ItemKind, rng: &mut GameRng) -> Self {
        let charges = match kind {
            ItemKind::Wand(_) => {
                let lo = rng.range_inclusive(2, 7);
                rng.range_inclusive(lo, 7)
            }
            _ => 0,
        };
        Self { kind, charges }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            ItemKind::Potion(k) => k.name(),
            ItemKind::Scroll(k) => k.name(),
            ItemKind::Wand(k) => k.name(),
            ItemKind::Weapon(k) => k.name(),
            ItemKind::Armor(k) => k.name(),
        }
    }

    pub fn symbol(&self) -> char {
        match self.kind {
            ItemKind::Potion(k) => k.symbol(),
            ItemKind::Scroll(_) => '@',
            ItemKind::Wand(_) => 'Z',
            ItemKind::Weapon(k) => k.symbol(),
            ItemKind::Armor(k) => k.symbol(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self.kind {
            ItemKind::Potion(k) => k.description(),
            ItemKind::Scroll(k) => k.description(),
            ItemKind::Wand(k) => k.description(),
            ItemKind::Weapon(_) => "This is a weapon that can be used to attack enemies.",
            ItemKind::Armor(_) => "This is armor. It may protect you from attacks.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_weapon_flags() {
        assert!(WeaponKind::Dagger.is_finesse());
        assert!(!WeaponKind::Dagger.is_heavy());
        assert!(WeaponKind::Greataxe.is_heavy());
        assert!(!WeaponKind::Club.is_finesse());
    }

    #[test]
    fn test_armor_tables_are_monotonic() {
        let kinds: Vec<_> = ArmorKind::iter().collect();
        for pair in kinds.windows(2) {
            assert!(pair[0].protection() < pair[1].protection());
        }
        // Heavier armor never has a looser softcap
        for pair in kinds.windows(2) {
            match (pair[0].dex_softcap(), pair[1].dex_softcap()) {
                (Some(a), Some(b)) => assert!(b <= a),
                (None, Some(_)) | (None, None) => {}
                (Some(_), None) => panic!("softcap disappears on heavier armor"),
            }
        }
    }

    #[test]
    fn test_wand_charges_in_range() {
        let mut rng = GameRng::new(11);
        for _ in 0..200 {
            let wand = Item::spawn(ItemKind::Wand(WandKind::Fear), &mut rng);
            assert!((2..=7).contains(&wand.charges));
        }
        let potion = Item::spawn(ItemKind::Potion(PotionKind::Health), &mut rng);
        assert_eq!(potion.charges, 0);
    }

    #[test]
    fn test_damage_dice_roll_within_bounds() {
        let mut rng = GameRng::new(5);
        for _ in 0..100 {
            let d = WeaponKind::Greataxe.roll_damage(&mut rng);
            assert!((2..=12).contains(&d));
        }
    }

    #[test]
    fn test_only_lightning_is_a_ray() {
        for kind in WandKind::iter() {
            let expect = matches!(kind, WandKind::Lightning);
            assert_eq!(kind.delivery() == WandDelivery::Ray, expect);
        }
    }
}
