//! Status effects
//!
//! The set of effect kinds is closed and known at build time; per-kind
//! behavior lives in constant tables here and in the expiry hook the
//! resolver calls when a countdown reaches zero. Durations tick down once
//! per owning actor's turn.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Status effect kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum EffectKind {
    Confused,
    Stunned,
    Asleep,
    Paralyzed,
    Frightened,
    Invisible,
    Haste,
    Lethargy,
    Resistance,
    Rejuvenated,
}

impl EffectKind {
    /// Effects that prevent the owner from acting at all
    pub const fn incapacitates(&self) -> bool {
        matches!(self, EffectKind::Asleep | EffectKind::Stunned | EffectKind::Paralyzed)
    }

    /// Message shown when the player gains this effect
    pub const fn player_gain_msg(&self) -> &'static str {
        match self {
            EffectKind::Confused => "You feel confused.",
            EffectKind::Stunned => "You are stunned.",
            EffectKind::Asleep => "You fall asleep.",
            EffectKind::Paralyzed => "You can't move!",
            EffectKind::Frightened => "You are gripped by fear.",
            EffectKind::Invisible => "You become invisible.",
            EffectKind::Haste => "You begin to move faster.",
            EffectKind::Lethargy => "You begin to feel lethargic.",
            EffectKind::Resistance => "You feel more resistant to damage.",
            EffectKind::Rejuvenated => "You begin to feel extremely rejuvenated.",
        }
    }

    /// Message shown when this effect wears off the player
    pub const fn player_expire_msg(&self) -> &'static str {
        match self {
            EffectKind::Confused => "Your head clears.",
            EffectKind::Stunned => "You are no longer stunned.",
            EffectKind::Asleep => "You wake up.",
            EffectKind::Paralyzed => "You can move again.",
            EffectKind::Frightened => "You regain your courage.",
            EffectKind::Invisible => "You become visible again.",
            EffectKind::Haste => "Your extra speed runs out.",
            EffectKind::Lethargy => "Your energy returns.",
            EffectKind::Resistance => "You feel vulnerable again.",
            EffectKind::Rejuvenated => "The rejuvenation wears off.",
        }
    }

    /// Predicate clause for the monster-side expiry message, if any
    pub const fn monster_expire_msg(&self) -> Option<&'static str> {
        match self {
            EffectKind::Confused => Some("is no longer confused"),
            EffectKind::Stunned => Some("is no longer stunned"),
            EffectKind::Frightened => Some("regains courage"),
            _ => None,
        }
    }

    /// Effect granted when this one expires, with its duration range.
    /// Coming down from Haste leaves the actor lethargic.
    pub const fn on_expire_grants(&self) -> Option<(EffectKind, (i32, i32))> {
        match self {
            EffectKind::Haste => Some((EffectKind::Lethargy, (5, 8))),
            _ => None,
        }
    }
}
