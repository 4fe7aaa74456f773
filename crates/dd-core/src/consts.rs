//! Global constants

/// Board width in columns
pub const BOARD_COLS: i32 = 40;

/// Board height in rows
pub const BOARD_ROWS: i32 = 16;

/// Baseline actor speed; energy credited per scheduler round at speed 30
pub const NORMAL_SPEED: i32 = 30;

/// Energy cost of a single-step move, independent of the mover's speed
pub const MOVE_ENERGY_COST: i32 = 30;

/// Attacks cost the attacker's speed up to this cap
pub const ATTACK_ENERGY_CAP: i32 = 45;

/// Player hit points at experience level 1
pub const PLAYER_BASE_HP: i32 = 100;

/// Additional max HP per experience level
pub const HP_PER_LEVEL: i32 = 15;

/// XP needed for level 2
pub const XP_BASE: i32 = 50;

/// Additional XP needed per further level
pub const XP_PER_LEVEL: i32 = 20;

/// Maximum retained message-log entries
pub const MESSAGE_CAP: usize = 50;
