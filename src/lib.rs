//! Hyperbattle - a dimensional bullet-hell combat encounter engine
//!
//! One [`combat::CombatSession`] runs a single battle from intro through the
//! turn-based menu phase, the real-time dodge phase, and resolution. The
//! engine is pure logic: callers feed it [`combat::InputEvent`]s and a frame
//! delta, and read back snapshots for rendering. It never touches a
//! framebuffer, a sound device, or a socket.
//!
//! Core module:
//! - `combat`: the encounter state machine, projectile simulation,
//!   perception system, resonance meters, and enemy AI

pub mod combat;

pub use combat::{CombatPhase, CombatResult, CombatSession, Dimension, InputEvent, Perception};

/// Engine tuning constants
pub mod consts {
    /// Default dodge box size
    pub const BOX_WIDTH: f32 = 300.0;
    pub const BOX_HEIGHT: f32 = 150.0;
    /// Dodge box resize animation rate (exponential approach per second)
    pub const BOX_ANIM_SPEED: f32 = 8.0;

    /// Soul defaults
    pub const SOUL_RADIUS: f32 = 8.0;
    pub const SOUL_SPEED: f32 = 200.0;
    /// Invulnerability window after a damaging hit (seconds)
    pub const SOUL_INVINCIBLE_DURATION: f32 = 1.0;

    /// Bullet defaults
    pub const BULLET_RADIUS: f32 = 8.0;
    pub const BULLET_DAMAGE: i32 = 5;
    pub const BULLET_LIFETIME: f32 = 10.0;

    /// Dialogue typewriter speed (characters per second)
    pub const DIALOGUE_SPEED: f32 = 30.0;
    /// Minimum dwell before the intro auto-advances (seconds)
    pub const INTRO_DWELL: f32 = 2.0;
    /// Minimum dwell before enemy dialogue auto-advances (seconds)
    pub const DIALOGUE_DWELL: f32 = 1.5;
    /// How long terminal phases display before the end callback fires
    pub const ENDING_DWELL: f32 = 3.0;

    /// Fight minigame bar speed (full sweeps per second)
    pub const FIGHT_BAR_SPEED: f32 = 1.0;

    /// Perception energy pool
    pub const MAX_PERCEPTION_ENERGY: f32 = 100.0;
    /// Energy regeneration per second, Plane state only
    pub const ENERGY_REGEN_RATE: f32 = 10.0;
    /// Shift interpolation rate (progress per second; ~0.33 s per shift)
    pub const SHIFT_RATE: f32 = 3.0;
    /// Cooldown after a completed shift (seconds)
    pub const SHIFT_COOLDOWN: f32 = 0.5;

    /// Transcendence gauge
    pub const TRANSCENDENCE_MAX: f32 = 100.0;
    pub const TRANSCENDENCE_DURATION: f32 = 6.0;
    pub const TRANSCENDENCE_PER_GRAZE: f32 = 2.0;

    /// Resonance meters
    pub const RESONANCE_MAX: f32 = 100.0;
    pub const RESONANCE_DECAY_RATE: f32 = 1.0;

    /// Grazing: extra ring beyond the hit distance that counts as a graze
    pub const GRAZE_DISTANCE: f32 = 20.0;
    /// Seconds between grazes before the combo resets
    pub const GRAZE_COMBO_TIMEOUT: f32 = 0.5;

    /// Chance that a damaging hit fractures the player's perception
    pub const FRACTURE_ON_HIT_CHANCE: f32 = 0.1;

    /// Depth layers further apart than this cannot collide (3d fights)
    pub const DEPTH_COLLISION_WINDOW: f32 = 0.2;
    /// Depth scrub speed (layers per second)
    pub const DEPTH_SHIFT_SPEED: f32 = 2.0;
    /// How far the 4d time scrub reaches into past/future (seconds)
    pub const TIME_SCRUB_RANGE: f32 = 2.0;
}

/// Exponential approach toward a target: `current + (target - current) * rate * dt`
#[inline]
pub fn approach(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current + (target - current) * (rate * dt).min(1.0)
}

/// Wrap a value into `[min, max]`, preserving overshoot distance
#[inline]
pub fn wrap_range(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        max - (min - value)
    } else if value > max {
        min + (value - max)
    } else {
        value
    }
}
