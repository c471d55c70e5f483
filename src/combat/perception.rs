//! Dimensional perception: the defensive layer of the dodge phase
//!
//! The player shifts between perception states that trade movement freedom
//! for damage mitigation. Shifts cost energy, take a fixed interpolation
//! time, and enter a short cooldown. Running the energy pool dry forces a
//! return to Plane with a doubled cooldown.
//!
//! The controller also owns the movement rules of the fight's dimension
//! (1d momentum strips, 3d depth layers, 4d wrapping plus time scrub) and
//! the transcendence gauge charged by grazing.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::bullet::{AttackAxis, Bullet};
use super::soul::PlayerSoul;
use crate::consts::*;
use crate::wrap_range;

/// The spatial dimension a fight takes place in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "1d")]
    OneD,
    #[default]
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "4d")]
    FourD,
}

/// Per-dimension movement rules applied on top of the perception state.
#[derive(Debug, Clone, Copy)]
pub struct DimensionRules {
    pub speed_multiplier: f32,
    pub horizontal_only: bool,
    /// Velocity carry-over per frame blend; 0 = direct control
    pub momentum: f32,
    /// Positions wrap at box edges instead of clamping
    pub wraps: bool,
    pub has_depth: bool,
    pub has_time: bool,
}

impl DimensionRules {
    pub fn for_dimension(dimension: Dimension) -> Self {
        match dimension {
            Dimension::OneD => Self {
                speed_multiplier: 1.2,
                horizontal_only: true,
                momentum: 0.3,
                wraps: false,
                has_depth: false,
                has_time: false,
            },
            Dimension::TwoD => Self {
                speed_multiplier: 1.0,
                horizontal_only: false,
                momentum: 0.0,
                wraps: false,
                has_depth: false,
                has_time: false,
            },
            Dimension::ThreeD => Self {
                speed_multiplier: 0.9,
                horizontal_only: false,
                momentum: 0.0,
                wraps: false,
                has_depth: true,
                has_time: false,
            },
            Dimension::FourD => Self {
                speed_multiplier: 0.85,
                horizontal_only: false,
                momentum: 0.0,
                wraps: true,
                has_depth: false,
                has_time: true,
            },
        }
    }
}

/// The perception state natural to a dimension; new fights start here
/// when a wave demands a forced shift.
pub fn recommended_perception(dimension: Dimension) -> Perception {
    match dimension {
        Dimension::OneD => Perception::Line,
        Dimension::TwoD => Perception::Plane,
        Dimension::ThreeD => Perception::Volume,
        Dimension::FourD => Perception::Hyper,
    }
}

/// Player perception states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perception {
    /// Frozen in place, fully invulnerable
    Point,
    /// Horizontal movement only; vertical attacks pass through
    Line,
    /// Normal sight; the only state that regenerates energy
    #[default]
    Plane,
    /// Phase-capable, 25% damage reduction
    Volume,
    /// Phase-capable, trajectory sight, slows bullets, 30% reduction
    Hyper,
    /// Transitional state while a shift interpolates
    Shifting,
    /// Broken perception; takes 25% extra damage
    Fractured,
}

/// Static capabilities of one perception state.
#[derive(Debug, Clone, Copy)]
pub struct PerceptionProfile {
    pub can_move: bool,
    pub horizontal_only: bool,
    pub can_phase: bool,
    pub invulnerable: bool,
    /// Fraction of bullet damage removed; negative means extra damage
    pub damage_reduction: f32,
    /// Attacks along this axis pass through entirely
    pub blocks_axis: Option<AttackAxis>,
    pub sees_trajectories: bool,
    /// Bullet time-scale while in this state
    pub time_dilation: f32,
    /// Energy drained per second while held
    pub drain: f32,
    /// Energy deducted when shifting into this state
    pub activation_cost: f32,
}

impl PerceptionProfile {
    pub fn for_state(state: Perception) -> Self {
        let base = Self {
            can_move: true,
            horizontal_only: false,
            can_phase: false,
            invulnerable: false,
            damage_reduction: 0.0,
            blocks_axis: None,
            sees_trajectories: false,
            time_dilation: 1.0,
            drain: 0.0,
            activation_cost: 0.0,
        };
        match state {
            Perception::Point => Self {
                can_move: false,
                invulnerable: true,
                drain: 25.0,
                activation_cost: 15.0,
                ..base
            },
            Perception::Line => Self {
                horizontal_only: true,
                damage_reduction: 0.5,
                blocks_axis: Some(AttackAxis::Vertical),
                drain: 8.0,
                activation_cost: 5.0,
                ..base
            },
            Perception::Plane => base,
            Perception::Volume => Self {
                can_phase: true,
                damage_reduction: 0.25,
                drain: 12.0,
                activation_cost: 10.0,
                ..base
            },
            Perception::Hyper => Self {
                can_phase: true,
                damage_reduction: 0.3,
                sees_trajectories: true,
                time_dilation: 0.6,
                drain: 20.0,
                activation_cost: 25.0,
                ..base
            },
            Perception::Shifting => base,
            Perception::Fractured => Self {
                damage_reduction: -0.25,
                ..base
            },
        }
    }
}

/// Why a requested shift was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftError {
    AlreadyShifting,
    OnCooldown,
    SameState,
    NotEnoughEnergy,
}

impl std::fmt::Display for ShiftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShiftError::AlreadyShifting => "a shift is already in progress",
            ShiftError::OnCooldown => "shift on cooldown",
            ShiftError::SameState => "already in that perception",
            ShiftError::NotEnoughEnergy => "not enough perception energy",
        };
        f.write_str(s)
    }
}

/// How long a forced fracture lasts before perception heals back to Plane.
const FRACTURE_DURATION: f32 = 4.0;

/// Mutable perception state for one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionController {
    pub dimension: Dimension,
    pub current: Perception,
    target: Option<Perception>,
    shift_progress: f32,
    pub shift_cooldown: f32,
    pub energy: f32,
    pub max_energy: f32,

    pub transcendence: f32,
    pub transcendence_active: bool,
    transcendence_timer: f32,

    fracture_timer: f32,
    /// Movement axes flipped while positive (Invert attack)
    pub invert_timer: f32,
    /// Render-layer darkness while positive (Blind attack)
    pub blind_timer: f32,
}

impl PerceptionController {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            current: Perception::Plane,
            target: None,
            shift_progress: 0.0,
            shift_cooldown: 0.0,
            energy: MAX_PERCEPTION_ENERGY,
            max_energy: MAX_PERCEPTION_ENERGY,
            transcendence: 0.0,
            transcendence_active: false,
            transcendence_timer: 0.0,
            fracture_timer: 0.0,
            invert_timer: 0.0,
            blind_timer: 0.0,
        }
    }

    pub fn is_shifting(&self) -> bool {
        self.target.is_some()
    }

    /// The state as presented to rendering and to the enemy AI:
    /// `Shifting` while a shift interpolates, otherwise the held state.
    pub fn display_state(&self) -> Perception {
        if self.is_shifting() {
            Perception::Shifting
        } else {
            self.current
        }
    }

    pub fn profile(&self) -> PerceptionProfile {
        PerceptionProfile::for_state(self.current)
    }

    /// Bullet time-scale for the held state (0.6 in Hyper).
    pub fn time_dilation(&self) -> f32 {
        self.profile().time_dilation
    }

    /// Request a shift. Validation happens up front; on success the cost is
    /// deducted immediately and the shift interpolates over ~0.33 s.
    pub fn start_shift(&mut self, target: Perception) -> Result<(), ShiftError> {
        if self.is_shifting() {
            return Err(ShiftError::AlreadyShifting);
        }
        if self.shift_cooldown > 0.0 {
            return Err(ShiftError::OnCooldown);
        }
        if target == self.current {
            return Err(ShiftError::SameState);
        }
        let cost = PerceptionProfile::for_state(target).activation_cost;
        if self.energy < cost {
            return Err(ShiftError::NotEnoughEnergy);
        }

        self.energy -= cost;
        self.target = Some(target);
        self.shift_progress = 0.0;
        Ok(())
    }

    /// Shift without cost, cooldown, or energy checks. Used when a wave
    /// demands a perception and by transcendence.
    pub fn force_shift(&mut self, target: Perception) {
        self.target = None;
        self.shift_progress = 0.0;
        self.current = target;
    }

    pub fn update(&mut self, dt: f32) {
        if self.shift_cooldown > 0.0 {
            self.shift_cooldown = (self.shift_cooldown - dt).max(0.0);
        }
        if self.invert_timer > 0.0 {
            self.invert_timer = (self.invert_timer - dt).max(0.0);
        }
        if self.blind_timer > 0.0 {
            self.blind_timer = (self.blind_timer - dt).max(0.0);
        }

        if let Some(target) = self.target {
            self.shift_progress += dt * SHIFT_RATE;
            if self.shift_progress >= 1.0 {
                self.current = target;
                self.target = None;
                self.shift_progress = 0.0;
                self.shift_cooldown = SHIFT_COOLDOWN;
            }
        }

        if self.transcendence_active {
            self.transcendence_timer -= dt;
            if self.transcendence_timer <= 0.0 {
                self.transcendence_active = false;
                self.transcendence_timer = 0.0;
                self.current = Perception::Plane;
            }
        }

        if self.current == Perception::Fractured {
            self.fracture_timer -= dt;
            if self.fracture_timer <= 0.0 {
                self.fracture_timer = 0.0;
                self.current = Perception::Plane;
            }
        }

        // Transcendence sustains Hyper for free
        let drain = if self.transcendence_active {
            0.0
        } else {
            self.profile().drain
        };
        if drain > 0.0 {
            self.energy -= drain * dt;
            if self.energy <= 0.0 {
                self.energy = 0.0;
                // Exhaustion snaps perception back with a doubled cooldown
                self.target = None;
                self.shift_progress = 0.0;
                self.current = Perception::Plane;
                self.shift_cooldown = SHIFT_COOLDOWN * 2.0;
            }
        } else if self.current == Perception::Plane && !self.is_shifting() {
            self.energy = (self.energy + ENERGY_REGEN_RATE * dt).min(self.max_energy);
        }
    }

    /// Charge the transcendence gauge from a graze, scaled by combo.
    pub fn add_transcendence(&mut self, combo: u32) {
        if self.transcendence_active {
            return;
        }
        let gain = TRANSCENDENCE_PER_GRAZE * (1.0 + 0.1 * combo as f32);
        self.transcendence = (self.transcendence + gain).min(TRANSCENDENCE_MAX);
    }

    pub fn can_transcend(&self) -> bool {
        !self.transcendence_active && self.transcendence >= TRANSCENDENCE_MAX
    }

    /// Spend a full gauge for a free Hyper window.
    pub fn activate_transcendence(&mut self) -> bool {
        if !self.can_transcend() {
            return false;
        }
        self.transcendence = 0.0;
        self.transcendence_active = true;
        self.transcendence_timer = TRANSCENDENCE_DURATION;
        self.force_shift(Perception::Hyper);
        true
    }

    // --- Enemy perception-attack hooks ---

    /// Step perception down one rung (Hyper→Volume→Plane→Line).
    pub fn collapse(&mut self) {
        self.target = None;
        self.shift_progress = 0.0;
        self.current = match self.current {
            Perception::Hyper => Perception::Volume,
            Perception::Volume => Perception::Plane,
            Perception::Plane | Perception::Shifting => Perception::Line,
            other => other,
        };
    }

    pub fn drain_energy(&mut self, amount: f32) {
        self.energy = (self.energy - amount).max(0.0);
    }

    pub fn fracture(&mut self, duration: f32) {
        self.target = None;
        self.shift_progress = 0.0;
        self.current = Perception::Fractured;
        self.fracture_timer = duration.max(FRACTURE_DURATION);
    }

    /// Lock shifting for the duration (the Lock attack).
    pub fn lock_shifts(&mut self, duration: f32) {
        self.shift_cooldown = self.shift_cooldown.max(duration);
    }

    pub fn invert_controls(&mut self, duration: f32) {
        self.invert_timer = self.invert_timer.max(duration);
    }

    pub fn blind(&mut self, duration: f32) {
        self.blind_timer = self.blind_timer.max(duration);
    }

    /// Integrate player movement for one frame.
    ///
    /// `scrub` drives the extra axis: depth in 3d fights, time in 4d.
    /// Returns whether the soul actually moved (for Orange/Cyan gating).
    pub fn apply_movement(
        &self,
        soul: &mut PlayerSoul,
        move_x: f32,
        move_y: f32,
        scrub: f32,
        dt: f32,
        bounds: (f32, f32, f32, f32),
    ) -> bool {
        let profile = self.profile();
        let rules = DimensionRules::for_dimension(self.dimension);

        let (mut mx, mut my) = (move_x, move_y);
        if self.invert_timer > 0.0 {
            mx = -mx;
            my = -my;
        }
        if !profile.can_move {
            mx = 0.0;
            my = 0.0;
        }
        if profile.horizontal_only || rules.horizontal_only {
            my = 0.0;
        }

        let speed = soul.speed * rules.speed_multiplier;
        let input = Vec2::new(mx, my);
        let desired = if input.length_squared() > 1.0 {
            input.normalize() * speed
        } else {
            input * speed
        };

        if rules.momentum > 0.0 {
            soul.velocity = soul.velocity * rules.momentum + desired * (1.0 - rules.momentum);
        } else {
            soul.velocity = desired;
        }
        soul.pos += soul.velocity * dt;

        if rules.has_depth {
            soul.depth = (soul.depth + scrub * DEPTH_SHIFT_SPEED * dt).clamp(0.0, 1.0);
        }
        if rules.has_time {
            soul.time_position = (soul.time_position + scrub * dt)
                .clamp(-TIME_SCRUB_RANGE, TIME_SCRUB_RANGE);
        }

        let (min_x, min_y, max_x, max_y) = bounds;
        if rules.wraps {
            soul.pos.x = wrap_range(soul.pos.x, min_x, max_x);
            soul.pos.y = wrap_range(soul.pos.y, min_y, max_y);
        } else {
            soul.pos.x = soul.pos.x.clamp(min_x + soul.radius, max_x - soul.radius);
            soul.pos.y = soul.pos.y.clamp(min_y + soul.radius, max_y - soul.radius);
        }

        soul.velocity.length_squared() > 1.0
    }

    /// Full collision gate: dimensional rules, perception immunity, kind
    /// gating, then damage scaling. Returns the damage to apply, or `None`
    /// if the bullet cannot hit.
    pub fn bullet_damage(
        &self,
        bullet: &Bullet,
        soul: &PlayerSoul,
        soul_moving: bool,
    ) -> Option<i32> {
        let profile = self.profile();
        if profile.invulnerable {
            return None;
        }
        // Telegraph bullets are visual only
        if bullet.damage <= 0 {
            return None;
        }

        let rules = DimensionRules::for_dimension(self.dimension);
        if rules.has_depth && (bullet.depth_layer - soul.depth).abs() > DEPTH_COLLISION_WINDOW {
            return None;
        }
        if rules.has_time && !bullet.exists_at_time(soul.time_position) {
            return None;
        }
        if profile.blocks_axis == Some(bullet.attack_axis) {
            return None;
        }
        if !bullet.check_hit(soul, soul_moving) {
            return None;
        }

        let scaled = bullet.damage as f32 * (1.0 - profile.damage_reduction);
        Some((scaled.round() as i32).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    const BOUNDS: (f32, f32, f32, f32) = (-150.0, -75.0, 150.0, 75.0);

    #[test]
    fn test_shift_rejected_without_energy() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.energy = 10.0;
        // Hyper costs 25: rejected, energy untouched
        assert_eq!(
            pc.start_shift(Perception::Hyper),
            Err(ShiftError::NotEnoughEnergy)
        );
        assert_eq!(pc.energy, 10.0);
        // Line costs 5: accepted
        assert!(pc.start_shift(Perception::Line).is_ok());
        assert_eq!(pc.energy, 5.0);
    }

    #[test]
    fn test_shift_completes_then_cools_down() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.start_shift(Perception::Volume).unwrap();
        assert_eq!(pc.display_state(), Perception::Shifting);

        // ~0.33 s at SHIFT_RATE 3.0
        for _ in 0..25 {
            pc.update(1.0 / 60.0);
        }
        assert_eq!(pc.current, Perception::Volume);
        assert!(pc.shift_cooldown > 0.0);
        assert_eq!(
            pc.start_shift(Perception::Plane),
            Err(ShiftError::OnCooldown)
        );
    }

    #[test]
    fn test_shift_rejected_while_shifting_or_same() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        assert_eq!(
            pc.start_shift(Perception::Plane),
            Err(ShiftError::SameState)
        );
        pc.start_shift(Perception::Line).unwrap();
        assert_eq!(
            pc.start_shift(Perception::Volume),
            Err(ShiftError::AlreadyShifting)
        );
    }

    #[test]
    fn test_exhaustion_forces_plane_with_double_cooldown() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.force_shift(Perception::Point);
        pc.energy = 1.0;
        pc.update(0.1); // Point drains 25/s
        assert_eq!(pc.current, Perception::Plane);
        assert_eq!(pc.energy, 0.0);
        assert!((pc.shift_cooldown - SHIFT_COOLDOWN * 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_energy_regenerates_only_in_plane() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.energy = 50.0;
        pc.update(1.0);
        assert!((pc.energy - 60.0).abs() < 1e-3);

        pc.force_shift(Perception::Line);
        let e = pc.energy;
        pc.update(1.0);
        assert!(pc.energy < e);
    }

    #[test]
    fn test_point_is_invulnerable() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.force_shift(Perception::Point);
        let bullet = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        let soul = PlayerSoul::default();
        assert_eq!(pc.bullet_damage(&bullet, &soul, false), None);
    }

    #[test]
    fn test_line_blocks_vertical_attacks_and_halves_damage() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.force_shift(Perception::Line);
        let soul = PlayerSoul::default();

        let mut vertical = Bullet::new(Vec2::ZERO, Vec2::new(0.0, 100.0));
        vertical.attack_axis = AttackAxis::Vertical;
        assert_eq!(pc.bullet_damage(&vertical, &soul, false), None);

        let mut horizontal = Bullet::new(Vec2::ZERO, Vec2::new(100.0, 0.0));
        horizontal.attack_axis = AttackAxis::Horizontal;
        horizontal.damage = 10;
        assert_eq!(pc.bullet_damage(&horizontal, &soul, false), Some(5));
    }

    #[test]
    fn test_fractured_takes_extra_damage() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.fracture(4.0);
        let mut bullet = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        bullet.damage = 8;
        let soul = PlayerSoul::default();
        assert_eq!(pc.bullet_damage(&bullet, &soul, false), Some(10));
    }

    #[test]
    fn test_fracture_heals_back_to_plane() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.fracture(4.0);
        assert_eq!(pc.current, Perception::Fractured);
        for _ in 0..300 {
            pc.update(1.0 / 60.0);
        }
        assert_eq!(pc.current, Perception::Plane);
    }

    #[test]
    fn test_depth_window_gates_3d_collisions() {
        let pc = PerceptionController::new(Dimension::ThreeD);
        let mut soul = PlayerSoul::default();
        soul.depth = 0.0;
        let mut bullet = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        bullet.depth_layer = 0.5;
        assert_eq!(pc.bullet_damage(&bullet, &soul, false), None);

        bullet.depth_layer = 0.1;
        assert!(pc.bullet_damage(&bullet, &soul, false).is_some());
    }

    #[test]
    fn test_temporal_window_gates_4d_collisions() {
        let pc = PerceptionController::new(Dimension::FourD);
        let soul = PlayerSoul::default();
        let mut bullet = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        bullet.active_time = Some((1.0, 2.0));
        assert_eq!(pc.bullet_damage(&bullet, &soul, false), None);
    }

    #[test]
    fn test_point_cannot_move() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.force_shift(Perception::Point);
        let mut soul = PlayerSoul::default();
        let moved = pc.apply_movement(&mut soul, 1.0, 0.0, 0.0, 0.1, BOUNDS);
        assert!(!moved);
        assert_eq!(soul.pos, Vec2::ZERO);
    }

    #[test]
    fn test_one_d_is_horizontal_with_momentum() {
        let pc = PerceptionController::new(Dimension::OneD);
        let mut soul = PlayerSoul::default();
        pc.apply_movement(&mut soul, 1.0, 1.0, 0.0, 0.1, BOUNDS);
        assert!(soul.pos.x > 0.0);
        assert_eq!(soul.pos.y, 0.0);
        // Momentum carries after input stops
        pc.apply_movement(&mut soul, 0.0, 0.0, 0.0, 0.1, BOUNDS);
        assert!(soul.velocity.x > 0.0);
    }

    #[test]
    fn test_four_d_wraps_at_edges() {
        let pc = PerceptionController::new(Dimension::FourD);
        let mut soul = PlayerSoul::default();
        soul.pos = Vec2::new(149.0, 0.0);
        soul.speed = 200.0;
        pc.apply_movement(&mut soul, 1.0, 0.0, 0.0, 0.5, BOUNDS);
        assert!(soul.pos.x < 0.0);
    }

    #[test]
    fn test_inverted_controls_flip_movement() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.invert_controls(2.0);
        let mut soul = PlayerSoul::default();
        pc.apply_movement(&mut soul, 1.0, 0.0, 0.0, 0.1, BOUNDS);
        assert!(soul.pos.x < 0.0);
    }

    #[test]
    fn test_transcendence_charges_and_activates() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        assert!(!pc.activate_transcendence());
        for _ in 0..100 {
            pc.add_transcendence(0);
        }
        assert!(pc.can_transcend());
        assert!(pc.activate_transcendence());
        assert_eq!(pc.current, Perception::Hyper);
        assert_eq!(pc.transcendence, 0.0);

        // Hyper is free while transcendent
        let e = pc.energy;
        pc.update(1.0);
        assert!(pc.energy >= e - 1e-3);

        for _ in 0..400 {
            pc.update(1.0 / 60.0);
        }
        assert!(!pc.transcendence_active);
        assert_eq!(pc.current, Perception::Plane);
    }

    #[test]
    fn test_collapse_steps_down_one_rung() {
        let mut pc = PerceptionController::new(Dimension::TwoD);
        pc.force_shift(Perception::Hyper);
        pc.collapse();
        assert_eq!(pc.current, Perception::Volume);
        pc.collapse();
        assert_eq!(pc.current, Perception::Plane);
        pc.collapse();
        assert_eq!(pc.current, Perception::Line);
        pc.collapse();
        assert_eq!(pc.current, Perception::Line);
    }
}
