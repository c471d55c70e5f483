//! Projectile simulation for the dodge phase
//!
//! Each bullet carries its own kinematic behaviors (homing, gravity, wave
//! motion, bouncing, spin) and a kind that gates when it can actually hit
//! the soul. Step order matters: homing steers velocity before gravity,
//! wave displacement is applied before integration, and bounds handling
//! runs last.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::soul::PlayerSoul;
use crate::consts::*;

/// Bullet kinds and their hit rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletKind {
    /// Always damages
    #[default]
    Normal,
    /// Damages only a stationary soul
    Orange,
    /// Damages only a moving soul
    Cyan,
    /// Never damages; the session converts overlap into a heal
    Green,
    /// Can be destroyed by player projectiles (renderer concern; damages normally)
    Yellow,
    /// Homes toward the soul
    Purple,
    /// Falls with gravity
    Blue,
}

/// Which movement axis an attack travels along, for Line-perception blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackAxis {
    Horizontal,
    Vertical,
    #[default]
    Both,
}

/// A single projectile in the dodge box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    /// Session-assigned id, unique within one attack phase; grazes are
    /// counted once per id
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub kind: BulletKind,
    pub radius: f32,
    pub damage: i32,
    pub lifetime: f32,
    pub age: f32,

    // Behavior flags
    pub homing: bool,
    pub homing_strength: f32,
    pub gravity_affected: bool,
    pub gravity: f32,
    pub bounces: bool,
    pub bounces_remaining: u32,
    pub spinning: bool,
    pub spin_speed: f32,
    pub spin_angle: f32,

    // Wave motion (perpendicular to velocity)
    pub wave_amplitude: f32,
    pub wave_frequency: f32,
    pub wave_offset: f32,

    // Dimensional properties
    /// Depth layer for 3d fights (0 = foreground, 1 = background)
    pub depth_layer: f32,
    /// Travel axis, for Line-perception directional blocking
    pub attack_axis: AttackAxis,
    /// 4d fights: the bullet only exists inside this time window
    pub active_time: Option<(f32, f32)>,

    pub active: bool,
}

impl Default for Bullet {
    fn default() -> Self {
        Self {
            id: 0,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            kind: BulletKind::Normal,
            radius: BULLET_RADIUS,
            damage: BULLET_DAMAGE,
            lifetime: BULLET_LIFETIME,
            age: 0.0,
            homing: false,
            homing_strength: 2.0,
            gravity_affected: false,
            gravity: 200.0,
            bounces: false,
            bounces_remaining: 0,
            spinning: false,
            spin_speed: 0.0,
            spin_angle: 0.0,
            wave_amplitude: 0.0,
            wave_frequency: 0.0,
            wave_offset: 0.0,
            depth_layer: 0.5,
            attack_axis: AttackAxis::Both,
            active_time: None,
            active: true,
        }
    }
}

impl Bullet {
    pub fn new(pos: Vec2, vel: Vec2) -> Self {
        Self {
            pos,
            vel,
            ..Default::default()
        }
    }

    /// 4d temporal check: does this bullet exist at the given scrub time?
    pub fn exists_at_time(&self, time: f32) -> bool {
        match self.active_time {
            Some((start, end)) => (start..=end).contains(&time),
            None => true,
        }
    }

    /// Advance one frame. `dt` is already time-dilated by the session when
    /// the player is in Hyper perception.
    pub fn update(&mut self, dt: f32, soul_pos: Vec2, bounds: (f32, f32, f32, f32)) {
        if !self.active {
            return;
        }

        self.age += dt;
        if self.age >= self.lifetime {
            self.active = false;
            return;
        }

        // Homing steers velocity toward the soul
        if self.homing {
            let to_soul = soul_pos - self.pos;
            let dist = to_soul.length();
            if dist > 0.0 {
                self.vel += (to_soul / dist) * self.homing_strength * dt * 100.0;
            }
        }

        if self.gravity_affected {
            self.vel.y += self.gravity * dt;
        }

        // Wave motion displaces position perpendicular to the velocity
        if self.wave_amplitude > 0.0 {
            let offset =
                (self.age * self.wave_frequency + self.wave_offset).sin() * self.wave_amplitude;
            let speed = self.vel.length();
            if speed > 0.0 {
                let perp = Vec2::new(-self.vel.y, self.vel.x) / speed;
                self.pos += perp * offset * dt * 10.0;
            }
        }

        self.pos += self.vel * dt;

        if self.spinning {
            self.spin_angle += self.spin_speed * dt;
        }

        let (min_x, min_y, max_x, max_y) = bounds;
        if self.bounces && self.bounces_remaining > 0 {
            if self.pos.x < min_x || self.pos.x > max_x {
                self.vel.x = -self.vel.x;
                self.bounces_remaining -= 1;
                self.pos.x = self.pos.x.clamp(min_x, max_x);
            }
            if self.pos.y < min_y || self.pos.y > max_y {
                self.vel.y = -self.vel.y;
                self.bounces_remaining = self.bounces_remaining.saturating_sub(1);
                self.pos.y = self.pos.y.clamp(min_y, max_y);
            }
        } else {
            // Deactivate once fully clear of the box
            let margin = self.radius * 2.0;
            if self.pos.x <= min_x - margin
                || self.pos.x >= max_x + margin
                || self.pos.y <= min_y - margin
                || self.pos.y >= max_y + margin
            {
                self.active = false;
            }
        }
    }

    /// Raw hit test against the soul, gated by bullet kind. Dimensional
    /// rules (depth layers, temporal windows, perception immunity) are
    /// layered on top by the perception controller.
    pub fn check_hit(&self, soul: &PlayerSoul, soul_moving: bool) -> bool {
        if !self.active || soul.invincible {
            return false;
        }

        let dist = (self.pos - soul.pos).length();
        if dist >= self.radius + soul.radius {
            return false;
        }

        match self.kind {
            BulletKind::Orange => !soul_moving,
            BulletKind::Cyan => soul_moving,
            BulletKind::Green => false,
            _ => true,
        }
    }

    /// Overlap test ignoring kind gating; used for Green heal pickup.
    pub fn overlaps(&self, soul: &PlayerSoul) -> bool {
        self.active && (self.pos - soul.pos).length() < self.radius + soul.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: (f32, f32, f32, f32) = (-150.0, -75.0, 150.0, 75.0);

    #[test]
    fn test_lifetime_expiry() {
        let mut b = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        b.lifetime = 1.0;
        b.update(0.5, Vec2::ZERO, BOUNDS);
        assert!(b.active);
        b.update(0.6, Vec2::ZERO, BOUNDS);
        assert!(!b.active);
    }

    #[test]
    fn test_out_of_bounds_boundary() {
        // Exactly 2*radius past the edge: inactive
        let mut b = Bullet::new(Vec2::new(-150.0 - 16.0, 0.0), Vec2::ZERO);
        b.update(0.01, Vec2::ZERO, BOUNDS);
        assert!(!b.active);

        // One unit closer: still active
        let mut b = Bullet::new(Vec2::new(-150.0 - 15.0, 0.0), Vec2::ZERO);
        b.update(0.01, Vec2::ZERO, BOUNDS);
        assert!(b.active);
    }

    #[test]
    fn test_bounce_reflects_and_clamps() {
        let mut b = Bullet::new(Vec2::new(149.0, 0.0), Vec2::new(300.0, 0.0));
        b.bounces = true;
        b.bounces_remaining = 2;
        b.update(0.1, Vec2::ZERO, BOUNDS);
        assert!(b.active);
        assert!(b.vel.x < 0.0);
        assert!(b.pos.x <= 150.0);
        assert_eq!(b.bounces_remaining, 1);
    }

    #[test]
    fn test_homing_steers_toward_soul() {
        let mut b = Bullet::new(Vec2::ZERO, Vec2::new(0.0, 0.0));
        b.homing = true;
        b.homing_strength = 3.0;
        let soul_pos = Vec2::new(100.0, 0.0);
        b.update(0.1, soul_pos, BOUNDS);
        assert!(b.vel.x > 0.0);
        assert_eq!(b.vel.y, 0.0);
    }

    #[test]
    fn test_orange_requires_stationary_soul() {
        let b = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        let mut b = b;
        b.kind = BulletKind::Orange;
        let soul = PlayerSoul::default();
        assert!(b.check_hit(&soul, false));
        assert!(!b.check_hit(&soul, true));
    }

    #[test]
    fn test_cyan_requires_moving_soul() {
        let mut b = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        b.kind = BulletKind::Cyan;
        let soul = PlayerSoul::default();
        assert!(b.check_hit(&soul, true));
        assert!(!b.check_hit(&soul, false));
    }

    #[test]
    fn test_green_never_hits() {
        let mut b = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        b.kind = BulletKind::Green;
        let soul = PlayerSoul::default();
        assert!(!b.check_hit(&soul, false));
        assert!(!b.check_hit(&soul, true));
        assert!(b.overlaps(&soul));
    }

    #[test]
    fn test_invincible_soul_never_hit() {
        let b = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        let mut soul = PlayerSoul::default();
        soul.make_invincible(None);
        assert!(!b.check_hit(&soul, false));
    }

    #[test]
    fn test_temporal_window() {
        let mut b = Bullet::new(Vec2::ZERO, Vec2::ZERO);
        b.active_time = Some((0.5, 1.5));
        assert!(!b.exists_at_time(0.0));
        assert!(b.exists_at_time(1.0));
        assert!(!b.exists_at_time(2.0));
    }
}
