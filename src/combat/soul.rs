//! The player's soul and the dodge box it lives in

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::approach;
use crate::consts::*;

/// The bounded arena in which the soul dodges bullets.
///
/// Resizes smoothly toward a target rect; attack phases may reshape it
/// (1d fights flatten it to a strip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub target_width: f32,
    pub target_height: f32,
}

impl Default for BattleBox {
    fn default() -> Self {
        let mut b = Self {
            x: -BOX_WIDTH / 2.0,
            y: -BOX_HEIGHT / 2.0,
            width: BOX_WIDTH,
            height: BOX_HEIGHT,
            target_x: 0.0,
            target_y: 0.0,
            target_width: 0.0,
            target_height: 0.0,
        };
        b.target_x = b.x;
        b.target_y = b.y;
        b.target_width = b.width;
        b.target_height = b.height;
        b
    }
}

impl BattleBox {
    /// `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn set_target(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.target_x = x;
        self.target_y = y;
        self.target_width = width;
        self.target_height = height;
    }

    /// Keep the center fixed while animating toward a new size.
    pub fn set_target_size(&mut self, width: f32, height: f32) {
        let c = self.center();
        self.set_target(c.x - width / 2.0, c.y - height / 2.0, width, height);
    }

    pub fn update(&mut self, dt: f32) {
        self.x = approach(self.x, self.target_x, BOX_ANIM_SPEED, dt);
        self.y = approach(self.y, self.target_y, BOX_ANIM_SPEED, dt);
        self.width = approach(self.width, self.target_width, BOX_ANIM_SPEED, dt);
        self.height = approach(self.height, self.target_height, BOX_ANIM_SPEED, dt);
    }

    pub fn snap_to_target(&mut self) {
        self.x = self.target_x;
        self.y = self.target_y;
        self.width = self.target_width;
        self.height = self.target_height;
    }
}

/// The player's avatar inside the dodge box.
///
/// Position is integrated by the perception controller, which owns the
/// dimension- and perception-dependent movement rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSoul {
    pub pos: Vec2,
    pub radius: f32,
    pub speed: f32,
    /// Carried velocity for dimensions with momentum (1d)
    pub velocity: Vec2,
    /// Depth layer in 3d fights (0 = foreground, 1 = background)
    pub depth: f32,
    /// Time-scrub position in 4d fights (seconds, relative)
    pub time_position: f32,
    pub invincible: bool,
    invincible_timer: f32,
}

impl Default for PlayerSoul {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            radius: SOUL_RADIUS,
            speed: SOUL_SPEED,
            velocity: Vec2::ZERO,
            depth: 0.5,
            time_position: 0.0,
            invincible: false,
            invincible_timer: 0.0,
        }
    }
}

impl PlayerSoul {
    /// Tick the invulnerability window.
    pub fn update(&mut self, dt: f32) {
        if self.invincible {
            self.invincible_timer -= dt;
            if self.invincible_timer <= 0.0 {
                self.invincible = false;
                self.invincible_timer = 0.0;
            }
        }
    }

    pub fn make_invincible(&mut self, duration: Option<f32>) {
        self.invincible = true;
        self.invincible_timer = duration.unwrap_or(SOUL_INVINCIBLE_DURATION);
    }

    /// Reset dodge-phase state and recenter in the box.
    pub fn reset(&mut self, box_center: Vec2) {
        self.pos = box_center;
        self.velocity = Vec2::ZERO;
        self.depth = 0.5;
        self.time_position = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_animates_toward_target() {
        let mut b = BattleBox::default();
        b.set_target_size(100.0, 100.0);
        let w0 = b.width;
        for _ in 0..120 {
            b.update(1.0 / 60.0);
        }
        assert!(b.width < w0);
        assert!((b.width - 100.0).abs() < 5.0);
    }

    #[test]
    fn test_box_snap() {
        let mut b = BattleBox::default();
        b.set_target(-50.0, -20.0, 100.0, 40.0);
        b.snap_to_target();
        assert_eq!(b.bounds(), (-50.0, -20.0, 50.0, 20.0));
    }

    #[test]
    fn test_invincibility_expires() {
        let mut soul = PlayerSoul::default();
        soul.make_invincible(Some(0.5));
        assert!(soul.invincible);
        soul.update(0.3);
        assert!(soul.invincible);
        soul.update(0.3);
        assert!(!soul.invincible);
    }
}
