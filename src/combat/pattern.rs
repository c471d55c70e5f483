//! Attack patterns, waves, and sequences
//!
//! A `Pattern` is a batch of bullets released all at once or fed out on a
//! spawn interval. A `Wave` groups patterns under a delay and duration, and
//! a `Sequence` plays waves in order. Generators build the concrete bullet
//! layouts, including the dimension-specific patterns (1d sweeps, 3d depth
//! layers, 4d temporal windows).

use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bullet::{AttackAxis, Bullet, BulletKind};
use super::perception::{Dimension, Perception};

/// Every attack pattern the engine can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    // Generic
    CircleBurst,
    Spiral,
    Wall,
    AimedShot,
    SineWave,
    BouncingBullets,
    HomingAttack,
    GravityDrop,
    // 1d
    LineSweep,
    ConvergingPoints,
    SegmentWave,
    // 2d
    TriangleFormation,
    SquareGrid,
    CircleSpiral,
    // 3d
    DepthWave,
    PhasingCubes,
    ShadowAssault,
    // 4d
    TemporalBurst,
    PastEcho,
    FutureConvergence,
}

impl PatternId {
    /// The native pattern pool of a fight dimension.
    pub fn pool(dimension: Dimension) -> &'static [PatternId] {
        match dimension {
            Dimension::OneD => &[
                PatternId::LineSweep,
                PatternId::ConvergingPoints,
                PatternId::SegmentWave,
            ],
            Dimension::TwoD => &[
                PatternId::TriangleFormation,
                PatternId::SquareGrid,
                PatternId::CircleSpiral,
                PatternId::CircleBurst,
                PatternId::Spiral,
                PatternId::AimedShot,
            ],
            Dimension::ThreeD => &[
                PatternId::DepthWave,
                PatternId::PhasingCubes,
                PatternId::ShadowAssault,
            ],
            Dimension::FourD => &[
                PatternId::TemporalBurst,
                PatternId::PastEcho,
                PatternId::FutureConvergence,
            ],
        }
    }
}

/// A batch of bullets released together or on a timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pending: VecDeque<Bullet>,
    /// Seconds between releases; 0 releases everything on the first update
    pub spawn_interval: f32,
    spawn_timer: f32,
}

impl Pattern {
    pub fn new(bullets: Vec<Bullet>, spawn_interval: f32) -> Self {
        Self {
            pending: bullets.into(),
            spawn_interval,
            spawn_timer: 0.0,
        }
    }

    pub fn completed(&self) -> bool {
        self.pending.is_empty()
    }

    /// Release due bullets into `out`. Timed patterns catch up if `dt`
    /// covers several intervals.
    pub fn update(&mut self, dt: f32, out: &mut Vec<Bullet>) {
        if self.pending.is_empty() {
            return;
        }
        if self.spawn_interval <= 0.0 {
            out.extend(self.pending.drain(..));
            return;
        }
        self.spawn_timer += dt;
        while self.spawn_timer >= self.spawn_interval {
            match self.pending.pop_front() {
                Some(b) => out.push(b),
                None => break,
            }
            self.spawn_timer -= self.spawn_interval;
        }
    }
}

/// One wave of an attack: patterns plus timing and presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub patterns: Vec<Pattern>,
    pub duration: f32,
    /// Seconds before the wave starts releasing bullets
    pub delay: f32,
    /// Perception the player is snapped to when the wave starts
    pub required_perception: Option<Perception>,
    pub dialogue: Option<String>,
    elapsed: f32,
}

impl Wave {
    pub fn new(patterns: Vec<Pattern>, duration: f32, delay: f32) -> Self {
        Self {
            patterns,
            duration,
            delay,
            required_perception: None,
            dialogue: None,
            elapsed: 0.0,
        }
    }

    pub fn started(&self) -> bool {
        self.elapsed >= self.delay
    }

    pub fn finished(&self) -> bool {
        self.elapsed >= self.delay + self.duration && self.patterns.iter().all(Pattern::completed)
    }

    pub fn update(&mut self, dt: f32, out: &mut Vec<Bullet>) {
        self.elapsed += dt;
        if !self.started() {
            return;
        }
        for p in &mut self.patterns {
            p.update(dt, out);
        }
    }
}

/// An ordered list of waves forming one full enemy attack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sequence {
    pub waves: Vec<Wave>,
    current: usize,
}

impl Sequence {
    pub fn new(waves: Vec<Wave>) -> Self {
        Self { waves, current: 0 }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_wave(&self) -> Option<&Wave> {
        self.waves.get(self.current)
    }

    pub fn completed(&self) -> bool {
        self.current >= self.waves.len()
    }

    /// Total scheduled play time across all waves.
    pub fn total_duration(&self) -> f32 {
        self.waves.iter().map(|w| w.delay + w.duration).sum()
    }

    pub fn update(&mut self, dt: f32, out: &mut Vec<Bullet>) {
        let Some(wave) = self.waves.get_mut(self.current) else {
            return;
        };
        wave.update(dt, out);
        if wave.finished() {
            self.current += 1;
        }
    }
}

fn center(bounds: (f32, f32, f32, f32)) -> Vec2 {
    Vec2::new((bounds.0 + bounds.2) / 2.0, (bounds.1 + bounds.3) / 2.0)
}

fn radial(origin: Vec2, angle: f32, speed: f32) -> Bullet {
    Bullet::new(origin, Vec2::new(angle.cos(), angle.sin()) * speed)
}

/// Build the full attack sequence for a pattern id.
///
/// `soul_pos` lets aimed patterns target the player's position at the
/// moment the attack starts.
pub fn build_sequence<R: Rng>(
    id: PatternId,
    bounds: (f32, f32, f32, f32),
    soul_pos: Vec2,
    duration: f32,
    difficulty: f32,
    rng: &mut R,
) -> Sequence {
    let (min_x, min_y, max_x, max_y) = bounds;
    let c = center(bounds);
    let scale = |n: f32| ((n * difficulty).round() as usize).max(1);

    let waves = match id {
        PatternId::CircleBurst => {
            // Pulsing rings with a drifting firing angle
            let rings = scale(3.0);
            (0..rings)
                .map(|i| {
                    let count = scale(12.0);
                    let bullets = (0..count)
                        .map(|j| {
                            let angle = TAU * j as f32 / count as f32 + i as f32 * 0.3;
                            radial(c, angle, 150.0 * difficulty)
                        })
                        .collect();
                    Wave::new(
                        vec![Pattern::new(bullets, 0.0)],
                        duration / rings as f32,
                        i as f32 * 0.5,
                    )
                })
                .collect()
        }
        PatternId::Spiral => {
            let count = scale(24.0);
            let bullets = (0..count)
                .map(|i| radial(c, i as f32 * 0.5, 120.0 * difficulty))
                .collect();
            vec![Wave::new(
                vec![Pattern::new(bullets, 0.08 / difficulty)],
                duration,
                0.0,
            )]
        }
        PatternId::Wall => {
            // Vertical walls sweeping across, alternating sides
            let sweeps = 3;
            (0..sweeps)
                .map(|i| {
                    let dir = if i % 2 == 0 { 1.0 } else { -1.0 };
                    let x = if dir > 0.0 { min_x } else { max_x };
                    let count = scale(8.0);
                    let bullets = (0..count)
                        .map(|j| {
                            let t = j as f32 / (count.max(2) - 1) as f32;
                            let mut b = Bullet::new(
                                Vec2::new(x, min_y + (max_y - min_y) * t),
                                Vec2::new(200.0 * dir * difficulty, 0.0),
                            );
                            b.attack_axis = AttackAxis::Horizontal;
                            b
                        })
                        .collect();
                    Wave::new(
                        vec![Pattern::new(bullets, 0.0)],
                        duration / sweeps as f32,
                        i as f32 * 0.8,
                    )
                })
                .collect()
        }
        PatternId::AimedShot => {
            let origin = Vec2::new(c.x, min_y);
            let count = scale(5.0);
            let base = (soul_pos - origin).to_angle();
            let bullets = (0..count)
                .map(|i| {
                    let offset = (i as f32 - (count as f32 - 1.0) / 2.0) * 0.5 / count as f32;
                    radial(origin, base + offset, 150.0 * difficulty)
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::SineWave => {
            let count = scale(12.0);
            let bullets = (0..count)
                .map(|i| {
                    let mut b =
                        Bullet::new(Vec2::new(min_x, c.y), Vec2::new(120.0 * difficulty, 0.0));
                    b.wave_amplitude = 30.0;
                    b.wave_frequency = 5.0;
                    b.wave_offset = i as f32 * 0.5;
                    b.attack_axis = AttackAxis::Horizontal;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.15)], duration, 0.0)]
        }
        PatternId::BouncingBullets => {
            let count = scale(5.0);
            let bullets = (0..count)
                .map(|_| {
                    let angle = rng.random_range(0.0..TAU);
                    let pos = Vec2::new(
                        rng.random_range(min_x + 20.0..max_x - 20.0),
                        rng.random_range(min_y + 20.0..max_y - 20.0),
                    );
                    let mut b = radial(pos, angle, 180.0 * difficulty);
                    b.pos = pos;
                    b.bounces = true;
                    b.bounces_remaining = 4;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::HomingAttack => {
            let origin = Vec2::new(c.x, min_y);
            let count = scale(3.0);
            let bullets = (0..count)
                .map(|_| {
                    let angle = rng.random_range(0.0..TAU);
                    let mut b = radial(origin, angle, 80.0);
                    b.kind = BulletKind::Purple;
                    b.homing = true;
                    b.homing_strength = 3.0;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.5)], duration, 0.0)]
        }
        PatternId::GravityDrop => {
            let count = scale(8.0);
            let spacing = (max_x - min_x) / (count + 1) as f32;
            let bullets = (0..count)
                .map(|i| {
                    let x = min_x + spacing * (i + 1) as f32;
                    let mut b = Bullet::new(
                        Vec2::new(x, min_y),
                        Vec2::new(rng.random_range(-20.0..20.0), 0.0),
                    );
                    b.kind = BulletKind::Blue;
                    b.gravity_affected = true;
                    b.gravity = 300.0;
                    b.attack_axis = AttackAxis::Vertical;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.1)], duration, 0.0)]
        }
        PatternId::LineSweep => {
            let lines = scale(3.0);
            let bullets = (0..lines)
                .map(|i| {
                    let y = min_y + (max_y - min_y) * (i + 1) as f32 / (lines + 1) as f32;
                    let dir = if i % 2 == 0 { 1.0 } else { -1.0 };
                    let x = if dir > 0.0 { min_x } else { max_x };
                    let mut b = Bullet::new(
                        Vec2::new(x, y),
                        Vec2::new(200.0 * dir * difficulty, 0.0),
                    );
                    b.attack_axis = AttackAxis::Horizontal;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::ConvergingPoints => {
            let count = scale(8.0);
            let bullets = (0..count)
                .map(|i| {
                    let side = if i % 2 == 0 { 1.0 } else { -1.0 };
                    let x = if side > 0.0 { min_x } else { max_x };
                    let y_offset = rng.random_range(-30.0..30.0);
                    let mut b = Bullet::new(
                        Vec2::new(x, c.y + y_offset),
                        Vec2::new(180.0 * side * difficulty, -y_offset * 2.0),
                    );
                    b.radius = 6.0;
                    b.attack_axis = AttackAxis::Horizontal;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::SegmentWave => {
            let count = scale(5.0);
            let bullets = (0..count)
                .map(|i| {
                    let mut b = Bullet::new(
                        Vec2::new(min_x - 20.0 - i as f32 * 50.0, c.y),
                        Vec2::new(150.0 * difficulty, 0.0),
                    );
                    b.radius = 15.0;
                    b.attack_axis = AttackAxis::Horizontal;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::TriangleFormation => {
            let triangles = scale(3.0);
            let mut bullets = Vec::with_capacity(triangles * 3);
            for t in 0..triangles {
                let offset = t as f32 * TAU / triangles as f32;
                for i in 0..3 {
                    let angle = offset + i as f32 * TAU / 3.0;
                    let mut b = radial(c, angle, 160.0 * difficulty);
                    b.spinning = true;
                    b.spin_speed = 5.0;
                    bullets.push(b);
                }
            }
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::SquareGrid => {
            let grid = scale(3.0);
            let spacing = (max_x - min_x).min(max_y - min_y) / (grid + 1) as f32;
            let mut bullets = Vec::with_capacity(grid * grid);
            for i in 0..grid {
                for j in 0..grid {
                    let pos = Vec2::new(
                        min_x + spacing * (i + 1) as f32,
                        min_y + spacing * (j + 1) as f32,
                    );
                    let angle = rng.random_range(0.0..TAU);
                    let mut b = radial(pos, angle, 80.0 * difficulty);
                    b.pos = pos;
                    b.radius = 10.0;
                    bullets.push(b);
                }
            }
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::CircleSpiral => {
            let count = scale(16.0);
            let bullets = (0..count)
                .map(|i| {
                    let speed = (120.0 + i as f32 * 5.0) * difficulty;
                    radial(c, i as f32 * 0.5, speed)
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.05)], duration, 0.0)]
        }
        PatternId::DepthWave => {
            // Rings at three depth layers
            let mut bullets = Vec::new();
            for layer in [0.0, 0.5, 1.0] {
                let count = scale(6.0);
                for i in 0..count {
                    let angle = TAU * i as f32 / count as f32;
                    let mut b = radial(c, angle, 140.0 * difficulty);
                    b.depth_layer = layer;
                    bullets.push(b);
                }
            }
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::PhasingCubes => {
            let count = scale(8.0);
            let layers = [0.0, 0.5, 1.0];
            let bullets = (0..count)
                .map(|_| {
                    let pos = c + Vec2::new(
                        rng.random_range(-50.0..50.0),
                        rng.random_range(-50.0..50.0),
                    );
                    let angle = rng.random_range(0.0..TAU);
                    let mut b = radial(pos, angle, 100.0 * difficulty);
                    b.pos = pos;
                    b.depth_layer = layers[rng.random_range(0..layers.len())];
                    b.radius = 12.0;
                    b.spinning = true;
                    b.spin_speed = 3.0;
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::ShadowAssault => {
            // Background telegraph column, then the real foreground bullet
            let count = scale(10.0);
            let mut bullets = Vec::with_capacity(count * 2);
            for _ in 0..count {
                let x = rng.random_range(min_x + 20.0..max_x - 20.0);
                let mut telegraph = Bullet::new(
                    Vec2::new(x, min_y - 10.0),
                    Vec2::new(0.0, 200.0 * difficulty),
                );
                telegraph.depth_layer = 1.0;
                telegraph.damage = 0;
                telegraph.attack_axis = AttackAxis::Vertical;
                bullets.push(telegraph);

                let mut real = Bullet::new(
                    Vec2::new(x, min_y - 60.0),
                    Vec2::new(0.0, 200.0 * difficulty),
                );
                real.depth_layer = 0.0;
                real.attack_axis = AttackAxis::Vertical;
                bullets.push(real);
            }
            let mut wave = Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0);
            wave.required_perception = Some(Perception::Volume);
            vec![wave]
        }
        PatternId::TemporalBurst => {
            let count = scale(12.0);
            let bullets = (0..count)
                .map(|i| {
                    let angle = TAU * i as f32 / count as f32;
                    let start = (i % 3) as f32 * 0.5;
                    let mut b = radial(c, angle, 150.0 * difficulty);
                    b.active_time = Some((start, start + 2.0));
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
        PatternId::PastEcho => {
            // Each source echoes three times across the scrub range
            let count = scale(6.0);
            let mut bullets = Vec::with_capacity(count * 3);
            for _ in 0..count {
                let pos = Vec2::new(
                    rng.random_range(min_x..max_x),
                    rng.random_range(min_y..max_y),
                );
                let vel = Vec2::new(
                    rng.random_range(-100.0..100.0) * difficulty,
                    rng.random_range(-100.0..100.0) * difficulty,
                );
                for phase in [0.0, 1.0, 2.0] {
                    let mut b = Bullet::new(pos, vel);
                    b.active_time = Some((phase - 2.0, phase - 1.2));
                    bullets.push(b);
                }
            }
            let mut wave = Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0);
            wave.required_perception = Some(Perception::Hyper);
            vec![wave]
        }
        PatternId::FutureConvergence => {
            // Spiral inward from a ring outside the box
            let count = scale(8.0);
            let bullets = (0..count)
                .map(|i| {
                    let angle = TAU * i as f32 / count as f32;
                    let pos = c + Vec2::new(angle.cos(), angle.sin()) * 200.0;
                    let mut b = Bullet::new(
                        pos,
                        -Vec2::new(angle.cos(), angle.sin()) * 100.0 * difficulty,
                    );
                    b.active_time = Some((0.0, 2.0));
                    b
                })
                .collect();
            vec![Wave::new(vec![Pattern::new(bullets, 0.0)], duration, 0.0)]
        }
    };

    Sequence::new(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const BOUNDS: (f32, f32, f32, f32) = (-150.0, -75.0, 150.0, 75.0);

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(7)
    }

    #[test]
    fn test_instant_pattern_releases_everything_at_once() {
        let bullets = vec![Bullet::default(); 5];
        let mut p = Pattern::new(bullets, 0.0);
        let mut out = Vec::new();
        p.update(1.0 / 60.0, &mut out);
        assert_eq!(out.len(), 5);
        assert!(p.completed());
    }

    #[test]
    fn test_timed_pattern_catches_up() {
        let bullets = vec![Bullet::default(); 10];
        let mut p = Pattern::new(bullets, 0.1);
        let mut out = Vec::new();
        // One large step covers three intervals
        p.update(0.35, &mut out);
        assert_eq!(out.len(), 3);
        p.update(0.1, &mut out);
        assert_eq!(out.len(), 4);
        assert!(!p.completed());
    }

    #[test]
    fn test_wave_delay_holds_bullets() {
        let mut w = Wave::new(vec![Pattern::new(vec![Bullet::default()], 0.0)], 2.0, 0.5);
        let mut out = Vec::new();
        w.update(0.3, &mut out);
        assert!(out.is_empty());
        w.update(0.3, &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_sequence_advances_through_waves() {
        let w1 = Wave::new(vec![Pattern::new(vec![Bullet::default()], 0.0)], 0.5, 0.0);
        let w2 = Wave::new(vec![Pattern::new(vec![Bullet::default()], 0.0)], 0.5, 0.0);
        let mut seq = Sequence::new(vec![w1, w2]);
        let mut out = Vec::new();

        seq.update(0.6, &mut out);
        assert_eq!(seq.current_index(), 1);
        assert!(!seq.completed());
        seq.update(0.6, &mut out);
        assert!(seq.completed());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_one_d_patterns_are_horizontal() {
        let mut r = rng();
        for id in PatternId::pool(Dimension::OneD) {
            let mut seq = build_sequence(*id, BOUNDS, Vec2::ZERO, 3.0, 1.0, &mut r);
            let mut out = Vec::new();
            seq.update(0.1, &mut out);
            assert!(!out.is_empty(), "{id:?} produced no bullets");
            for b in &out {
                assert_eq!(b.attack_axis, AttackAxis::Horizontal, "{id:?}");
                assert!(b.vel.x != 0.0, "{id:?} bullet has no horizontal travel");
            }
        }
    }

    #[test]
    fn test_four_d_patterns_carry_temporal_windows() {
        let mut r = rng();
        for id in PatternId::pool(Dimension::FourD) {
            let mut seq = build_sequence(*id, BOUNDS, Vec2::ZERO, 3.0, 1.0, &mut r);
            let mut out = Vec::new();
            seq.update(0.1, &mut out);
            assert!(out.iter().all(|b| b.active_time.is_some()), "{id:?}");
        }
    }

    #[test]
    fn test_depth_wave_spans_layers() {
        let mut r = rng();
        let mut seq = build_sequence(PatternId::DepthWave, BOUNDS, Vec2::ZERO, 3.0, 1.0, &mut r);
        let mut out = Vec::new();
        seq.update(0.1, &mut out);
        let layers: std::collections::HashSet<_> =
            out.iter().map(|b| (b.depth_layer * 2.0) as i32).collect();
        assert_eq!(layers.len(), 3);
    }

    #[test]
    fn test_every_pattern_generates_bullets() {
        let mut r = rng();
        for dim in [
            Dimension::OneD,
            Dimension::TwoD,
            Dimension::ThreeD,
            Dimension::FourD,
        ] {
            for id in PatternId::pool(dim) {
                let mut seq = build_sequence(*id, BOUNDS, Vec2::new(10.0, 5.0), 4.0, 1.0, &mut r);
                let mut out = Vec::new();
                // Multi-wave sequences run their waves back to back, so
                // give them well past the nominal duration
                for _ in 0..900 {
                    seq.update(1.0 / 60.0, &mut out);
                }
                assert!(!out.is_empty(), "{id:?} produced no bullets");
                assert!(seq.completed(), "{id:?} never completed");
            }
        }
    }
}
