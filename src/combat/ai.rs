//! Dimension-aware enemy AI
//!
//! The AI layer sits between the enemy actor and the attack phase: it
//! watches the player's perception habits, fires perception-disrupting
//! attacks, picks patterns from the dimension's pool with counter-play
//! modifiers, and drives multi-phase boss escalation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::perception::{Dimension, Perception, PerceptionController};
use super::pattern::PatternId;

/// Behavioral archetypes, assigned from dimension and boss status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiArchetype {
    /// Attacks on rotation, no tactics
    Passive,
    /// Reacts to player perception
    Reactive,
    /// Overwhelms with difficulty scaling
    Aggressive,
    /// Counters the player's perception habits
    Tactical,
    /// Multi-phase escalation with every tool
    Boss,
}

/// Ways an enemy can disrupt the player's perception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerceptionAttackKind {
    /// Step the player down one perception rung
    Collapse,
    /// Flood the senses: drains energy and fractures
    Expand,
    /// Flip movement controls
    Invert,
    /// Darken the player's view
    Blind,
    /// Freeze shifting for the duration
    Lock,
    /// Break perception outright
    Fracture,
}

/// One perception attack an enemy knows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionAttack {
    pub kind: PerceptionAttackKind,
    pub duration: f32,
    pub cooldown: f32,
    pub dialogue: String,
}

impl PerceptionAttack {
    fn new(kind: PerceptionAttackKind, cooldown: f32, dialogue: &str) -> Self {
        Self {
            kind,
            duration: 3.0,
            cooldown,
            dialogue: dialogue.into(),
        }
    }

    pub fn effect_text(&self) -> &str {
        if !self.dialogue.is_empty() {
            return &self.dialogue;
        }
        match self.kind {
            PerceptionAttackKind::Collapse => "Reality collapses around you!",
            PerceptionAttackKind::Expand => "Too many dimensions flood your senses!",
            PerceptionAttackKind::Invert => "Everything is backwards!",
            PerceptionAttackKind::Blind => "Your perception dims...",
            PerceptionAttackKind::Lock => "Your perception is locked in place!",
            PerceptionAttackKind::Fracture => "Your perception fractures!",
        }
    }
}

/// AI state for one enemy in one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyAi {
    pub archetype: AiArchetype,
    pub dimension: Dimension,
    pub attacks: Vec<PerceptionAttack>,
    attack_cooldown: f32,

    /// 0..1, raises attack intensity; climbs with boss phases
    pub aggression: f32,
    perception_attack_chance: f32,

    perception_history: Vec<Perception>,

    pub phase: u32,
    phase_thresholds: Vec<f32>,
}

impl EnemyAi {
    /// Build the AI matching an enemy's dimension and boss flag, with the
    /// dimension's native perception attacks.
    pub fn for_enemy(dimension: Dimension, is_boss: bool) -> Self {
        let archetype = if is_boss {
            AiArchetype::Boss
        } else {
            match dimension {
                Dimension::FourD => AiArchetype::Tactical,
                Dimension::ThreeD => AiArchetype::Reactive,
                _ => AiArchetype::Passive,
            }
        };

        let mut attacks = match dimension {
            Dimension::OneD => vec![PerceptionAttack::new(
                PerceptionAttackKind::Collapse,
                10.0,
                "Reality compresses to a line!",
            )],
            Dimension::TwoD => vec![PerceptionAttack::new(
                PerceptionAttackKind::Invert,
                8.0,
                "Your perception flips!",
            )],
            Dimension::ThreeD => vec![
                PerceptionAttack::new(
                    PerceptionAttackKind::Collapse,
                    8.0,
                    "Depth collapses around you!",
                ),
                PerceptionAttack::new(
                    PerceptionAttackKind::Blind,
                    12.0,
                    "Shadows obscure your vision!",
                ),
            ],
            Dimension::FourD => vec![
                PerceptionAttack::new(
                    PerceptionAttackKind::Fracture,
                    6.0,
                    "Time splinters your perception!",
                ),
                PerceptionAttack::new(
                    PerceptionAttackKind::Expand,
                    10.0,
                    "Too many timelines flood your mind!",
                ),
                PerceptionAttack::new(
                    PerceptionAttackKind::Lock,
                    15.0,
                    "Your perception is frozen in time!",
                ),
            ],
        };

        if is_boss {
            for a in &mut attacks {
                a.cooldown *= 0.7;
            }
            attacks.push(PerceptionAttack::new(
                PerceptionAttackKind::Fracture,
                5.0,
                "Your dimensional awareness shatters!",
            ));
        }

        Self {
            archetype,
            dimension,
            attacks,
            attack_cooldown: 0.0,
            aggression: if is_boss { 0.7 } else { 0.5 },
            perception_attack_chance: if is_boss { 0.3 } else { 0.15 },
            perception_history: Vec::new(),
            phase: 0,
            phase_thresholds: vec![0.75, 0.5, 0.25],
        }
    }

    pub fn update(&mut self, dt: f32) {
        if self.attack_cooldown > 0.0 {
            self.attack_cooldown = (self.attack_cooldown - dt).max(0.0);
        }
    }

    /// Record one observation of the player's perception. Keeps the last
    /// 20 samples.
    pub fn record_player_perception(&mut self, perception: Perception) {
        self.perception_history.push(perception);
        if self.perception_history.len() > 20 {
            self.perception_history.remove(0);
        }
    }

    /// Majority vote over the history; needs at least 5 samples.
    pub fn player_tendency(&self) -> Option<Perception> {
        if self.perception_history.len() < 5 {
            return None;
        }
        let mut counts: Vec<(Perception, usize)> = Vec::new();
        for &p in &self.perception_history {
            match counts.iter_mut().find(|(c, _)| *c == p) {
                Some((_, n)) => *n += 1,
                None => counts.push((p, 1)),
            }
        }
        counts.into_iter().max_by_key(|(_, n)| *n).map(|(p, _)| p)
    }

    /// Roll whether to open this turn with a perception attack. The chance
    /// climbs as the enemy gets desperate, and tactical enemies press
    /// harder when the player leans on one perception.
    pub fn should_use_perception_attack<R: Rng>(&self, hp_ratio: f32, rng: &mut R) -> bool {
        if self.attack_cooldown > 0.0 || self.attacks.is_empty() {
            return false;
        }

        let mut chance = self.perception_attack_chance;
        if hp_ratio < 0.5 {
            chance *= 1.5;
        }
        if hp_ratio < 0.25 {
            chance *= 2.0;
        }
        if self.archetype == AiArchetype::Tactical
            && self
                .player_tendency()
                .is_some_and(|p| p != Perception::Plane)
        {
            chance *= 1.5;
        }

        rng.random_range(0.0..1.0) < chance
    }

    /// Pick a perception attack. Tactical and boss enemies counter the
    /// player's current state when they can.
    pub fn select_perception_attack<R: Rng>(
        &self,
        player_perception: Perception,
        rng: &mut R,
    ) -> Option<PerceptionAttack> {
        if self.attacks.is_empty() {
            return None;
        }

        if matches!(self.archetype, AiArchetype::Tactical | AiArchetype::Boss) {
            let counter = match player_perception {
                Perception::Point => Some(PerceptionAttackKind::Expand),
                Perception::Line => Some(PerceptionAttackKind::Collapse),
                Perception::Plane => Some(PerceptionAttackKind::Fracture),
                Perception::Volume => Some(PerceptionAttackKind::Collapse),
                Perception::Hyper => Some(PerceptionAttackKind::Blind),
                _ => None,
            };
            if let Some(kind) = counter {
                if let Some(attack) = self.attacks.iter().find(|a| a.kind == kind) {
                    return Some(attack.clone());
                }
            }
        }

        let i = rng.random_range(0..self.attacks.len());
        Some(self.attacks[i].clone())
    }

    /// Apply a perception attack to the player's controller. Returns the
    /// effect text to display.
    pub fn apply_perception_attack(
        &mut self,
        attack: &PerceptionAttack,
        controller: &mut PerceptionController,
    ) -> String {
        self.attack_cooldown = attack.cooldown;

        match attack.kind {
            PerceptionAttackKind::Collapse => controller.collapse(),
            PerceptionAttackKind::Expand => {
                controller.drain_energy(30.0);
                controller.fracture(attack.duration);
            }
            PerceptionAttackKind::Invert => controller.invert_controls(attack.duration),
            PerceptionAttackKind::Blind => controller.blind(attack.duration),
            PerceptionAttackKind::Lock => controller.lock_shifts(attack.duration),
            PerceptionAttackKind::Fracture => {
                controller.fracture(attack.duration);
                controller.drain_energy(15.0);
            }
        }

        attack.effect_text().to_string()
    }

    /// Choose an attack pattern from the dimension pool, with tactical
    /// counter-play and aggression scaling applied to the difficulty.
    pub fn select_attack_pattern<R: Rng>(
        &self,
        player_perception: Perception,
        difficulty: f32,
        rng: &mut R,
    ) -> (PatternId, f32) {
        let mut pool = PatternId::pool(self.dimension);

        let mut modifier = 1.0;
        if matches!(self.archetype, AiArchetype::Tactical | AiArchetype::Boss) {
            match player_perception {
                Perception::Line => modifier = 1.2,
                Perception::Point => modifier = 0.8,
                Perception::Volume => {
                    if self.dimension == Dimension::ThreeD {
                        pool = &[PatternId::DepthWave];
                    }
                    modifier = 1.3;
                }
                _ => {}
            }
        }
        if self.archetype == AiArchetype::Aggressive {
            modifier *= 1.0 + self.aggression * 0.5;
        }

        let id = pool[rng.random_range(0..pool.len())];
        (id, difficulty * modifier)
    }

    fn phase_for(&self, hp_ratio: f32) -> u32 {
        self.phase_thresholds
            .iter()
            .filter(|&&t| hp_ratio <= t)
            .count() as u32
    }

    /// Advance boss phase on HP threshold crossings. Each new phase raises
    /// aggression and returns a one-shot transition line.
    pub fn update_boss_phase(&mut self, hp_ratio: f32) -> Option<&'static str> {
        let new_phase = self.phase_for(hp_ratio);
        if new_phase <= self.phase {
            return None;
        }
        self.phase = new_phase;
        self.aggression = (self.aggression + 0.2).min(1.0);

        let texts = [
            "The enemy's form shifts!",
            "Reality warps around the enemy!",
            "The enemy reveals its true power!",
        ];
        Some(texts[(new_phase as usize - 1).min(texts.len() - 1)])
    }
}
