//! Dimensional resonance and graze tracking
//!
//! Resonance is the meta-mechanic that rewards fighting in tune with a
//! dimension: five per-form meters fill from grazes, FIGHT hits, and ACTs,
//! decay over time, scale outgoing damage, and unlock special ACT options
//! at threshold tiers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::perception::{Dimension, Perception};
use crate::consts::*;

/// The five resonance meters, one per dimensional form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResonanceForm {
    Point,
    Line,
    Plane,
    Volume,
    Hyper,
}

impl ResonanceForm {
    pub const ALL: [ResonanceForm; 5] = [
        ResonanceForm::Point,
        ResonanceForm::Line,
        ResonanceForm::Plane,
        ResonanceForm::Volume,
        ResonanceForm::Hyper,
    ];

    fn index(self) -> usize {
        match self {
            ResonanceForm::Point => 0,
            ResonanceForm::Line => 1,
            ResonanceForm::Plane => 2,
            ResonanceForm::Volume => 3,
            ResonanceForm::Hyper => 4,
        }
    }

    /// The form a fight dimension resonates with.
    pub fn for_dimension(dimension: Dimension) -> Self {
        match dimension {
            Dimension::OneD => ResonanceForm::Line,
            Dimension::TwoD => ResonanceForm::Plane,
            Dimension::ThreeD => ResonanceForm::Volume,
            Dimension::FourD => ResonanceForm::Hyper,
        }
    }
}

/// Attunement tiers reached as a meter fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResonanceTier {
    Minor,
    Moderate,
    Major,
    Master,
}

impl ResonanceTier {
    pub fn for_value(value: f32) -> Option<Self> {
        if value >= 100.0 {
            Some(ResonanceTier::Master)
        } else if value >= 75.0 {
            Some(ResonanceTier::Major)
        } else if value >= 50.0 {
            Some(ResonanceTier::Moderate)
        } else if value >= 25.0 {
            Some(ResonanceTier::Minor)
        } else {
            None
        }
    }
}

/// ACT options unlocked by resonance tiers: `(act id, form, tier)`.
const RESONANCE_ACTS: [(&str, ResonanceForm, ResonanceTier); 5] = [
    ("point_collapse", ResonanceForm::Point, ResonanceTier::Major),
    ("line_focus", ResonanceForm::Line, ResonanceTier::Major),
    (
        "geometric_meditation",
        ResonanceForm::Plane,
        ResonanceTier::Moderate,
    ),
    ("phase_mastery", ResonanceForm::Volume, ResonanceTier::Major),
    (
        "transcendent_strike",
        ResonanceForm::Hyper,
        ResonanceTier::Master,
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceTracker {
    meters: [f32; 5],
}

impl Default for ResonanceTracker {
    fn default() -> Self {
        Self { meters: [0.0; 5] }
    }
}

impl ResonanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, form: ResonanceForm) -> f32 {
        self.meters[form.index()]
    }

    pub fn add(&mut self, form: ResonanceForm, amount: f32) {
        let m = &mut self.meters[form.index()];
        *m = (*m + amount).clamp(0.0, RESONANCE_MAX);
    }

    /// All meters decay at a fixed rate.
    pub fn update(&mut self, dt: f32) {
        for m in &mut self.meters {
            *m = (*m - RESONANCE_DECAY_RATE * dt).max(0.0);
        }
    }

    pub fn total(&self) -> f32 {
        self.meters.iter().sum()
    }

    /// Outgoing damage multiplier: up to +50% at full attunement across
    /// all five forms.
    pub fn damage_multiplier(&self) -> f32 {
        1.0 + (self.total() / (RESONANCE_MAX * 5.0)) * 0.5
    }

    pub fn tier(&self, form: ResonanceForm) -> Option<ResonanceTier> {
        ResonanceTier::for_value(self.get(form))
    }

    /// ACT ids currently unlocked by resonance.
    pub fn unlocked_acts(&self) -> Vec<&'static str> {
        RESONANCE_ACTS
            .iter()
            .filter(|(_, form, tier)| self.tier(*form).is_some_and(|t| t >= *tier))
            .map(|(id, _, _)| *id)
            .collect()
    }

    // --- Gameplay hooks ---

    /// A graze attunes to the fight's dimension, lightly to Plane, scaled
    /// by the combo bonus (see [`GrazeTracker::reward_multiplier`]). Grazing
    /// while in Hyper perception counts double (prediction bonus).
    pub fn on_graze(&mut self, dimension: Dimension, perception: Perception, combo_bonus: f32) {
        let scale = combo_bonus
            * if perception == Perception::Hyper {
                2.0
            } else {
                1.0
            };
        self.add(ResonanceForm::Plane, 1.0 * scale);
        self.add(ResonanceForm::for_dimension(dimension), 3.0 * scale);
    }

    /// Landing a FIGHT hit is an act of focus.
    pub fn on_fight_hit(&mut self) {
        self.add(ResonanceForm::Line, 2.0);
    }

    /// Using an ACT is an act of understanding.
    pub fn on_act(&mut self) {
        self.add(ResonanceForm::Plane, 2.0);
    }
}

/// Tracks grazes within one attack phase: each bullet grazes at most once,
/// and rapid consecutive grazes build a combo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrazeTracker {
    grazed: HashSet<u32>,
    pub combo: u32,
    combo_timer: f32,
    pub total_grazes: u32,
}

impl GrazeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-attack state at the start of a dodge phase.
    pub fn begin_attack(&mut self) {
        self.grazed.clear();
        self.combo = 0;
        self.combo_timer = 0.0;
    }

    pub fn update(&mut self, dt: f32) {
        if self.combo > 0 {
            self.combo_timer -= dt;
            if self.combo_timer <= 0.0 {
                self.combo = 0;
                self.combo_timer = 0.0;
            }
        }
    }

    /// Register a graze if the bullet sits inside the graze ring (closer
    /// than `hit_distance + GRAZE_DISTANCE` without touching) and has not
    /// grazed before. Returns true when a new graze is counted.
    pub fn try_graze(&mut self, bullet_id: u32, distance: f32, hit_distance: f32) -> bool {
        if distance < hit_distance || distance >= hit_distance + GRAZE_DISTANCE {
            return false;
        }
        if !self.grazed.insert(bullet_id) {
            return false;
        }
        self.combo += 1;
        self.combo_timer = GRAZE_COMBO_TIMEOUT;
        self.total_grazes += 1;
        true
    }

    /// Combo-scaled reward multiplier applied to graze payouts.
    pub fn reward_multiplier(&self) -> f32 {
        1.0 + 0.1 * self.combo as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_decay_and_clamp() {
        let mut r = ResonanceTracker::new();
        r.add(ResonanceForm::Line, 150.0);
        assert_eq!(r.get(ResonanceForm::Line), 100.0);
        r.update(2.0);
        assert!((r.get(ResonanceForm::Line) - 98.0).abs() < 1e-3);
        r.update(1000.0);
        assert_eq!(r.get(ResonanceForm::Line), 0.0);
    }

    #[test]
    fn test_damage_multiplier_range() {
        let mut r = ResonanceTracker::new();
        assert!((r.damage_multiplier() - 1.0).abs() < 1e-6);
        for form in ResonanceForm::ALL {
            r.add(form, 100.0);
        }
        assert!((r.damage_multiplier() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(ResonanceTier::for_value(24.9), None);
        assert_eq!(ResonanceTier::for_value(25.0), Some(ResonanceTier::Minor));
        assert_eq!(
            ResonanceTier::for_value(50.0),
            Some(ResonanceTier::Moderate)
        );
        assert_eq!(ResonanceTier::for_value(75.0), Some(ResonanceTier::Major));
        assert_eq!(ResonanceTier::for_value(100.0), Some(ResonanceTier::Master));
    }

    #[test]
    fn test_resonance_act_unlocks() {
        let mut r = ResonanceTracker::new();
        assert!(r.unlocked_acts().is_empty());

        r.add(ResonanceForm::Plane, 50.0);
        assert_eq!(r.unlocked_acts(), vec!["geometric_meditation"]);

        r.add(ResonanceForm::Hyper, 99.0);
        assert_eq!(r.unlocked_acts(), vec!["geometric_meditation"]);
        r.add(ResonanceForm::Hyper, 1.0);
        assert!(r.unlocked_acts().contains(&"transcendent_strike"));
    }

    #[test]
    fn test_hyper_graze_counts_double() {
        let mut a = ResonanceTracker::new();
        let mut b = ResonanceTracker::new();
        a.on_graze(Dimension::ThreeD, Perception::Plane, 1.0);
        b.on_graze(Dimension::ThreeD, Perception::Hyper, 1.0);
        assert_eq!(
            b.get(ResonanceForm::Volume),
            a.get(ResonanceForm::Volume) * 2.0
        );
    }

    #[test]
    fn test_graze_combo_scales_resonance() {
        let mut g = GrazeTracker::new();
        let mut r = ResonanceTracker::new();
        let mut gains = Vec::new();
        for id in 0..2 {
            assert!(g.try_graze(id, 20.0, 16.0));
            let before = r.get(ResonanceForm::Volume);
            r.on_graze(Dimension::ThreeD, Perception::Plane, g.reward_multiplier());
            gains.push(r.get(ResonanceForm::Volume) - before);
        }
        // combo 1 -> x1.1, combo 2 -> x1.2
        assert!((gains[0] - 3.0 * 1.1).abs() < 1e-3);
        assert!((gains[1] - 3.0 * 1.2).abs() < 1e-3);
        assert!(gains[1] > gains[0]);
    }

    #[test]
    fn test_graze_once_per_bullet() {
        let mut g = GrazeTracker::new();
        assert!(g.try_graze(7, 20.0, 16.0));
        assert!(!g.try_graze(7, 20.0, 16.0));
        assert_eq!(g.combo, 1);
        assert!(g.try_graze(8, 20.0, 16.0));
        assert_eq!(g.combo, 2);
        assert!((g.reward_multiplier() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_graze_ring_excludes_touching_and_far() {
        let mut g = GrazeTracker::new();
        // Touching: a hit, not a graze
        assert!(!g.try_graze(1, 10.0, 16.0));
        // Beyond the ring
        assert!(!g.try_graze(2, 16.0 + GRAZE_DISTANCE, 16.0));
        // Inside the ring
        assert!(g.try_graze(3, 16.0 + GRAZE_DISTANCE - 0.1, 16.0));
    }

    #[test]
    fn test_combo_times_out() {
        let mut g = GrazeTracker::new();
        g.try_graze(1, 20.0, 16.0);
        g.update(GRAZE_COMBO_TIMEOUT + 0.01);
        assert_eq!(g.combo, 0);
        assert_eq!(g.total_grazes, 1);
    }

    #[test]
    fn test_begin_attack_resets_graze_ids() {
        let mut g = GrazeTracker::new();
        g.try_graze(1, 20.0, 16.0);
        g.begin_attack();
        assert!(g.try_graze(1, 20.0, 16.0));
    }
}
