//! Enemy templates, live actors, and the registry
//!
//! Templates are immutable definitions (stats, dialogue, ACT options,
//! attack list). Starting a battle instantiates a template into an
//! [`EnemyActor`] carrying the mutable per-fight state: HP, mood ladder,
//! turn bookkeeping, and the attack rotation.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::pattern::PatternId;
use super::perception::Dimension;
use super::stats::CombatStats;

/// Enemy disposition, derived from mood points against the spare
/// threshold. Only `Spareable` permits a successful MERCY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Hostile,
    Aggressive,
    Neutral,
    Curious,
    Friendly,
    Spareable,
}

/// One ACT menu option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mood_change: i32,
    #[serde(default)]
    pub heal: i32,
    #[serde(default)]
    pub requires_mood: Option<Mood>,
    /// Minimum completed turns before this ACT works
    #[serde(default)]
    pub requires_turn: u32,
    /// Remaining uses; -1 is unlimited
    #[serde(default = "unlimited")]
    pub uses: i32,
    #[serde(default)]
    pub success_dialogue: String,
    #[serde(default)]
    pub fail_dialogue: String,
}

fn unlimited() -> i32 {
    -1
}

impl ActOption {
    pub fn new(id: &str, name: &str, mood_change: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            mood_change,
            heal: 0,
            requires_mood: None,
            requires_turn: 0,
            uses: -1,
            success_dialogue: String::new(),
            fail_dialogue: String::new(),
        }
    }

    /// The CHECK option every enemy carries.
    pub fn check() -> Self {
        Self::new("check", "Check", 0)
    }
}

/// One entry in an enemy's attack rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackSpec {
    pub id: String,
    pub name: String,
    pub pattern: PatternId,
    pub duration: f32,
    #[serde(default = "default_difficulty")]
    pub difficulty: f32,
    #[serde(default)]
    pub dialogue: String,
}

fn default_difficulty() -> f32 {
    1.0
}

/// Immutable enemy definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyTemplate {
    pub id: String,
    pub name: String,
    pub stats: CombatStats,
    pub dimension: Dimension,
    #[serde(default)]
    pub is_boss: bool,

    #[serde(default = "default_spare_threshold")]
    pub spare_threshold: i32,
    #[serde(default = "default_true")]
    pub can_spare: bool,
    #[serde(default = "default_true")]
    pub can_flee: bool,

    #[serde(default)]
    pub encounter_text: String,
    #[serde(default)]
    pub check_text: String,
    #[serde(default)]
    pub idle_dialogues: Vec<String>,
    #[serde(default)]
    pub hurt_dialogues: Vec<String>,
    #[serde(default)]
    pub low_hp_dialogues: Vec<String>,
    #[serde(default)]
    pub spare_dialogue: String,
    #[serde(default)]
    pub kill_dialogue: String,

    pub acts: Vec<ActOption>,
    pub attacks: Vec<AttackSpec>,

    #[serde(default)]
    pub xp_reward: i32,
    #[serde(default)]
    pub gold_reward: i32,
    /// Extra gold granted when spared instead of killed
    #[serde(default)]
    pub spare_gold_reward: i32,
}

fn default_spare_threshold() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

impl EnemyTemplate {
    /// Spawn the mutable battle-time actor.
    pub fn instantiate(&self) -> EnemyActor {
        EnemyActor {
            template: self.clone(),
            stats: self.stats.clone(),
            mood: Mood::Neutral,
            mood_points: 0,
            turns_taken: 0,
            times_hurt: 0,
            times_spared: 0,
            attack_index: 0,
        }
    }
}

/// Result of one ACT attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ActOutcome {
    pub success: bool,
    pub dialogue: String,
    pub mood_change: i32,
    pub heal: i32,
}

/// A live enemy in one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyActor {
    pub template: EnemyTemplate,
    pub stats: CombatStats,
    pub mood: Mood,
    pub mood_points: i32,
    pub turns_taken: u32,
    pub times_hurt: u32,
    /// Failed spare attempts; some ACTs and dialogue key off this
    pub times_spared: u32,
    attack_index: usize,
}

impl EnemyActor {
    pub fn is_spareable(&self) -> bool {
        self.mood == Mood::Spareable || self.mood_points >= self.template.spare_threshold
    }

    pub fn add_mood_points(&mut self, amount: i32) {
        self.mood_points += amount;
        self.update_mood();
    }

    fn update_mood(&mut self) {
        let t = self.template.spare_threshold;
        self.mood = if self.mood_points >= t {
            Mood::Spareable
        } else if self.mood_points * 4 >= t * 3 {
            Mood::Friendly
        } else if self.mood_points * 2 >= t {
            Mood::Curious
        } else if self.mood_points * 2 <= -t {
            Mood::Hostile
        } else if self.mood_points < 0 {
            Mood::Aggressive
        } else {
            Mood::Neutral
        };
    }

    /// Next attack in the rotation; the AI may override this choice.
    pub fn next_attack(&mut self) -> Option<AttackSpec> {
        if self.template.attacks.is_empty() {
            return None;
        }
        let spec = self.template.attacks[self.attack_index].clone();
        self.attack_index = (self.attack_index + 1) % self.template.attacks.len();
        Some(spec)
    }

    /// Pick turn dialogue by state: desperate below 25% HP, pained after
    /// being hurt, idle otherwise.
    pub fn dialogue<R: Rng>(&self, rng: &mut R) -> String {
        let pool = if self.stats.hp_ratio() < 0.25 && !self.template.low_hp_dialogues.is_empty() {
            &self.template.low_hp_dialogues
        } else if self.times_hurt > 0 && !self.template.hurt_dialogues.is_empty() {
            &self.template.hurt_dialogues
        } else if !self.template.idle_dialogues.is_empty() {
            &self.template.idle_dialogues
        } else {
            return "...".into();
        };
        pool[rng.random_range(0..pool.len())].clone()
    }

    /// Attempt an ACT. CHECK reports the check text; other ACTs validate
    /// mood/turn/use requirements before applying mood changes.
    pub fn perform_act(&mut self, act_id: &str) -> ActOutcome {
        if act_id == "check" {
            return ActOutcome {
                success: true,
                dialogue: self.template.check_text.clone(),
                mood_change: 0,
                heal: 0,
            };
        }

        let Some(act) = self
            .template
            .acts
            .iter_mut()
            .find(|a| a.id == act_id)
        else {
            return ActOutcome {
                success: false,
                dialogue: "Nothing happened.".into(),
                mood_change: 0,
                heal: 0,
            };
        };

        if let Some(required) = act.requires_mood {
            if self.mood != required {
                let dialogue = if act.fail_dialogue.is_empty() {
                    "It doesn't seem effective...".into()
                } else {
                    act.fail_dialogue.clone()
                };
                return ActOutcome {
                    success: false,
                    dialogue,
                    mood_change: 0,
                    heal: 0,
                };
            }
        }
        if act.requires_turn > self.turns_taken {
            return ActOutcome {
                success: false,
                dialogue: "It's too early for that...".into(),
                mood_change: 0,
                heal: 0,
            };
        }
        if act.uses == 0 {
            return ActOutcome {
                success: false,
                dialogue: "You can't do that anymore...".into(),
                mood_change: 0,
                heal: 0,
            };
        }

        if act.uses > 0 {
            act.uses -= 1;
        }
        let dialogue = if act.success_dialogue.is_empty() {
            format!("You {}.", act.name)
        } else {
            act.success_dialogue.clone()
        };
        let mood_change = act.mood_change;
        let heal = act.heal;
        self.add_mood_points(mood_change);

        ActOutcome {
            success: true,
            dialogue,
            mood_change,
            heal,
        }
    }

    pub fn end_turn(&mut self) {
        self.turns_taken += 1;
    }
}

/// Caller-owned lookup of enemy templates.
#[derive(Debug, Clone, Default)]
pub struct EnemyRegistry {
    templates: HashMap<String, EnemyTemplate>,
}

impl EnemyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the standard roster across all four
    /// dimensions plus the 4d boss.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        for template in builtin_roster() {
            reg.register(template);
        }
        reg
    }

    pub fn register(&mut self, template: EnemyTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, id: &str) -> Option<&EnemyTemplate> {
        self.templates.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Load additional templates from a JSON array.
    pub fn load_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let templates: Vec<EnemyTemplate> = serde_json::from_str(json)?;
        let n = templates.len();
        for t in templates {
            self.register(t);
        }
        Ok(n)
    }
}

fn builtin_roster() -> Vec<EnemyTemplate> {
    vec![
        EnemyTemplate {
            id: "point_spirit".into(),
            name: "Point Spirit".into(),
            stats: CombatStats::new(8, 3, 0),
            dimension: Dimension::OneD,
            is_boss: false,
            spare_threshold: 50,
            can_spare: true,
            can_flee: true,
            encounter_text: "A tiny Point Spirit appears! It has no dimension at all.".into(),
            check_text: "POINT SPIRIT - ATK 3 DEF 0. A consciousness before extension.".into(),
            idle_dialogues: vec![
                "Point Spirit flickers in and out of perception.".into(),
                "\"I am... here. Just here.\"".into(),
            ],
            hurt_dialogues: vec!["Point Spirit wavers.".into()],
            low_hp_dialogues: vec!["\"Am I... ending?\"".into()],
            spare_dialogue: "Point Spirit fades peacefully.".into(),
            kill_dialogue: "Point Spirit collapses into true nothing.".into(),
            acts: vec![
                ActOption::check(),
                ActOption {
                    success_dialogue: "You acknowledge the Point Spirit. \"You... see me?\"".into(),
                    ..ActOption::new("acknowledge", "Acknowledge", 50)
                },
                ActOption {
                    success_dialogue: "You contemplate existence without extension.".into(),
                    ..ActOption::new("contemplate", "Contemplate", 40)
                },
            ],
            attacks: vec![AttackSpec {
                id: "existence_pulse".into(),
                name: "Existence Pulse".into(),
                pattern: PatternId::ConvergingPoints,
                duration: 2.5,
                difficulty: 0.6,
                dialogue: "Point Spirit pulses with pure existence!".into(),
            }],
            xp_reward: 3,
            gold_reward: 2,
            spare_gold_reward: 8,
        },
        EnemyTemplate {
            id: "line_walker".into(),
            name: "Line Walker".into(),
            stats: CombatStats::new(15, 5, 2),
            dimension: Dimension::OneD,
            is_boss: false,
            spare_threshold: 100,
            can_spare: true,
            can_flee: true,
            encounter_text: "Line Walker blocks your path!".into(),
            check_text: "LINE WALKER - ATK 5 DEF 2. Knows only forward and backward.".into(),
            idle_dialogues: vec![
                "Line Walker vibrates uncertainly.".into(),
                "\"There's only forward and back...\"".into(),
            ],
            hurt_dialogues: vec!["Line Walker contracts in pain.".into()],
            low_hp_dialogues: vec!["\"The line... is getting shorter.\"".into()],
            spare_dialogue: "Line Walker steps aside at last.".into(),
            kill_dialogue: "The line goes dark.".into(),
            acts: vec![
                ActOption::check(),
                ActOption {
                    success_dialogue: "You explain width. It is baffled but intrigued.".into(),
                    ..ActOption::new("explain", "Explain", 30)
                },
                ActOption {
                    requires_turn: 2,
                    success_dialogue: "You walk the line together for a while.".into(),
                    ..ActOption::new("walk_together", "Walk With", 45)
                },
            ],
            attacks: vec![
                AttackSpec {
                    id: "line_dash".into(),
                    name: "Line Dash".into(),
                    pattern: PatternId::LineSweep,
                    duration: 3.0,
                    difficulty: 1.0,
                    dialogue: "Line Walker dashes along its line!".into(),
                },
                AttackSpec {
                    id: "segment_march".into(),
                    name: "Segment March".into(),
                    pattern: PatternId::SegmentWave,
                    duration: 3.5,
                    difficulty: 1.0,
                    dialogue: "Segments march toward you!".into(),
                },
            ],
            xp_reward: 5,
            gold_reward: 3,
            spare_gold_reward: 10,
        },
        EnemyTemplate {
            id: "triangle_scout".into(),
            name: "Triangle Scout".into(),
            stats: CombatStats::new(20, 6, 3),
            dimension: Dimension::TwoD,
            is_boss: false,
            spare_threshold: 100,
            can_spare: true,
            can_flee: true,
            encounter_text: "Triangle Scout spotted you first!".into(),
            check_text: "TRIANGLE SCOUT - ATK 6 DEF 3. The simplest polygon, and proud of it.".into(),
            idle_dialogues: vec![
                "Triangle Scout rotates alertly.".into(),
                "\"Three sides are all anyone needs.\"".into(),
            ],
            hurt_dialogues: vec!["A vertex chips!".into()],
            low_hp_dialogues: vec!["Triangle Scout wobbles on a bent edge.".into()],
            spare_dialogue: "Triangle Scout salutes and glides off.".into(),
            kill_dialogue: "The triangle unfolds into nothing.".into(),
            acts: vec![
                ActOption::check(),
                ActOption {
                    success_dialogue: "You discuss acute angles. It is flattered.".into(),
                    ..ActOption::new("discuss_angles", "Discuss Angles", 35)
                },
                ActOption {
                    success_dialogue: "You admire its vertices. It preens.".into(),
                    ..ActOption::new("admire_vertices", "Admire Vertices", 30)
                },
            ],
            attacks: vec![
                AttackSpec {
                    id: "spin_attack".into(),
                    name: "Spin Attack".into(),
                    pattern: PatternId::TriangleFormation,
                    duration: 3.0,
                    difficulty: 1.0,
                    dialogue: "Spinning triangles everywhere!".into(),
                },
                AttackSpec {
                    id: "corner_shot".into(),
                    name: "Corner Shot".into(),
                    pattern: PatternId::AimedShot,
                    duration: 2.5,
                    difficulty: 1.0,
                    dialogue: "Triangle Scout takes aim!".into(),
                },
            ],
            xp_reward: 8,
            gold_reward: 5,
            spare_gold_reward: 12,
        },
        EnemyTemplate {
            id: "cube_guard".into(),
            name: "Cube Guard".into(),
            stats: CombatStats::new(30, 8, 5),
            dimension: Dimension::ThreeD,
            is_boss: false,
            spare_threshold: 100,
            can_spare: true,
            can_flee: true,
            encounter_text: "Cube Guard stands at attention. You shall not pass.".into(),
            check_text: "CUBE GUARD - ATK 8 DEF 5. Six faces, all of them stern.".into(),
            idle_dialogues: vec![
                "Cube Guard holds formation.".into(),
                "\"Depth is my duty.\"".into(),
            ],
            hurt_dialogues: vec!["A face dents inward.".into()],
            low_hp_dialogues: vec!["Cube Guard's edges are crumbling.".into()],
            spare_dialogue: "Cube Guard nods and lets you pass.".into(),
            kill_dialogue: "The cube folds flat.".into(),
            acts: vec![
                ActOption::check(),
                ActOption {
                    success_dialogue: "You salute. It returns the gesture crisply.".into(),
                    ..ActOption::new("salute", "Salute", 40)
                },
                ActOption {
                    success_dialogue: "You discuss the burdens of guarding depth.".into(),
                    ..ActOption::new("discuss_duty", "Discuss Duty", 30)
                },
            ],
            attacks: vec![
                AttackSpec {
                    id: "depth_patrol".into(),
                    name: "Depth Patrol".into(),
                    pattern: PatternId::DepthWave,
                    duration: 3.5,
                    difficulty: 1.0,
                    dialogue: "Cube Guard sweeps every layer!".into(),
                },
                AttackSpec {
                    id: "phase_drill".into(),
                    name: "Phase Drill".into(),
                    pattern: PatternId::PhasingCubes,
                    duration: 3.0,
                    difficulty: 1.0,
                    dialogue: "Cubes phase between depths!".into(),
                },
            ],
            xp_reward: 12,
            gold_reward: 8,
            spare_gold_reward: 15,
        },
        EnemyTemplate {
            id: "tesseract_sage".into(),
            name: "Tesseract Sage".into(),
            stats: CombatStats::new(60, 12, 8),
            dimension: Dimension::FourD,
            is_boss: true,
            spare_threshold: 120,
            can_spare: true,
            can_flee: false,
            encounter_text: "The Tesseract Sage regards you from every moment at once.".into(),
            check_text: "TESSERACT SAGE - ATK 12 DEF 8. It has already seen this battle end.".into(),
            idle_dialogues: vec![
                "The Sage rotates through an axis you cannot name.".into(),
                "\"You are so briefly here.\"".into(),
            ],
            hurt_dialogues: vec!["A cell of the Sage dims.".into()],
            low_hp_dialogues: vec!["\"Perhaps... this moment matters after all.\"".into()],
            spare_dialogue: "The Sage unfolds, satisfied. \"You chose well, in every timeline.\"".into(),
            kill_dialogue: "The Sage collapses across all four axes.".into(),
            acts: vec![
                ActOption::check(),
                ActOption {
                    success_dialogue: "You listen. The Sage speaks of seconds like rooms.".into(),
                    ..ActOption::new("listen", "Listen", 30)
                },
                ActOption {
                    requires_turn: 2,
                    success_dialogue: "\"Time? Time is just the direction you cannot walk back.\"".into(),
                    ..ActOption::new("ask_about_time", "Ask About Time", 35)
                },
                ActOption {
                    requires_mood: Some(Mood::Friendly),
                    uses: 1,
                    success_dialogue: "For one instant you perceive all four axes together.".into(),
                    fail_dialogue: "The Sage is not ready to share that with you.".into(),
                    ..ActOption::new("transcend_together", "Transcend", 60)
                },
            ],
            attacks: vec![
                AttackSpec {
                    id: "temporal_lesson".into(),
                    name: "Temporal Lesson".into(),
                    pattern: PatternId::TemporalBurst,
                    duration: 4.0,
                    difficulty: 1.2,
                    dialogue: "\"Observe: the same moment, three ways.\"".into(),
                },
                AttackSpec {
                    id: "echo_of_ages".into(),
                    name: "Echo of Ages".into(),
                    pattern: PatternId::PastEcho,
                    duration: 4.0,
                    difficulty: 1.0,
                    dialogue: "Echoes of past attacks replay around you!".into(),
                },
                AttackSpec {
                    id: "convergence".into(),
                    name: "Convergence".into(),
                    pattern: PatternId::FutureConvergence,
                    duration: 4.5,
                    difficulty: 1.1,
                    dialogue: "\"Everything arrives at the center eventually.\"".into(),
                },
            ],
            xp_reward: 50,
            gold_reward: 30,
            spare_gold_reward: 60,
        },
    ]
}
