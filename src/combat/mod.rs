//! Combat encounter engine
//!
//! All battle logic lives here. This module must be pure and deterministic:
//! - Caller-driven frame stepping (`CombatSession::update(dt, &FrameInput)`)
//! - Seeded RNG only, owned by the session
//! - No rendering, audio, or platform dependencies
//!
//! The flow of a battle: `Intro` → `PlayerMenu` (Fight/Act/Item/Mercy) →
//! `EnemyDialogue` → `EnemyAttack` (the bullet-hell dodge phase) →
//! `Resolution` → loop or a terminal phase. During the dodge phase the
//! player may shift between dimensional perception states that trade
//! movement freedom for damage immunity.

pub mod ai;
pub mod bullet;
pub mod enemy;
pub mod events;
pub mod pattern;
pub mod perception;
pub mod resonance;
pub mod session;
pub mod soul;
pub mod stats;

pub use ai::{AiArchetype, EnemyAi, PerceptionAttack, PerceptionAttackKind};
pub use bullet::{AttackAxis, Bullet, BulletKind};
pub use enemy::{ActOption, AttackSpec, EnemyActor, EnemyRegistry, EnemyTemplate, Mood};
pub use events::{CombatEvent, EventSink, NullSink, VecSink};
pub use pattern::{Pattern, PatternId, Sequence, Wave};
pub use perception::{Dimension, Perception, PerceptionController, PerceptionProfile, ShiftError};
pub use resonance::{GrazeTracker, ResonanceForm, ResonanceTier, ResonanceTracker};
pub use session::{
    CombatPhase, CombatResult, CombatSession, FrameInput, InputEvent, Item, Snapshot,
};
pub use soul::{BattleBox, PlayerSoul};
pub use stats::CombatStats;
