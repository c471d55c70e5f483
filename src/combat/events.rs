//! Outbound combat events
//!
//! The session reports everything observable through an [`EventSink`] so a
//! frontend can drive sound, screen shake, or logging without polling
//! snapshots. The engine itself only logs.

use super::perception::Perception;
use super::session::CombatResult;

/// One observable thing that happened during a battle.
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    BattleStarted { enemy_id: String },
    BattleEnded { result: CombatResult, xp: i32, gold: i32 },
    /// Player dealt FIGHT damage
    DamageDealt { amount: i32, accuracy: f32 },
    /// Player took bullet damage
    DamageTaken { amount: i32 },
    Healed { amount: i32 },
    Graze { combo: u32 },
    PerceptionShifted { from: Perception, to: Perception },
    /// Enemy used a perception attack
    AbilityUsed { name: String },
    ActPerformed { act_id: String },
    ItemUsed { item_id: String },
    EntityDied { enemy_id: String },
    TurnStarted { turn: u32 },
}

/// Receiver for combat events. Implementations must be cheap; the sink is
/// called from inside the frame update.
pub trait EventSink {
    fn on_event(&mut self, event: &CombatEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &CombatEvent) {}
}

/// Buffers events for tests and polling frontends.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub events: Vec<CombatEvent>,
}

impl EventSink for VecSink {
    fn on_event(&mut self, event: &CombatEvent) {
        self.events.push(event.clone());
    }
}
