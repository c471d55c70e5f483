//! Hyperbattle entry point
//!
//! Headless demo: runs one scripted battle at a fixed timestep and prints
//! the outcome. Useful for watching the engine log and for profiling the
//! simulation without a frontend.
//!
//! Usage: `hyperbattle [enemy_id] [seed]`

use std::env;

use hyperbattle::combat::{
    CombatPhase, CombatSession, EnemyRegistry, FrameInput, InputEvent,
};

const SIM_DT: f32 = 1.0 / 60.0;
const MAX_SIM_SECONDS: f32 = 300.0;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let enemy_id = args.get(1).map(String::as_str).unwrap_or("point_spirit");
    let seed = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0xD1CE_u64);

    let registry = EnemyRegistry::builtin();
    let mut session = CombatSession::new(seed);
    if !session.start_battle(&registry, enemy_id) {
        eprintln!("unknown enemy {enemy_id:?}; available:");
        for id in registry.ids() {
            eprintln!("  {id}");
        }
        std::process::exit(1);
    }

    println!(
        "fighting {} (seed {seed})",
        session.enemy().map(|e| e.template.name.as_str()).unwrap_or("?")
    );

    let mut elapsed = 0.0;
    while elapsed < MAX_SIM_SECONDS {
        let snap = session.snapshot();
        let mut input = FrameInput::default();

        match snap.phase {
            CombatPhase::Intro | CombatPhase::EnemyDialogue => {
                session.handle_event(InputEvent::Confirm);
            }
            CombatPhase::PlayerMenu => {
                // Always FIGHT; the fight handler confirms near the center
                session.menu_index = 0;
                session.handle_event(InputEvent::Confirm);
            }
            CombatPhase::Fight => {
                if (snap.fight_bar - 0.5).abs() < 0.03 {
                    session.handle_event(InputEvent::Confirm);
                }
            }
            CombatPhase::EnemyAttack => {
                // Dodge away from the nearest bullet
                let nearest = snap
                    .bullets
                    .iter()
                    .map(|b| b.pos - snap.soul_pos)
                    .min_by(|a, b| a.length_squared().total_cmp(&b.length_squared()));
                if let Some(delta) = nearest {
                    if delta.length() < 60.0 {
                        input.move_x = -delta.x.signum();
                        input.move_y = -delta.y.signum();
                    }
                }
            }
            phase if phase.is_terminal() => {
                if let Some(result) = session.result {
                    let enemy = session.enemy();
                    println!("result: {result:?}");
                    println!(
                        "player hp {}/{}, enemy hp {}/{}, {} turns",
                        snap.player_hp,
                        snap.player_max_hp,
                        enemy.map_or(0, |e| e.stats.hp),
                        enemy.map_or(0, |e| e.stats.max_hp),
                        session.turn(),
                    );
                    return;
                }
            }
            _ => {}
        }

        session.update(SIM_DT, &input);
        elapsed += SIM_DT;
    }

    println!("battle did not finish within {MAX_SIM_SECONDS} seconds");
}
