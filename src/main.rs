//! Runs an AI-vs-AI battle through the session manager and prints the
//! resulting event stream.
//!
//! Usage: `battle-demo [manager-config.ron]`. Set `BATTLE_SEED` for a
//! reproducible battle and `RUST_LOG` to control log output.

use pokemon_battle_engine::battle::state::BattleType;
use pokemon_battle_engine::session::LogSink;
use pokemon_battle_engine::{
    BattlePokemon, Catalog, EffectRegistry, ManagerConfig, Participant, SessionConfig, SessionManager, SessionUpdate,
};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Species, level and moves for one demo roster entry.
type TeamEntry = (&'static str, u8, &'static [&'static str]);

const RED_TEAM: &[TeamEntry] = &[
    ("pikachu", 30, &["thunderbolt", "quick-attack", "thunder-wave", "agility"]),
    ("charmander", 30, &["flamethrower", "slash", "sunny-day", "will-o-wisp"]),
    ("bulbasaur", 30, &["giga-drain", "sleep-powder", "razor-leaf", "toxic"]),
];

const BLUE_TEAM: &[TeamEntry] = &[
    ("squirtle", 30, &["surf", "water-gun", "rain-dance", "growl"]),
    ("growlithe", 30, &["ember", "body-slam", "flamethrower", "swords-dance"]),
    ("geodude", 30, &["earthquake", "rock-throw", "sandstorm", "tackle"]),
];

fn build_team(catalog: &Catalog, entries: &[TeamEntry], first_id: u64) -> Result<Vec<BattlePokemon>, Box<dyn Error>> {
    entries
        .iter()
        .zip(first_id..)
        .map(|(&(species, level, moves), instance_id)| {
            let species = catalog.species(species)?;
            Ok(BattlePokemon::from_species(instance_id, species, level, moves, catalog)?)
        })
        .collect()
}

fn load_config() -> Result<ManagerConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let source = std::fs::read_to_string(&path)?;
            Ok(ManagerConfig::from_ron_str(&source)?)
        }
        None => Ok(ManagerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let catalog = Arc::new(Catalog::standard()?);
    let registry = Arc::new(EffectRegistry::standard());

    let red = build_team(&catalog, RED_TEAM, 1)?;
    let blue = build_team(&catalog, BLUE_TEAM, 100)?;
    let mut session = SessionConfig::new(
        BattleType::Trainer,
        vec![Participant::ai("red", "Red", red), Participant::ai("blue", "Blue", blue)],
    );
    if let Some(seed) = std::env::var("BATTLE_SEED").ok().and_then(|seed| seed.parse().ok()) {
        session = session.with_seed(seed);
    }

    let manager = SessionManager::new(config, catalog, registry).with_sink(Arc::new(LogSink));
    let (session_id, mut updates) = manager.create_and_subscribe(session).await?;
    tracing::info!(%session_id, "demo battle started");

    loop {
        match updates.recv().await {
            Ok(SessionUpdate::Events(events)) => {
                for event in events.iter().filter(|event| !event.is_silent()) {
                    println!("{}", event.message);
                }
            }
            Ok(SessionUpdate::AwaitingActions { turn, participants, .. }) => {
                println!("-- turn {turn}: waiting on {}", participants.join(", "));
            }
            Ok(SessionUpdate::Ended(report)) => {
                match report.winner() {
                    Some(winner) => println!("{} wins after {} turns", winner.name, report.turns),
                    None => println!("battle over after {} turns: {:?}", report.turns, report.outcome),
                }
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "demo output fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    Ok(())
}
