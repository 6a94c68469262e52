//! Pokemon Battle Engine
//!
//! Turn-based battle resolution with sessions. Clients submit actions to a
//! [`SessionManager`]; each battle runs on its own task, resolves a turn once
//! every participant has acted (or the turn deadline passes) and broadcasts
//! the resulting event sequence.

pub mod battle;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod player;
pub mod pokemon;
pub mod session;

// --- From the `schema` crate ---
pub use schema::{
    BaseStats, ItemData, ItemEffect, MoveCategory, MoveData, MoveEffect, MoveTarget, PokemonType, SpeciesData,
    StatType, StatusKind,
};

// --- From this crate ---
pub use battle::ai::{Behavior, ScoringAI};
pub use battle::catch::CaptureDevice;
pub use battle::effects::EffectRegistry;
pub use battle::engine::{resolve_turn, BattleAction, EngineContext};
pub use battle::events::{BattleEvent, BattleEventKind, BattleEventSequence};
pub use battle::state::{BattlePhase, BattleState, BattleType, Conclusion, TerminationReason, TurnRng};
pub use catalog::Catalog;
pub use config::{ManagerConfig, SessionConfig, SessionRules};
pub use errors::{BattleEngineError, ManagerError, SessionError, SubmitError};
pub use player::{Participant, ParticipantId, PlayerAction};
pub use pokemon::{BattlePokemon, InstanceId, StatusCondition};
pub use session::{BattleReport, ResultSink, SessionManager, SessionSnapshot, SessionUpdate, SubmitAck};
