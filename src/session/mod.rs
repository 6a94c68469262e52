//! Battle sessions: the per-battle state machine, the task that drives it and
//! the manager that routes clients to it.

pub mod machine;
pub mod manager;
pub mod report;
pub mod worker;

pub use machine::{BattleSession, Deadline};
pub use manager::SessionManager;
pub use report::{BattleReport, ChannelSink, LogSink, ParticipantSummary, ResultSink};

use crate::battle::events::BattleEventSequence;
use crate::battle::state::{BattlePhase, BattleState};
use crate::player::ParticipantId;
use serde::{Deserialize, Serialize};

pub type SessionId = String;

/// Everything a session broadcasts to its participants and spectators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionUpdate {
    /// One resolved step, flushed as a unit.
    Events(BattleEventSequence),
    AwaitingActions {
        turn: u32,
        phase: BattlePhase,
        participants: Vec<ParticipantId>,
    },
    Ended(BattleReport),
}

/// Acknowledgement of an accepted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub turn: u32,
    /// A previous submission for this turn was replaced.
    pub replaced: bool,
    /// The submission completed the set and the step was resolved.
    pub resolved: bool,
}

/// Read-only copy of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: BattleState,
    pub awaiting: Vec<ParticipantId>,
    pub last_events: Option<BattleEventSequence>,
    pub report: Option<BattleReport>,
}
