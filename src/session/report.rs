use crate::battle::state::{BattleState, BattleType, Conclusion};
use crate::player::ParticipantId;
use crate::pokemon::InstanceId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Per-participant summary included in a [`BattleReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: ParticipantId,
    pub name: String,
    pub remaining_pokemon: usize,
    pub fainted_pokemon: usize,
    pub forfeited: bool,
    /// Instances that took the field, in order of first appearance.
    pub participated: Vec<InstanceId>,
}

/// Final result of a battle, handed to whoever settles rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    pub battle_id: String,
    pub battle_type: BattleType,
    pub outcome: Conclusion,
    pub turns: u32,
    pub participants: Vec<ParticipantSummary>,
    /// Every fainted instance across all sides.
    pub defeated: Vec<InstanceId>,
}

impl BattleReport {
    pub fn from_state(state: &BattleState) -> Self {
        let participants = state
            .participants
            .iter()
            .map(|participant| {
                let fainted = participant.roster.iter().filter(|p| p.is_fainted()).count();
                ParticipantSummary {
                    id: participant.id.clone(),
                    name: participant.name.clone(),
                    remaining_pokemon: participant.roster.len() - fainted,
                    fainted_pokemon: fainted,
                    forfeited: participant.forfeited,
                    participated: participant.participated.clone(),
                }
            })
            .collect();
        let defeated = state
            .participants
            .iter()
            .flat_map(|participant| participant.roster.iter())
            .filter(|pokemon| pokemon.is_fainted())
            .map(|pokemon| pokemon.instance_id)
            .collect();

        Self {
            battle_id: state.battle_id.clone(),
            battle_type: state.battle_type,
            outcome: state.conclusion.clone().unwrap_or(Conclusion::Draw),
            // the counter already points at the next turn
            turns: state.turn_number.saturating_sub(1),
            participants,
            defeated,
        }
    }

    pub fn winner(&self) -> Option<&ParticipantSummary> {
        match self.outcome {
            Conclusion::Victory { winner } => self.participants.get(winner),
            _ => None,
        }
    }
}

/// Receives the report of every battle that reaches its end.
pub trait ResultSink: Send + Sync {
    fn deliver(&self, report: &BattleReport);
}

/// Writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn deliver(&self, report: &BattleReport) {
        tracing::info!(
            battle_id = %report.battle_id,
            turns = report.turns,
            outcome = ?report.outcome,
            defeated = report.defeated.len(),
            "battle result"
        );
    }
}

/// Forwards reports to a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BattleReport>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BattleReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&self, report: &BattleReport) {
        if self.tx.send(report.clone()).is_err() {
            tracing::warn!(battle_id = %report.battle_id, "result receiver dropped");
        }
    }
}
