use crate::battle::catch::CaptureDevice;
use crate::pokemon::{BattlePokemon, InstanceId};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub const MAX_ROSTER_SIZE: usize = 6;

pub type ParticipantId = String;

/// What a participant wants to do this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// `target` names the opposing participant; `None` picks the first opponent still standing.
    UseMove {
        move_id: String,
        target: Option<ParticipantId>,
    },
    /// `target_slot` is a roster index; `None` targets the active Pokemon.
    UseItem {
        item_id: String,
        target_slot: Option<usize>,
    },
    SwitchPokemon {
        from: usize,
        to: usize,
    },
    Capture {
        device: CaptureDevice,
    },
    Flee,
    Pass,
}

impl PlayerAction {
    pub fn is_move(&self) -> bool {
        matches!(self, PlayerAction::UseMove { .. })
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, PlayerAction::SwitchPokemon { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ParticipantKind {
    #[default]
    Human,
    Ai,
}

/// One side of a battle: a human client, a trainer AI or a wild Pokemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub kind: ParticipantKind,
    pub connected: bool,
    #[serde(skip)]
    pub last_action_at: Option<Instant>,
    #[serde(skip)]
    pub disconnected_at: Option<Instant>,
    pub roster: Vec<BattlePokemon>,
    pub active_index: usize,
    pub switches_this_turn: u8,
    pub flee_attempts: u8,
    pub forfeited: bool,
    /// Set once an elimination event has been emitted.
    pub eliminated: bool,
    pub capture_charm: bool,
    /// Instance ids of every Pokemon that has been on the field.
    pub participated: Vec<InstanceId>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, roster: Vec<BattlePokemon>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ParticipantKind::Human,
            connected: true,
            last_action_at: None,
            disconnected_at: None,
            roster,
            active_index: 0,
            switches_this_turn: 0,
            flee_attempts: 0,
            forfeited: false,
            eliminated: false,
            capture_charm: false,
            participated: Vec::new(),
        }
    }

    pub fn ai(id: impl Into<String>, name: impl Into<String>, roster: Vec<BattlePokemon>) -> Self {
        Self {
            kind: ParticipantKind::Ai,
            ..Self::new(id, name, roster)
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == ParticipantKind::Ai
    }

    pub fn active_pokemon(&self) -> Option<&BattlePokemon> {
        self.roster.get(self.active_index)
    }

    pub fn active_pokemon_mut(&mut self) -> Option<&mut BattlePokemon> {
        self.roster.get_mut(self.active_index)
    }

    pub fn has_active_pokemon(&self) -> bool {
        self.active_pokemon().is_some_and(|pokemon| !pokemon.is_fainted())
    }

    /// Roster indices of conscious Pokemon that are not on the field.
    pub fn available_switches(&self) -> Vec<usize> {
        self.roster
            .iter()
            .enumerate()
            .filter(|(index, pokemon)| *index != self.active_index && !pokemon.is_fainted())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn all_fainted(&self) -> bool {
        self.roster.iter().all(|pokemon| pokemon.is_fainted())
    }

    /// Out of the battle: forfeited, or nothing left that can fight.
    pub fn is_defeated(&self) -> bool {
        self.forfeited || self.all_fainted()
    }

    pub fn record_participation(&mut self) {
        if let Some(pokemon) = self.roster.get(self.active_index) {
            if !self.participated.contains(&pokemon.instance_id) {
                self.participated.push(pokemon.instance_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::TestPokemonBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn available_switches_skip_active_and_fainted() {
        let participant = Participant::new(
            "p1",
            "Red",
            vec![
                TestPokemonBuilder::new("pikachu", 1).build(),
                TestPokemonBuilder::new("bulbasaur", 2).with_hp(0).build(),
                TestPokemonBuilder::new("squirtle", 3).build(),
            ],
        );
        assert_eq!(participant.available_switches(), vec![2]);
        assert!(!participant.is_defeated());
    }

    #[test]
    fn empty_roster_is_defeated() {
        let participant = Participant::new("p1", "Red", Vec::new());
        assert!(participant.is_defeated());
        assert!(!participant.has_active_pokemon());
    }

    #[test]
    fn participation_is_recorded_once() {
        let mut participant = Participant::new(
            "p1",
            "Red",
            vec![TestPokemonBuilder::new("pikachu", 7).build()],
        );
        participant.record_participation();
        participant.record_participation();
        assert_eq!(participant.participated, vec![7]);
    }
}
