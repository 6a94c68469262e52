use crate::battle::commands::PokemonRef;
use crate::config::SessionRules;
use crate::player::Participant;
use crate::pokemon::{BattlePokemon, InstanceId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BattleType {
    Wild,
    Trainer,
    PlayerVsPlayer,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BattlePhase {
    Intro,
    ActionSelection,
    ActionResolution,
    SwitchPhase,
    ForcedSwitch,
    VictorySequence,
    Ended,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    Admin(String),
    Shutdown,
    /// An engine error aborted resolution.
    Fatal(String),
}

/// How a battle finished. Participant references are indices into `BattleState::participants`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Conclusion {
    Victory { winner: usize },
    Draw,
    Fled { participant: usize },
    Captured {
        participant: usize,
        instance_id: InstanceId,
        added_to_roster: bool,
    },
    Interrupted { reason: TerminationReason },
}

/// A weather, terrain or field effect with an optional remaining duration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldCondition {
    pub id: String,
    pub turns_remaining: Option<u8>,
}

impl FieldCondition {
    pub fn new(id: impl Into<String>, turns_remaining: Option<u8>) -> Self {
        Self {
            id: id.into(),
            turns_remaining,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Environment {
    pub weather: Option<FieldCondition>,
    pub terrain: Option<FieldCondition>,
    pub field_effects: Vec<FieldCondition>,
}

impl Environment {
    pub fn weather_is(&self, id: &str) -> bool {
        self.weather.as_ref().is_some_and(|weather| weather.id == id)
    }

    pub fn terrain_is(&self, id: &str) -> bool {
        self.terrain.as_ref().is_some_and(|terrain| terrain.id == id)
    }

    pub fn has_field_effect(&self, id: &str) -> bool {
        self.field_effects.iter().any(|effect| effect.id == id)
    }
}

/// Randomness source for one resolution step. Seeded for replay, or scripted in tests.
#[derive(Debug, Clone)]
pub struct TurnRng {
    source: RngSource,
}

#[derive(Debug, Clone)]
enum RngSource {
    Seeded(StdRng),
    Scripted { outcomes: Vec<u16>, index: usize },
}

impl TurnRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: RngSource::Seeded(StdRng::seed_from_u64(seed)),
        }
    }

    /// Scripted values are clamped into whatever range each draw asks for.
    pub fn new_for_test(outcomes: Vec<u16>) -> Self {
        Self {
            source: RngSource::Scripted { outcomes, index: 0 },
        }
    }

    /// Percentile roll in 1..=100.
    pub fn next_outcome(&mut self, reason: &str) -> u8 {
        self.next_in_range(reason, 1, 100) as u8
    }

    /// Uniform value in `low..=high`.
    pub fn next_in_range(&mut self, reason: &str, low: u16, high: u16) -> u16 {
        let outcome = match &mut self.source {
            RngSource::Seeded(rng) => rng.random_range(low..=high),
            RngSource::Scripted { outcomes, index } => {
                if *index >= outcomes.len() {
                    panic!(
                        "TurnRng exhausted! Tried to get a value for: '{}'. Need more random values.",
                        reason
                    );
                }
                let value = outcomes[*index].clamp(low, high);
                *index += 1;
                value
            }
        };
        tracing::trace!(reason, outcome, "rng consumed");
        outcome
    }

    pub fn next_u32(&mut self, reason: &str) -> u32 {
        match &mut self.source {
            RngSource::Seeded(rng) => {
                let value = rng.random::<u32>();
                tracing::trace!(reason, value, "rng consumed");
                value
            }
            RngSource::Scripted { .. } => self.next_in_range(reason, 0, u16::MAX) as u32,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BattleState {
    pub battle_id: String,
    pub battle_type: BattleType,
    pub participants: Vec<Participant>,
    pub spectators: BTreeSet<String>,
    pub turn_number: u32,
    pub phase: BattlePhase,
    pub environment: Environment,
    pub rules: SessionRules,
    pub conclusion: Option<Conclusion>,
    pub next_event_id: u64,
}

impl BattleState {
    pub fn new(
        battle_id: impl Into<String>,
        battle_type: BattleType,
        participants: Vec<Participant>,
        rules: SessionRules,
    ) -> Self {
        Self {
            battle_id: battle_id.into(),
            battle_type,
            participants,
            spectators: BTreeSet::new(),
            turn_number: 1,
            phase: BattlePhase::Intro,
            environment: Environment::default(),
            rules,
            conclusion: None,
            next_event_id: 1,
        }
    }

    pub fn participant_index(&self, id: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }

    pub fn pokemon(&self, pokemon_ref: PokemonRef) -> Option<&BattlePokemon> {
        self.participants
            .get(pokemon_ref.participant)?
            .roster
            .get(pokemon_ref.slot)
    }

    pub fn pokemon_mut(&mut self, pokemon_ref: PokemonRef) -> Option<&mut BattlePokemon> {
        self.participants
            .get_mut(pokemon_ref.participant)?
            .roster
            .get_mut(pokemon_ref.slot)
    }

    pub fn active_ref(&self, participant: usize) -> Option<PokemonRef> {
        let p = self.participants.get(participant)?;
        p.roster.get(p.active_index)?;
        Some(PokemonRef::new(participant, p.active_index))
    }

    /// Active, conscious Pokemon of every participant still in the battle, in participant order.
    pub fn active_refs(&self) -> Vec<PokemonRef> {
        (0..self.participants.len())
            .filter(|&index| !self.participants[index].is_defeated())
            .filter_map(|index| self.active_ref(index))
            .filter(|&r| self.pokemon(r).is_some_and(|p| !p.is_fainted()))
            .collect()
    }

    /// Participants still able to fight.
    pub fn remaining_participants(&self) -> Vec<usize> {
        (0..self.participants.len())
            .filter(|&index| !self.participants[index].is_defeated())
            .collect()
    }

    pub fn opponents_of(&self, participant: usize) -> Vec<usize> {
        self.remaining_participants()
            .into_iter()
            .filter(|&index| index != participant)
            .collect()
    }

    pub fn is_concluded(&self) -> bool {
        self.conclusion.is_some()
    }

    pub fn participant_name(&self, participant: usize) -> &str {
        self.participants
            .get(participant)
            .map(|p| p.name.as_str())
            .unwrap_or("???")
    }

    pub fn pokemon_name(&self, pokemon_ref: PokemonRef) -> String {
        self.pokemon(pokemon_ref)
            .map(|p| p.display_name())
            .unwrap_or_else(|| "???".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut a = TurnRng::from_seed(42);
        let mut b = TurnRng::from_seed(42);
        let first: Vec<u8> = (0..20).map(|_| a.next_outcome("test")).collect();
        let second: Vec<u8> = (0..20).map(|_| b.next_outcome("test")).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|&v| (1..=100).contains(&v)));
    }

    #[test]
    fn scripted_rng_clamps_into_range() {
        let mut rng = TurnRng::new_for_test(vec![50, 1, 500]);
        assert_eq!(rng.next_in_range("variance", 85, 100), 85);
        assert_eq!(rng.next_in_range("crit", 1, 24), 1);
        assert_eq!(rng.next_outcome("accuracy"), 100);
    }

    #[test]
    #[should_panic(expected = "TurnRng exhausted")]
    fn scripted_rng_panics_when_exhausted() {
        let mut rng = TurnRng::new_for_test(vec![]);
        rng.next_outcome("nothing left");
    }
}
