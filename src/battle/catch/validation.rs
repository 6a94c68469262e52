use crate::battle::commands::PokemonRef;
use crate::battle::events::ActionFailureReason;
use crate::battle::state::{BattleState, BattleType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureError {
    /// Capture is only possible against wild Pokemon.
    InvalidBattleType { battle_type: BattleType },
    NoTargetPokemon,
    TargetFainted,
}

impl CaptureError {
    pub fn failure_reason(&self) -> ActionFailureReason {
        match self {
            CaptureError::InvalidBattleType { .. } => ActionFailureReason::CaptureNotAllowed,
            CaptureError::NoTargetPokemon | CaptureError::TargetFainted => {
                ActionFailureReason::NoCaptureTarget
            }
        }
    }
}

pub fn is_capture_allowed(battle_type: BattleType) -> bool {
    battle_type == BattleType::Wild
}

/// The wild Pokemon a capture attempt by `participant` would target.
pub fn can_attempt_capture(state: &BattleState, participant: usize) -> Result<PokemonRef, CaptureError> {
    if !is_capture_allowed(state.battle_type) {
        return Err(CaptureError::InvalidBattleType {
            battle_type: state.battle_type,
        });
    }

    let target = state
        .participants
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != participant)
        .find_map(|(index, _)| state.active_ref(index))
        .ok_or(CaptureError::NoTargetPokemon)?;

    match state.pokemon(target) {
        Some(pokemon) if pokemon.is_fainted() => Err(CaptureError::TargetFainted),
        Some(_) => Ok(target),
        None => Err(CaptureError::NoTargetPokemon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, create_wild_battle, TestPokemonBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn trainer_battles_reject_capture() {
        let state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        assert_eq!(
            can_attempt_capture(&state, 0),
            Err(CaptureError::InvalidBattleType {
                battle_type: BattleType::Trainer
            })
        );
    }

    #[test]
    fn wild_target_is_found() {
        let state = create_wild_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("growlithe", 2).build(),
        );
        assert_eq!(can_attempt_capture(&state, 0), Ok(PokemonRef::new(1, 0)));
    }

    #[test]
    fn fainted_target_cannot_be_captured() {
        let state = create_wild_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("growlithe", 2).with_hp(0).build(),
        );
        assert_eq!(can_attempt_capture(&state, 0), Err(CaptureError::TargetFainted));
    }
}
