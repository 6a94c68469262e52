use super::{can_attempt_capture, resolve_capture, CaptureDevice};
use crate::battle::commands::PokemonRef;
use crate::battle::events::{BattleEventKind, EventBus};
use crate::battle::state::{BattleState, Conclusion, TurnRng};
use crate::catalog::Catalog;
use crate::errors::{BattleResult, ExecutionError};
use crate::player::MAX_ROSTER_SIZE;
use crate::pokemon::Origin;

/// Runs a capture action: announces the throw, rolls the outcome and, on
/// success, moves the Pokemon to the capturer and concludes the battle.
pub fn execute_capture(
    state: &mut BattleState,
    participant: usize,
    device: CaptureDevice,
    catalog: &Catalog,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let thrower = state.active_ref(participant);
    bus.emit_for(
        state,
        BattleEventKind::CaptureAttempted { participant, device },
        thrower,
        None,
    );

    let target = match can_attempt_capture(state, participant) {
        Ok(target) => target,
        Err(error) => {
            tracing::debug!(?error, participant, "capture rejected");
            bus.emit_for(
                state,
                BattleEventKind::ActionFailed {
                    reason: error.failure_reason(),
                },
                thrower,
                None,
            );
            return Ok(());
        }
    };

    let pokemon = state.pokemon(target).ok_or(ExecutionError::NoPokemon(target))?;
    let catch_rate = catalog.species(&pokemon.species)?.catch_rate;
    let charm = state
        .participants
        .get(participant)
        .is_some_and(|p| p.capture_charm);
    let outcome = resolve_capture(pokemon, catch_rate, device, charm, rng);

    bus.emit_for(
        state,
        BattleEventKind::CaptureResult {
            shake_count: outcome.shake_count,
            critical: outcome.critical,
            captured: outcome.captured,
        },
        thrower,
        Some(target),
    );

    if outcome.captured {
        let (instance_id, added_to_roster) = transfer_captured(state, participant, target)?;
        tracing::info!(
            battle_id = %state.battle_id,
            participant,
            instance_id,
            added_to_roster,
            "pokemon captured"
        );
        state.conclusion = Some(Conclusion::Captured {
            participant,
            instance_id,
            added_to_roster,
        });
    }
    Ok(())
}

/// Removes the captured Pokemon from its side and adds it to the capturer's
/// roster when there is room.
fn transfer_captured(
    state: &mut BattleState,
    participant: usize,
    target: PokemonRef,
) -> BattleResult<(u64, bool)> {
    let wild_side = state
        .participants
        .get_mut(target.participant)
        .ok_or(ExecutionError::InvalidParticipant(target.participant))?;
    if target.slot >= wild_side.roster.len() {
        return Err(ExecutionError::NoPokemon(target).into());
    }
    let mut captured = wild_side.roster.remove(target.slot);
    wild_side.active_index = 0;

    captured.reset_on_switch_out();
    captured.origin = Origin::Owned;
    let instance_id = captured.instance_id;

    let capturer = state
        .participants
        .get_mut(participant)
        .ok_or(ExecutionError::InvalidParticipant(participant))?;
    let added = capturer.roster.len() < MAX_ROSTER_SIZE;
    if added {
        capturer.roster.push(captured);
    }
    Ok((instance_id, added))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_wild_battle, standard_catalog, TestPokemonBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn successful_capture_moves_the_pokemon() {
        let mut state = create_wild_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("growlithe", 2).build(),
        );
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut bus = EventBus::new(&state);
        execute_capture(
            &mut state,
            0,
            CaptureDevice::Master,
            standard_catalog(),
            &mut rng,
            &mut bus,
        )
        .unwrap();

        assert_eq!(
            state.conclusion,
            Some(Conclusion::Captured {
                participant: 0,
                instance_id: 2,
                added_to_roster: true
            })
        );
        assert_eq!(state.participants[0].roster.len(), 2);
        assert_eq!(state.participants[0].roster[1].origin, Origin::Owned);
        assert!(state.participants[1].roster.is_empty());
        assert_eq!(
            bus.finish(&mut state).tags(),
            vec!["capture-attempted", "capture-result"]
        );
    }

    #[test]
    fn full_roster_still_captures() {
        let team: Vec<_> = (1..=6)
            .map(|id| TestPokemonBuilder::new("pikachu", id).build())
            .collect();
        let mut state = create_wild_battle(team[0].clone(), TestPokemonBuilder::new("growlithe", 9).build());
        state.participants[0].roster = team;
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut bus = EventBus::new(&state);
        execute_capture(
            &mut state,
            0,
            CaptureDevice::Master,
            standard_catalog(),
            &mut rng,
            &mut bus,
        )
        .unwrap();
        assert!(matches!(
            state.conclusion,
            Some(Conclusion::Captured {
                added_to_roster: false,
                ..
            })
        ));
        assert_eq!(state.participants[0].roster.len(), MAX_ROSTER_SIZE);
    }
}
