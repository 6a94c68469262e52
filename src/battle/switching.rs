use crate::config::SessionRules;
use crate::errors::SwitchError;
use crate::player::Participant;
use serde::{Deserialize, Serialize};

/// What changed after a successful switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchOutcome {
    pub from_slot: usize,
    pub to_slot: usize,
    pub forced: bool,
}

/// Checks a switch request without changing anything.
///
/// Forced switches (replacing a fainted Pokemon) ignore the switching rules
/// and the per-turn limit, but fail with [`SwitchError::NoAvailablePokemon`]
/// when nothing is left to send out.
pub fn validate_switch(
    participant: &Participant,
    from: usize,
    to: usize,
    forced: bool,
    rules: &SessionRules,
) -> Result<(), SwitchError> {
    if forced {
        if participant.available_switches().is_empty() {
            return Err(SwitchError::NoAvailablePokemon);
        }
    } else {
        if !rules.switching_allowed {
            return Err(SwitchError::SwitchingDisabled);
        }
        if participant.switches_this_turn >= rules.max_switches_per_turn {
            return Err(SwitchError::SwitchLimitReached {
                limit: rules.max_switches_per_turn,
            });
        }
    }

    if from != participant.active_index {
        return Err(SwitchError::NotActive {
            from,
            active: participant.active_index,
        });
    }
    let roster_size = participant.roster.len();
    let Some(incoming) = participant.roster.get(to) else {
        return Err(SwitchError::IndexOutOfRange {
            index: to,
            roster_size,
        });
    };
    if to == participant.active_index {
        return Err(SwitchError::AlreadyActive(to));
    }
    if incoming.is_fainted() {
        return Err(SwitchError::TargetFainted(to));
    }
    Ok(())
}

/// Validates and applies a switch. The outgoing Pokemon loses its stat
/// stages; the incoming one is recorded as having taken part.
pub fn resolve_switch(
    participant: &mut Participant,
    from: usize,
    to: usize,
    forced: bool,
    rules: &SessionRules,
) -> Result<SwitchOutcome, SwitchError> {
    validate_switch(participant, from, to, forced, rules)?;

    if let Some(outgoing) = participant.roster.get_mut(from) {
        outgoing.reset_on_switch_out();
    }
    participant.active_index = to;
    if !forced {
        participant.switches_this_turn += 1;
    }
    participant.record_participation();

    tracing::debug!(participant = %participant.id, from, to, forced, "switch applied");
    Ok(SwitchOutcome {
        from_slot: from,
        to_slot: to,
        forced,
    })
}
