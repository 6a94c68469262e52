use crate::battle::events::{BattleEventKind, DamageCause, EventBus, FieldSlot};
use crate::battle::state::{BattleState, FieldCondition};
use crate::errors::ExecutionError;
use crate::pokemon::StatusCondition;
use schema::StatType;
use serde::{Deserialize, Serialize};

/// Stable address of a Pokemon: participant index plus roster slot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PokemonRef {
    pub participant: usize,
    pub slot: usize,
}

impl PokemonRef {
    pub fn new(participant: usize, slot: usize) -> Self {
        Self { participant, slot }
    }
}

/// Atomic state mutations. Effects and resolvers describe what should happen
/// as commands; only [`execute_command`] touches the state.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleCommand {
    DealDamage {
        target: PokemonRef,
        amount: u16,
        cause: DamageCause,
    },
    Heal {
        target: PokemonRef,
        amount: u16,
    },
    Revive {
        target: PokemonRef,
        hp: u16,
    },
    /// Replacing one status kind with another is refused; counter updates are silent.
    SetStatus {
        target: PokemonRef,
        status: Option<StatusCondition>,
    },
    ChangeStatStage {
        target: PokemonRef,
        stat: StatType,
        delta: i8,
    },
    ConsumeHeldItem {
        target: PokemonRef,
    },
    SetWeather {
        weather: Option<FieldCondition>,
    },
    SetTerrain {
        terrain: Option<FieldCondition>,
    },
    AddFieldEffect {
        effect: FieldCondition,
    },
    /// Counts down every timed field condition and removes the expired ones.
    TickEnvironment,
    EmitEvent {
        kind: BattleEventKind,
        source: Option<PokemonRef>,
        target: Option<PokemonRef>,
    },
}

pub fn execute_command(
    command: BattleCommand,
    state: &mut BattleState,
    bus: &mut EventBus,
) -> Result<(), ExecutionError> {
    match command {
        BattleCommand::DealDamage {
            target,
            amount,
            cause,
        } => {
            let pokemon = pokemon_mut(state, target)?;
            if pokemon.is_fainted() {
                return Ok(());
            }
            let dealt = pokemon.take_damage(amount);
            let remaining_hp = pokemon.current_hp();
            let fainted = pokemon.is_fainted();
            bus.emit_for(
                state,
                BattleEventKind::DamageApplied {
                    amount: dealt,
                    remaining_hp,
                    cause,
                },
                None,
                Some(target),
            );
            if fainted {
                bus.emit_for(state, BattleEventKind::PokemonFainted, None, Some(target));
            }
        }
        BattleCommand::Heal { target, amount } => {
            let pokemon = pokemon_mut(state, target)?;
            let restored = pokemon.heal(amount);
            let new_hp = pokemon.current_hp();
            if restored > 0 {
                bus.emit_for(
                    state,
                    BattleEventKind::Healed {
                        amount: restored,
                        new_hp,
                    },
                    None,
                    Some(target),
                );
            }
        }
        BattleCommand::Revive { target, hp } => {
            let pokemon = pokemon_mut(state, target)?;
            if !pokemon.is_fainted() {
                return Ok(());
            }
            pokemon.set_hp(hp.max(1));
            pokemon.status = None;
            let new_hp = pokemon.current_hp();
            bus.emit_for(state, BattleEventKind::Revived { new_hp }, None, Some(target));
        }
        BattleCommand::SetStatus { target, status } => {
            let pokemon = pokemon_mut(state, target)?;
            if pokemon.is_fainted() {
                return Ok(());
            }
            let previous = pokemon.status;
            match (previous, status) {
                (None, Some(new)) => {
                    pokemon.status = Some(new);
                    bus.emit_for(
                        state,
                        BattleEventKind::StatusInflicted { status: new.kind() },
                        None,
                        Some(target),
                    );
                }
                (Some(old), None) => {
                    pokemon.status = None;
                    bus.emit_for(
                        state,
                        BattleEventKind::StatusCured { status: old.kind() },
                        None,
                        Some(target),
                    );
                }
                (Some(old), Some(new)) if old.kind() == new.kind() => {
                    pokemon.status = Some(new);
                }
                (Some(_), Some(_)) => {
                    tracing::debug!(?target, "status replacement refused");
                }
                (None, None) => {}
            }
        }
        BattleCommand::ChangeStatStage { target, stat, delta } => {
            let pokemon = pokemon_mut(state, target)?;
            if pokemon.is_fainted() || delta == 0 {
                return Ok(());
            }
            let (old_stage, new_stage) = pokemon.stat_stages.modify(stat, delta);
            let kind = if old_stage == new_stage {
                BattleEventKind::StatChangeBlocked {
                    stat,
                    rising: delta > 0,
                }
            } else {
                BattleEventKind::StatStageChanged {
                    stat,
                    old_stage,
                    new_stage,
                }
            };
            bus.emit_for(state, kind, None, Some(target));
        }
        BattleCommand::ConsumeHeldItem { target } => {
            let pokemon = pokemon_mut(state, target)?;
            if let Some(item_id) = pokemon.held_item.take() {
                bus.emit_for(
                    state,
                    BattleEventKind::HeldItemConsumed { item_id },
                    None,
                    Some(target),
                );
            }
        }
        BattleCommand::SetWeather { weather } => {
            let previous = std::mem::replace(&mut state.environment.weather, weather.clone());
            announce_replacement(state, bus, FieldSlot::Weather, previous, weather);
        }
        BattleCommand::SetTerrain { terrain } => {
            let previous = std::mem::replace(&mut state.environment.terrain, terrain.clone());
            announce_replacement(state, bus, FieldSlot::Terrain, previous, terrain);
        }
        BattleCommand::AddFieldEffect { effect } => {
            let id = effect.id.clone();
            let effects = &mut state.environment.field_effects;
            match effects.iter_mut().find(|existing| existing.id == id) {
                Some(existing) => existing.turns_remaining = effect.turns_remaining,
                None => {
                    effects.push(effect);
                    bus.emit(
                        state,
                        BattleEventKind::FieldStarted {
                            slot: FieldSlot::Field,
                            id,
                        },
                    );
                }
            }
        }
        BattleCommand::TickEnvironment => tick_environment(state, bus),
        BattleCommand::EmitEvent {
            kind,
            source,
            target,
        } => bus.emit_for(state, kind, source, target),
    }
    Ok(())
}

pub fn execute_command_batch(
    commands: Vec<BattleCommand>,
    state: &mut BattleState,
    bus: &mut EventBus,
) -> Result<(), ExecutionError> {
    for command in commands {
        execute_command(command, state, bus)?;
    }
    Ok(())
}

fn pokemon_mut(
    state: &mut BattleState,
    target: PokemonRef,
) -> Result<&mut crate::pokemon::BattlePokemon, ExecutionError> {
    if target.participant >= state.participants.len() {
        return Err(ExecutionError::InvalidParticipant(target.participant));
    }
    state
        .pokemon_mut(target)
        .ok_or(ExecutionError::NoPokemon(target))
}

fn announce_replacement(
    state: &BattleState,
    bus: &mut EventBus,
    slot: FieldSlot,
    previous: Option<FieldCondition>,
    next: Option<FieldCondition>,
) {
    let previous_id = previous.map(|condition| condition.id);
    let next_id = next.map(|condition| condition.id);
    if previous_id == next_id {
        return;
    }
    if let Some(id) = previous_id {
        bus.emit(state, BattleEventKind::FieldEnded { slot, id });
    }
    if let Some(id) = next_id {
        bus.emit(state, BattleEventKind::FieldStarted { slot, id });
    }
}

fn tick(condition: &mut FieldCondition) -> bool {
    match condition.turns_remaining.as_mut() {
        Some(turns) => {
            *turns = turns.saturating_sub(1);
            *turns > 0
        }
        None => true,
    }
}

fn tick_environment(state: &mut BattleState, bus: &mut EventBus) {
    let mut expired = Vec::new();

    if let Some(weather) = state.environment.weather.as_mut() {
        if !tick(weather) {
            expired.push((FieldSlot::Weather, weather.id.clone()));
            state.environment.weather = None;
        }
    }
    if let Some(terrain) = state.environment.terrain.as_mut() {
        if !tick(terrain) {
            expired.push((FieldSlot::Terrain, terrain.id.clone()));
            state.environment.terrain = None;
        }
    }
    state.environment.field_effects.retain_mut(|effect| {
        let keep = tick(effect);
        if !keep {
            expired.push((FieldSlot::Field, effect.id.clone()));
        }
        keep
    });

    for (slot, id) in expired {
        bus.emit(state, BattleEventKind::FieldEnded { slot, id });
    }
}
