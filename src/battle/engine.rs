use crate::battle::calculators::compute_damage;
use crate::battle::catch::execute_capture;
use crate::battle::commands::{execute_command, execute_command_batch, BattleCommand, PokemonRef};
use crate::battle::effects::{
    active_effects, end_of_turn_order, run_hook, Effect, EffectCategory, EffectOwner, EffectRegistry,
    HookContext, HookResult, Trigger,
};
use crate::battle::events::{
    ActionFailureReason, BattleEventKind, BattleEventSequence, CannotActReason, DamageCause, EventBus,
    NoEffectReason,
};
use crate::battle::state::{
    BattlePhase, BattleState, BattleType, Conclusion, FieldCondition, TerminationReason, TurnRng,
};
use crate::battle::stats::{move_hits, staged_speed};
use crate::battle::switching::resolve_switch;
use crate::catalog::Catalog;
use crate::errors::{BattleResult, ExecutionError};
use crate::player::{ParticipantId, PlayerAction};
use crate::pokemon::{BattlePokemon, InstanceId, StatusCondition, UseMoveError};
use schema::{ItemEffect, MoveData, MoveEffect, MoveTarget, PokemonType, StatusKind};
use tokio::time::Instant;

/// Declared priority of switches, items, captures and flee attempts.
pub const NON_MOVE_PRIORITY: i8 = 6;
/// Passing always resolves last.
pub const PASS_PRIORITY: i8 = i8::MIN;

/// Read-only data the resolver needs. Shared by every session.
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    pub catalog: &'a Catalog,
    pub registry: &'a EffectRegistry,
}

impl<'a> EngineContext<'a> {
    pub fn new(catalog: &'a Catalog, registry: &'a EffectRegistry) -> Self {
        Self { catalog, registry }
    }
}

/// A submitted action plus the ordering data computed for it at the start of resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleAction {
    pub participant: usize,
    pub submitter: ParticipantId,
    pub action: PlayerAction,
    /// Replacement of a fainted Pokemon. Resolves before everything else.
    pub forced: bool,
    pub priority: i8,
    pub speed: u32,
    pub submitted_at: Option<Instant>,
    /// The Pokemon that was active when the turn began.
    pub actor: Option<InstanceId>,
}

impl BattleAction {
    pub fn new(participant: usize, action: PlayerAction) -> Self {
        Self {
            participant,
            submitter: ParticipantId::new(),
            action,
            forced: false,
            priority: 0,
            speed: 0,
            submitted_at: None,
            actor: None,
        }
    }

    pub fn forced_switch(participant: usize, from: usize, to: usize) -> Self {
        Self {
            forced: true,
            ..Self::new(participant, PlayerAction::SwitchPokemon { from, to })
        }
    }

    pub fn submitted_by(mut self, submitter: impl Into<ParticipantId>, at: Instant) -> Self {
        self.submitter = submitter.into();
        self.submitted_at = Some(at);
        self
    }

    fn is_non_move(&self) -> bool {
        !matches!(self.action, PlayerAction::UseMove { .. } | PlayerAction::Pass)
    }

    fn order_key(&self) -> (bool, i8, bool, u32) {
        (self.forced, self.priority, self.is_non_move(), self.speed)
    }
}

/// Speed after stages and `ModifySpeed` hooks (paralysis, abilities, items).
pub fn effective_speed(
    state: &BattleState,
    pokemon_ref: PokemonRef,
    effects: &[Effect],
    rng: &mut TurnRng,
) -> u32 {
    let Some(pokemon) = state.pokemon(pokemon_ref) else {
        return 0;
    };
    let mut ctx = HookContext::new(state, rng)
        .with_actor(pokemon_ref)
        .with_speed(staged_speed(pokemon) as u32);
    run_hook(effects, Trigger::ModifySpeed, &mut ctx);
    ctx.speed
}

/// Fills in submitter, acting instance, declared priority and effective speed.
pub fn prepare_actions(
    state: &BattleState,
    actions: &mut [BattleAction],
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
) -> BattleResult<()> {
    let effects = active_effects(state, ctx.registry);
    for action in actions.iter_mut() {
        let participant = state
            .participants
            .get(action.participant)
            .ok_or(ExecutionError::InvalidParticipant(action.participant))?;
        if action.submitter.is_empty() {
            action.submitter = participant.id.clone();
        }

        let active = state
            .active_ref(action.participant)
            .filter(|&r| state.pokemon(r).is_some_and(|p| !p.is_fainted()));
        action.actor = active.and_then(|r| state.pokemon(r)).map(|p| p.instance_id);
        action.priority = match &action.action {
            PlayerAction::UseMove { move_id, .. } => ctx.catalog.move_data(move_id)?.priority,
            PlayerAction::Pass => PASS_PRIORITY,
            _ => NON_MOVE_PRIORITY,
        };
        action.speed = active.map_or(0, |r| effective_speed(state, r, &effects, rng));
    }
    Ok(())
}

/// Sorts by forced flag, declared priority, non-move before move and speed, all
/// descending. Exact ties draw one tiebreak value each, in submission order.
/// Forced switches and passes keep submission order without drawing.
pub fn order_actions(mut actions: Vec<BattleAction>, rng: &mut TurnRng) -> Vec<BattleAction> {
    actions.sort_by(|a, b| b.order_key().cmp(&a.order_key()));

    let mut ordered = Vec::with_capacity(actions.len());
    let mut remaining = actions.into_iter().peekable();
    while let Some(first) = remaining.next() {
        let key = first.order_key();
        let mut group = vec![first];
        while let Some(next) = remaining.next_if(|a| a.order_key() == key) {
            group.push(next);
        }

        let needs_tiebreak =
            group.len() > 1 && !group[0].forced && group[0].action != PlayerAction::Pass;
        if needs_tiebreak {
            let mut keyed: Vec<(u32, BattleAction)> = group
                .into_iter()
                .map(|action| (rng.next_u32("speed tiebreak"), action))
                .collect();
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
            ordered.extend(keyed.into_iter().map(|(_, action)| action));
        } else {
            ordered.extend(group);
        }
    }
    ordered
}

/// Resolves one full turn. Only fatal engine errors escape as `Err`; anything
/// that merely cannot happen any more becomes a "failed" or "no effect" event.
pub fn resolve_turn(
    state: &mut BattleState,
    mut actions: Vec<BattleAction>,
    rng: &mut TurnRng,
    ctx: &EngineContext<'_>,
) -> BattleResult<BattleEventSequence> {
    let turn = state.turn_number;
    let mut bus = EventBus::new(state);
    state.phase = BattlePhase::ActionResolution;
    bus.emit(state, BattleEventKind::TurnStarted { turn });
    tracing::debug!(battle_id = %state.battle_id, turn, actions = actions.len(), "resolving turn");

    prepare_actions(state, &mut actions, ctx, rng)?;
    for action in order_actions(actions, rng) {
        if state.is_concluded() {
            break;
        }
        execute_action(state, &action, ctx, rng, &mut bus)?;
        check_termination(state, &mut bus);
    }

    if !state.is_concluded() {
        run_end_of_turn(state, ctx, rng, &mut bus)?;
        check_termination(state, &mut bus);
    }
    if !state.is_concluded() && state.rules.max_turns.is_some_and(|max| turn >= max) {
        tracing::info!(battle_id = %state.battle_id, turn, "turn limit reached, ending in a draw");
        state.conclusion = Some(Conclusion::Draw);
    }

    for participant in &mut state.participants {
        participant.switches_this_turn = 0;
    }
    state.turn_number += 1;
    bus.emit(state, BattleEventKind::TurnEnded { turn });
    Ok(finish_step(state, bus))
}

/// Applies the replacement switches of a forced-switch phase. The turn counter does not move.
pub fn resolve_replacements(
    state: &mut BattleState,
    actions: Vec<BattleAction>,
    rng: &mut TurnRng,
    ctx: &EngineContext<'_>,
) -> BattleResult<BattleEventSequence> {
    let mut bus = EventBus::new(state);
    for action in actions {
        if state.is_concluded() {
            break;
        }
        match action.action {
            PlayerAction::SwitchPokemon { from, to } => {
                execute_switch(state, action.participant, from, to, true, ctx, rng, &mut bus)?;
            }
            other => {
                tracing::debug!(participant = action.participant, action = ?other, "ignoring non-switch replacement");
            }
        }
        check_termination(state, &mut bus);
    }
    check_termination(state, &mut bus);
    Ok(finish_step(state, bus))
}

/// A voluntary switch that does not use up the participant's turn.
pub fn resolve_immediate_switch(
    state: &mut BattleState,
    participant: usize,
    from: usize,
    to: usize,
    rng: &mut TurnRng,
    ctx: &EngineContext<'_>,
) -> BattleResult<BattleEventSequence> {
    state.phase = BattlePhase::SwitchPhase;
    let mut bus = EventBus::new(state);
    execute_switch(state, participant, from, to, false, ctx, rng, &mut bus)?;
    check_termination(state, &mut bus);
    Ok(finish_step(state, bus))
}

/// Opening sequence: announcement, send-outs and entry hooks.
pub fn run_intro(
    state: &mut BattleState,
    rng: &mut TurnRng,
    ctx: &EngineContext<'_>,
) -> BattleResult<BattleEventSequence> {
    for participant in &mut state.participants {
        let lead_fainted = participant
            .active_pokemon()
            .is_none_or(|pokemon| pokemon.is_fainted());
        if lead_fainted {
            if let Some(first) = participant.roster.iter().position(|p| !p.is_fainted()) {
                participant.active_index = first;
            }
        }
    }

    let mut bus = EventBus::new(state);
    bus.emit(
        state,
        BattleEventKind::BattleStarted {
            battle_type: state.battle_type,
        },
    );
    for index in 0..state.participants.len() {
        let Some(lead) = state
            .active_ref(index)
            .filter(|&r| state.pokemon(r).is_some_and(|p| !p.is_fainted()))
        else {
            continue;
        };
        state.participants[index].record_participation();
        bus.emit_for(state, BattleEventKind::SentOut { participant: index }, None, Some(lead));
    }
    for lead in state.active_refs() {
        run_switch_in(state, ctx, rng, &mut bus, lead)?;
    }

    check_termination(state, &mut bus);
    Ok(finish_step(state, bus))
}

/// Marks a participant as forfeited and settles the battle if that decides it.
pub fn resolve_forfeit(state: &mut BattleState, participant: usize) -> BattleEventSequence {
    let mut bus = EventBus::new(state);
    forfeit(state, participant, &mut bus);
    check_termination(state, &mut bus);
    finish_step(state, bus)
}

/// Ends the battle from outside the turn loop.
pub fn interrupt(state: &mut BattleState, reason: TerminationReason) -> BattleEventSequence {
    let conclusion = Conclusion::Interrupted { reason };
    state.conclusion = Some(conclusion.clone());
    let mut bus = EventBus::new(state);
    bus.emit(state, BattleEventKind::BattleEnded { conclusion });
    state.phase = BattlePhase::Ended;
    bus.finish(state)
}

/// Participants still in the battle whose active Pokemon has fainted.
pub fn participants_needing_replacement(state: &BattleState) -> Vec<usize> {
    state
        .remaining_participants()
        .into_iter()
        .filter(|&index| !state.participants[index].has_active_pokemon())
        .collect()
}

/// Emits eliminations and records a victory or draw once at most one participant remains.
pub fn check_termination(state: &mut BattleState, bus: &mut EventBus) {
    if state.is_concluded() {
        return;
    }
    for index in 0..state.participants.len() {
        let newly_out = {
            let participant = &mut state.participants[index];
            let out = participant.is_defeated() && !participant.eliminated;
            if out {
                participant.eliminated = true;
            }
            out
        };
        if newly_out {
            bus.emit(state, BattleEventKind::ParticipantEliminated { participant: index });
        }
    }

    match state.remaining_participants().as_slice() {
        [] => state.conclusion = Some(Conclusion::Draw),
        [winner] => state.conclusion = Some(Conclusion::Victory { winner: *winner }),
        _ => {}
    }
}

fn finish_step(state: &mut BattleState, mut bus: EventBus) -> BattleEventSequence {
    if let Some(conclusion) = state.conclusion.clone() {
        tracing::info!(battle_id = %state.battle_id, turn = state.turn_number, ?conclusion, "battle concluded");
        bus.emit(state, BattleEventKind::BattleEnded { conclusion });
        state.phase = BattlePhase::VictorySequence;
    } else if participants_needing_replacement(state).is_empty() {
        state.phase = BattlePhase::ActionSelection;
    } else {
        state.phase = BattlePhase::ForcedSwitch;
    }
    bus.finish(state)
}

fn execute_action(
    state: &mut BattleState,
    action: &BattleAction,
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let participant = action.participant;
    let defeated = state
        .participants
        .get(participant)
        .ok_or(ExecutionError::InvalidParticipant(participant))?
        .is_defeated();
    if defeated {
        tracing::debug!(participant, "participant is out, skipping action");
        return Ok(());
    }

    match &action.action {
        PlayerAction::UseMove { move_id, target } => {
            execute_move(state, action, move_id, target.as_deref(), ctx, rng, bus)
        }
        PlayerAction::UseItem { item_id, target_slot } => {
            execute_item(state, participant, item_id, *target_slot, ctx, bus)
        }
        PlayerAction::SwitchPokemon { from, to } => {
            execute_switch(state, participant, *from, *to, action.forced, ctx, rng, bus)
        }
        PlayerAction::Capture { device } => {
            if acting_pokemon(state, action).is_none() {
                return Ok(());
            }
            execute_capture(state, participant, *device, ctx.catalog, rng, bus)
        }
        PlayerAction::Flee => execute_flee(state, participant, rng, bus),
        PlayerAction::Pass => Ok(()),
    }
}

/// The action's Pokemon, if it is still on the field and conscious.
fn acting_pokemon(state: &BattleState, action: &BattleAction) -> Option<PokemonRef> {
    let active = state.active_ref(action.participant)?;
    let pokemon = state.pokemon(active)?;
    let same = action.actor.is_none_or(|id| id == pokemon.instance_id);
    (same && !pokemon.is_fainted()).then_some(active)
}

fn select_target(state: &BattleState, participant: usize, requested: Option<&str>) -> Option<PokemonRef> {
    let standing = |index: usize| {
        state
            .active_ref(index)
            .filter(|&r| state.pokemon(r).is_some_and(|p| !p.is_fainted()))
    };
    let opponents = state.opponents_of(participant);
    requested
        .and_then(|id| state.participant_index(id))
        .filter(|index| opponents.contains(index))
        .and_then(standing)
        .or_else(|| opponents.into_iter().find_map(standing))
}

fn current_hp(state: &BattleState, pokemon_ref: PokemonRef) -> BattleResult<u16> {
    state
        .pokemon(pokemon_ref)
        .map(BattlePokemon::current_hp)
        .ok_or_else(|| ExecutionError::NoPokemon(pokemon_ref).into())
}

fn execute_move(
    state: &mut BattleState,
    action: &BattleAction,
    move_id: &str,
    requested_target: Option<&str>,
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let Some(attacker) = acting_pokemon(state, action) else {
        tracing::debug!(participant = action.participant, move_id, "actor left the field, skipping move");
        return Ok(());
    };
    let move_data = ctx.catalog.move_data(move_id)?.clone();

    let cancelled = dispatch(
        state,
        ctx,
        rng,
        bus,
        Trigger::BeforeMove,
        HookScope::actor(attacker).with_move(&move_data),
    )?;
    if let Some(reason) = cancelled {
        bus.emit_for(state, BattleEventKind::CannotAct { reason }, Some(attacker), None);
        return Ok(());
    }

    let used = state
        .pokemon_mut(attacker)
        .ok_or(ExecutionError::NoPokemon(attacker))?
        .use_move(move_id);
    if let Err(error) = used {
        let reason = match error {
            UseMoveError::NotKnown => ActionFailureReason::MoveNotKnown,
            UseMoveError::NoPpRemaining => ActionFailureReason::NoPpRemaining,
        };
        bus.emit_for(state, BattleEventKind::ActionFailed { reason }, Some(attacker), None);
        return Ok(());
    }
    bus.emit_for(
        state,
        BattleEventKind::MoveUsed {
            move_id: move_data.id.clone(),
            move_name: move_data.name.clone(),
        },
        Some(attacker),
        None,
    );

    let defender = match move_data.target {
        MoveTarget::User => attacker,
        MoveTarget::Opponent => match select_target(state, action.participant, requested_target) {
            Some(defender) => defender,
            None => {
                bus.emit_for(
                    state,
                    BattleEventKind::NoEffect {
                        reason: NoEffectReason::NoTarget,
                    },
                    Some(attacker),
                    None,
                );
                return Ok(());
            }
        },
    };

    if defender != attacker {
        let attacker_pokemon = state.pokemon(attacker).ok_or(ExecutionError::NoPokemon(attacker))?;
        if !move_hits(attacker_pokemon, &move_data, rng) {
            bus.emit_for(state, BattleEventKind::MoveMissed, Some(attacker), Some(defender));
            return Ok(());
        }
    }

    let mut dealt = 0;
    if move_data.is_damaging() {
        let effects = active_effects(state, ctx.registry);
        let outcome = compute_damage(state, attacker, defender, &move_data, &effects, rng)?;
        if outcome.effectiveness == 0.0 {
            bus.emit_for(
                state,
                BattleEventKind::NoEffect {
                    reason: NoEffectReason::Immune,
                },
                Some(attacker),
                Some(defender),
            );
            return Ok(());
        }
        if outcome.is_critical {
            bus.emit_for(state, BattleEventKind::CriticalHit, Some(attacker), Some(defender));
        }
        if outcome.effectiveness != 1.0 {
            bus.emit_for(
                state,
                BattleEventKind::Effectiveness {
                    multiplier: outcome.effectiveness,
                },
                Some(attacker),
                Some(defender),
            );
        }

        let before = current_hp(state, defender)?;
        execute_command(
            BattleCommand::DealDamage {
                target: defender,
                amount: outcome.amount,
                cause: DamageCause::Move,
            },
            state,
            bus,
        )?;
        dealt = before - current_hp(state, defender)?;

        execute_command_batch(drain_and_recoil(attacker, &move_data, dealt), state, bus)?;
        // effects from before the hit, so a defender that fainted still reacts
        dispatch_with(
            state,
            rng,
            bus,
            Trigger::DamageTaken,
            HookScope::actor(attacker)
                .with_target(defender)
                .with_move(&move_data)
                .with_damage(dealt as u32),
            &effects,
        )?;
    }

    apply_secondary_effects(state, attacker, defender, &move_data, rng, bus)?;
    dispatch(
        state,
        ctx,
        rng,
        bus,
        Trigger::AfterMove,
        HookScope::actor(attacker)
            .with_target(defender)
            .with_move(&move_data)
            .with_damage(dealt as u32),
    )?;
    Ok(())
}

fn drain_and_recoil(attacker: PokemonRef, move_data: &MoveData, dealt: u16) -> Vec<BattleCommand> {
    if dealt == 0 {
        return Vec::new();
    }
    let share = |percent: u8| ((dealt as u32 * percent as u32 / 100) as u16).max(1);
    move_data
        .effects
        .iter()
        .filter_map(|effect| match effect {
            MoveEffect::Drain { percent } => Some(BattleCommand::Heal {
                target: attacker,
                amount: share(*percent),
            }),
            MoveEffect::Recoil { percent } => Some(BattleCommand::DealDamage {
                target: attacker,
                amount: share(*percent),
                cause: DamageCause::Recoil,
            }),
            _ => None,
        })
        .collect()
}

fn roll_chance(chance: u8, reason: &str, rng: &mut TurnRng) -> bool {
    chance >= 100 || rng.next_outcome(reason) <= chance
}

/// Types that can never receive a status.
fn status_immune(pokemon: &BattlePokemon, status: StatusKind) -> bool {
    let immune_types: &[PokemonType] = match status {
        StatusKind::Burn => &[PokemonType::Fire],
        StatusKind::Poison | StatusKind::Toxic => &[PokemonType::Poison, PokemonType::Steel],
        StatusKind::Paralysis => &[PokemonType::Electric],
        StatusKind::Freeze => &[PokemonType::Ice],
        StatusKind::Sleep => &[],
    };
    immune_types.iter().any(|&t| pokemon.has_type(t))
}

fn timed(id: &str, turns: u8) -> FieldCondition {
    FieldCondition::new(id, (turns > 0).then_some(turns))
}

fn is_standing(state: &BattleState, pokemon_ref: PokemonRef) -> bool {
    state.pokemon(pokemon_ref).is_some_and(|p| !p.is_fainted())
}

/// Status, stat and field effects listed on the move. Chances below 100 roll
/// once each, in listed order, and only when the effect could apply.
fn apply_secondary_effects(
    state: &mut BattleState,
    attacker: PokemonRef,
    defender: PokemonRef,
    move_data: &MoveData,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let primary = !move_data.is_damaging();
    for effect in &move_data.effects {
        match effect {
            MoveEffect::InflictStatus { status, chance } => {
                let Some(pokemon) = state.pokemon(defender).filter(|p| !p.is_fainted()) else {
                    continue;
                };
                let blocked = if pokemon.status.is_some() {
                    Some(NoEffectReason::AlreadyStatused)
                } else if status_immune(pokemon, *status) {
                    Some(NoEffectReason::StatusImmune)
                } else {
                    None
                };
                if let Some(reason) = blocked {
                    if primary {
                        bus.emit_for(state, BattleEventKind::NoEffect { reason }, Some(attacker), Some(defender));
                    }
                    continue;
                }
                if !roll_chance(*chance, "secondary status", rng) {
                    continue;
                }
                let sleep_turns = if *status == StatusKind::Sleep {
                    rng.next_in_range("sleep duration", 1, 3) as u8
                } else {
                    0
                };
                execute_command(
                    BattleCommand::SetStatus {
                        target: defender,
                        status: Some(StatusCondition::inflict(*status, sleep_turns)),
                    },
                    state,
                    bus,
                )?;
            }
            MoveEffect::StatChange {
                target,
                stat,
                stages,
                chance,
            } => {
                let target = match target {
                    MoveTarget::User => attacker,
                    MoveTarget::Opponent => defender,
                };
                if !is_standing(state, target) || !roll_chance(*chance, "secondary stat change", rng) {
                    continue;
                }
                execute_command(
                    BattleCommand::ChangeStatStage {
                        target,
                        stat: *stat,
                        delta: *stages,
                    },
                    state,
                    bus,
                )?;
            }
            MoveEffect::Heal { percent } => {
                let Some(pokemon) = state.pokemon(attacker).filter(|p| !p.is_fainted()) else {
                    continue;
                };
                let amount = ((pokemon.max_hp() as u32 * *percent as u32 / 100) as u16).max(1);
                execute_command(BattleCommand::Heal { target: attacker, amount }, state, bus)?;
            }
            MoveEffect::SetWeather { weather, turns } => execute_command(
                BattleCommand::SetWeather {
                    weather: Some(timed(weather, *turns)),
                },
                state,
                bus,
            )?,
            MoveEffect::SetTerrain { terrain, turns } => execute_command(
                BattleCommand::SetTerrain {
                    terrain: Some(timed(terrain, *turns)),
                },
                state,
                bus,
            )?,
            MoveEffect::AddFieldEffect { effect, turns } => execute_command(
                BattleCommand::AddFieldEffect {
                    effect: timed(effect, *turns),
                },
                state,
                bus,
            )?,
            MoveEffect::Drain { .. } | MoveEffect::Recoil { .. } => {}
        }
    }
    Ok(())
}

/// Commands a bag item would produce for its target. Empty means "no effect".
fn item_commands(
    effect: &ItemEffect,
    pokemon: &BattlePokemon,
    target: PokemonRef,
    on_field: bool,
) -> Vec<BattleCommand> {
    let fainted = pokemon.is_fainted();
    let missing_hp = pokemon.max_hp() - pokemon.current_hp();
    let cure = BattleCommand::SetStatus { target, status: None };

    match effect {
        ItemEffect::Heal { amount } if !fainted && missing_hp > 0 => vec![BattleCommand::Heal {
            target,
            amount: *amount,
        }],
        ItemEffect::HealFull if !fainted => {
            let mut commands = Vec::new();
            if missing_hp > 0 {
                commands.push(BattleCommand::Heal {
                    target,
                    amount: missing_hp,
                });
            }
            if pokemon.status.is_some() {
                commands.push(cure);
            }
            commands
        }
        ItemEffect::CureStatus { status } if !fainted => match pokemon.status {
            Some(current) if status.is_none_or(|kind| kind == current.kind()) => vec![cure],
            _ => Vec::new(),
        },
        ItemEffect::Revive { percent } if fainted => {
            let hp = (pokemon.max_hp() as u32 * *percent as u32 / 100) as u16;
            vec![BattleCommand::Revive {
                target,
                hp: hp.max(1),
            }]
        }
        ItemEffect::BoostStat { stat, stages } if on_field && !fainted => {
            vec![BattleCommand::ChangeStatStage {
                target,
                stat: *stat,
                delta: *stages,
            }]
        }
        _ => Vec::new(),
    }
}

fn execute_item(
    state: &mut BattleState,
    participant: usize,
    item_id: &str,
    target_slot: Option<usize>,
    ctx: &EngineContext<'_>,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let user = state.active_ref(participant);
    if !state.rules.item_use_allowed {
        bus.emit_for(
            state,
            BattleEventKind::ActionFailed {
                reason: ActionFailureReason::ItemsNotAllowed,
            },
            user,
            None,
        );
        return Ok(());
    }

    let item = ctx.catalog.item(item_id)?;
    let active_index = state
        .participants
        .get(participant)
        .ok_or(ExecutionError::InvalidParticipant(participant))?
        .active_index;
    let target = PokemonRef::new(participant, target_slot.unwrap_or(active_index));
    bus.emit_for(
        state,
        BattleEventKind::ItemUsed {
            participant,
            item_id: item.id.clone(),
            item_name: item.name.clone(),
        },
        user,
        Some(target),
    );

    let commands = match state.pokemon(target) {
        Some(pokemon) => item_commands(&item.effect, pokemon, target, target.slot == active_index),
        None => Vec::new(),
    };
    if commands.is_empty() {
        bus.emit_for(
            state,
            BattleEventKind::NoEffect {
                reason: NoEffectReason::ItemHadNoEffect,
            },
            user,
            Some(target),
        );
        return Ok(());
    }
    execute_command_batch(commands, state, bus)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn execute_switch(
    state: &mut BattleState,
    participant: usize,
    from: usize,
    to: usize,
    forced: bool,
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let rules = state.rules.clone();
    let side = state
        .participants
        .get_mut(participant)
        .ok_or(ExecutionError::InvalidParticipant(participant))?;
    match resolve_switch(side, from, to, forced, &rules) {
        Ok(outcome) => {
            let incoming = PokemonRef::new(participant, outcome.to_slot);
            bus.emit_for(
                state,
                BattleEventKind::Switched {
                    participant,
                    from_slot: outcome.from_slot,
                    to_slot: outcome.to_slot,
                    forced,
                },
                None,
                Some(incoming),
            );
            run_switch_in(state, ctx, rng, bus, incoming)
        }
        Err(error) => {
            tracing::debug!(participant, %error, "switch rejected during resolution");
            bus.emit_for(
                state,
                BattleEventKind::ActionFailed {
                    reason: ActionFailureReason::SwitchRejected {
                        reason: error.to_string(),
                    },
                },
                state.active_ref(participant),
                None,
            );
            Ok(())
        }
    }
}

/// Wild escape: always succeeds when at least as fast, otherwise
/// `(own * 128 / wild + 30 * attempts) mod 256` out of 256.
pub fn escape_succeeds(own_speed: u32, wild_speed: u32, attempts: u8, rng: &mut TurnRng) -> bool {
    if own_speed >= wild_speed {
        return true;
    }
    let odds = (own_speed * 128 / wild_speed.max(1) + 30 * attempts as u32) % 256;
    (rng.next_in_range("flee check", 0, 255) as u32) < odds
}

fn execute_flee(
    state: &mut BattleState,
    participant: usize,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let runner = state.active_ref(participant);
    match state.battle_type {
        BattleType::Trainer => bus.emit_for(
            state,
            BattleEventKind::ActionFailed {
                reason: ActionFailureReason::CannotFleeTrainer,
            },
            runner,
            None,
        ),
        BattleType::PlayerVsPlayer => forfeit(state, participant, bus),
        BattleType::Wild => {
            let side = state
                .participants
                .get_mut(participant)
                .ok_or(ExecutionError::InvalidParticipant(participant))?;
            side.flee_attempts = side.flee_attempts.saturating_add(1);
            let attempts = side.flee_attempts;

            let speed_of = |r: PokemonRef| state.pokemon(r).map_or(0, |p| staged_speed(p) as u32);
            let own_speed = runner.map_or(0, speed_of);
            let wild_speed = state
                .opponents_of(participant)
                .into_iter()
                .filter_map(|index| state.active_ref(index))
                .map(speed_of)
                .max()
                .unwrap_or(0);

            if escape_succeeds(own_speed, wild_speed, attempts, rng) {
                bus.emit_for(state, BattleEventKind::FleeSucceeded { participant }, runner, None);
                state.conclusion = Some(Conclusion::Fled { participant });
            } else {
                bus.emit_for(state, BattleEventKind::FleeFailed { participant }, runner, None);
            }
        }
    }
    Ok(())
}

fn forfeit(state: &mut BattleState, participant: usize, bus: &mut EventBus) {
    let Some(side) = state.participants.get_mut(participant) else {
        return;
    };
    side.forfeited = true;
    tracing::info!(battle_id = %state.battle_id, participant, "participant forfeited");
    bus.emit(state, BattleEventKind::Forfeited { participant });
}

fn run_end_of_turn(
    state: &mut BattleState,
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let effects = end_of_turn_order(active_effects(state, ctx.registry));
    dispatch_each(state, rng, bus, Trigger::EndTurn, HookScope::default(), effects)?;
    execute_command(BattleCommand::TickEnvironment, state, bus)?;
    Ok(())
}

fn run_switch_in(
    state: &mut BattleState,
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
    bus: &mut EventBus,
    incoming: PokemonRef,
) -> BattleResult<()> {
    let effects = active_effects(state, ctx.registry);
    dispatch_each(state, rng, bus, Trigger::SwitchIn, HookScope::actor(incoming), effects)
}

/// Who and what a trigger is about.
#[derive(Clone, Copy, Default)]
struct HookScope<'m> {
    actor: Option<PokemonRef>,
    target: Option<PokemonRef>,
    move_data: Option<&'m MoveData>,
    damage: u32,
}

impl<'m> HookScope<'m> {
    fn actor(actor: PokemonRef) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    fn with_target(mut self, target: PokemonRef) -> Self {
        self.target = Some(target);
        self
    }

    fn with_move(mut self, move_data: &'m MoveData) -> Self {
        self.move_data = Some(move_data);
        self
    }

    fn with_damage(mut self, damage: u32) -> Self {
        self.damage = damage;
        self
    }

    fn context<'a>(&self, state: &'a BattleState, rng: &'a mut TurnRng) -> HookContext<'a>
    where
        'm: 'a,
    {
        let mut ctx = HookContext::new(state, rng).with_damage(self.damage);
        ctx.actor = self.actor;
        ctx.target = self.target;
        ctx.move_data = self.move_data;
        ctx
    }
}

/// Runs a trigger over every effect against one snapshot, then executes the
/// collected commands. Returns the `BeforeMove` cancellation, if any.
fn dispatch(
    state: &mut BattleState,
    ctx: &EngineContext<'_>,
    rng: &mut TurnRng,
    bus: &mut EventBus,
    trigger: Trigger,
    scope: HookScope<'_>,
) -> BattleResult<Option<CannotActReason>> {
    let effects = active_effects(state, ctx.registry);
    let (cancelled, commands) = {
        let mut hook_ctx = scope.context(state, rng);
        let results = run_hook(&effects, trigger, &mut hook_ctx);
        (hook_ctx.cancelled, HookResult::flatten(results))
    };
    execute_command_batch(commands, state, bus)?;
    Ok(cancelled)
}

fn dispatch_with(
    state: &mut BattleState,
    rng: &mut TurnRng,
    bus: &mut EventBus,
    trigger: Trigger,
    scope: HookScope<'_>,
    effects: &[Effect],
) -> BattleResult<()> {
    let commands = {
        let mut hook_ctx = scope.context(state, rng);
        HookResult::flatten(run_hook(effects, trigger, &mut hook_ctx))
    };
    execute_command_batch(commands, state, bus)?;
    Ok(())
}

/// Runs a trigger one effect at a time, executing each effect's commands
/// before the next hook reads the state. Effects that left play are skipped.
fn dispatch_each(
    state: &mut BattleState,
    rng: &mut TurnRng,
    bus: &mut EventBus,
    trigger: Trigger,
    scope: HookScope<'_>,
    effects: Vec<Effect>,
) -> BattleResult<()> {
    for effect in effects {
        if !effect_in_play(state, &effect) {
            continue;
        }
        let commands = {
            let mut hook_ctx = scope.context(state, rng);
            HookResult::flatten(run_hook(std::slice::from_ref(&effect), trigger, &mut hook_ctx))
        };
        execute_command_batch(commands, state, bus)?;
    }
    Ok(())
}

fn effect_in_play(state: &BattleState, effect: &Effect) -> bool {
    match effect.owner {
        EffectOwner::Pokemon(owner) => {
            if state.active_ref(owner.participant) != Some(owner) {
                return false;
            }
            state.pokemon(owner).is_some_and(|pokemon| {
                !pokemon.is_fainted()
                    && match effect.category {
                        EffectCategory::Ability => pokemon.ability.as_deref() == Some(effect.id.as_str()),
                        EffectCategory::Item => pokemon.held_item.as_deref() == Some(effect.id.as_str()),
                        EffectCategory::Status => pokemon
                            .status
                            .is_some_and(|status| status.kind().effect_id() == effect.id),
                        _ => false,
                    }
            })
        }
        EffectOwner::Global => match effect.category {
            EffectCategory::Weather => state.environment.weather_is(&effect.id),
            EffectCategory::Terrain => state.environment.terrain_is(&effect.id),
            EffectCategory::Field => state.environment.has_field_effect(&effect.id),
            _ => false,
        },
    }
}
