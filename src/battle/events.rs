use crate::battle::catch::CaptureDevice;
use crate::battle::commands::PokemonRef;
use crate::battle::state::{BattleState, BattleType, Conclusion};
use crate::pokemon::title_case;
use schema::{StatType, StatusKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannotActReason {
    Asleep,
    Frozen,
    FullyParalyzed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoEffectReason {
    /// Type chart gave a 0x multiplier.
    Immune,
    NoTarget,
    AlreadyStatused,
    StatusImmune,
    ItemHadNoEffect,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ActionFailureReason {
    NoPpRemaining,
    MoveNotKnown,
    ItemsNotAllowed,
    CaptureNotAllowed,
    NoCaptureTarget,
    CannotFleeTrainer,
    SwitchRejected { reason: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum DamageCause {
    Move,
    Recoil,
    Status(StatusKind),
    Weather(String),
    /// Ability or held item, by effect id.
    Effect(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSlot {
    Weather,
    Terrain,
    Field,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum BattleEventKind {
    BattleStarted { battle_type: BattleType },
    SentOut { participant: usize },
    TurnStarted { turn: u32 },
    MoveUsed { move_id: String, move_name: String },
    MoveMissed,
    CannotAct { reason: CannotActReason },
    NoEffect { reason: NoEffectReason },
    Effectiveness { multiplier: f32 },
    CriticalHit,
    DamageApplied { amount: u16, remaining_hp: u16, cause: DamageCause },
    Healed { amount: u16, new_hp: u16 },
    Revived { new_hp: u16 },
    StatusInflicted { status: StatusKind },
    StatusCured { status: StatusKind },
    StatStageChanged { stat: StatType, old_stage: i8, new_stage: i8 },
    StatChangeBlocked { stat: StatType, rising: bool },
    PokemonFainted,
    Switched { participant: usize, from_slot: usize, to_slot: usize, forced: bool },
    ItemUsed { participant: usize, item_id: String, item_name: String },
    HeldItemConsumed { item_id: String },
    AbilityActivated { ability: String },
    FieldStarted { slot: FieldSlot, id: String },
    FieldEnded { slot: FieldSlot, id: String },
    FleeSucceeded { participant: usize },
    FleeFailed { participant: usize },
    Forfeited { participant: usize },
    CaptureAttempted { participant: usize, device: CaptureDevice },
    CaptureResult { shake_count: u8, critical: bool, captured: bool },
    ParticipantEliminated { participant: usize },
    ActionFailed { reason: ActionFailureReason },
    TurnEnded { turn: u32 },
    BattleEnded { conclusion: Conclusion },
}

impl BattleEventKind {
    /// Stable kind tag used by clients.
    pub fn tag(&self) -> &'static str {
        match self {
            BattleEventKind::BattleStarted { .. } => "battle-started",
            BattleEventKind::SentOut { .. } => "sent-out",
            BattleEventKind::TurnStarted { .. } => "turn-started",
            BattleEventKind::MoveUsed { .. } => "move-used",
            BattleEventKind::MoveMissed => "move-missed",
            BattleEventKind::CannotAct { .. } => "cannot-act",
            BattleEventKind::NoEffect { .. } => "no-effect",
            BattleEventKind::Effectiveness { .. } => "effectiveness",
            BattleEventKind::CriticalHit => "critical-hit",
            BattleEventKind::DamageApplied { .. } => "damage-applied",
            BattleEventKind::Healed { .. } => "healed",
            BattleEventKind::Revived { .. } => "revived",
            BattleEventKind::StatusInflicted { .. } => "status-inflicted",
            BattleEventKind::StatusCured { .. } => "status-cured",
            BattleEventKind::StatStageChanged { .. } => "stat-stage-changed",
            BattleEventKind::StatChangeBlocked { .. } => "stat-change-blocked",
            BattleEventKind::PokemonFainted => "fainted",
            BattleEventKind::Switched { .. } => "switched",
            BattleEventKind::ItemUsed { .. } => "item-used",
            BattleEventKind::HeldItemConsumed { .. } => "held-item-consumed",
            BattleEventKind::AbilityActivated { .. } => "ability-activated",
            BattleEventKind::FieldStarted { .. } => "field-started",
            BattleEventKind::FieldEnded { .. } => "field-ended",
            BattleEventKind::FleeSucceeded { .. } => "flee-succeeded",
            BattleEventKind::FleeFailed { .. } => "flee-failed",
            BattleEventKind::Forfeited { .. } => "forfeited",
            BattleEventKind::CaptureAttempted { .. } => "capture-attempted",
            BattleEventKind::CaptureResult { .. } => "capture-result",
            BattleEventKind::ParticipantEliminated { .. } => "participant-eliminated",
            BattleEventKind::ActionFailed { .. } => "action-failed",
            BattleEventKind::TurnEnded { .. } => "turn-ended",
            BattleEventKind::BattleEnded { .. } => "battle-ended",
        }
    }

    /// Suggested presentation delay in milliseconds.
    pub fn delay_ms(&self) -> u32 {
        match self {
            BattleEventKind::TurnStarted { .. }
            | BattleEventKind::TurnEnded { .. }
            | BattleEventKind::Effectiveness { .. } => 0,
            BattleEventKind::MoveUsed { .. }
            | BattleEventKind::Switched { .. }
            | BattleEventKind::SentOut { .. } => 800,
            BattleEventKind::PokemonFainted | BattleEventKind::CaptureResult { .. } => 1200,
            BattleEventKind::BattleStarted { .. } | BattleEventKind::BattleEnded { .. } => 1500,
            _ => 600,
        }
    }
}

/// One presentation-ready fact about what happened during resolution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleEvent {
    pub id: u64,
    pub kind: BattleEventKind,
    pub source: Option<PokemonRef>,
    pub target: Option<PokemonRef>,
    pub message: String,
    pub delay_ms: u32,
}

impl BattleEvent {
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }

    /// Structured payload for clients that render their own text.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null)
    }

    pub fn is_silent(&self) -> bool {
        self.message.is_empty()
    }
}

/// Text for an event, rendered against the state at the moment it is emitted.
fn describe(
    kind: &BattleEventKind,
    source: Option<PokemonRef>,
    target: Option<PokemonRef>,
    state: &BattleState,
) -> String {
    let name_of = |r: Option<PokemonRef>| r.map(|r| state.pokemon_name(r)).unwrap_or_default();
    let source_name = name_of(source);
    let target_name = name_of(target);

    match kind {
        BattleEventKind::BattleStarted { battle_type } => match battle_type {
            BattleType::Wild => {
                let wild = state
                    .participants
                    .iter()
                    .skip(1)
                    .filter_map(|p| p.active_pokemon())
                    .map(|p| p.display_name())
                    .next()
                    .unwrap_or_default();
                format!("A wild {} appeared!", wild)
            }
            BattleType::Trainer => {
                let names: Vec<&str> = state.participants.iter().skip(1).map(|p| p.name.as_str()).collect();
                format!("{} would like to battle!", names.join(" and "))
            }
            BattleType::PlayerVsPlayer => {
                let names: Vec<&str> = state.participants.iter().map(|p| p.name.as_str()).collect();
                format!("The battle between {} begins!", names.join(" and "))
            }
        },
        BattleEventKind::SentOut { participant } => {
            format!("{} sent out {}!", state.participant_name(*participant), target_name)
        }
        BattleEventKind::TurnStarted { turn } => format!("=== Turn {} ===", turn),
        BattleEventKind::MoveUsed { move_name, .. } => format!("{} used {}!", source_name, move_name),
        BattleEventKind::MoveMissed => format!("{}'s attack missed!", source_name),
        BattleEventKind::CannotAct { reason } => match reason {
            CannotActReason::Asleep => format!("{} is fast asleep.", source_name),
            CannotActReason::Frozen => format!("{} is frozen solid!", source_name),
            CannotActReason::FullyParalyzed => {
                format!("{} is paralyzed! It can't move!", source_name)
            }
        },
        BattleEventKind::NoEffect { reason } => match reason {
            NoEffectReason::Immune => format!("It doesn't affect {}...", target_name),
            NoEffectReason::NoTarget => "But there was no target...".to_string(),
            NoEffectReason::AlreadyStatused | NoEffectReason::StatusImmune => {
                "But it failed!".to_string()
            }
            NoEffectReason::ItemHadNoEffect => "It won't have any effect.".to_string(),
        },
        BattleEventKind::Effectiveness { multiplier } => {
            if *multiplier > 1.0 {
                "It's super effective!".to_string()
            } else if *multiplier < 1.0 && *multiplier > 0.0 {
                "It's not very effective...".to_string()
            } else {
                String::new()
            }
        }
        BattleEventKind::CriticalHit => "A critical hit!".to_string(),
        BattleEventKind::DamageApplied { amount, cause, .. } => match cause {
            DamageCause::Move => format!("{} took {} damage!", target_name, amount),
            DamageCause::Recoil => format!("{} is damaged by recoil!", target_name),
            DamageCause::Status(StatusKind::Burn) => format!("{} is hurt by its burn!", target_name),
            DamageCause::Status(_) => format!("{} is hurt by poison!", target_name),
            DamageCause::Weather(weather) if weather == "hail" => {
                format!("{} is buffeted by the hail!", target_name)
            }
            DamageCause::Weather(_) => format!("{} is buffeted by the sandstorm!", target_name),
            DamageCause::Effect(effect) => {
                format!("{} was hurt by {}!", target_name, title_case(effect))
            }
        },
        BattleEventKind::Healed { amount, .. } => {
            format!("{} restored {} HP!", target_name, amount)
        }
        BattleEventKind::Revived { .. } => format!("{} was revived!", target_name),
        BattleEventKind::StatusInflicted { status } => match status {
            StatusKind::Sleep => format!("{} fell asleep!", target_name),
            StatusKind::Poison => format!("{} was poisoned!", target_name),
            StatusKind::Toxic => format!("{} was badly poisoned!", target_name),
            StatusKind::Burn => format!("{} was burned!", target_name),
            StatusKind::Freeze => format!("{} was frozen solid!", target_name),
            StatusKind::Paralysis => {
                format!("{} is paralyzed! It may be unable to move!", target_name)
            }
        },
        BattleEventKind::StatusCured { status } => match status {
            StatusKind::Sleep => format!("{} woke up!", target_name),
            StatusKind::Freeze => format!("{} thawed out!", target_name),
            other => format!("{} is no longer {}.", target_name, other),
        },
        BattleEventKind::StatStageChanged {
            stat,
            old_stage,
            new_stage,
        } => {
            let change = new_stage - old_stage;
            let wording = match change {
                c if c >= 3 => "rose drastically!",
                2 => "rose sharply!",
                1 => "rose!",
                -1 => "fell!",
                -2 => "harshly fell!",
                _ => "severely fell!",
            };
            format!("{}'s {} {}", target_name, stat, wording)
        }
        BattleEventKind::StatChangeBlocked { stat, rising } => {
            let direction = if *rising { "higher" } else { "lower" };
            format!("{}'s {} won't go any {}!", target_name, stat, direction)
        }
        BattleEventKind::PokemonFainted => format!("{} fainted!", target_name),
        BattleEventKind::Switched {
            participant,
            from_slot,
            forced,
            ..
        } => {
            let trainer = state.participant_name(*participant);
            if *forced {
                format!("{} sent out {}!", trainer, target_name)
            } else {
                let outgoing = state.pokemon_name(PokemonRef::new(*participant, *from_slot));
                format!("{} withdrew {} and sent out {}!", trainer, outgoing, target_name)
            }
        }
        BattleEventKind::ItemUsed {
            participant,
            item_name,
            ..
        } => format!("{} used a {}!", state.participant_name(*participant), item_name),
        BattleEventKind::HeldItemConsumed { item_id } => {
            format!("{} used its {}!", target_name, title_case(item_id))
        }
        BattleEventKind::AbilityActivated { ability } => {
            format!("[{}'s {}]", source_name, title_case(ability))
        }
        BattleEventKind::FieldStarted { id, .. } => field_started_message(id),
        BattleEventKind::FieldEnded { id, .. } => field_ended_message(id),
        BattleEventKind::FleeSucceeded { .. } => "Got away safely!".to_string(),
        BattleEventKind::FleeFailed { .. } => "Can't escape!".to_string(),
        BattleEventKind::Forfeited { participant } => {
            format!("{} forfeited the battle!", state.participant_name(*participant))
        }
        BattleEventKind::CaptureAttempted {
            participant,
            device,
        } => format!("{} threw a {}!", state.participant_name(*participant), device),
        BattleEventKind::CaptureResult {
            shake_count,
            captured,
            ..
        } => {
            if *captured {
                format!("Gotcha! {} was caught!", target_name)
            } else {
                match shake_count {
                    0 => "Oh no! The Pokemon broke free!".to_string(),
                    1 => "Aww! It appeared to be caught!".to_string(),
                    2 => "Aargh! Almost had it!".to_string(),
                    _ => "Gah! It was so close, too!".to_string(),
                }
            }
        }
        BattleEventKind::ParticipantEliminated { participant } => {
            format!("{} is out of usable Pokemon!", state.participant_name(*participant))
        }
        BattleEventKind::ActionFailed { reason } => match reason {
            ActionFailureReason::NoPpRemaining => {
                "But there was no PP left for the move!".to_string()
            }
            ActionFailureReason::MoveNotKnown => "But it failed!".to_string(),
            ActionFailureReason::ItemsNotAllowed => "Items can't be used right now!".to_string(),
            ActionFailureReason::CaptureNotAllowed => "The trainer blocked the ball!".to_string(),
            ActionFailureReason::NoCaptureTarget => "There's nothing to catch!".to_string(),
            ActionFailureReason::CannotFleeTrainer => {
                "No! There's no running from a trainer battle!".to_string()
            }
            ActionFailureReason::SwitchRejected { reason } => format!("Couldn't switch: {}", reason),
        },
        BattleEventKind::TurnEnded { .. } => String::new(),
        BattleEventKind::BattleEnded { conclusion } => match conclusion {
            Conclusion::Victory { winner } => {
                format!("{} won the battle!", state.participant_name(*winner))
            }
            Conclusion::Draw => "The battle ended in a draw!".to_string(),
            Conclusion::Fled { .. } => "The battle is over.".to_string(),
            Conclusion::Captured { participant, .. } => {
                format!("{} caught a new Pokemon!", state.participant_name(*participant))
            }
            Conclusion::Interrupted { .. } => "The battle was interrupted.".to_string(),
        },
    }
}

fn field_started_message(id: &str) -> String {
    match id {
        "rain" => "It started to rain!".to_string(),
        "sun" => "The sunlight turned harsh!".to_string(),
        "sandstorm" => "A sandstorm kicked up!".to_string(),
        "hail" => "It started to hail!".to_string(),
        "electric-terrain" => "An electric current ran across the battlefield!".to_string(),
        "grassy-terrain" => "Grass grew to cover the battlefield!".to_string(),
        "psychic-terrain" => "The battlefield got weird!".to_string(),
        "misty-terrain" => "Mist swirled around the battlefield!".to_string(),
        "mud-sport" => "Electricity's power was weakened!".to_string(),
        "water-sport" => "Fire's power was weakened!".to_string(),
        other => format!("{} took effect!", title_case(other)),
    }
}

fn field_ended_message(id: &str) -> String {
    match id {
        "rain" => "The rain stopped.".to_string(),
        "sun" => "The harsh sunlight faded.".to_string(),
        "sandstorm" => "The sandstorm subsided.".to_string(),
        "hail" => "The hail stopped.".to_string(),
        other => format!("{} wore off.", title_case(other)),
    }
}

/// Collects events for one resolution step and assigns their ids.
#[derive(Debug)]
pub struct EventBus {
    battle_id: String,
    turn: u32,
    next_id: u64,
    events: Vec<BattleEvent>,
}

impl EventBus {
    pub fn new(state: &BattleState) -> Self {
        Self {
            battle_id: state.battle_id.clone(),
            turn: state.turn_number,
            next_id: state.next_event_id,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, state: &BattleState, kind: BattleEventKind) {
        self.emit_for(state, kind, None, None);
    }

    pub fn emit_for(
        &mut self,
        state: &BattleState,
        kind: BattleEventKind,
        source: Option<PokemonRef>,
        target: Option<PokemonRef>,
    ) {
        let message = describe(&kind, source, target, state);
        let event = BattleEvent {
            id: self.next_id,
            delay_ms: kind.delay_ms(),
            kind,
            source,
            target,
            message,
        };
        self.next_id += 1;
        self.events.push(event);
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Closes the bus, handing the id counter back to the state.
    pub fn finish(self, state: &mut BattleState) -> BattleEventSequence {
        state.next_event_id = self.next_id;
        BattleEventSequence {
            battle_id: self.battle_id,
            turn: self.turn,
            events: self.events,
        }
    }
}

/// Ordered events produced by one resolution step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleEventSequence {
    pub battle_id: String,
    pub turn: u32,
    pub events: Vec<BattleEvent>,
}

impl BattleEventSequence {
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BattleEvent> {
        self.events.iter()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.events.iter().map(BattleEvent::tag).collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.events.iter().any(|event| event.tag() == tag)
    }

    pub fn count(&self, tag: &str) -> usize {
        self.events.iter().filter(|event| event.tag() == tag).count()
    }
}

impl fmt::Display for BattleEventSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in self.events.iter().filter(|event| !event.is_silent()) {
            writeln!(f, "  {}", event.message)?;
        }
        Ok(())
    }
}
