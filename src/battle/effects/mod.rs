//! Effect hooks.
//!
//! Abilities, held items, statuses, weather, terrain and field effects are all
//! [`Effect`]s. Each one is looked up by id in the [`EffectRegistry`] and may
//! respond to any [`Trigger`]. Hooks read the battle through a [`HookContext`],
//! fold modifiers into its running values (damage, speed, crit stage), and
//! describe state changes as [`BattleCommand`]s for the caller to execute.

pub mod abilities;
pub mod field;
pub mod items;
pub mod registry;
pub mod statuses;

pub use registry::{EffectRegistry, Hook, HookBundle};

use crate::battle::commands::{BattleCommand, PokemonRef};
use crate::battle::events::{BattleEventKind, CannotActReason};
use crate::battle::state::{BattleState, TurnRng};
use crate::pokemon::BattlePokemon;
use schema::MoveData;
use serde::{Deserialize, Serialize};

/// Category order doubles as the dispatch order for a single trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectCategory {
    Ability,
    Item,
    Status,
    Weather,
    Terrain,
    Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectOwner {
    Pokemon(PokemonRef),
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    SwitchIn,
    BeforeMove,
    ModifySpeed,
    ModifyCritStage,
    DamageCalc,
    AfterMove,
    DamageTaken,
    EndTurn,
}

/// An effect currently in play, resolved against the registry.
#[derive(Debug, Clone)]
pub struct Effect {
    pub id: String,
    pub category: EffectCategory,
    pub owner: EffectOwner,
    pub hooks: HookBundle,
    pub remaining: Option<u8>,
}

impl Effect {
    pub fn owner_ref(&self) -> Option<PokemonRef> {
        match self.owner {
            EffectOwner::Pokemon(pokemon_ref) => Some(pokemon_ref),
            EffectOwner::Global => None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.owner == EffectOwner::Global
    }
}

/// Shared, mutable view handed to each hook in turn.
pub struct HookContext<'a> {
    pub state: &'a BattleState,
    pub rng: &'a mut TurnRng,
    pub actor: Option<PokemonRef>,
    pub target: Option<PokemonRef>,
    pub move_data: Option<&'a MoveData>,
    /// Running damage during `DamageCalc`; damage dealt for `AfterMove` and `DamageTaken`.
    pub damage: u32,
    pub speed: u32,
    pub crit_stage: u8,
    /// Set by a `BeforeMove` hook that prevents the move.
    pub cancelled: Option<CannotActReason>,
    commands: Vec<BattleCommand>,
}

impl<'a> HookContext<'a> {
    pub fn new(state: &'a BattleState, rng: &'a mut TurnRng) -> Self {
        Self {
            state,
            rng,
            actor: None,
            target: None,
            move_data: None,
            damage: 0,
            speed: 0,
            crit_stage: 0,
            cancelled: None,
            commands: Vec::new(),
        }
    }

    pub fn with_actor(mut self, actor: PokemonRef) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_target(mut self, target: PokemonRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_move(mut self, move_data: &'a MoveData) -> Self {
        self.move_data = Some(move_data);
        self
    }

    pub fn with_damage(mut self, damage: u32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_crit_stage(mut self, crit_stage: u8) -> Self {
        self.crit_stage = crit_stage;
        self
    }

    pub fn push(&mut self, command: BattleCommand) {
        self.commands.push(command);
    }

    pub fn scale_damage(&mut self, numerator: u32, denominator: u32) {
        self.damage = self.damage * numerator / denominator;
    }

    pub fn scale_speed(&mut self, numerator: u32, denominator: u32) {
        self.speed = self.speed * numerator / denominator;
    }

    pub fn actor_pokemon(&self) -> Option<&'a BattlePokemon> {
        let state = self.state;
        self.actor.and_then(|r| state.pokemon(r))
    }

    pub fn target_pokemon(&self) -> Option<&'a BattlePokemon> {
        let state = self.state;
        self.target.and_then(|r| state.pokemon(r))
    }

    /// True when the effect belongs to the Pokemon performing the action.
    pub fn owned_by_actor(&self, effect: &Effect) -> bool {
        effect.owner_ref().is_some() && effect.owner_ref() == self.actor
    }

    pub fn owned_by_target(&self, effect: &Effect) -> bool {
        effect.owner_ref().is_some() && effect.owner_ref() == self.target
    }

    pub fn owner_pokemon(&self, effect: &Effect) -> Option<&'a BattlePokemon> {
        let state = self.state;
        effect.owner_ref().and_then(|r| state.pokemon(r))
    }

    /// Announces an ability or item activation for the effect's owner.
    pub fn announce(&mut self, effect: &Effect) {
        if effect.category == EffectCategory::Ability {
            self.push(BattleCommand::EmitEvent {
                kind: BattleEventKind::AbilityActivated {
                    ability: effect.id.clone(),
                },
                source: effect.owner_ref(),
                target: None,
            });
        }
    }
}

/// Commands produced by a single effect.
#[derive(Debug, Clone)]
pub struct HookResult {
    pub effect_id: String,
    pub category: EffectCategory,
    pub commands: Vec<BattleCommand>,
}

impl HookResult {
    pub fn flatten(results: Vec<HookResult>) -> Vec<BattleCommand> {
        results.into_iter().flat_map(|result| result.commands).collect()
    }
}

/// Every effect in play: per-Pokemon effects for each conscious active Pokemon
/// in participant order, then weather, terrain and field effects.
/// Ids with no registry entry are logged and skipped.
pub fn active_effects(state: &BattleState, registry: &EffectRegistry) -> Vec<Effect> {
    let mut effects = Vec::new();

    for owner in state.active_refs() {
        let Some(pokemon) = state.pokemon(owner) else {
            continue;
        };
        let owned = [
            (EffectCategory::Ability, pokemon.ability.as_deref()),
            (EffectCategory::Item, pokemon.held_item.as_deref()),
            (
                EffectCategory::Status,
                pokemon.status.map(|status| status.kind().effect_id()),
            ),
        ];
        for (category, id) in owned {
            if let Some(id) = id {
                push_effect(&mut effects, registry, category, id, EffectOwner::Pokemon(owner), None);
            }
        }
    }

    let environment = &state.environment;
    if let Some(weather) = &environment.weather {
        push_effect(
            &mut effects,
            registry,
            EffectCategory::Weather,
            &weather.id,
            EffectOwner::Global,
            weather.turns_remaining,
        );
    }
    if let Some(terrain) = &environment.terrain {
        push_effect(
            &mut effects,
            registry,
            EffectCategory::Terrain,
            &terrain.id,
            EffectOwner::Global,
            terrain.turns_remaining,
        );
    }
    for field_effect in &environment.field_effects {
        push_effect(
            &mut effects,
            registry,
            EffectCategory::Field,
            &field_effect.id,
            EffectOwner::Global,
            field_effect.turns_remaining,
        );
    }

    effects.sort_by_key(|effect| effect.category);
    effects
}

fn push_effect(
    effects: &mut Vec<Effect>,
    registry: &EffectRegistry,
    category: EffectCategory,
    id: &str,
    owner: EffectOwner,
    remaining: Option<u8>,
) {
    match registry.lookup(category, id) {
        Some(hooks) => effects.push(Effect {
            id: id.to_string(),
            category,
            owner,
            hooks: *hooks,
            remaining,
        }),
        None => tracing::warn!(?category, id, "no registered effect, skipping"),
    }
}

/// End-of-turn order: per-Pokemon effects grouped by owner in participant order, globals last.
pub fn end_of_turn_order(mut effects: Vec<Effect>) -> Vec<Effect> {
    effects.sort_by_key(|effect| match effect.owner {
        EffectOwner::Pokemon(owner) => (0, owner.participant, effect.category),
        EffectOwner::Global => (1, 0, effect.category),
    });
    effects
}

/// Runs `trigger` over `effects` in order. Modifiers fold through the context,
/// so each hook sees the values left by the previous one. A cancelled
/// `BeforeMove` stops the remaining hooks.
pub fn run_hook(effects: &[Effect], trigger: Trigger, ctx: &mut HookContext<'_>) -> Vec<HookResult> {
    let mut results = Vec::new();
    for effect in effects {
        if trigger == Trigger::BeforeMove && ctx.cancelled.is_some() {
            break;
        }
        let Some(hook) = effect.hooks.get(trigger) else {
            continue;
        };
        hook(effect, ctx);
        let commands = std::mem::take(&mut ctx.commands);
        if !commands.is_empty() {
            results.push(HookResult {
                effect_id: effect.id.clone(),
                category: effect.category,
                commands,
            });
        }
    }
    results
}
