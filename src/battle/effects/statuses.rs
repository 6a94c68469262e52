use super::{Effect, EffectCategory, EffectRegistry, HookBundle, HookContext};
use crate::battle::commands::BattleCommand;
use crate::battle::events::{CannotActReason, DamageCause};
use crate::pokemon::StatusCondition;
use schema::StatusKind;

pub const FREEZE_THAW_CHANCE: u8 = 20;
pub const FULL_PARALYSIS_CHANCE: u8 = 25;

pub fn register(registry: &mut EffectRegistry) {
    let status = |registry: &mut EffectRegistry, kind: StatusKind, hooks: HookBundle| {
        registry.register(EffectCategory::Status, kind.effect_id(), hooks)
    };

    status(
        registry,
        StatusKind::Sleep,
        HookBundle {
            on_before_move: Some(sleep_before_move),
            ..HookBundle::NONE
        },
    );
    status(
        registry,
        StatusKind::Freeze,
        HookBundle {
            on_before_move: Some(freeze_before_move),
            ..HookBundle::NONE
        },
    );
    status(
        registry,
        StatusKind::Paralysis,
        HookBundle {
            on_before_move: Some(paralysis_before_move),
            on_modify_speed: Some(paralysis_speed),
            ..HookBundle::NONE
        },
    );
    status(
        registry,
        StatusKind::Burn,
        HookBundle {
            on_end_turn: Some(burn_damage),
            ..HookBundle::NONE
        },
    );
    status(
        registry,
        StatusKind::Poison,
        HookBundle {
            on_end_turn: Some(poison_damage),
            ..HookBundle::NONE
        },
    );
    status(
        registry,
        StatusKind::Toxic,
        HookBundle {
            on_end_turn: Some(toxic_damage),
            ..HookBundle::NONE
        },
    );
}

/// Sleep counts down once per attempted move and wakes the Pokemon when it reaches zero.
fn sleep_before_move(effect: &Effect, ctx: &mut HookContext<'_>) {
    if !ctx.owned_by_actor(effect) {
        return;
    }
    let (Some(owner), Some(pokemon)) = (effect.owner_ref(), ctx.owner_pokemon(effect)) else {
        return;
    };
    let Some(StatusCondition::Sleep(turns)) = pokemon.status else {
        return;
    };
    if turns == 0 {
        ctx.push(BattleCommand::SetStatus {
            target: owner,
            status: None,
        });
    } else {
        ctx.push(BattleCommand::SetStatus {
            target: owner,
            status: Some(StatusCondition::Sleep(turns - 1)),
        });
        ctx.cancelled = Some(CannotActReason::Asleep);
    }
}

fn freeze_before_move(effect: &Effect, ctx: &mut HookContext<'_>) {
    if !ctx.owned_by_actor(effect) {
        return;
    }
    let Some(owner) = effect.owner_ref() else {
        return;
    };
    if ctx.rng.next_outcome("freeze thaw check") <= FREEZE_THAW_CHANCE {
        ctx.push(BattleCommand::SetStatus {
            target: owner,
            status: None,
        });
    } else {
        ctx.cancelled = Some(CannotActReason::Frozen);
    }
}

fn paralysis_before_move(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect)
        && ctx.rng.next_outcome("full paralysis check") <= FULL_PARALYSIS_CHANCE
    {
        ctx.cancelled = Some(CannotActReason::FullyParalyzed);
    }
}

fn paralysis_speed(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) {
        ctx.scale_speed(1, 4);
    }
}

fn residual_damage(effect: &Effect, ctx: &mut HookContext<'_>, kind: StatusKind, numerator: u16, denominator: u16) {
    let (Some(owner), Some(pokemon)) = (effect.owner_ref(), ctx.owner_pokemon(effect)) else {
        return;
    };
    let amount = (pokemon.max_hp() as u32 * numerator as u32 / denominator as u32).max(1) as u16;
    ctx.push(BattleCommand::DealDamage {
        target: owner,
        amount,
        cause: DamageCause::Status(kind),
    });
}

fn burn_damage(effect: &Effect, ctx: &mut HookContext<'_>) {
    residual_damage(effect, ctx, StatusKind::Burn, 1, 16);
}

fn poison_damage(effect: &Effect, ctx: &mut HookContext<'_>) {
    residual_damage(effect, ctx, StatusKind::Poison, 1, 8);
}

/// Toxic deals n/16 on its n-th tick, then increments n.
fn toxic_damage(effect: &Effect, ctx: &mut HookContext<'_>) {
    let (Some(owner), Some(pokemon)) = (effect.owner_ref(), ctx.owner_pokemon(effect)) else {
        return;
    };
    let Some(StatusCondition::Toxic(counter)) = pokemon.status else {
        return;
    };
    let counter = counter.clamp(1, 15);
    residual_damage(effect, ctx, StatusKind::Toxic, counter as u16, 16);
    ctx.push(BattleCommand::SetStatus {
        target: owner,
        status: Some(StatusCondition::Toxic(counter + 1)),
    });
}
