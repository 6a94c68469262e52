use super::{Effect, EffectCategory, EffectRegistry, HookBundle, HookContext};
use crate::battle::commands::BattleCommand;
use crate::battle::events::DamageCause;
use schema::PokemonType;

pub fn register(registry: &mut EffectRegistry) {
    let item = |registry: &mut EffectRegistry, id: &str, hooks: HookBundle| {
        registry.register(EffectCategory::Item, id, hooks)
    };

    item(
        registry,
        "leftovers",
        HookBundle {
            on_end_turn: Some(leftovers),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "life-orb",
        HookBundle {
            on_damage_calc: Some(life_orb_boost),
            on_after_move: Some(life_orb_recoil),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "scope-lens",
        HookBundle {
            on_modify_crit_stage: Some(scope_lens),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "choice-scarf",
        HookBundle {
            on_modify_speed: Some(choice_scarf),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "charcoal",
        HookBundle {
            on_damage_calc: Some(charcoal),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "mystic-water",
        HookBundle {
            on_damage_calc: Some(mystic_water),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "miracle-seed",
        HookBundle {
            on_damage_calc: Some(miracle_seed),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "magnet",
        HookBundle {
            on_damage_calc: Some(magnet),
            ..HookBundle::NONE
        },
    );
    item(
        registry,
        "lum-berry",
        HookBundle {
            on_after_move: Some(lum_berry),
            on_end_turn: Some(lum_berry),
            ..HookBundle::NONE
        },
    );
}

fn leftovers(effect: &Effect, ctx: &mut HookContext<'_>) {
    let (Some(owner), Some(pokemon)) = (effect.owner_ref(), ctx.owner_pokemon(effect)) else {
        return;
    };
    if pokemon.current_hp() < pokemon.max_hp() {
        ctx.push(BattleCommand::Heal {
            target: owner,
            amount: (pokemon.max_hp() / 16).max(1),
        });
    }
}

fn life_orb_boost(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) {
        ctx.scale_damage(13, 10);
    }
}

fn life_orb_recoil(effect: &Effect, ctx: &mut HookContext<'_>) {
    if !ctx.owned_by_actor(effect) || ctx.damage == 0 {
        return;
    }
    let (Some(owner), Some(pokemon)) = (effect.owner_ref(), ctx.owner_pokemon(effect)) else {
        return;
    };
    ctx.push(BattleCommand::DealDamage {
        target: owner,
        amount: (pokemon.max_hp() / 10).max(1),
        cause: DamageCause::Effect(effect.id.clone()),
    });
}

fn scope_lens(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) {
        ctx.crit_stage += 1;
    }
}

fn choice_scarf(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) {
        ctx.scale_speed(3, 2);
    }
}

/// 1.2x for moves of the item's type.
fn type_boost(effect: &Effect, ctx: &mut HookContext<'_>, boosted: PokemonType) {
    if ctx.owned_by_actor(effect)
        && ctx
            .move_data
            .is_some_and(|move_data| move_data.move_type == boosted)
    {
        ctx.scale_damage(6, 5);
    }
}

fn charcoal(effect: &Effect, ctx: &mut HookContext<'_>) {
    type_boost(effect, ctx, PokemonType::Fire);
}

fn mystic_water(effect: &Effect, ctx: &mut HookContext<'_>) {
    type_boost(effect, ctx, PokemonType::Water);
}

fn miracle_seed(effect: &Effect, ctx: &mut HookContext<'_>) {
    type_boost(effect, ctx, PokemonType::Grass);
}

fn magnet(effect: &Effect, ctx: &mut HookContext<'_>) {
    type_boost(effect, ctx, PokemonType::Electric);
}

fn lum_berry(effect: &Effect, ctx: &mut HookContext<'_>) {
    let (Some(owner), Some(pokemon)) = (effect.owner_ref(), ctx.owner_pokemon(effect)) else {
        return;
    };
    if pokemon.status.is_none() || pokemon.held_item.as_deref() != Some(effect.id.as_str()) {
        return;
    }
    ctx.push(BattleCommand::ConsumeHeldItem { target: owner });
    ctx.push(BattleCommand::SetStatus {
        target: owner,
        status: None,
    });
}
