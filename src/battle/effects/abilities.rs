use super::{Effect, EffectCategory, EffectRegistry, HookBundle, HookContext};
use crate::battle::commands::BattleCommand;
use crate::battle::events::DamageCause;
use schema::{MoveCategory, PokemonType, StatType};

pub fn register(registry: &mut EffectRegistry) {
    let ability = |registry: &mut EffectRegistry, id: &str, hooks: HookBundle| {
        registry.register(EffectCategory::Ability, id, hooks)
    };

    ability(
        registry,
        "intimidate",
        HookBundle {
            on_switch_in: Some(intimidate),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "blaze",
        HookBundle {
            on_damage_calc: Some(blaze),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "torrent",
        HookBundle {
            on_damage_calc: Some(torrent),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "overgrow",
        HookBundle {
            on_damage_calc: Some(overgrow),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "huge-power",
        HookBundle {
            on_damage_calc: Some(huge_power),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "thick-fat",
        HookBundle {
            on_damage_calc: Some(thick_fat),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "speed-boost",
        HookBundle {
            on_end_turn: Some(speed_boost),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "swift-swim",
        HookBundle {
            on_modify_speed: Some(swift_swim),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "chlorophyll",
        HookBundle {
            on_modify_speed: Some(chlorophyll),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "super-luck",
        HookBundle {
            on_modify_crit_stage: Some(super_luck),
            ..HookBundle::NONE
        },
    );
    ability(
        registry,
        "rough-skin",
        HookBundle {
            on_damage_taken: Some(rough_skin),
            ..HookBundle::NONE
        },
    );
}

fn intimidate(effect: &Effect, ctx: &mut HookContext<'_>) {
    let Some(owner) = effect.owner_ref() else {
        return;
    };
    if ctx.actor != Some(owner) {
        return;
    }
    let targets: Vec<_> = ctx
        .state
        .active_refs()
        .into_iter()
        .filter(|target| target.participant != owner.participant)
        .collect();
    if targets.is_empty() {
        return;
    }
    ctx.announce(effect);
    for target in targets {
        ctx.push(BattleCommand::ChangeStatStage {
            target,
            stat: StatType::Attack,
            delta: -1,
        });
    }
}

/// Boosts moves of `boosted` type by 1.5x while the user is at or below a third of its HP.
fn pinch_boost(effect: &Effect, ctx: &mut HookContext<'_>, boosted: PokemonType) {
    if !ctx.owned_by_actor(effect) {
        return;
    }
    let (Some(pokemon), Some(move_data)) = (ctx.actor_pokemon(), ctx.move_data) else {
        return;
    };
    if move_data.move_type == boosted && pokemon.current_hp() as u32 * 3 <= pokemon.max_hp() as u32 {
        ctx.scale_damage(3, 2);
    }
}

fn blaze(effect: &Effect, ctx: &mut HookContext<'_>) {
    pinch_boost(effect, ctx, PokemonType::Fire);
}

fn torrent(effect: &Effect, ctx: &mut HookContext<'_>) {
    pinch_boost(effect, ctx, PokemonType::Water);
}

fn overgrow(effect: &Effect, ctx: &mut HookContext<'_>) {
    pinch_boost(effect, ctx, PokemonType::Grass);
}

fn huge_power(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect)
        && ctx
            .move_data
            .is_some_and(|move_data| move_data.category == MoveCategory::Physical)
    {
        ctx.scale_damage(2, 1);
    }
}

fn thick_fat(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_target(effect)
        && ctx.move_data.is_some_and(|move_data| {
            matches!(move_data.move_type, PokemonType::Fire | PokemonType::Ice)
        })
    {
        ctx.scale_damage(1, 2);
    }
}

fn speed_boost(effect: &Effect, ctx: &mut HookContext<'_>) {
    let Some(owner) = effect.owner_ref() else {
        return;
    };
    ctx.announce(effect);
    ctx.push(BattleCommand::ChangeStatStage {
        target: owner,
        stat: StatType::Speed,
        delta: 1,
    });
}

fn swift_swim(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) && ctx.state.environment.weather_is("rain") {
        ctx.scale_speed(2, 1);
    }
}

fn chlorophyll(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) && ctx.state.environment.weather_is("sun") {
        ctx.scale_speed(2, 1);
    }
}

fn super_luck(effect: &Effect, ctx: &mut HookContext<'_>) {
    if ctx.owned_by_actor(effect) {
        ctx.crit_stage += 1;
    }
}

fn rough_skin(effect: &Effect, ctx: &mut HookContext<'_>) {
    if !ctx.owned_by_target(effect) || ctx.damage == 0 {
        return;
    }
    let (Some(attacker), Some(move_data)) = (ctx.actor, ctx.move_data) else {
        return;
    };
    if !move_data.contact {
        return;
    }
    let Some(attacker_pokemon) = ctx.actor_pokemon() else {
        return;
    };
    let amount = (attacker_pokemon.max_hp() / 8).max(1);
    ctx.announce(effect);
    ctx.push(BattleCommand::DealDamage {
        target: attacker,
        amount,
        cause: DamageCause::Effect(effect.id.clone()),
    });
}

#[cfg(test)]
mod tests {
    use crate::battle::commands::{BattleCommand, PokemonRef};
    use crate::battle::effects::{active_effects, run_hook, EffectRegistry, HookContext, HookResult, Trigger};
    use crate::battle::state::{FieldCondition, TurnRng};
    use crate::battle::tests::common::{create_test_battle, test_move, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::StatType;

    #[test]
    fn intimidate_lowers_opposing_attack_on_switch_in() {
        let state = create_test_battle(
            TestPokemonBuilder::new("growlithe", 1).with_ability("intimidate").build(),
            TestPokemonBuilder::new("machop", 2).build(),
        );
        let effects = active_effects(&state, &EffectRegistry::standard());
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut ctx = HookContext::new(&state, &mut rng).with_actor(PokemonRef::new(0, 0));
        let commands = HookResult::flatten(run_hook(&effects, Trigger::SwitchIn, &mut ctx));
        assert!(commands.contains(&BattleCommand::ChangeStatStage {
            target: PokemonRef::new(1, 0),
            stat: StatType::Attack,
            delta: -1,
        }));
    }

    #[test]
    fn intimidate_ignores_other_switch_ins() {
        let state = create_test_battle(
            TestPokemonBuilder::new("growlithe", 1).with_ability("intimidate").build(),
            TestPokemonBuilder::new("machop", 2).build(),
        );
        let effects = active_effects(&state, &EffectRegistry::standard());
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut ctx = HookContext::new(&state, &mut rng).with_actor(PokemonRef::new(1, 0));
        assert!(run_hook(&effects, Trigger::SwitchIn, &mut ctx).is_empty());
    }

    #[rstest]
    #[case(100, 100)]
    #[case(34, 100)]
    #[case(33, 150)]
    fn blaze_needs_low_hp(#[case] hp: u16, #[case] expected: u32) {
        let state = create_test_battle(
            TestPokemonBuilder::new("charmander", 1)
                .with_ability("blaze")
                .with_hp(hp)
                .build(),
            TestPokemonBuilder::new("bulbasaur", 2).build(),
        );
        let ember = test_move("ember");
        let effects = active_effects(&state, &EffectRegistry::standard());
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut ctx = HookContext::new(&state, &mut rng)
            .with_actor(PokemonRef::new(0, 0))
            .with_target(PokemonRef::new(1, 0))
            .with_move(&ember)
            .with_damage(100);
        run_hook(&effects, Trigger::DamageCalc, &mut ctx);
        assert_eq!(ctx.damage, expected);
    }

    #[test]
    fn swift_swim_doubles_speed_in_rain() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("kingdra", 1).with_ability("swift-swim").build(),
            TestPokemonBuilder::new("bulbasaur", 2).build(),
        );
        state.environment.weather = Some(FieldCondition::new("rain", Some(5)));
        let effects = active_effects(&state, &EffectRegistry::standard());
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut ctx = HookContext::new(&state, &mut rng)
            .with_actor(PokemonRef::new(0, 0))
            .with_speed(80);
        run_hook(&effects, Trigger::ModifySpeed, &mut ctx);
        assert_eq!(ctx.speed, 160);
    }
}
