use super::{Effect, EffectCategory, EffectRegistry, HookBundle, HookContext};
use crate::battle::commands::BattleCommand;
use crate::battle::events::DamageCause;
use crate::pokemon::BattlePokemon;
use schema::PokemonType;

pub fn register(registry: &mut EffectRegistry) {
    registry.register(
        EffectCategory::Weather,
        "rain",
        HookBundle {
            on_damage_calc: Some(rain),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Weather,
        "sun",
        HookBundle {
            on_damage_calc: Some(sun),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Weather,
        "sandstorm",
        HookBundle {
            on_end_turn: Some(sandstorm),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Weather,
        "hail",
        HookBundle {
            on_end_turn: Some(hail),
            ..HookBundle::NONE
        },
    );

    registry.register(
        EffectCategory::Terrain,
        "electric-terrain",
        HookBundle {
            on_damage_calc: Some(electric_terrain),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Terrain,
        "grassy-terrain",
        HookBundle {
            on_damage_calc: Some(grassy_terrain_boost),
            on_end_turn: Some(grassy_terrain_heal),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Terrain,
        "psychic-terrain",
        HookBundle {
            on_damage_calc: Some(psychic_terrain),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Terrain,
        "misty-terrain",
        HookBundle {
            on_damage_calc: Some(misty_terrain),
            ..HookBundle::NONE
        },
    );

    registry.register(
        EffectCategory::Field,
        "mud-sport",
        HookBundle {
            on_damage_calc: Some(mud_sport),
            ..HookBundle::NONE
        },
    );
    registry.register(
        EffectCategory::Field,
        "water-sport",
        HookBundle {
            on_damage_calc: Some(water_sport),
            ..HookBundle::NONE
        },
    );
}

fn is_grounded(pokemon: &BattlePokemon) -> bool {
    !pokemon.has_type(PokemonType::Flying)
}

fn move_type(ctx: &HookContext<'_>) -> Option<PokemonType> {
    ctx.move_data.map(|move_data| move_data.move_type)
}

fn rain(_: &Effect, ctx: &mut HookContext<'_>) {
    match move_type(ctx) {
        Some(PokemonType::Water) => ctx.scale_damage(3, 2),
        Some(PokemonType::Fire) => ctx.scale_damage(1, 2),
        _ => {}
    }
}

fn sun(_: &Effect, ctx: &mut HookContext<'_>) {
    match move_type(ctx) {
        Some(PokemonType::Fire) => ctx.scale_damage(3, 2),
        Some(PokemonType::Water) => ctx.scale_damage(1, 2),
        _ => {}
    }
}

/// Chips every active Pokemon not of an immune type for 1/16 of its max HP.
fn weather_chip(effect: &Effect, ctx: &mut HookContext<'_>, immune: &[PokemonType]) {
    let state = ctx.state;
    for target in state.active_refs() {
        let Some(pokemon) = state.pokemon(target) else {
            continue;
        };
        if immune.iter().any(|&t| pokemon.has_type(t)) {
            continue;
        }
        ctx.push(BattleCommand::DealDamage {
            target,
            amount: (pokemon.max_hp() / 16).max(1),
            cause: DamageCause::Weather(effect.id.clone()),
        });
    }
}

fn sandstorm(effect: &Effect, ctx: &mut HookContext<'_>) {
    weather_chip(
        effect,
        ctx,
        &[PokemonType::Rock, PokemonType::Ground, PokemonType::Steel],
    );
}

fn hail(effect: &Effect, ctx: &mut HookContext<'_>) {
    weather_chip(effect, ctx, &[PokemonType::Ice]);
}

/// 1.3x for `boosted` moves used by a grounded attacker.
fn terrain_boost(ctx: &mut HookContext<'_>, boosted: PokemonType) {
    let grounded = ctx.actor_pokemon().is_some_and(is_grounded);
    if grounded && move_type(ctx) == Some(boosted) {
        ctx.scale_damage(13, 10);
    }
}

fn electric_terrain(_: &Effect, ctx: &mut HookContext<'_>) {
    terrain_boost(ctx, PokemonType::Electric);
}

fn grassy_terrain_boost(_: &Effect, ctx: &mut HookContext<'_>) {
    terrain_boost(ctx, PokemonType::Grass);
}

fn psychic_terrain(_: &Effect, ctx: &mut HookContext<'_>) {
    terrain_boost(ctx, PokemonType::Psychic);
}

fn grassy_terrain_heal(_: &Effect, ctx: &mut HookContext<'_>) {
    let state = ctx.state;
    for target in state.active_refs() {
        let Some(pokemon) = state.pokemon(target) else {
            continue;
        };
        if is_grounded(pokemon) && pokemon.current_hp() < pokemon.max_hp() {
            ctx.push(BattleCommand::Heal {
                target,
                amount: (pokemon.max_hp() / 16).max(1),
            });
        }
    }
}

fn misty_terrain(_: &Effect, ctx: &mut HookContext<'_>) {
    let grounded_target = ctx.target_pokemon().is_some_and(is_grounded);
    if grounded_target && move_type(ctx) == Some(PokemonType::Dragon) {
        ctx.scale_damage(1, 2);
    }
}

fn mud_sport(_: &Effect, ctx: &mut HookContext<'_>) {
    if move_type(ctx) == Some(PokemonType::Electric) {
        ctx.scale_damage(1, 3);
    }
}

fn water_sport(_: &Effect, ctx: &mut HookContext<'_>) {
    if move_type(ctx) == Some(PokemonType::Fire) {
        ctx.scale_damage(1, 3);
    }
}

#[cfg(test)]
mod tests {
    use crate::battle::commands::{BattleCommand, PokemonRef};
    use crate::battle::effects::{active_effects, run_hook, EffectRegistry, HookContext, HookResult, Trigger};
    use crate::battle::state::{FieldCondition, TurnRng};
    use crate::battle::tests::common::{create_test_battle, test_move, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::PokemonType;

    #[rstest]
    #[case("rain", "water-gun", 150)]
    #[case("rain", "ember", 50)]
    #[case("sun", "ember", 150)]
    #[case("sun", "tackle", 100)]
    fn weather_scales_damage(#[case] weather: &str, #[case] move_id: &str, #[case] expected: u32) {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        state.environment.weather = Some(FieldCondition::new(weather, Some(5)));
        let move_data = test_move(move_id);
        let effects = active_effects(&state, &EffectRegistry::standard());
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut ctx = HookContext::new(&state, &mut rng)
            .with_actor(PokemonRef::new(0, 0))
            .with_target(PokemonRef::new(1, 0))
            .with_move(&move_data)
            .with_damage(100);
        run_hook(&effects, Trigger::DamageCalc, &mut ctx);
        assert_eq!(ctx.damage, expected);
    }

    #[test]
    fn sandstorm_spares_rock_types() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("geodude", 1)
                .with_types(vec![PokemonType::Rock, PokemonType::Ground])
                .build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        state.environment.weather = Some(FieldCondition::new("sandstorm", Some(5)));
        let effects = active_effects(&state, &EffectRegistry::standard());
        let mut rng = TurnRng::new_for_test(vec![]);
        let mut ctx = HookContext::new(&state, &mut rng);
        let commands = HookResult::flatten(run_hook(&effects, Trigger::EndTurn, &mut ctx));
        assert_eq!(commands.len(), 1);
        assert!(matches!(
            commands[0],
            BattleCommand::DealDamage { target, amount: 6, .. } if target == PokemonRef::new(1, 0)
        ));
    }
}
