use crate::battle::commands::PokemonRef;
use crate::battle::effects::{run_hook, Effect, HookContext, Trigger};
use crate::battle::state::{BattleState, TurnRng};
use crate::battle::stats::{effective_attack, effective_defense};
use crate::errors::{BattleResult, ExecutionError};
use crate::pokemon::StatusCondition;
use schema::{MoveCategory, MoveData, PokemonType};

/// One-in-N critical hit chance, indexed by crit stage (stage 3+ always crits).
pub const CRIT_CHANCE_DENOMINATORS: [u16; 4] = [24, 8, 2, 1];
pub const MIN_DAMAGE_ROLL: u16 = 85;
pub const MAX_DAMAGE_ROLL: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub amount: u16,
    pub effectiveness: f32,
    pub is_critical: bool,
}

/// `((2*level/5 + 2) * power * atk/def) / 50 + 2`, truncating at each step.
pub fn base_damage(level: u8, power: u16, attack: u16, defense: u16) -> u32 {
    let level_factor = 2 * level as u32 / 5 + 2;
    level_factor * power as u32 * attack as u32 / defense.max(1) as u32 / 50 + 2
}

pub fn roll_critical(crit_stage: u8, rng: &mut TurnRng) -> bool {
    let index = (crit_stage as usize).min(CRIT_CHANCE_DENOMINATORS.len() - 1);
    let denominator = CRIT_CHANCE_DENOMINATORS[index];
    rng.next_in_range("critical hit", 1, denominator) == 1
}

/// Damage for one hit of `move_data`. Crit stage and `DamageCalc` hooks come from `effects`.
pub fn compute_damage(
    state: &BattleState,
    attacker_ref: PokemonRef,
    defender_ref: PokemonRef,
    move_data: &MoveData,
    effects: &[Effect],
    rng: &mut TurnRng,
) -> BattleResult<DamageOutcome> {
    let attacker = state
        .pokemon(attacker_ref)
        .ok_or(ExecutionError::NoPokemon(attacker_ref))?;
    let defender = state
        .pokemon(defender_ref)
        .ok_or(ExecutionError::NoPokemon(defender_ref))?;

    let effectiveness = PokemonType::effectiveness_against(move_data.move_type, &defender.types);
    let power = move_data.power.unwrap_or(0);
    if effectiveness == 0.0 || power == 0 || move_data.category == MoveCategory::Status {
        return Ok(DamageOutcome {
            amount: 0,
            effectiveness,
            is_critical: false,
        });
    }

    let crit_stage = {
        let mut ctx = HookContext::new(state, rng)
            .with_actor(attacker_ref)
            .with_target(defender_ref)
            .with_move(move_data)
            .with_crit_stage(move_data.crit_stage);
        run_hook(effects, Trigger::ModifyCritStage, &mut ctx);
        ctx.crit_stage
    };
    let is_critical = roll_critical(crit_stage, rng);

    let attack = effective_attack(attacker, move_data.category, is_critical);
    let defense = effective_defense(defender, move_data.category, is_critical);
    let mut damage = base_damage(attacker.level, power, attack, defense);

    if is_critical {
        damage = damage * 3 / 2;
    }
    if attacker.has_type(move_data.move_type) && move_data.move_type != PokemonType::Typeless {
        damage = damage * 3 / 2;
    }
    damage = (damage as f32 * effectiveness) as u32;
    if move_data.category == MoveCategory::Physical && attacker.status == Some(StatusCondition::Burn) {
        damage /= 2;
    }
    let roll = rng.next_in_range("damage roll", MIN_DAMAGE_ROLL, MAX_DAMAGE_ROLL);
    damage = damage * roll as u32 / 100;

    let mut ctx = HookContext::new(state, rng)
        .with_actor(attacker_ref)
        .with_target(defender_ref)
        .with_move(move_data)
        .with_damage(damage);
    run_hook(effects, Trigger::DamageCalc, &mut ctx);

    let amount = ctx.damage.clamp(1, u16::MAX as u32) as u16;
    tracing::trace!(
        move_id = %move_data.id,
        amount,
        effectiveness,
        is_critical,
        "damage computed"
    );
    Ok(DamageOutcome {
        amount,
        effectiveness,
        is_critical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::effects::active_effects;
    use crate::battle::tests::common::{create_test_battle, standard_registry, test_move, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::BaseStats;

    #[rstest]
    #[case(50, 40, 100, 80, 24)]
    #[case(50, 40, 50, 50, 19)]
    #[case(100, 120, 200, 100, 203)]
    #[case(1, 10, 5, 500, 2)]
    fn base_damage_formula(
        #[case] level: u8,
        #[case] power: u16,
        #[case] attack: u16,
        #[case] defense: u16,
        #[case] expected: u32,
    ) {
        assert_eq!(base_damage(level, power, attack, defense), expected);
    }

    #[rstest]
    #[case(0, 1, true)]
    #[case(0, 2, false)]
    #[case(2, 1, true)]
    #[case(2, 2, false)]
    #[case(3, 99, true)]
    #[case(7, 99, true)]
    fn crit_roll_by_stage(#[case] stage: u8, #[case] roll: u16, #[case] expected: bool) {
        let mut rng = TurnRng::new_for_test(vec![roll]);
        assert_eq!(roll_critical(stage, &mut rng), expected);
    }

    #[test]
    fn ghost_immunity_short_circuits_without_rolls() {
        let state = create_test_battle(
            TestPokemonBuilder::new("eevee", 1).with_moves(&["tackle"]).build(),
            TestPokemonBuilder::new("gastly", 2).build(),
        );
        let effects = active_effects(&state, standard_registry());
        let mut rng = TurnRng::new_for_test(vec![]);
        let outcome = compute_damage(
            &state,
            PokemonRef::new(0, 0),
            PokemonRef::new(1, 0),
            &test_move("tackle"),
            &effects,
            &mut rng,
        )
        .unwrap();
        assert_eq!(outcome.amount, 0);
        assert_eq!(outcome.effectiveness, 0.0);
    }

    #[test]
    fn stab_and_crit_stack() {
        let stats = BaseStats {
            hp: 150,
            attack: 100,
            defense: 80,
            sp_attack: 100,
            sp_defense: 80,
            speed: 50,
        };
        let state = create_test_battle(
            TestPokemonBuilder::new("eevee", 1).with_stats(stats).build(),
            TestPokemonBuilder::new("machop", 2)
                .with_types(vec![PokemonType::Fighting])
                .with_stats(stats)
                .build(),
        );
        // crit roll 1 (hit), max variance roll
        let mut rng = TurnRng::new_for_test(vec![1, 100]);
        let outcome = compute_damage(
            &state,
            PokemonRef::new(0, 0),
            PokemonRef::new(1, 0),
            &test_move("tackle"),
            &[],
            &mut rng,
        )
        .unwrap();
        // 24 -> crit 36 -> STAB 54
        assert!(outcome.is_critical);
        assert_eq!(outcome.amount, 54);
    }

    #[test]
    fn burned_attacker_deals_half_physical_damage() {
        let stats = BaseStats {
            hp: 150,
            attack: 100,
            defense: 80,
            sp_attack: 100,
            sp_defense: 80,
            speed: 50,
        };
        let state = create_test_battle(
            TestPokemonBuilder::new("machop", 1)
                .with_types(vec![PokemonType::Fighting])
                .with_stats(stats)
                .with_status(StatusCondition::Burn)
                .build(),
            TestPokemonBuilder::new("eevee", 2).with_stats(stats).build(),
        );
        let mut rng = TurnRng::new_for_test(vec![24, 100]);
        let outcome = compute_damage(
            &state,
            PokemonRef::new(0, 0),
            PokemonRef::new(1, 0),
            &test_move("tackle"),
            &[],
            &mut rng,
        )
        .unwrap();
        assert_eq!(outcome.amount, 12);
    }
}
