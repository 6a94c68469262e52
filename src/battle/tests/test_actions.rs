#[cfg(test)]
mod tests {
    use crate::battle::engine::{escape_succeeds, resolve_turn, BattleAction};
    use crate::battle::events::{ActionFailureReason, BattleEventKind, BattleEventSequence, DamageCause, NoEffectReason};
    use crate::battle::state::{BattlePhase, BattleState, BattleType, Conclusion, FieldCondition, TurnRng};
    use crate::battle::tests::common::{
        assert_ok, create_team_battle, create_test_battle, create_wild_battle, engine_context, move_action,
        pass_action, TestPokemonBuilder,
    };
    use crate::player::PlayerAction;
    use crate::pokemon::StatusCondition;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::{StatType, StatusKind};

    fn run(state: &mut BattleState, actions: Vec<BattleAction>, rolls: Vec<u16>) -> BattleEventSequence {
        let mut rng = TurnRng::new_for_test(rolls);
        assert_ok(resolve_turn(state, actions, &mut rng, &engine_context()))
    }

    fn has_kind(events: &BattleEventSequence, kind: &BattleEventKind) -> bool {
        events.iter().any(|event| &event.kind == kind)
    }

    fn item(participant: usize, item_id: &str, target_slot: Option<usize>) -> BattleAction {
        BattleAction::new(
            participant,
            PlayerAction::UseItem {
                item_id: item_id.to_string(),
                target_slot,
            },
        )
    }

    // --- Fleeing ---

    #[test]
    fn test_faster_runner_always_escapes() {
        let mut state = create_wild_battle(
            TestPokemonBuilder::new("pikachu", 1).with_speed(90).build(),
            TestPokemonBuilder::new("geodude", 2).with_speed(20).build(),
        );
        let events = run(
            &mut state,
            vec![BattleAction::new(0, PlayerAction::Flee), pass_action(1)],
            vec![],
        );
        assert!(events.contains("flee-succeeded"));
        assert_eq!(state.conclusion, Some(Conclusion::Fled { participant: 0 }));
        assert_eq!(state.phase, BattlePhase::VictorySequence);
    }

    #[rstest]
    // 30 * 128 / 90 + 30 = 72 out of 256
    #[case(30, 90, 1, 71, true)]
    #[case(30, 90, 1, 72, false)]
    // third attempt: 42 + 90 = 132
    #[case(30, 90, 3, 131, true)]
    fn test_escape_odds(
        #[case] own: u32,
        #[case] wild: u32,
        #[case] attempts: u8,
        #[case] roll: u16,
        #[case] expected: bool,
    ) {
        let mut rng = TurnRng::new_for_test(vec![roll]);
        assert_eq!(escape_succeeds(own, wild, attempts, &mut rng), expected);
    }

    #[test]
    fn test_trainer_battles_cannot_be_fled() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        let events = run(
            &mut state,
            vec![BattleAction::new(0, PlayerAction::Flee), pass_action(1)],
            vec![],
        );
        assert!(has_kind(
            &events,
            &BattleEventKind::ActionFailed {
                reason: ActionFailureReason::CannotFleeTrainer
            }
        ));
        assert_eq!(state.conclusion, None);
    }

    #[test]
    fn test_fleeing_a_player_battle_forfeits() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        state.battle_type = BattleType::PlayerVsPlayer;
        let events = run(
            &mut state,
            vec![BattleAction::new(0, PlayerAction::Flee), pass_action(1)],
            vec![],
        );
        assert!(events.contains("forfeited"));
        assert_eq!(state.conclusion, Some(Conclusion::Victory { winner: 1 }));
    }

    // --- Items ---

    #[test]
    fn test_potion_restores_twenty() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).with_hp(50).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        let events = run(&mut state, vec![item(0, "potion", None), pass_action(1)], vec![]);
        assert!(events.contains("item-used"));
        assert!(has_kind(&events, &BattleEventKind::Healed { amount: 20, new_hp: 70 }));
    }

    #[test]
    fn test_revive_targets_a_benched_slot() {
        let mut state = create_team_battle(
            vec![
                TestPokemonBuilder::new("pikachu", 1).build(),
                TestPokemonBuilder::new("eevee", 2).with_hp(0).build(),
            ],
            vec![TestPokemonBuilder::new("squirtle", 3).build()],
        );
        let events = run(&mut state, vec![item(0, "revive", Some(1)), pass_action(1)], vec![]);
        assert!(has_kind(&events, &BattleEventKind::Revived { new_hp: 50 }));
        assert_eq!(state.participants[0].roster[1].current_hp(), 50);
    }

    #[test]
    fn test_useless_item_reports_no_effect() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        let events = run(&mut state, vec![item(0, "potion", None), pass_action(1)], vec![]);
        assert!(has_kind(
            &events,
            &BattleEventKind::NoEffect {
                reason: NoEffectReason::ItemHadNoEffect
            }
        ));
    }

    #[test]
    fn test_items_fail_when_disabled() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).with_hp(10).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        state.rules.item_use_allowed = false;
        let events = run(&mut state, vec![item(0, "potion", None), pass_action(1)], vec![]);
        assert!(has_kind(
            &events,
            &BattleEventKind::ActionFailed {
                reason: ActionFailureReason::ItemsNotAllowed
            }
        ));
        assert_eq!(state.participants[0].roster[0].current_hp(), 10);
    }

    // --- Move effects ---

    #[test]
    fn test_thunder_wave_paralyzes() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).with_moves(&["thunder-wave"]).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        run(&mut state, vec![move_action(0, "thunder-wave"), pass_action(1)], vec![1]);
        assert_eq!(state.participants[1].roster[0].status, Some(StatusCondition::Paralysis));
    }

    #[test]
    fn test_electric_types_ignore_paralysis() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("pikachu", 1).with_moves(&["thunder-wave"]).build(),
            TestPokemonBuilder::new("pikachu", 2).build(),
        );
        let events = run(&mut state, vec![move_action(0, "thunder-wave"), pass_action(1)], vec![1]);
        assert!(has_kind(
            &events,
            &BattleEventKind::NoEffect {
                reason: NoEffectReason::StatusImmune
            }
        ));
        assert_eq!(state.participants[1].roster[0].status, None);
    }

    #[rstest]
    #[case(10, true)]
    #[case(11, false)]
    fn test_secondary_burn_chance(#[case] roll: u16, #[case] burned: bool) {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("charmander", 1).with_moves(&["ember"]).build(),
            TestPokemonBuilder::new("eevee", 2).build(),
        );
        // accuracy, crit, damage roll, burn chance
        run(&mut state, vec![move_action(0, "ember"), pass_action(1)], vec![1, 24, 100, roll]);
        let expected = burned.then_some(StatusCondition::Burn);
        assert_eq!(state.participants[1].roster[0].status, expected);
    }

    #[test]
    fn test_giga_drain_heals_half_the_damage() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("bulbasaur", 1)
                .with_moves(&["giga-drain"])
                .with_hp(10)
                .build(),
            TestPokemonBuilder::new("eevee", 2).with_max_hp(300).build(),
        );
        run(&mut state, vec![move_action(0, "giga-drain"), pass_action(1)], vec![1, 24, 100]);
        let dealt = 300 - state.participants[1].roster[0].current_hp();
        assert!(dealt > 0);
        assert_eq!(state.participants[0].roster[0].current_hp(), 10 + dealt / 2);
    }

    #[test]
    fn test_stat_stages_stop_at_six() {
        let mut attacker = TestPokemonBuilder::new("scyther", 1).with_moves(&["swords-dance"]).build();
        attacker.stat_stages.set(StatType::Attack, 6);
        let mut state = create_test_battle(attacker, TestPokemonBuilder::new("eevee", 2).build());

        let events = run(&mut state, vec![move_action(0, "swords-dance"), pass_action(1)], vec![]);
        assert!(has_kind(
            &events,
            &BattleEventKind::StatChangeBlocked {
                stat: StatType::Attack,
                rising: true
            }
        ));
        assert_eq!(state.participants[0].roster[0].stat_stages.get(StatType::Attack), 6);
    }

    #[test]
    fn test_rough_skin_retaliates_when_knocked_out() {
        let mut state = create_team_battle(
            vec![TestPokemonBuilder::new("machop", 1)
                .with_moves(&["tackle"])
                .with_speed(90)
                .build()],
            vec![
                TestPokemonBuilder::new("eevee", 2)
                    .with_ability("rough-skin")
                    .with_hp(1)
                    .build(),
                TestPokemonBuilder::new("pikachu", 3).build(),
            ],
        );
        let events = run(&mut state, vec![move_action(0, "tackle"), pass_action(1)], vec![1, 24, 85]);

        assert_eq!(events.count("fainted"), 1);
        assert!(has_kind(
            &events,
            &BattleEventKind::DamageApplied {
                amount: 12,
                remaining_hp: 88,
                cause: DamageCause::Effect("rough-skin".to_string())
            }
        ));
        assert_eq!(state.participants[0].roster[0].current_hp(), 88);
    }

    // --- End of turn ---

    #[test]
    fn test_poison_deals_an_eighth_at_end_of_turn() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("eevee", 1).with_status(StatusCondition::Poison).build(),
            TestPokemonBuilder::new("pikachu", 2).build(),
        );
        let events = run(&mut state, vec![pass_action(0), pass_action(1)], vec![]);
        assert!(has_kind(
            &events,
            &BattleEventKind::DamageApplied {
                amount: 12,
                remaining_hp: 88,
                cause: DamageCause::Status(StatusKind::Poison)
            }
        ));
    }

    #[test]
    fn test_weather_counts_down_and_ends() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("eevee", 1).build(),
            TestPokemonBuilder::new("pikachu", 2).build(),
        );
        state.environment.weather = Some(FieldCondition::new("rain", Some(1)));
        let events = run(&mut state, vec![pass_action(0), pass_action(1)], vec![]);
        assert!(events.contains("field-ended"));
        assert_eq!(state.environment.weather, None);
    }

    #[test]
    fn test_turn_cap_ends_in_a_draw() {
        let mut state = create_test_battle(
            TestPokemonBuilder::new("eevee", 1).build(),
            TestPokemonBuilder::new("pikachu", 2).build(),
        );
        state.rules.max_turns = Some(1);
        let events = run(&mut state, vec![pass_action(0), pass_action(1)], vec![]);
        assert_eq!(state.conclusion, Some(Conclusion::Draw));
        assert_eq!(state.phase, BattlePhase::VictorySequence);
        assert!(events.contains("battle-ended"));
    }
}
