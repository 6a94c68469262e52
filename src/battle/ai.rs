//! Action selection for AI-controlled participants.

use crate::battle::state::{BattleState, TurnRng};
use crate::catalog::Catalog;
use crate::errors::BattleResult;
use crate::player::PlayerAction;
use crate::pokemon::BattlePokemon;
use schema::{MoveCategory, MoveEffect, MoveTarget, PokemonType};

/// Baseline score of a voluntary switch. Any reasonable attack beats it.
const SWITCH_BASELINE: f32 = 1.0;

/// Anything that can pick an action for a participant.
pub trait Behavior: Send + Sync {
    /// Action for the current action-selection phase.
    fn decide_action(
        &self,
        participant: usize,
        state: &BattleState,
        catalog: &Catalog,
        rng: &mut TurnRng,
    ) -> PlayerAction;

    /// Replacement for a fainted active Pokemon, or `None` when nothing is left.
    fn decide_replacement(&self, participant: usize, state: &BattleState) -> Option<PlayerAction>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringAI;

impl ScoringAI {
    pub fn new() -> Self {
        Self
    }

    fn opponent<'s>(&self, participant: usize, state: &'s BattleState) -> Option<&'s BattlePokemon> {
        state
            .opponents_of(participant)
            .into_iter()
            .filter_map(|index| state.participants[index].active_pokemon())
            .find(|pokemon| !pokemon.is_fainted())
    }

    fn score_move(
        &self,
        move_id: &str,
        attacker: &BattlePokemon,
        defender: &BattlePokemon,
        catalog: &Catalog,
        rng: &mut TurnRng,
    ) -> BattleResult<f32> {
        let move_data = catalog.move_data(move_id)?;

        let mut damage_score = 0.0;
        if move_data.is_damaging() {
            let effectiveness = PokemonType::effectiveness_against(move_data.move_type, &defender.types);
            if effectiveness == 0.0 {
                return Ok(-1.0);
            }
            let stab = if move_data.move_type != PokemonType::Typeless && attacker.has_type(move_data.move_type) {
                1.5
            } else {
                1.0
            };
            damage_score = move_data.power.unwrap_or(0) as f32 * effectiveness * stab;
        }

        let mut utility_score = 0.0;
        for effect in &move_data.effects {
            match effect {
                MoveEffect::StatChange {
                    target: MoveTarget::User,
                    stat,
                    stages,
                    chance,
                } if *stages > 0 => {
                    let current = attacker.stat_stages.get(*stat);
                    if current < 6 {
                        let headroom = 1.0 - current as f32 / 6.0;
                        utility_score += 20.0 * *stages as f32 * headroom * (*chance as f32 / 100.0);
                    }
                }
                MoveEffect::StatChange {
                    target: MoveTarget::Opponent,
                    stat,
                    stages,
                    chance,
                } if *stages < 0 => {
                    if defender.stat_stages.get(*stat) > -6 {
                        utility_score += 15.0 * stages.unsigned_abs() as f32 * (*chance as f32 / 100.0);
                    }
                }
                MoveEffect::InflictStatus { chance, .. } if defender.status.is_none() => {
                    utility_score += 45.0 * (*chance as f32 / 100.0);
                }
                MoveEffect::Heal { percent } if attacker.current_hp() < attacker.max_hp() / 2 => {
                    utility_score += *percent as f32;
                }
                _ => {}
            }
        }

        if move_data.category == MoveCategory::Status && utility_score < 1.0 {
            return Ok(-1.0);
        }

        let mut score = damage_score + utility_score;
        if move_data.category != MoveCategory::Status {
            // sure-hit moves get a slight edge
            score *= move_data.accuracy.unwrap_or(101) as f32 / 100.0;
        }
        Ok(score * jitter(rng))
    }
}

/// +/- 5% so equal options do not always resolve the same way.
fn jitter(rng: &mut TurnRng) -> f32 {
    0.95 + rng.next_in_range("ai jitter", 0, 100) as f32 / 1000.0
}

impl Behavior for ScoringAI {
    fn decide_action(
        &self,
        participant: usize,
        state: &BattleState,
        catalog: &Catalog,
        rng: &mut TurnRng,
    ) -> PlayerAction {
        let Some(side) = state.participants.get(participant) else {
            return PlayerAction::Pass;
        };
        let (Some(attacker), Some(defender)) = (side.active_pokemon(), self.opponent(participant, state)) else {
            return PlayerAction::Pass;
        };

        let best_move = attacker
            .moves
            .iter()
            .filter(|slot| slot.pp > 0)
            .filter_map(|slot| {
                match self.score_move(&slot.move_id, attacker, defender, catalog, rng) {
                    Ok(score) => Some((slot.move_id.clone(), score)),
                    Err(error) => {
                        tracing::warn!(participant, move_id = %slot.move_id, %error, "unscorable move");
                        None
                    }
                }
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let best_switch = if state.rules.switching_allowed {
            side.available_switches()
                .into_iter()
                .map(|slot| (slot, SWITCH_BASELINE + jitter(rng) - 0.95))
                .max_by(|a, b| a.1.total_cmp(&b.1))
        } else {
            None
        };

        let use_move = |move_id: String| PlayerAction::UseMove { move_id, target: None };
        let switch_to = |to: usize| PlayerAction::SwitchPokemon {
            from: side.active_index,
            to,
        };
        match (best_move, best_switch) {
            (Some((move_id, move_score)), Some((slot, switch_score))) => {
                if switch_score > move_score {
                    switch_to(slot)
                } else {
                    use_move(move_id)
                }
            }
            (Some((move_id, _)), None) => use_move(move_id),
            (None, Some((slot, _))) => switch_to(slot),
            (None, None) => PlayerAction::Pass,
        }
    }

    fn decide_replacement(&self, participant: usize, state: &BattleState) -> Option<PlayerAction> {
        let side = state.participants.get(participant)?;
        // healthiest first, lowest slot on ties
        let to = side.available_switches().into_iter().max_by(|&a, &b| {
            let fraction = |slot: usize| {
                let pokemon = &side.roster[slot];
                pokemon.current_hp() as f32 / pokemon.max_hp().max(1) as f32
            };
            fraction(a).total_cmp(&fraction(b)).then(b.cmp(&a))
        })?;
        Some(PlayerAction::SwitchPokemon {
            from: side.active_index,
            to,
        })
    }
}
