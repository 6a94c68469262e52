use crate::battle::state::TurnRng;
use crate::pokemon::BattlePokemon;
use schema::{MoveCategory, MoveData, StatType};

/// Attacking stat for a move, with stages applied.
/// Critical hits ignore the attacker's negative stages.
pub fn effective_attack(pokemon: &BattlePokemon, category: MoveCategory, critical: bool) -> u16 {
    let stat = match category {
        MoveCategory::Physical => StatType::Attack,
        MoveCategory::Special => StatType::SpecialAttack,
        MoveCategory::Status => return 0,
    };
    let mut stage = pokemon.stat_stages.get(stat);
    if critical {
        stage = stage.max(0);
    }
    apply_stat_stage_multiplier(pokemon.stat(stat), stage)
}

/// Defending stat for a move, with stages applied.
/// Critical hits ignore the defender's positive stages.
pub fn effective_defense(pokemon: &BattlePokemon, category: MoveCategory, critical: bool) -> u16 {
    let stat = match category {
        MoveCategory::Physical => StatType::Defense,
        MoveCategory::Special => StatType::SpecialDefense,
        MoveCategory::Status => return 0,
    };
    let mut stage = pokemon.stat_stages.get(stat);
    if critical {
        stage = stage.min(0);
    }
    apply_stat_stage_multiplier(pokemon.stat(stat), stage)
}

/// Speed with stages applied. Status, ability and item modifiers run as effect hooks on top.
pub fn staged_speed(pokemon: &BattlePokemon) -> u16 {
    apply_stat_stage_multiplier(pokemon.stats.speed, pokemon.stat_stages.get(StatType::Speed))
}

/// Rolls accuracy for a move. Moves without an accuracy value never miss.
pub fn move_hits(attacker: &BattlePokemon, move_data: &MoveData, rng: &mut TurnRng) -> bool {
    let Some(base_accuracy) = move_data.accuracy else {
        return true;
    };

    let stage = attacker.stat_stages.get(StatType::Accuracy);
    let modified = (base_accuracy as f64 * apply_accuracy_stage_multiplier(stage)).round();
    let threshold = modified.clamp(1.0, 100.0) as u8;

    rng.next_outcome("accuracy check") <= threshold
}

/// Negative stages: 3 / (3 + |stage|). Positive stages: (3 + stage) / 3.
pub fn apply_accuracy_stage_multiplier(stage: i8) -> f64 {
    let stage = stage.clamp(-6, 6) as f64;
    if stage < 0.0 {
        3.0 / (3.0 - stage)
    } else {
        (3.0 + stage) / 3.0
    }
}

/// Negative stages: 2 / (2 + |stage|). Positive stages: (2 + stage) / 2.
pub fn apply_stat_stage_multiplier(base_stat: u16, stage: i8) -> u16 {
    let clamped_stage = stage.clamp(-6, 6);

    if clamped_stage == 0 {
        return base_stat;
    }

    let multiplier = if clamped_stage < 0 {
        2.0 / (2.0 + (-clamped_stage) as f64)
    } else {
        (2.0 + clamped_stage as f64) / 2.0
    };

    ((base_stat as f64) * multiplier).round() as u16
}
