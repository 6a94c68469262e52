use super::{abilities, field, items, statuses, Effect, EffectCategory, HookContext, Trigger};
use std::collections::HashMap;
use std::fmt;

pub type Hook = fn(&Effect, &mut HookContext<'_>);

/// Optional hook per trigger. Unset triggers are ignored for the effect.
#[derive(Clone, Copy, Default)]
pub struct HookBundle {
    pub on_switch_in: Option<Hook>,
    pub on_before_move: Option<Hook>,
    pub on_modify_speed: Option<Hook>,
    pub on_modify_crit_stage: Option<Hook>,
    pub on_damage_calc: Option<Hook>,
    pub on_after_move: Option<Hook>,
    pub on_damage_taken: Option<Hook>,
    pub on_end_turn: Option<Hook>,
}

impl HookBundle {
    pub const NONE: HookBundle = HookBundle {
        on_switch_in: None,
        on_before_move: None,
        on_modify_speed: None,
        on_modify_crit_stage: None,
        on_damage_calc: None,
        on_after_move: None,
        on_damage_taken: None,
        on_end_turn: None,
    };

    pub fn get(&self, trigger: Trigger) -> Option<Hook> {
        match trigger {
            Trigger::SwitchIn => self.on_switch_in,
            Trigger::BeforeMove => self.on_before_move,
            Trigger::ModifySpeed => self.on_modify_speed,
            Trigger::ModifyCritStage => self.on_modify_crit_stage,
            Trigger::DamageCalc => self.on_damage_calc,
            Trigger::AfterMove => self.on_after_move,
            Trigger::DamageTaken => self.on_damage_taken,
            Trigger::EndTurn => self.on_end_turn,
        }
    }

    fn triggers(&self) -> Vec<Trigger> {
        [
            Trigger::SwitchIn,
            Trigger::BeforeMove,
            Trigger::ModifySpeed,
            Trigger::ModifyCritStage,
            Trigger::DamageCalc,
            Trigger::AfterMove,
            Trigger::DamageTaken,
            Trigger::EndTurn,
        ]
        .into_iter()
        .filter(|&trigger| self.get(trigger).is_some())
        .collect()
    }
}

impl fmt::Debug for HookBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.triggers()).finish()
    }
}

/// Immutable id -> hooks table, built once at startup and shared by every session.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    entries: HashMap<EffectCategory, HashMap<String, HookBundle>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every built-in ability, item, status and field effect.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        abilities::register(&mut registry);
        items::register(&mut registry);
        statuses::register(&mut registry);
        field::register(&mut registry);
        registry
    }

    pub fn register(&mut self, category: EffectCategory, id: impl Into<String>, hooks: HookBundle) {
        let id = id.into();
        let previous = self.entries.entry(category).or_default().insert(id.clone(), hooks);
        if previous.is_some() {
            tracing::warn!(?category, id = %id, "effect registered twice, keeping the latest");
        }
    }

    pub fn lookup(&self, category: EffectCategory, id: &str) -> Option<&HookBundle> {
        self.entries.get(&category)?.get(id)
    }

    pub fn contains(&self, category: EffectCategory, id: &str) -> bool {
        self.lookup(category, id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
