use crate::{StatType, StatusKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemEffect {
    /// Restores a fixed amount of HP to a conscious Pokemon.
    Heal { amount: u16 },
    HealFull,
    /// Cures the given status, or any status when `None`.
    CureStatus { status: Option<StatusKind> },
    /// Revives a fainted Pokemon to a percentage of its max HP.
    Revive { percent: u8 },
    BoostStat { stat: StatType, stages: i8 },
    /// Only meaningful while held; has no bag effect.
    Held,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    pub id: String,
    pub name: String,
    pub effect: ItemEffect,
}
