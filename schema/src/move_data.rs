use crate::{PokemonType, StatType, StatusKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
pub enum MoveTarget {
    User,
    #[default]
    Opponent,
}

/// Secondary effects a move applies after (or instead of) dealing damage.
/// `chance` is a percentage; 100 means the effect always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveEffect {
    InflictStatus { status: StatusKind, chance: u8 },
    StatChange { target: MoveTarget, stat: StatType, stages: i8, chance: u8 },
    Drain { percent: u8 },
    Recoil { percent: u8 },
    Heal { percent: u8 },
    SetWeather { weather: String, turns: u8 },
    SetTerrain { terrain: String, turns: u8 },
    AddFieldEffect { effect: String, turns: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveData {
    pub id: String,
    pub name: String,
    pub move_type: PokemonType,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: Option<u16>,
    /// Accuracy percentage; `None` never misses.
    #[serde(default)]
    pub accuracy: Option<u8>,
    pub max_pp: u8,
    #[serde(default)]
    pub priority: i8,
    #[serde(default)]
    pub crit_stage: u8,
    #[serde(default)]
    pub target: MoveTarget,
    #[serde(default)]
    pub contact: bool,
    #[serde(default)]
    pub effects: Vec<MoveEffect>,
}

impl MoveData {
    pub fn is_damaging(&self) -> bool {
        self.category != MoveCategory::Status && self.power.is_some_and(|power| power > 0)
    }
}
