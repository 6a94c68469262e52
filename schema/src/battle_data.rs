use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumCount, EnumIter};

/// Stats that carry a battle stage in the range -6..=+6.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum StatType {
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
    Accuracy,
}

impl StatType {
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            StatType::Attack => "Attack",
            StatType::Defense => "Defense",
            StatType::SpecialAttack => "Sp. Atk",
            StatType::SpecialDefense => "Sp. Def",
            StatType::Speed => "Speed",
            StatType::Accuracy => "accuracy",
        };
        write!(f, "{}", display_name)
    }
}

/// Non-volatile status kinds as they appear in catalog data.
/// Runtime counters live on the engine's status condition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum StatusKind {
    Sleep,
    Poison,
    Toxic,
    Burn,
    Freeze,
    Paralysis,
}

impl StatusKind {
    /// Registry id of the status effect.
    pub fn effect_id(self) -> &'static str {
        match self {
            StatusKind::Sleep => "sleep",
            StatusKind::Poison => "poison",
            StatusKind::Toxic => "toxic",
            StatusKind::Burn => "burn",
            StatusKind::Freeze => "freeze",
            StatusKind::Paralysis => "paralysis",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            StatusKind::Sleep => "asleep",
            StatusKind::Poison => "poisoned",
            StatusKind::Toxic => "badly poisoned",
            StatusKind::Burn => "burned",
            StatusKind::Freeze => "frozen",
            StatusKind::Paralysis => "paralyzed",
        };
        write!(f, "{}", display_name)
    }
}
