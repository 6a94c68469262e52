use crate::catalog::Catalog;
use crate::errors::CatalogError;
use schema::{BaseStats, PokemonType, SpeciesData, StatType, StatusKind};
use serde::{Deserialize, Serialize};
use strum::EnumCount;

pub type InstanceId = u64;

pub const MAX_MOVES: usize = 4;
pub const MIN_STAGE: i8 = -6;
pub const MAX_STAGE: i8 = 6;

/// Non-volatile status. Counters: `Sleep` holds the turns left asleep,
/// `Toxic` holds the number of end-of-turn ticks taken so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCondition {
    Sleep(u8),
    Poison,
    Toxic(u8),
    Burn,
    Freeze,
    Paralysis,
}

impl StatusCondition {
    pub fn kind(&self) -> StatusKind {
        match self {
            StatusCondition::Sleep(_) => StatusKind::Sleep,
            StatusCondition::Poison => StatusKind::Poison,
            StatusCondition::Toxic(_) => StatusKind::Toxic,
            StatusCondition::Burn => StatusKind::Burn,
            StatusCondition::Freeze => StatusKind::Freeze,
            StatusCondition::Paralysis => StatusKind::Paralysis,
        }
    }

    /// Fresh condition for a newly inflicted status.
    pub fn inflict(kind: StatusKind, sleep_turns: u8) -> Self {
        match kind {
            StatusKind::Sleep => StatusCondition::Sleep(sleep_turns),
            StatusKind::Poison => StatusCondition::Poison,
            StatusKind::Toxic => StatusCondition::Toxic(1),
            StatusKind::Burn => StatusCondition::Burn,
            StatusKind::Freeze => StatusCondition::Freeze,
            StatusKind::Paralysis => StatusCondition::Paralysis,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Genderless,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Origin {
    Wild,
    #[default]
    Owned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSlot {
    pub move_id: String,
    pub pp: u8,
    pub max_pp: u8,
}

impl MoveSlot {
    pub fn new(move_id: impl Into<String>, max_pp: u8) -> Self {
        Self {
            move_id: move_id.into(),
            pp: max_pp,
            max_pp,
        }
    }

    pub fn use_pp(&mut self) -> bool {
        if self.pp > 0 {
            self.pp -= 1;
            true
        } else {
            false
        }
    }

    pub fn restore_pp(&mut self, amount: u8) {
        self.pp = self.pp.saturating_add(amount).min(self.max_pp);
    }
}

/// Stage modifiers, one per [`StatType`], always within -6..=+6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatStages([i8; StatType::COUNT]);

impl StatStages {
    pub fn get(&self, stat: StatType) -> i8 {
        self.0[stat.index()]
    }

    /// Applies `delta` with clamping and returns `(old, new)`.
    pub fn modify(&mut self, stat: StatType, delta: i8) -> (i8, i8) {
        let old = self.get(stat);
        let new = old.saturating_add(delta).clamp(MIN_STAGE, MAX_STAGE);
        self.0[stat.index()] = new;
        (old, new)
    }

    pub fn set(&mut self, stat: StatType, stage: i8) {
        self.0[stat.index()] = stage.clamp(MIN_STAGE, MAX_STAGE);
    }

    pub fn clear(&mut self) {
        self.0 = [0; StatType::COUNT];
    }

    pub fn is_neutral(&self) -> bool {
        self.0.iter().all(|&stage| stage == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseMoveError {
    NotKnown,
    NoPpRemaining,
}

/// A Pokemon as it exists inside one battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattlePokemon {
    pub instance_id: InstanceId,
    pub species: String,
    pub nickname: Option<String>,
    pub level: u8,
    current_hp: u16,
    max_hp: u16,
    pub types: Vec<PokemonType>,
    pub moves: Vec<MoveSlot>,
    pub held_item: Option<String>,
    pub ability: Option<String>,
    pub status: Option<StatusCondition>,
    pub stat_stages: StatStages,
    /// Calculated stats for this level; `hp` mirrors `max_hp`.
    pub stats: BaseStats,
    pub gender: Gender,
    pub shiny: bool,
    pub origin: Origin,
}

impl BattlePokemon {
    pub fn new(
        instance_id: InstanceId,
        species: impl Into<String>,
        level: u8,
        types: Vec<PokemonType>,
        stats: BaseStats,
    ) -> Self {
        Self {
            instance_id,
            species: species.into(),
            nickname: None,
            level,
            current_hp: stats.hp,
            max_hp: stats.hp,
            types,
            moves: Vec::new(),
            held_item: None,
            ability: None,
            status: None,
            stat_stages: StatStages::default(),
            stats,
            gender: Gender::default(),
            shiny: false,
            origin: Origin::default(),
        }
    }

    /// Builds a battle-ready Pokemon from catalog species data, filling PP from move data.
    pub fn from_species(
        instance_id: InstanceId,
        species: &SpeciesData,
        level: u8,
        move_ids: &[&str],
        catalog: &Catalog,
    ) -> Result<Self, CatalogError> {
        let stats = calculate_stats(&species.base_stats, level);
        let mut pokemon = Self::new(
            instance_id,
            species.id.clone(),
            level,
            species.types.clone(),
            stats,
        );
        for move_id in move_ids.iter().take(MAX_MOVES) {
            let move_data = catalog.move_data(move_id)?;
            pokemon.moves.push(MoveSlot::new(move_data.id.clone(), move_data.max_pp));
        }
        pokemon.ability = species.abilities.first().cloned();
        Ok(pokemon)
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.ability = Some(ability.into());
        self
    }

    pub fn with_held_item(mut self, item: impl Into<String>) -> Self {
        self.held_item = Some(item.into());
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn display_name(&self) -> String {
        match &self.nickname {
            Some(nickname) => nickname.clone(),
            None => title_case(&self.species),
        }
    }

    pub fn current_hp(&self) -> u16 {
        self.current_hp
    }

    pub fn max_hp(&self) -> u16 {
        self.max_hp
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    /// Sets HP, clamped to `0..=max_hp`.
    pub fn set_hp(&mut self, hp: u16) {
        self.current_hp = hp.min(self.max_hp);
    }

    /// Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: u16) -> u16 {
        let dealt = amount.min(self.current_hp);
        self.current_hp -= dealt;
        dealt
    }

    /// Returns the HP actually restored. Fainted Pokemon cannot be healed.
    pub fn heal(&mut self, amount: u16) -> u16 {
        if self.is_fainted() {
            return 0;
        }
        let restored = amount.min(self.max_hp - self.current_hp);
        self.current_hp += restored;
        restored
    }

    pub fn has_type(&self, pokemon_type: PokemonType) -> bool {
        self.types.contains(&pokemon_type)
    }

    pub fn move_slot(&self, move_id: &str) -> Option<&MoveSlot> {
        self.moves.iter().find(|slot| slot.move_id == move_id)
    }

    pub fn use_move(&mut self, move_id: &str) -> Result<(), UseMoveError> {
        let slot = self
            .moves
            .iter_mut()
            .find(|slot| slot.move_id == move_id)
            .ok_or(UseMoveError::NotKnown)?;
        if slot.use_pp() {
            Ok(())
        } else {
            Err(UseMoveError::NoPpRemaining)
        }
    }

    pub fn has_usable_move(&self) -> bool {
        self.moves.iter().any(|slot| slot.pp > 0)
    }

    /// Raw stat value for a stage-carrying stat, before stage multipliers.
    pub fn stat(&self, stat: StatType) -> u16 {
        match stat {
            StatType::Attack => self.stats.attack,
            StatType::Defense => self.stats.defense,
            StatType::SpecialAttack => self.stats.sp_attack,
            StatType::SpecialDefense => self.stats.sp_defense,
            StatType::Speed => self.stats.speed,
            StatType::Accuracy => 100,
        }
    }

    /// Clears state that does not survive leaving the field.
    pub fn reset_on_switch_out(&mut self) {
        self.stat_stages.clear();
        if let Some(StatusCondition::Toxic(_)) = self.status {
            self.status = Some(StatusCondition::Toxic(1));
        }
    }
}

/// Level-scaled stats without IVs, EVs or natures.
pub fn calculate_stats(base: &BaseStats, level: u8) -> BaseStats {
    let level = level as u32;
    let scale = |base: u16| (2 * base as u32 * level / 100) as u16;
    BaseStats {
        hp: scale(base.hp) + level as u16 + 10,
        attack: scale(base.attack) + 5,
        defense: scale(base.defense) + 5,
        sp_attack: scale(base.sp_attack) + 5,
        sp_defense: scale(base.sp_defense) + 5,
        speed: scale(base.speed) + 5,
    }
}

/// "mr-mime" -> "Mr Mime"
pub fn title_case(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
