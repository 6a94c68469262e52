use crate::battle::effects::EffectRegistry;
use crate::battle::engine::{BattleAction, EngineContext};
use crate::battle::state::{BattleState, BattleType, TurnRng};
use crate::catalog::Catalog;
use crate::config::SessionRules;
use crate::errors::BattleResult;
use crate::player::{Participant, PlayerAction};
use crate::pokemon::{BattlePokemon, InstanceId, MoveSlot, Origin, StatusCondition};
use schema::{BaseStats, MoveData, PokemonType};
use std::sync::OnceLock;

pub fn standard_catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(|| Catalog::standard().expect("bundled catalog should parse"))
}

pub fn standard_registry() -> &'static EffectRegistry {
    static REGISTRY: OnceLock<EffectRegistry> = OnceLock::new();
    REGISTRY.get_or_init(EffectRegistry::standard)
}

pub fn engine_context() -> EngineContext<'static> {
    EngineContext::new(standard_catalog(), standard_registry())
}

pub fn test_move(id: &str) -> MoveData {
    standard_catalog()
        .move_data(id)
        .unwrap_or_else(|err| panic!("test move {id}: {err}"))
        .clone()
}

/// A builder for creating test Pokemon with flat, predictable stats.
///
/// Types come from the standard catalog when the species is known there.
/// Every stat defaults to 50 and max HP to 100.
///
/// # Example
/// ```ignore
/// let pokemon = TestPokemonBuilder::new("pikachu", 1)
///     .with_moves(&["thunderbolt"])
///     .with_status(StatusCondition::Paralysis)
///     .build();
/// ```
pub struct TestPokemonBuilder {
    species: String,
    instance_id: InstanceId,
    level: u8,
    types: Option<Vec<PokemonType>>,
    stats: BaseStats,
    moves: Vec<String>,
    status: Option<StatusCondition>,
    current_hp: Option<u16>,
    ability: Option<String>,
    item: Option<String>,
    origin: Origin,
}

impl TestPokemonBuilder {
    pub fn new(species: &str, instance_id: InstanceId) -> Self {
        Self {
            species: species.to_string(),
            instance_id,
            level: 50,
            types: None,
            stats: BaseStats {
                hp: 100,
                attack: 50,
                defense: 50,
                sp_attack: 50,
                sp_defense: 50,
                speed: 50,
            },
            moves: Vec::new(),
            status: None,
            current_hp: None,
            ability: None,
            item: None,
            origin: Origin::Owned,
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_types(mut self, types: Vec<PokemonType>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_stats(mut self, stats: BaseStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_speed(mut self, speed: u16) -> Self {
        self.stats.speed = speed;
        self
    }

    pub fn with_max_hp(mut self, hp: u16) -> Self {
        self.stats.hp = hp;
        self
    }

    /// Moves are looked up in the standard catalog for their PP.
    pub fn with_moves(mut self, moves: &[&str]) -> Self {
        self.moves = moves.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_status(mut self, status: StatusCondition) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets current HP. If not set, HP will be max.
    pub fn with_hp(mut self, hp: u16) -> Self {
        self.current_hp = Some(hp);
        self
    }

    pub fn with_ability(mut self, ability: &str) -> Self {
        self.ability = Some(ability.to_string());
        self
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.item = Some(item.to_string());
        self
    }

    pub fn wild(mut self) -> Self {
        self.origin = Origin::Wild;
        self
    }

    pub fn build(self) -> BattlePokemon {
        let catalog = standard_catalog();
        let types = self.types.unwrap_or_else(|| {
            catalog
                .species(&self.species)
                .map(|species| species.types.clone())
                .unwrap_or_else(|_| vec![PokemonType::Normal])
        });

        let mut pokemon = BattlePokemon::new(self.instance_id, self.species, self.level, types, self.stats)
            .with_origin(self.origin);
        for move_id in &self.moves {
            let max_pp = catalog.move_data(move_id).map(|m| m.max_pp).unwrap_or(10);
            pokemon.moves.push(MoveSlot::new(move_id.clone(), max_pp));
        }
        pokemon.status = self.status;
        pokemon.ability = self.ability;
        pokemon.held_item = self.item;
        if let Some(hp) = self.current_hp {
            pokemon.set_hp(hp);
        }
        pokemon
    }
}

pub fn create_test_participant(id: &str, name: &str, roster: Vec<BattlePokemon>) -> Participant {
    Participant::new(id, name, roster)
}

/// Creates a standard 1v1 trainer battle for testing.
pub fn create_test_battle(p1_pokemon: BattlePokemon, p2_pokemon: BattlePokemon) -> BattleState {
    create_team_battle(vec![p1_pokemon], vec![p2_pokemon])
}

pub fn create_team_battle(p1_team: Vec<BattlePokemon>, p2_team: Vec<BattlePokemon>) -> BattleState {
    let player1 = create_test_participant("p1", "Player 1", p1_team);
    let player2 = create_test_participant("p2", "Player 2", p2_team);
    BattleState::new(
        "test_battle",
        BattleType::Trainer,
        vec![player1, player2],
        SessionRules::default(),
    )
}

/// Player against a single wild Pokemon.
pub fn create_wild_battle(player_pokemon: BattlePokemon, wild_pokemon: BattlePokemon) -> BattleState {
    let player = create_test_participant("p1", "Player 1", vec![player_pokemon]);
    let wild = Participant::ai("wild", "Wild", vec![wild_pokemon.with_origin(Origin::Wild)]);
    BattleState::new("wild_battle", BattleType::Wild, vec![player, wild], SessionRules::default())
}

/// Creates a `TurnRng` with a long list of default values (50).
/// Useful for tests where the specific outcome is not important.
pub fn predictable_rng() -> TurnRng {
    TurnRng::new_for_test(vec![50; 100])
}

/// Asserts that a Result is Ok and returns the value.
pub fn assert_ok<T>(result: BattleResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok but got error: {}", err),
    }
}

pub fn move_action(participant: usize, move_id: &str) -> BattleAction {
    BattleAction::new(
        participant,
        PlayerAction::UseMove {
            move_id: move_id.to_string(),
            target: None,
        },
    )
}

pub fn pass_action(participant: usize) -> BattleAction {
    BattleAction::new(participant, PlayerAction::Pass)
}
