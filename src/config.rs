use crate::battle::state::{BattleType, Environment, FieldCondition};
use crate::errors::ConfigError;
use crate::player::Participant;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-session rule switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRules {
    pub switching_allowed: bool,
    pub item_use_allowed: bool,
    pub turn_time_limit_secs: u64,
    pub max_switches_per_turn: u8,
    /// When false a voluntary switch resolves immediately and the participant still picks an action.
    pub switch_consumes_turn: bool,
    /// Battles reaching this turn without a winner end in a draw.
    pub max_turns: Option<u32>,
    pub disconnect_grace_secs: u64,
    /// Extra time on the first selection deadline while clients play the intro.
    pub intro_delay_ms: u64,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            switching_allowed: true,
            item_use_allowed: true,
            turn_time_limit_secs: 60,
            max_switches_per_turn: 1,
            switch_consumes_turn: true,
            max_turns: Some(1000),
            disconnect_grace_secs: 120,
            intro_delay_ms: 0,
        }
    }
}

impl SessionRules {
    /// Defaults for a battle type. Bag items are off in player-vs-player battles.
    pub fn for_battle_type(battle_type: BattleType) -> Self {
        match battle_type {
            BattleType::PlayerVsPlayer => Self {
                item_use_allowed: false,
                ..Self::default()
            },
            BattleType::Wild | BattleType::Trainer => Self::default(),
        }
    }

    pub fn turn_time_limit(&self) -> Duration {
        Duration::from_secs(self.turn_time_limit_secs)
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_secs(self.disconnect_grace_secs)
    }

    pub fn intro_delay(&self) -> Duration {
        Duration::from_millis(self.intro_delay_ms)
    }
}

/// Limits and defaults for a [`crate::session::manager::SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub max_sessions: usize,
    pub max_spectators_per_session: usize,
    /// Capacity of each session's command queue.
    pub command_buffer: usize,
    /// Capacity of each session's broadcast channel.
    pub update_buffer: usize,
    /// Overrides [`SessionRules::for_battle_type`] when set.
    pub default_rules: Option<SessionRules>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1024,
            max_spectators_per_session: 32,
            command_buffer: 64,
            update_buffer: 1024,
            default_rules: None,
        }
    }
}

impl ManagerConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_buffer == 0 || self.update_buffer == 0 {
            return Err(ConfigError::Invalid(
                "channel buffers must be non-zero".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid("max_sessions must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn rules_for(&self, battle_type: BattleType) -> SessionRules {
        self.default_rules
            .clone()
            .unwrap_or_else(|| SessionRules::for_battle_type(battle_type))
    }
}

/// Everything needed to open one battle session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Generated by the manager when absent.
    pub battle_id: Option<String>,
    pub battle_type: BattleType,
    pub participants: Vec<Participant>,
    pub rules: Option<SessionRules>,
    pub environment: Environment,
    /// Master seed; per-turn seeds are drawn from it.
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(battle_type: BattleType, participants: Vec<Participant>) -> Self {
        Self {
            battle_id: None,
            battle_type,
            participants,
            rules: None,
            environment: Environment::default(),
            seed: None,
        }
    }

    pub fn with_battle_id(mut self, battle_id: impl Into<String>) -> Self {
        self.battle_id = Some(battle_id.into());
        self
    }

    pub fn with_rules(mut self, rules: SessionRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_weather(mut self, weather: impl Into<String>, turns: Option<u8>) -> Self {
        self.environment.weather = Some(FieldCondition::new(weather, turns));
        self
    }
}
