use crate::battle::commands::PokemonRef;
use thiserror::Error;

/// Lookup and parse failures against the static game catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("move not found: {0}")]
    MoveNotFound(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("species not found: {0}")]
    SpeciesNotFound(String),
    #[error("duplicate {kind} entry: {id}")]
    DuplicateEntry { kind: &'static str, id: String },
    #[error("malformed catalog data: {0}")]
    Malformed(String),
}

/// Failures while applying a single state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("no pokemon at participant {}, slot {}", .0.participant, .0.slot)]
    NoPokemon(PokemonRef),
    #[error("invalid participant index: {0}")]
    InvalidParticipant(usize),
}

/// Fatal engine errors. Any of these aborts the turn in progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleEngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("inconsistent battle state: {0}")]
    InconsistentState(String),
}

pub type BattleResult<T> = Result<T, BattleEngineError>;

/// Reasons a switch request cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    #[error("roster index {index} is out of range (roster size {roster_size})")]
    IndexOutOfRange { index: usize, roster_size: usize },
    #[error("cannot switch to fainted pokemon at slot {0}")]
    TargetFainted(usize),
    #[error("pokemon at slot {0} is already active")]
    AlreadyActive(usize),
    #[error("slot {from} is not the active pokemon (active is {active})")]
    NotActive { from: usize, active: usize },
    #[error("switching is disabled for this battle")]
    SwitchingDisabled,
    #[error("switch limit of {limit} per turn reached")]
    SwitchLimitReached { limit: u8 },
    #[error("no pokemon available to switch in")]
    NoAvailablePokemon,
}

impl SwitchError {
    /// A participant with nothing left to send out is out of the battle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwitchError::NoAvailablePokemon)
    }
}

/// Rejections returned to a client that submitted an action.
/// None of these change session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session has ended")]
    SessionClosed,
    #[error("{0} is not a participant in this battle")]
    NotAParticipant(String),
    #[error("participant is disconnected")]
    Disconnected,
    #[error("action was submitted for turn {submitted}, current turn is {current}")]
    StaleTurn { submitted: u32, current: u32 },
    #[error("participant is not expected to act right now")]
    NotAwaitingAction,
    #[error("a replacement switch is required")]
    ForcedSwitchRequired,
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("invalid switch: {0}")]
    InvalidSwitch(#[from] SwitchError),
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

impl SubmitError {
    /// Stable machine-readable rejection code.
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::SessionNotFound(_) => "session-not-found",
            SubmitError::SessionClosed => "session-closed",
            SubmitError::NotAParticipant(_) => "not-a-participant",
            SubmitError::Disconnected => "disconnected",
            SubmitError::StaleTurn { .. } => "stale-turn",
            SubmitError::NotAwaitingAction => "not-awaiting-action",
            SubmitError::ForcedSwitchRequired => "forced-switch-required",
            SubmitError::InvalidTarget(_) => "invalid-target",
            SubmitError::InvalidSwitch(_) => "invalid-switch",
            SubmitError::InvalidAction(_) => "invalid-action",
        }
    }
}

/// Failures creating a battle session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a battle needs at least two participants, got {0}")]
    TooFewParticipants(usize),
    #[error("duplicate participant id: {0}")]
    DuplicateParticipant(String),
    #[error("invalid roster for {participant}: {reason}")]
    InvalidRoster { participant: String, reason: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Engine(#[from] BattleEngineError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session limit of {limit} reached")]
    SessionLimitReached { limit: usize },
    #[error("session {0} already exists")]
    DuplicateSession(String),
    #[error("spectator limit of {limit} reached")]
    SpectatorLimitReached { limit: usize },
    #[error("participant {0} not found")]
    ParticipantNotFound(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
