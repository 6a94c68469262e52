use super::report::BattleReport;
use super::{SessionSnapshot, SessionUpdate, SubmitAck};
use crate::battle::ai::{Behavior, ScoringAI};
use crate::battle::catch::is_capture_allowed;
use crate::battle::effects::EffectRegistry;
use crate::battle::engine::{self, BattleAction, EngineContext};
use crate::battle::events::BattleEventSequence;
use crate::battle::state::{BattlePhase, BattleState, TerminationReason, TurnRng};
use crate::battle::switching::validate_switch;
use crate::catalog::Catalog;
use crate::config::{SessionConfig, SessionRules};
use crate::errors::{BattleEngineError, ManagerError, SessionError, SubmitError};
use crate::player::{PlayerAction, MAX_ROSTER_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// When the current step stops waiting. `step` ties the deadline to one
/// selection window so a late timer can never resolve a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub step: u64,
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct PendingAction {
    action: PlayerAction,
    submitted_at: Instant,
    sequence: u64,
}

/// One battle's lifecycle. Synchronous; time comes in as arguments and
/// outgoing updates queue up until [`BattleSession::drain_updates`].
pub struct BattleSession {
    state: BattleState,
    catalog: Arc<Catalog>,
    registry: Arc<EffectRegistry>,
    behavior: Box<dyn Behavior>,
    /// Source of per-step seeds.
    seeds: StdRng,
    /// AI choices and default replacements.
    decisions: TurnRng,
    pending: BTreeMap<usize, PendingAction>,
    submissions: u64,
    step: u64,
    announced_step: u64,
    deadline: Option<Deadline>,
    max_spectators: usize,
    last_events: Option<BattleEventSequence>,
    report: Option<BattleReport>,
    outbox: Vec<SessionUpdate>,
}

impl BattleSession {
    pub fn new(
        battle_id: impl Into<String>,
        config: SessionConfig,
        rules: SessionRules,
        catalog: Arc<Catalog>,
        registry: Arc<EffectRegistry>,
    ) -> Result<Self, SessionError> {
        validate_participants(&config, &catalog)?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut seeds = StdRng::seed_from_u64(seed);
        let decisions = TurnRng::from_seed(seeds.random());
        let mut state = BattleState::new(battle_id, config.battle_type, config.participants, rules);
        state.environment = config.environment;
        tracing::debug!(battle_id = %state.battle_id, seed, "session created");

        Ok(Self {
            state,
            catalog,
            registry,
            behavior: Box::new(ScoringAI::new()),
            seeds,
            decisions,
            pending: BTreeMap::new(),
            submissions: 0,
            step: 0,
            announced_step: 0,
            deadline: None,
            max_spectators: usize::MAX,
            last_events: None,
            report: None,
            outbox: Vec::new(),
        })
    }

    pub fn with_max_spectators(mut self, limit: usize) -> Self {
        self.max_spectators = limit;
        self
    }

    pub fn with_behavior(mut self, behavior: Box<dyn Behavior>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn battle_id(&self) -> &str {
        &self.state.battle_id
    }

    pub fn state(&self) -> &BattleState {
        &self.state
    }

    pub fn phase(&self) -> BattlePhase {
        self.state.phase
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    pub fn is_ended(&self) -> bool {
        self.state.phase == BattlePhase::Ended
    }

    pub fn report(&self) -> Option<&BattleReport> {
        self.report.as_ref()
    }

    pub fn drain_updates(&mut self) -> Vec<SessionUpdate> {
        std::mem::take(&mut self.outbox)
    }

    /// Runs the intro and opens the first selection window.
    pub fn start(&mut self, now: Instant) {
        if self.state.phase != BattlePhase::Intro {
            return;
        }
        let mut rng = self.step_rng();
        let ctx = EngineContext::new(&self.catalog, &self.registry);
        match engine::run_intro(&mut self.state, &mut rng, &ctx) {
            Ok(events) => self.publish(events),
            Err(error) => return self.fail(error),
        }
        let intro_delay = self.state.rules.intro_delay();
        self.open_step(now, intro_delay);
        self.advance(now);
    }

    pub fn submit(
        &mut self,
        participant_id: &str,
        action: PlayerAction,
        expected_turn: Option<u32>,
        now: Instant,
    ) -> Result<SubmitAck, SubmitError> {
        if self.is_ended() || self.state.is_concluded() {
            return Err(SubmitError::SessionClosed);
        }
        let index = self
            .state
            .participant_index(participant_id)
            .ok_or_else(|| SubmitError::NotAParticipant(participant_id.to_string()))?;
        let turn = self.state.turn_number;
        if let Some(submitted) = expected_turn {
            if submitted != turn {
                return Err(SubmitError::StaleTurn {
                    submitted,
                    current: turn,
                });
            }
        }
        if !self.state.participants[index].connected {
            return Err(SubmitError::Disconnected);
        }
        if !self.required().contains(&index) {
            return Err(SubmitError::NotAwaitingAction);
        }

        match self.state.phase {
            BattlePhase::ForcedSwitch => self.validate_replacement(index, &action)?,
            _ => self.validate_action(index, &action)?,
        }
        self.state.participants[index].last_action_at = Some(now);

        if let PlayerAction::SwitchPokemon { from, to } = action {
            if !self.state.rules.switch_consumes_turn && self.state.phase == BattlePhase::ActionSelection {
                // an action chosen for the outgoing Pokemon no longer applies
                let replaced = self.pending.remove(&index).is_some();
                self.switch_immediately(index, from, to, now);
                return Ok(SubmitAck {
                    turn,
                    replaced,
                    resolved: false,
                });
            }
        }

        let replaced = self.record(index, action, now);
        tracing::debug!(
            battle_id = %self.state.battle_id,
            turn,
            participant = participant_id,
            replaced,
            "action accepted"
        );
        let step = self.step;
        self.advance(now);
        Ok(SubmitAck {
            turn,
            replaced,
            resolved: self.step != step || self.is_ended(),
        })
    }

    /// Applies defaults for everyone still missing and resolves. A deadline
    /// from an earlier step is ignored.
    pub fn on_deadline(&mut self, step: u64, now: Instant) {
        if self.is_ended() || self.deadline.is_none_or(|deadline| deadline.step != step) {
            return;
        }
        self.deadline = None;

        let missing = self.awaiting();
        tracing::info!(
            battle_id = %self.state.battle_id,
            turn = self.state.turn_number,
            missing = missing.len(),
            "deadline elapsed, applying default actions"
        );
        self.apply_disconnect_forfeits(now);
        for index in self.awaiting() {
            if let Some(action) = self.default_action(index) {
                self.record(index, action, now);
            }
        }
        self.advance(now);
    }

    pub fn set_connected(&mut self, participant_id: &str, connected: bool, now: Instant) -> Result<(), SubmitError> {
        if self.is_ended() {
            return Err(SubmitError::SessionClosed);
        }
        let index = self
            .state
            .participant_index(participant_id)
            .ok_or_else(|| SubmitError::NotAParticipant(participant_id.to_string()))?;
        let participant = &mut self.state.participants[index];
        if participant.connected == connected {
            return Ok(());
        }
        participant.connected = connected;
        participant.disconnected_at = if connected { None } else { Some(now) };
        tracing::info!(battle_id = %self.state.battle_id, participant = participant_id, connected, "connection changed");

        self.advance(now);
        Ok(())
    }

    pub fn add_spectator(&mut self, spectator: impl Into<String>) -> Result<(), ManagerError> {
        if self.state.spectators.len() >= self.max_spectators {
            return Err(ManagerError::SpectatorLimitReached {
                limit: self.max_spectators,
            });
        }
        self.state.spectators.insert(spectator.into());
        Ok(())
    }

    pub fn remove_spectator(&mut self, spectator: &str) -> bool {
        self.state.spectators.remove(spectator)
    }

    /// Ends the battle with an interrupted outcome. Nothing from a partially
    /// resolved step is delivered.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.is_ended() {
            return;
        }
        tracing::info!(battle_id = %self.state.battle_id, turn = self.state.turn_number, ?reason, "terminating session");
        let events = engine::interrupt(&mut self.state, reason);
        self.publish(events);
        self.finish();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            awaiting: self.awaiting_ids(),
            last_events: self.last_events.clone(),
            report: self.report.clone(),
        }
    }

    /// Participants that must act in the current phase.
    fn required(&self) -> Vec<usize> {
        match self.state.phase {
            BattlePhase::ActionSelection => self.state.remaining_participants(),
            BattlePhase::ForcedSwitch => engine::participants_needing_replacement(&self.state),
            _ => Vec::new(),
        }
    }

    fn awaiting(&self) -> Vec<usize> {
        self.required()
            .into_iter()
            .filter(|index| !self.pending.contains_key(index))
            .collect()
    }

    fn awaiting_ids(&self) -> Vec<String> {
        self.awaiting()
            .into_iter()
            .map(|index| self.state.participants[index].id.clone())
            .collect()
    }

    fn validate_action(&self, index: usize, action: &PlayerAction) -> Result<(), SubmitError> {
        let side = &self.state.participants[index];
        let rules = &self.state.rules;
        match action {
            PlayerAction::UseMove { move_id, target } => {
                let pokemon = side
                    .active_pokemon()
                    .ok_or_else(|| SubmitError::InvalidAction("no active pokemon".to_string()))?;
                let slot = pokemon
                    .move_slot(move_id)
                    .ok_or_else(|| SubmitError::InvalidAction(format!("{move_id} is not known")))?;
                if slot.pp == 0 {
                    return Err(SubmitError::InvalidAction(format!("{move_id} has no PP left")));
                }
                if let Some(target) = target {
                    let valid = self
                        .state
                        .participant_index(target)
                        .is_some_and(|t| t != index && !self.state.participants[t].is_defeated());
                    if !valid {
                        return Err(SubmitError::InvalidTarget(target.clone()));
                    }
                }
            }
            PlayerAction::UseItem { item_id, target_slot } => {
                if !rules.item_use_allowed {
                    return Err(SubmitError::InvalidAction("items are not allowed".to_string()));
                }
                self.catalog
                    .item(item_id)
                    .map_err(|error| SubmitError::InvalidAction(error.to_string()))?;
                if let Some(slot) = target_slot {
                    if *slot >= side.roster.len() {
                        return Err(SubmitError::InvalidTarget(format!("roster slot {slot}")));
                    }
                }
            }
            PlayerAction::SwitchPokemon { from, to } => validate_switch(side, *from, *to, false, rules)?,
            PlayerAction::Capture { .. } => {
                if !is_capture_allowed(self.state.battle_type) {
                    return Err(SubmitError::InvalidAction(
                        "capture is only possible in wild battles".to_string(),
                    ));
                }
            }
            PlayerAction::Flee | PlayerAction::Pass => {}
        }
        Ok(())
    }

    fn validate_replacement(&self, index: usize, action: &PlayerAction) -> Result<(), SubmitError> {
        match action {
            PlayerAction::SwitchPokemon { from, to } => Ok(validate_switch(
                &self.state.participants[index],
                *from,
                *to,
                true,
                &self.state.rules,
            )?),
            _ => Err(SubmitError::ForcedSwitchRequired),
        }
    }

    /// Stores an action, replacing an earlier one. Returns whether one was replaced.
    fn record(&mut self, index: usize, action: PlayerAction, now: Instant) -> bool {
        self.submissions += 1;
        let pending = PendingAction {
            action,
            submitted_at: now,
            sequence: self.submissions,
        };
        self.pending.insert(index, pending).is_some()
    }

    /// Pass during selection, a random healthy Pokemon during a forced switch.
    fn default_action(&mut self, index: usize) -> Option<PlayerAction> {
        if self.state.phase != BattlePhase::ForcedSwitch {
            return Some(PlayerAction::Pass);
        }
        let side = &self.state.participants[index];
        let options = side.available_switches();
        if options.is_empty() {
            return None;
        }
        let pick = self
            .decisions
            .next_in_range("default replacement", 0, (options.len() - 1) as u16) as usize;
        Some(PlayerAction::SwitchPokemon {
            from: side.active_index,
            to: options[pick],
        })
    }

    /// Fills in actions for AI participants. Humans, connected or not, only
    /// get defaults from [`BattleSession::on_deadline`].
    fn fill_automatic_actions(&mut self, now: Instant) {
        let forced = self.state.phase == BattlePhase::ForcedSwitch;
        for index in self.awaiting() {
            if !self.state.participants[index].is_ai() {
                continue;
            }
            let action = if forced {
                self.behavior.decide_replacement(index, &self.state)
            } else {
                Some(
                    self.behavior
                        .decide_action(index, &self.state, &self.catalog, &mut self.decisions),
                )
            };
            if let Some(action) = action {
                self.record(index, action, now);
            }
        }
    }

    fn apply_disconnect_forfeits(&mut self, now: Instant) {
        let grace = self.state.rules.disconnect_grace();
        let expired: Vec<usize> = self
            .required()
            .into_iter()
            .filter(|&index| {
                let participant = &self.state.participants[index];
                !participant.connected && participant.disconnected_at.is_some_and(|at| now >= at + grace)
            })
            .collect();

        for index in expired {
            if self.state.is_concluded() {
                break;
            }
            tracing::info!(
                battle_id = %self.state.battle_id,
                participant = %self.state.participants[index].id,
                "disconnect grace expired, forfeiting"
            );
            self.pending.remove(&index);
            let events = engine::resolve_forfeit(&mut self.state, index);
            self.publish(events);
        }
    }

    /// Moves the session forward until it needs input or has ended.
    fn advance(&mut self, now: Instant) {
        loop {
            match self.state.phase {
                BattlePhase::VictorySequence => {
                    self.finish();
                    return;
                }
                BattlePhase::ActionSelection | BattlePhase::ForcedSwitch => {
                    self.apply_disconnect_forfeits(now);
                    if self.state.phase == BattlePhase::VictorySequence {
                        continue;
                    }
                    self.fill_automatic_actions(now);
                    if !self.awaiting().is_empty() {
                        self.announce_awaiting();
                        return;
                    }
                    self.resolve(now);
                }
                _ => return,
            }
        }
    }

    fn resolve(&mut self, now: Instant) {
        let forced = self.state.phase == BattlePhase::ForcedSwitch;
        let mut pending: Vec<(usize, PendingAction)> = std::mem::take(&mut self.pending).into_iter().collect();
        pending.sort_by_key(|(_, pending)| pending.sequence);
        let actions: Vec<BattleAction> = pending
            .into_iter()
            .map(|(index, pending)| {
                let action = match pending.action {
                    PlayerAction::SwitchPokemon { from, to } if forced => BattleAction::forced_switch(index, from, to),
                    other => BattleAction::new(index, other),
                };
                action.submitted_by(self.state.participants[index].id.clone(), pending.submitted_at)
            })
            .collect();

        let mut rng = self.step_rng();
        let ctx = EngineContext::new(&self.catalog, &self.registry);
        let result = if forced {
            engine::resolve_replacements(&mut self.state, actions, &mut rng, &ctx)
        } else {
            engine::resolve_turn(&mut self.state, actions, &mut rng, &ctx)
        };
        match result {
            Ok(events) => {
                self.publish(events);
                if !self.state.is_concluded() {
                    self.open_step(now, Duration::ZERO);
                }
            }
            Err(error) => self.fail(error),
        }
    }

    fn switch_immediately(&mut self, index: usize, from: usize, to: usize, now: Instant) {
        let mut rng = self.step_rng();
        let ctx = EngineContext::new(&self.catalog, &self.registry);
        match engine::resolve_immediate_switch(&mut self.state, index, from, to, &mut rng, &ctx) {
            Ok(events) => {
                self.publish(events);
                self.advance(now);
            }
            Err(error) => self.fail(error),
        }
    }

    fn open_step(&mut self, now: Instant, extra: Duration) {
        self.step += 1;
        self.pending.clear();
        self.deadline = Some(Deadline {
            step: self.step,
            at: now + extra + self.state.rules.turn_time_limit(),
        });
    }

    fn announce_awaiting(&mut self) {
        if self.announced_step == self.step {
            return;
        }
        self.announced_step = self.step;
        self.outbox.push(SessionUpdate::AwaitingActions {
            turn: self.state.turn_number,
            phase: self.state.phase,
            participants: self.awaiting_ids(),
        });
    }

    fn step_rng(&mut self) -> TurnRng {
        TurnRng::from_seed(self.seeds.random())
    }

    fn publish(&mut self, events: BattleEventSequence) {
        self.last_events = Some(events.clone());
        self.outbox.push(SessionUpdate::Events(events));
    }

    fn fail(&mut self, error: BattleEngineError) {
        tracing::error!(
            battle_id = %self.state.battle_id,
            turn = self.state.turn_number,
            %error,
            "fatal engine error, interrupting battle"
        );
        let events = engine::interrupt(&mut self.state, TerminationReason::Fatal(error.to_string()));
        self.publish(events);
        self.finish();
    }

    fn finish(&mut self) {
        if self.report.is_some() {
            return;
        }
        self.state.phase = BattlePhase::Ended;
        self.deadline = None;
        self.pending.clear();
        let report = BattleReport::from_state(&self.state);
        tracing::info!(
            battle_id = %report.battle_id,
            turns = report.turns,
            outcome = ?report.outcome,
            "battle finished"
        );
        self.outbox.push(SessionUpdate::Ended(report.clone()));
        self.report = Some(report);
    }
}

fn validate_participants(config: &SessionConfig, catalog: &Catalog) -> Result<(), SessionError> {
    if config.participants.len() < 2 {
        return Err(SessionError::TooFewParticipants(config.participants.len()));
    }
    let mut seen = HashSet::new();
    for participant in &config.participants {
        if !seen.insert(participant.id.as_str()) {
            return Err(SessionError::DuplicateParticipant(participant.id.clone()));
        }
        let invalid = |reason: String| SessionError::InvalidRoster {
            participant: participant.id.clone(),
            reason,
        };
        if participant.roster.is_empty() {
            return Err(invalid("roster is empty".to_string()));
        }
        if participant.roster.len() > MAX_ROSTER_SIZE {
            return Err(invalid(format!("more than {MAX_ROSTER_SIZE} pokemon")));
        }
        if participant.all_fainted() {
            return Err(invalid("every pokemon has fainted".to_string()));
        }
        for pokemon in &participant.roster {
            catalog.species(&pokemon.species)?;
            for slot in &pokemon.moves {
                catalog.move_data(&slot.move_id)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::state::{BattleType, Conclusion};
    use crate::battle::tests::common::TestPokemonBuilder;
    use crate::errors::{CatalogError, SwitchError};
    use crate::player::Participant;
    use crate::pokemon::{BattlePokemon, Origin};
    use pretty_assertions::assert_eq;

    fn tackle() -> PlayerAction {
        PlayerAction::UseMove {
            move_id: "tackle".to_string(),
            target: None,
        }
    }

    fn session_with(p1: Vec<BattlePokemon>, p2: Vec<BattlePokemon>, rules: SessionRules) -> BattleSession {
        let config = SessionConfig::new(
            BattleType::PlayerVsPlayer,
            vec![Participant::new("p1", "Red", p1), Participant::new("p2", "Blue", p2)],
        )
        .with_seed(42);
        let mut session = BattleSession::new(
            "session-test",
            config,
            rules,
            Arc::new(Catalog::standard().unwrap()),
            Arc::new(EffectRegistry::standard()),
        )
        .unwrap();
        session.start(Instant::now());
        session
    }

    fn duel() -> BattleSession {
        session_with(
            vec![TestPokemonBuilder::new("pikachu", 1).with_moves(&["tackle"]).with_speed(90).build()],
            vec![TestPokemonBuilder::new("eevee", 2).with_moves(&["tackle"]).with_speed(55).build()],
            SessionRules::default(),
        )
    }

    #[test]
    fn start_runs_the_intro_and_waits_for_everyone() {
        let mut session = duel();
        assert_eq!(session.phase(), BattlePhase::ActionSelection);
        let updates = session.drain_updates();
        assert!(matches!(&updates[0], SessionUpdate::Events(events) if events.contains("battle-started")));
        assert!(matches!(
            &updates[1],
            SessionUpdate::AwaitingActions { turn: 1, participants, .. } if participants.len() == 2
        ));
    }

    #[test]
    fn second_submission_replaces_the_first() {
        let mut session = duel();
        let now = Instant::now();
        let first = session.submit("p1", PlayerAction::Pass, Some(1), now).unwrap();
        assert!(!first.replaced);
        let second = session.submit("p1", tackle(), Some(1), now).unwrap();
        assert!(second.replaced);
        assert!(!second.resolved);

        let ack = session.submit("p2", tackle(), None, now).unwrap();
        assert!(ack.resolved);
        assert_eq!(session.state().turn_number, 2);
        let moves = session
            .snapshot()
            .last_events
            .map(|events| events.count("move-used"))
            .unwrap_or_default();
        assert_eq!(moves, 2);
    }

    #[test]
    fn rejections_leave_the_session_untouched() {
        let mut session = duel();
        let now = Instant::now();
        assert_eq!(
            session.submit("p9", PlayerAction::Pass, None, now),
            Err(SubmitError::NotAParticipant("p9".to_string()))
        );
        assert_eq!(
            session.submit("p1", PlayerAction::Pass, Some(3), now),
            Err(SubmitError::StaleTurn { submitted: 3, current: 1 })
        );
        assert_eq!(
            session
                .submit(
                    "p1",
                    PlayerAction::UseMove {
                        move_id: "tackle".to_string(),
                        target: Some("p1".to_string())
                    },
                    None,
                    now
                )
                .map_err(|e| e.code()),
            Err("invalid-target")
        );
        assert_eq!(
            session.submit("p1", PlayerAction::Capture { device: Default::default() }, None, now).map_err(|e| e.code()),
            Err("invalid-action")
        );
        assert_eq!(
            session.submit("p1", PlayerAction::SwitchPokemon { from: 0, to: 0 }, None, now),
            Err(SubmitError::InvalidSwitch(SwitchError::AlreadyActive(0)))
        );
        assert_eq!(
            session
                .submit(
                    "p1",
                    PlayerAction::UseItem {
                        item_id: "potion".to_string(),
                        target_slot: None
                    },
                    None,
                    now
                )
                .map_err(|e| e.code()),
            Err("invalid-action")
        );
        assert_eq!(session.snapshot().awaiting.len(), 2);
    }

    #[test]
    fn forced_switch_accepts_only_replacements() {
        let mut session = session_with(
            vec![TestPokemonBuilder::new("machop", 1)
                .with_moves(&["tackle"])
                .with_speed(90)
                .build()],
            vec![
                TestPokemonBuilder::new("eevee", 2).with_moves(&["tackle"]).with_hp(1).build(),
                TestPokemonBuilder::new("pikachu", 3).with_moves(&["tackle"]).build(),
            ],
            SessionRules::default(),
        );
        let now = Instant::now();
        session.submit("p1", tackle(), None, now).unwrap();
        session.submit("p2", tackle(), None, now).unwrap();
        assert_eq!(session.phase(), BattlePhase::ForcedSwitch);
        assert_eq!(session.snapshot().awaiting, vec!["p2".to_string()]);

        assert_eq!(
            session.submit("p2", tackle(), None, now),
            Err(SubmitError::ForcedSwitchRequired)
        );
        assert_eq!(
            session.submit("p1", tackle(), None, now),
            Err(SubmitError::NotAwaitingAction)
        );
        let ack = session
            .submit("p2", PlayerAction::SwitchPokemon { from: 0, to: 1 }, None, now)
            .unwrap();
        assert!(ack.resolved);
        assert_eq!(session.phase(), BattlePhase::ActionSelection);
        assert_eq!(session.state().turn_number, 2);
        assert_eq!(session.state().participants[1].active_index, 1);
    }

    #[test]
    fn deadline_passes_for_missing_participants_once() {
        let mut session = duel();
        let now = Instant::now();
        session.submit("p1", tackle(), None, now).unwrap();
        let deadline = session.deadline().unwrap();

        session.on_deadline(deadline.step, deadline.at);
        assert_eq!(session.state().turn_number, 2);
        assert_eq!(
            session.snapshot().last_events.map(|events| events.count("move-used")),
            Some(1)
        );

        // the old deadline cannot resolve the new turn
        session.on_deadline(deadline.step, deadline.at);
        assert_eq!(session.state().turn_number, 2);
    }

    #[test]
    fn immediate_switch_keeps_the_turn_open() {
        let rules = SessionRules {
            switch_consumes_turn: false,
            ..SessionRules::default()
        };
        let mut session = session_with(
            vec![
                TestPokemonBuilder::new("pikachu", 1).with_moves(&["tackle"]).build(),
                TestPokemonBuilder::new("squirtle", 2).with_moves(&["tackle"]).with_speed(40).build(),
            ],
            vec![TestPokemonBuilder::new("eevee", 3).with_moves(&["tackle"]).with_speed(60).build()],
            rules,
        );
        let now = Instant::now();
        let ack = session
            .submit("p1", PlayerAction::SwitchPokemon { from: 0, to: 1 }, None, now)
            .unwrap();
        assert!(!ack.resolved);
        assert_eq!(session.phase(), BattlePhase::ActionSelection);
        assert_eq!(session.state().participants[0].active_index, 1);
        assert_eq!(session.snapshot().awaiting.len(), 2);
    }

    #[test]
    fn immediate_switch_discards_the_earlier_action() {
        let rules = SessionRules {
            switch_consumes_turn: false,
            ..SessionRules::default()
        };
        let mut session = session_with(
            vec![
                TestPokemonBuilder::new("pikachu", 1).with_moves(&["thunderbolt"]).build(),
                TestPokemonBuilder::new("squirtle", 2).with_moves(&["tackle"]).with_speed(40).build(),
            ],
            vec![TestPokemonBuilder::new("eevee", 3)
                .with_moves(&["tackle"])
                .with_max_hp(300)
                .with_speed(60)
                .build()],
            rules,
        );
        let now = Instant::now();
        let thunderbolt = PlayerAction::UseMove {
            move_id: "thunderbolt".to_string(),
            target: None,
        };
        session.submit("p1", thunderbolt, None, now).unwrap();

        let ack = session
            .submit("p1", PlayerAction::SwitchPokemon { from: 0, to: 1 }, None, now)
            .unwrap();
        assert!(ack.replaced);
        assert!(session.snapshot().awaiting.contains(&"p1".to_string()));

        session.submit("p1", tackle(), None, now).unwrap();
        let ack = session.submit("p2", tackle(), None, now).unwrap();
        assert!(ack.resolved);
        let events = session.snapshot().last_events.unwrap();
        assert_eq!(events.count("move-used"), 2);
        assert!(!events.contains("action-failed"));
    }

    #[test]
    fn disconnected_participants_wait_for_the_deadline() {
        let mut session = duel();
        let now = Instant::now();
        session.set_connected("p1", false, now).unwrap();
        session.set_connected("p2", false, now).unwrap();
        assert!(!session.is_ended());
        assert_eq!(session.state().turn_number, 1);

        let first = session.deadline().unwrap();
        session.on_deadline(first.step, first.at);
        assert_eq!(session.state().turn_number, 2);
        assert!(!session.is_ended());

        // the second deadline falls after the grace period
        let second = session.deadline().unwrap();
        assert!(second.at >= now + session.state().rules.disconnect_grace());
        session.on_deadline(second.step, second.at);
        assert!(session.is_ended());
    }

    #[test]
    fn disconnected_participants_forfeit_after_grace() {
        let mut session = duel();
        let now = Instant::now();
        session.set_connected("p2", false, now).unwrap();
        assert_eq!(
            session.submit("p2", PlayerAction::Pass, None, now),
            Err(SubmitError::Disconnected)
        );

        let ack = session.submit("p1", tackle(), None, now).unwrap();
        assert!(!ack.resolved);
        // inside the grace period the missing action defaults to a pass
        let deadline = session.deadline().unwrap();
        session.on_deadline(deadline.step, deadline.at);
        assert_eq!(session.state().turn_number, 2);

        let later = now + session.state().rules.disconnect_grace();
        session.submit("p1", tackle(), None, later).unwrap();
        assert!(session.is_ended());
        assert_eq!(
            session.report().map(|report| report.outcome.clone()),
            Some(Conclusion::Victory { winner: 0 })
        );
        assert_eq!(session.submit("p1", PlayerAction::Pass, None, later), Err(SubmitError::SessionClosed));
    }

    #[test]
    fn deadline_sends_out_a_replacement() {
        let mut session = session_with(
            vec![TestPokemonBuilder::new("machop", 1)
                .with_moves(&["tackle"])
                .with_speed(90)
                .build()],
            vec![
                TestPokemonBuilder::new("eevee", 2).with_moves(&["tackle"]).with_hp(1).build(),
                TestPokemonBuilder::new("squirtle", 3).with_moves(&["tackle"]).with_hp(0).build(),
                TestPokemonBuilder::new("pikachu", 4).with_moves(&["tackle"]).build(),
            ],
            SessionRules::default(),
        );
        let now = Instant::now();
        session.submit("p1", tackle(), None, now).unwrap();
        session.submit("p2", tackle(), None, now).unwrap();
        assert_eq!(session.phase(), BattlePhase::ForcedSwitch);

        let deadline = session.deadline().unwrap();
        session.on_deadline(deadline.step, deadline.at);

        assert_eq!(session.phase(), BattlePhase::ActionSelection);
        assert_eq!(session.state().turn_number, 2);
        assert_eq!(session.state().participants[1].active_index, 2);
        assert!(session.snapshot().last_events.is_some_and(|events| events.contains("switched")));
    }

    #[test]
    fn fatal_errors_interrupt_without_partial_events() {
        let config = SessionConfig::new(
            BattleType::Wild,
            vec![
                Participant::new(
                    "p1",
                    "Red",
                    vec![TestPokemonBuilder::new("pikachu", 1).with_moves(&["tackle"]).build()],
                ),
                Participant::ai(
                    "wild",
                    "Wild",
                    vec![TestPokemonBuilder::new("eevee", 2)
                        .with_moves(&["tackle"])
                        .build()
                        .with_origin(Origin::Wild)],
                ),
            ],
        )
        .with_seed(7);
        let mut session = BattleSession::new(
            "fatal",
            config,
            SessionRules::default(),
            Arc::new(Catalog::standard().unwrap()),
            Arc::new(EffectRegistry::standard()),
        )
        .unwrap();
        let now = Instant::now();
        session.start(now);
        session.drain_updates();
        // catch rate lookup fails mid-turn
        session.state.participants[1].roster[0].species = "missingno".to_string();

        session
            .submit("p1", PlayerAction::Capture { device: Default::default() }, None, now)
            .unwrap();

        assert!(session.is_ended());
        let updates = session.drain_updates();
        assert!(!updates.iter().any(|update| matches!(
            update,
            SessionUpdate::Events(events) if events.contains("capture-attempted") || events.contains("capture-result")
        )));
        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Ended(BattleReport {
                outcome: Conclusion::Interrupted {
                    reason: TerminationReason::Fatal(_)
                },
                ..
            }))
        ));
    }

    #[test]
    fn terminate_reports_an_interruption() {
        let mut session = duel();
        session.drain_updates();
        session.terminate(TerminationReason::Admin("maintenance".to_string()));
        assert!(session.is_ended());
        let updates = session.drain_updates();
        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Ended(BattleReport {
                outcome: Conclusion::Interrupted { .. },
                ..
            }))
        ));
    }

    #[test]
    fn invalid_rosters_are_rejected() {
        let config = SessionConfig::new(
            BattleType::Trainer,
            vec![
                Participant::new("p1", "Red", vec![TestPokemonBuilder::new("pikachu", 1).build()]),
                Participant::new("p1", "Blue", vec![TestPokemonBuilder::new("eevee", 2).build()]),
            ],
        );
        let result = BattleSession::new(
            "dupe",
            config,
            SessionRules::default(),
            Arc::new(Catalog::standard().unwrap()),
            Arc::new(EffectRegistry::standard()),
        );
        assert!(matches!(result, Err(SessionError::DuplicateParticipant(id)) if id == "p1"));
    }

    #[test]
    fn unknown_species_are_rejected_at_creation() {
        let config = SessionConfig::new(
            BattleType::Trainer,
            vec![
                Participant::new("p1", "Red", vec![TestPokemonBuilder::new("pikachu", 1).build()]),
                Participant::new("p2", "Blue", vec![TestPokemonBuilder::new("missingno", 2).build()]),
            ],
        );
        let result = BattleSession::new(
            "unknown",
            config,
            SessionRules::default(),
            Arc::new(Catalog::standard().unwrap()),
            Arc::new(EffectRegistry::standard()),
        );
        assert!(matches!(
            result,
            Err(SessionError::Catalog(CatalogError::SpeciesNotFound(id))) if id == "missingno"
        ));
    }
}
