use super::machine::BattleSession;
use super::report::{LogSink, ResultSink};
use super::worker::{SessionCommand, SessionWorker};
use super::{SessionId, SessionSnapshot, SessionUpdate, SubmitAck};
use crate::battle::effects::EffectRegistry;
use crate::battle::state::TerminationReason;
use crate::catalog::Catalog;
use crate::config::{ManagerConfig, SessionConfig};
use crate::errors::{ManagerError, SubmitError};
use crate::player::PlayerAction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info};

#[derive(Clone)]
struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

type SessionMap = Arc<RwLock<HashMap<SessionId, SessionHandle>>>;

/// Entry point for clients. Each session runs on its own task; the manager
/// only keeps the channels needed to reach it. Finished sessions are dropped
/// from the map as soon as their task exits.
pub struct SessionManager {
    config: ManagerConfig,
    catalog: Arc<Catalog>,
    registry: Arc<EffectRegistry>,
    sink: Arc<dyn ResultSink>,
    sessions: SessionMap,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(config: ManagerConfig, catalog: Arc<Catalog>, registry: Arc<EffectRegistry>) -> Self {
        Self {
            config,
            catalog,
            registry,
            sink: Arc::new(LogSink),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validates the rosters, spawns the session task and returns its id.
    pub async fn create_session(&self, config: SessionConfig) -> Result<SessionId, ManagerError> {
        let (session_id, _) = self.spawn_session(config).await?;
        Ok(session_id)
    }

    /// Like [`Self::create_session`], but subscribed before the task starts so
    /// the intro and any turns resolved without waiting are not missed.
    pub async fn create_and_subscribe(
        &self,
        config: SessionConfig,
    ) -> Result<(SessionId, broadcast::Receiver<SessionUpdate>), ManagerError> {
        self.spawn_session(config).await
    }

    async fn spawn_session(
        &self,
        config: SessionConfig,
    ) -> Result<(SessionId, broadcast::Receiver<SessionUpdate>), ManagerError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.config.max_sessions {
            return Err(ManagerError::SessionLimitReached {
                limit: self.config.max_sessions,
            });
        }
        let session_id = match &config.battle_id {
            Some(id) => id.clone(),
            None => format!("battle-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
        };
        if sessions.contains_key(&session_id) {
            return Err(ManagerError::DuplicateSession(session_id));
        }

        let rules = config
            .rules
            .clone()
            .unwrap_or_else(|| self.config.rules_for(config.battle_type));
        let session = BattleSession::new(
            session_id.clone(),
            config,
            rules,
            Arc::clone(&self.catalog),
            Arc::clone(&self.registry),
        )?
        .with_max_spectators(self.config.max_spectators_per_session);

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer);
        let (update_tx, updates) = broadcast::channel(self.config.update_buffer);
        let worker = SessionWorker::new(session, command_rx, update_tx.clone(), Arc::clone(&self.sink));
        sessions.insert(
            session_id.clone(),
            SessionHandle {
                command_tx,
                update_tx,
            },
        );
        drop(sessions);

        let registry = Arc::clone(&self.sessions);
        let id = session_id.clone();
        tokio::spawn(async move {
            worker.run().await;
            registry.write().await.remove(&id);
            debug!(session_id = %id, "session released");
        });
        info!(%session_id, "session created");
        Ok((session_id, updates))
    }

    /// Returns once the action is validated and queued. Resolution, if this
    /// completed the set, has already happened when the ack arrives.
    pub async fn submit_action(
        &self,
        session_id: &str,
        participant_id: &str,
        action: PlayerAction,
        expected_turn: Option<u32>,
    ) -> Result<SubmitAck, SubmitError> {
        let handle = self
            .handle(session_id)
            .await
            .ok_or_else(|| SubmitError::SessionNotFound(session_id.to_string()))?;
        let (reply, reply_rx) = oneshot::channel();
        handle
            .command_tx
            .send(SessionCommand::Submit {
                participant: participant_id.to_string(),
                action,
                expected_turn,
                reply,
            })
            .await
            .map_err(|_| SubmitError::SessionClosed)?;
        reply_rx.await.map_err(|_| SubmitError::SessionClosed)?
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, ManagerError> {
        self.request(session_id, |reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Receiver for every update the session publishes from now on.
    pub async fn subscribe(&self, session_id: &str) -> Result<broadcast::Receiver<SessionUpdate>, ManagerError> {
        self.handle(session_id)
            .await
            .map(|handle| handle.update_tx.subscribe())
            .ok_or_else(|| ManagerError::SessionNotFound(session_id.to_string()))
    }

    pub async fn terminate_session(&self, session_id: &str, reason: TerminationReason) -> Result<(), ManagerError> {
        self.request(session_id, |reply| SessionCommand::Terminate { reason, reply })
            .await
    }

    pub async fn add_spectator(&self, session_id: &str, spectator: impl Into<String>) -> Result<(), ManagerError> {
        let spectator = spectator.into();
        self.request(session_id, |reply| SessionCommand::AddSpectator { spectator, reply })
            .await?
    }

    pub async fn remove_spectator(&self, session_id: &str, spectator: &str) -> Result<bool, ManagerError> {
        let spectator = spectator.to_string();
        self.request(session_id, |reply| SessionCommand::RemoveSpectator { spectator, reply })
            .await
    }

    pub async fn set_connected(
        &self,
        session_id: &str,
        participant_id: &str,
        connected: bool,
    ) -> Result<(), ManagerError> {
        let participant = participant_id.to_string();
        let result = self
            .request(session_id, |reply| SessionCommand::SetConnected {
                participant,
                connected,
                reply,
            })
            .await?;
        result.map_err(|error| match error {
            SubmitError::NotAParticipant(id) => ManagerError::ParticipantNotFound(id),
            _ => ManagerError::SessionNotFound(session_id.to_string()),
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Terminates every running session.
    pub async fn shutdown(&self) {
        let handles: Vec<(SessionId, SessionHandle)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        info!(sessions = handles.len(), "shutting down sessions");
        for (session_id, handle) in handles {
            let (reply, reply_rx) = oneshot::channel();
            let command = SessionCommand::Terminate {
                reason: TerminationReason::Shutdown,
                reply,
            };
            if handle.command_tx.send(command).await.is_ok() {
                let _ = reply_rx.await;
            } else {
                debug!(%session_id, "session already stopped");
            }
        }
    }

    async fn handle(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Sends a command and waits for its reply. A session whose task has
    /// already stopped counts as not found.
    async fn request<T>(
        &self,
        session_id: &str,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, ManagerError> {
        let not_found = || ManagerError::SessionNotFound(session_id.to_string());
        let handle = self.handle(session_id).await.ok_or_else(not_found)?;
        let (reply, reply_rx) = oneshot::channel();
        handle.command_tx.send(command(reply)).await.map_err(|_| not_found())?;
        reply_rx.await.map_err(|_| not_found())
    }
}
