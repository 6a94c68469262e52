//! Background task that owns one [`BattleSession`].
//!
//! Commands arrive from the [`super::SessionManager`] with a oneshot reply;
//! updates go out on a broadcast channel. The turn deadline is raced against
//! incoming commands so a timeout fires at most once per selection window.

use super::machine::{BattleSession, Deadline};
use super::report::ResultSink;
use super::{SessionSnapshot, SessionUpdate, SubmitAck};
use crate::battle::state::TerminationReason;
use crate::errors::{ManagerError, SubmitError};
use crate::player::{ParticipantId, PlayerAction};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

pub enum SessionCommand {
    Submit {
        participant: ParticipantId,
        action: PlayerAction,
        expected_turn: Option<u32>,
        reply: oneshot::Sender<Result<SubmitAck, SubmitError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    SetConnected {
        participant: ParticipantId,
        connected: bool,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    AddSpectator {
        spectator: String,
        reply: oneshot::Sender<Result<(), ManagerError>>,
    },
    RemoveSpectator {
        spectator: String,
        reply: oneshot::Sender<bool>,
    },
    Terminate {
        reason: TerminationReason,
        reply: oneshot::Sender<()>,
    },
}

pub struct SessionWorker {
    session: BattleSession,
    command_rx: mpsc::Receiver<SessionCommand>,
    update_tx: broadcast::Sender<SessionUpdate>,
    sink: Arc<dyn ResultSink>,
}

impl SessionWorker {
    pub fn new(
        session: BattleSession,
        command_rx: mpsc::Receiver<SessionCommand>,
        update_tx: broadcast::Sender<SessionUpdate>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            session,
            command_rx,
            update_tx,
            sink,
        }
    }

    /// Drives the session until it ends. Dropping every command sender
    /// terminates the battle.
    pub async fn run(mut self) {
        self.session.start(Instant::now());
        self.flush();

        while !self.session.is_ended() {
            let deadline = self.session.deadline();
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!(battle_id = %self.session.battle_id(), "command channel closed");
                        self.session.terminate(TerminationReason::Shutdown);
                    }
                },
                step = wait_for(deadline) => {
                    self.session.on_deadline(step, Instant::now());
                }
            }
            self.flush();
        }

        // answer whatever is still queued so callers see the session as closed
        self.command_rx.close();
        while let Ok(command) = self.command_rx.try_recv() {
            self.handle_command(command);
        }
        debug!(battle_id = %self.session.battle_id(), "session worker stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        let now = Instant::now();
        match command {
            SessionCommand::Submit {
                participant,
                action,
                expected_turn,
                reply,
            } => {
                let result = self.session.submit(&participant, action, expected_turn, now);
                if let Err(error) = &result {
                    debug!(battle_id = %self.session.battle_id(), %participant, code = error.code(), "submission rejected");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            SessionCommand::SetConnected {
                participant,
                connected,
                reply,
            } => {
                let _ = reply.send(self.session.set_connected(&participant, connected, now));
            }
            SessionCommand::AddSpectator { spectator, reply } => {
                let _ = reply.send(self.session.add_spectator(spectator));
            }
            SessionCommand::RemoveSpectator { spectator, reply } => {
                let _ = reply.send(self.session.remove_spectator(&spectator));
            }
            SessionCommand::Terminate { reason, reply } => {
                self.session.terminate(reason);
                let _ = reply.send(());
            }
        }
    }

    /// Publishes queued updates. The final report also goes to the sink.
    fn flush(&mut self) {
        for update in self.session.drain_updates() {
            if let SessionUpdate::Ended(report) = &update {
                self.sink.deliver(report);
            }
            // fails only when nobody is subscribed
            let _ = self.update_tx.send(update);
        }
    }
}

async fn wait_for(deadline: Option<Deadline>) -> u64 {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(deadline.at).await;
            deadline.step
        }
        None => std::future::pending().await,
    }
}
