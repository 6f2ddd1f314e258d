//! Fan-out owner
//!
//! The owner task holds the subscriber map for one media type of one
//! stream. It waits on the frame queue and the command queue together and
//! handles whichever is ready; when both are, no order between them is
//! promised, only that events never overlap.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::stats::FanOutStats;

use super::config::RelayConfig;
use super::error::RelayError;
use super::frame::{Frame, MediaKind};

/// Bounded channel a viewer session reads packets from
pub type Sink = mpsc::Sender<Bytes>;

enum Command {
    Attach {
        session_id: String,
        sink: Sink,
        reply: oneshot::Sender<Result<(), RelayError>>,
    },
    Detach {
        session_id: String,
        reply: oneshot::Sender<bool>,
    },
    Contains {
        session_id: String,
        reply: oneshot::Sender<bool>,
    },
    Stats {
        reply: oneshot::Sender<FanOutStats>,
    },
    Shutdown {
        reply: oneshot::Sender<FanOutStats>,
    },
}

/// Handle to a fan-out owner task
pub struct FanOut {
    kind: MediaKind,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl FanOut {
    /// Spawn an owner task
    ///
    /// Returns the handle and the sending half of the frame queue. The
    /// frame queue is normally fed by a [`Listener`](super::Listener).
    pub fn spawn(kind: MediaKind, config: &RelayConfig) -> (Self, mpsc::Sender<Frame>) {
        let (frame_tx, frame_rx) = mpsc::channel(config.frame_queue_capacity);
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity);

        let owner = Owner {
            kind,
            subscribers: HashMap::new(),
            stats: FanOutStats::new(kind),
        };
        let task = tokio::spawn(owner.run(frame_rx, command_rx));

        (
            Self {
                kind,
                commands: command_tx,
                task,
            },
            frame_tx,
        )
    }

    /// Media type served by this owner
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Add a subscriber
    ///
    /// Fails with [`RelayError::AlreadyAttached`] if the session already
    /// has a sink here; the existing subscription is left untouched.
    pub async fn attach(&self, session_id: impl Into<String>, sink: Sink) -> Result<(), RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Attach {
            session_id: session_id.into(),
            sink,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::Stopped)?
    }

    /// Remove a subscriber
    ///
    /// Returns whether the session was attached. Detaching an unknown
    /// session, or detaching from a stopped owner, is not an error.
    pub async fn detach(&self, session_id: impl Into<String>) -> bool {
        let (reply, rx) = oneshot::channel();
        let command = Command::Detach {
            session_id: session_id.into(),
            reply,
        };
        if self.send(command).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Whether a session is currently attached
    pub async fn contains(&self, session_id: impl Into<String>) -> Result<bool, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Contains {
            session_id: session_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::Stopped)
    }

    /// Current statistics
    pub async fn stats(&self) -> Result<FanOutStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| RelayError::Stopped)
    }

    /// Stop the owner and wait for it to exit
    ///
    /// Every subscriber sink is dropped, which ends the matching receivers
    /// once they have drained.
    pub async fn shutdown(self) -> FanOutStats {
        let (reply, rx) = oneshot::channel();
        let mut stats = FanOutStats::new(self.kind);
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            if let Ok(last) = rx.await {
                stats = last;
            }
        }
        let _ = self.task.await;
        stats
    }

    async fn send(&self, command: Command) -> Result<(), RelayError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RelayError::Stopped)
    }
}

struct Owner {
    kind: MediaKind,
    subscribers: HashMap<String, Sink>,
    stats: FanOutStats,
}

impl Owner {
    async fn run(mut self, mut frames: mpsc::Receiver<Frame>, mut commands: mpsc::Receiver<Command>) {
        let mut frames_open = true;

        loop {
            tokio::select! {
                frame = frames.recv(), if frames_open => match frame {
                    Some(frame) => self.fan_out(frame),
                    None => {
                        frames_open = false;
                        tracing::debug!(kind = %self.kind, "Frame queue closed");
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        commands.close();
                        let stats = self.snapshot();
                        self.subscribers.clear();
                        tracing::debug!(
                            kind = %self.kind,
                            frames = stats.frames_received,
                            "Fan-out owner stopped"
                        );
                        let _ = reply.send(stats);
                        return;
                    }
                    Some(command) => self.handle(command),
                    None => return,
                },
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Attach {
                session_id,
                sink,
                reply,
            } => {
                let result = if self.subscribers.contains_key(&session_id) {
                    tracing::warn!(
                        kind = %self.kind,
                        session_id = %session_id,
                        "Rejected duplicate attach"
                    );
                    Err(RelayError::AlreadyAttached(session_id))
                } else {
                    tracing::debug!(
                        kind = %self.kind,
                        session_id = %session_id,
                        subscribers = self.subscribers.len() + 1,
                        "Subscriber attached"
                    );
                    self.subscribers.insert(session_id, sink);
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::Detach { session_id, reply } => {
                let removed = self.subscribers.remove(&session_id).is_some();
                if removed {
                    tracing::debug!(
                        kind = %self.kind,
                        session_id = %session_id,
                        subscribers = self.subscribers.len(),
                        "Subscriber detached"
                    );
                }
                let _ = reply.send(removed);
            }
            Command::Contains { session_id, reply } => {
                let _ = reply.send(self.subscribers.contains_key(&session_id));
            }
            Command::Stats { reply } | Command::Shutdown { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn fan_out(&mut self, frame: Frame) {
        self.stats.frames_received += 1;

        if self.subscribers.is_empty() {
            return;
        }

        let payload = frame.into_payload();
        let mut closed = Vec::new();

        for (session_id, sink) in &self.subscribers {
            match sink.try_send(payload.clone()) {
                Ok(()) => self.stats.deliveries += 1,
                Err(TrySendError::Full(_)) => {
                    self.stats.dropped_full += 1;
                    tracing::trace!(
                        kind = %self.kind,
                        session_id = %session_id,
                        "Sink full, frame dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(session_id.clone()),
            }
        }

        for session_id in closed {
            self.subscribers.remove(&session_id);
            self.stats.pruned_closed += 1;
            tracing::debug!(
                kind = %self.kind,
                session_id = %session_id,
                "Sink closed, subscriber removed"
            );
        }
    }

    fn snapshot(&self) -> FanOutStats {
        FanOutStats {
            subscribers: self.subscribers.len(),
            ..self.stats.clone()
        }
    }
}
