//! Endpoint lifecycle task and handle

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::allocator::{PortAllocator, PortLease};
use crate::control::{ControlPlane, MediaDescription};
use crate::error::{Error, Result};
use crate::relay::{MediaKind, RelayError, Sink, StreamRelay};
use crate::stats::EndpointStats;

use super::config::EndpointConfig;
use super::state::EndpointPhase;

enum Command {
    Attach {
        session_id: String,
        audio: Sink,
        video: Sink,
        reply: oneshot::Sender<Result<()>>,
    },
    Detach {
        session_id: String,
        reply: oneshot::Sender<()>,
    },
    Stats {
        reply: oneshot::Sender<Result<EndpointStats>>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to a relay endpoint
///
/// Clones share one endpoint. Once the endpoint is closed every operation
/// fails with [`Error::EndpointClosed`]. If every handle is dropped without
/// calling [`close`](Self::close), the endpoint closes itself.
#[derive(Clone)]
pub struct RelayEndpoint {
    stream_id: Arc<str>,
    origin: Arc<str>,
    description: Arc<MediaDescription>,
    base_port: u16,
    commands: mpsc::Sender<Command>,
    phase: watch::Receiver<EndpointPhase>,
}

impl RelayEndpoint {
    /// Create an endpoint for `stream_id` served by `origin`
    ///
    /// Acquires a port lease, asks the origin to forward the stream to it,
    /// then starts the relay. If provisioning fails the lease is released
    /// before the error is returned.
    pub async fn create<C: ControlPlane>(
        origin: &str,
        stream_id: &str,
        allocator: &PortAllocator,
        control: Arc<C>,
        config: &EndpointConfig,
    ) -> Result<Self> {
        let lease = allocator.acquire().await?;
        let description = MediaDescription::for_lease(config.resolve_host(), &lease, config);
        let (phase_tx, phase_rx) = watch::channel(EndpointPhase::Created);

        let forwarder_id = match control.provision(origin, stream_id, &description).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    stream_id = %stream_id,
                    origin = %origin,
                    error = %e,
                    "Provisioning failed, releasing ports"
                );
                allocator.release(lease).await;
                return Err(e.into());
            }
        };

        let relay = StreamRelay::start(&lease, &config.relay);
        advance(&phase_tx, EndpointPhase::Active);

        tracing::info!(
            stream_id = %stream_id,
            origin = %origin,
            forwarder_id = %forwarder_id,
            base_port = lease.base_port(),
            "Endpoint created"
        );

        let base_port = lease.base_port();
        let (tx, rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let lifecycle = Lifecycle {
            stream_id: stream_id.to_string(),
            origin: origin.to_string(),
            forwarder_id,
            lease,
            relay,
            allocator: allocator.clone(),
            control,
            phase: phase_tx,
        };
        tokio::spawn(lifecycle.run(rx));

        Ok(Self {
            stream_id: Arc::from(stream_id),
            origin: Arc::from(origin),
            description: Arc::new(description),
            base_port,
            commands: tx,
            phase: phase_rx,
        })
    }

    /// Stream served by this endpoint
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Origin the stream is pulled from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Description sent to the origin at creation
    pub fn description(&self) -> &MediaDescription {
        &self.description
    }

    /// Base port of the endpoint's lease
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> EndpointPhase {
        *self.phase.borrow()
    }

    /// Whether the endpoint has finished closing
    pub fn is_closed(&self) -> bool {
        self.phase() == EndpointPhase::Closed
    }

    /// Attach a session's audio and video sinks
    ///
    /// Both sinks are attached or neither is. Fails with
    /// `AlreadyAttached` if the session is attached to either media type.
    pub async fn attach(
        &self,
        session_id: impl Into<String>,
        audio: Sink,
        video: Sink,
    ) -> Result<()> {
        if !self.phase().accepts_subscriptions() {
            return Err(Error::EndpointClosed);
        }

        let (reply, rx) = oneshot::channel();
        self.send(Command::Attach {
            session_id: session_id.into(),
            audio,
            video,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::EndpointClosed)?
    }

    /// Detach a session from both media types
    ///
    /// Unknown sessions are ignored.
    pub async fn detach(&self, session_id: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Detach {
            session_id: session_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::EndpointClosed)
    }

    /// Relay statistics
    pub async fn stats(&self) -> Result<EndpointStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| Error::EndpointClosed)?
    }

    /// Stop relaying, release the ports and tear down the origin forward
    ///
    /// The ports are released even when the origin rejects the teardown;
    /// that rejection is still returned.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Close { reply }).await?;
        rx.await.map_err(|_| Error::EndpointClosed)?
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::EndpointClosed)
    }
}

impl std::fmt::Debug for RelayEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEndpoint")
            .field("stream_id", &self.stream_id)
            .field("origin", &self.origin)
            .field("base_port", &self.base_port)
            .field("phase", &self.phase())
            .finish()
    }
}

struct Lifecycle<C> {
    stream_id: String,
    origin: String,
    forwarder_id: String,
    lease: PortLease,
    relay: StreamRelay,
    allocator: PortAllocator,
    control: Arc<C>,
    phase: watch::Sender<EndpointPhase>,
}

impl<C: ControlPlane> Lifecycle<C> {
    async fn run(self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Attach {
                    session_id,
                    audio,
                    video,
                    reply,
                } => {
                    let _ = reply.send(self.attach(session_id, audio, video).await);
                }
                Command::Detach { session_id, reply } => {
                    self.detach(&session_id).await;
                    let _ = reply.send(());
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.stats().await);
                }
                Command::Close { reply } => {
                    commands.close();
                    let _ = reply.send(self.close().await);
                    return;
                }
            }
        }

        tracing::debug!(stream_id = %self.stream_id, "All endpoint handles dropped, closing");
        if let Err(e) = self.close().await {
            tracing::warn!(error = %e, "Implicit endpoint close failed");
        }
    }

    async fn attach(&self, session_id: String, audio_sink: Sink, video_sink: Sink) -> Result<()> {
        let audio = self.relay.fanout(MediaKind::Audio);
        let video = self.relay.fanout(MediaKind::Video);

        // Only this task attaches to these owners, so checking both first
        // rules out a half-attached session.
        if self.relay.is_attached(&session_id).await? {
            tracing::warn!(
                stream_id = %self.stream_id,
                session_id = %session_id,
                "Session already attached"
            );
            return Err(RelayError::AlreadyAttached(session_id).into());
        }

        audio.attach(session_id.clone(), audio_sink).await?;
        if let Err(e) = video.attach(session_id.clone(), video_sink).await {
            audio.detach(session_id).await;
            return Err(e.into());
        }

        tracing::info!(
            stream_id = %self.stream_id,
            session_id = %session_id,
            "Session attached"
        );
        Ok(())
    }

    async fn detach(&self, session_id: &str) {
        let audio = self.relay.fanout(MediaKind::Audio).detach(session_id).await;
        let video = self.relay.fanout(MediaKind::Video).detach(session_id).await;

        if audio || video {
            tracing::info!(
                stream_id = %self.stream_id,
                session_id = %session_id,
                "Session detached"
            );
        }
    }

    async fn stats(&self) -> Result<EndpointStats> {
        let (audio, video) = self.relay.fanout_stats().await?;
        let [audio_listener, video_listener, video2_listener] = self.relay.listener_stats();

        Ok(EndpointStats {
            stream_id: self.stream_id.clone(),
            base_port: self.lease.base_port(),
            audio,
            video,
            audio_listener,
            video_listener,
            video2_listener,
        })
    }

    async fn close(self) -> Result<()> {
        advance(&self.phase, EndpointPhase::Closing);

        let summary = self.relay.stop().await;

        let base_port = self.lease.base_port();
        self.allocator.release(self.lease).await;

        let result = self
            .control
            .teardown(&self.origin, &self.stream_id, &self.forwarder_id)
            .await;

        advance(&self.phase, EndpointPhase::Closed);

        match result {
            Ok(()) => {
                tracing::info!(
                    stream_id = %self.stream_id,
                    base_port = base_port,
                    audio_frames = summary.audio.frames_received,
                    video_frames = summary.video.frames_received,
                    audio_drop_ratio = summary.audio.drop_ratio(),
                    video_drop_ratio = summary.video.drop_ratio(),
                    "Endpoint closed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    stream_id = %self.stream_id,
                    forwarder_id = %self.forwarder_id,
                    error = %e,
                    "Teardown rejected by origin"
                );
                Err(Error::ControlPlane(e))
            }
        }
    }
}

fn advance(phase: &watch::Sender<EndpointPhase>, next: EndpointPhase) {
    let previous = phase.send_replace(next);
    debug_assert!(
        previous.can_transition_to(next),
        "invalid endpoint transition {} -> {}",
        previous,
        next
    );
}
