//! Edge node implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, OnceCell, RwLock};

use crate::allocator::PortAllocator;
use crate::control::{ControlPlane, HttpControlPlane};
use crate::endpoint::RelayEndpoint;
use crate::error::{Error, Result};
use crate::relay::RelayError;

use super::config::NodeConfig;

/// Endpoint of one stream, filled in by the first viewer
type Slot = Arc<OnceCell<RelayEndpoint>>;

/// Receiving side of a viewer session's sinks
#[derive(Debug)]
pub struct Subscription {
    /// Session identifier
    pub session_id: String,
    /// Stream the session is attached to
    pub stream_id: String,
    /// Audio packets
    pub audio: mpsc::Receiver<Bytes>,
    /// Video packets
    pub video: mpsc::Receiver<Bytes>,
}

/// Stream and session directory of an edge node
///
/// The two maps are never locked at the same time, and neither is locked
/// while an endpoint is being created.
pub struct EdgeNode<C: ControlPlane = HttpControlPlane> {
    config: NodeConfig,
    allocator: PortAllocator,
    control: Arc<C>,
    /// Endpoint slot per stream id
    endpoints: RwLock<HashMap<String, Slot>>,
    /// Stream id per session id
    sessions: RwLock<HashMap<String, String>>,
}

impl EdgeNode<HttpControlPlane> {
    /// Create a node talking HTTP to its origin
    pub fn new(config: NodeConfig) -> Result<Self> {
        let control = HttpControlPlane::new(config.control.clone())?;
        Self::with_control(config, Arc::new(control))
    }
}

impl<C: ControlPlane> EdgeNode<C> {
    /// Create a node with a custom control plane
    pub fn with_control(config: NodeConfig, control: Arc<C>) -> Result<Self> {
        let allocator = PortAllocator::start(config.allocator.clone())?;

        tracing::info!(origin = %config.origin_addr, "Edge node started");

        Ok(Self {
            config,
            allocator,
            control,
            endpoints: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Get the node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Get the port allocator
    pub fn allocator(&self) -> &PortAllocator {
        &self.allocator
    }

    /// Attach a new viewer session to a stream
    ///
    /// Creates the stream's endpoint on first use. If the session cannot
    /// be attached to an endpoint this call just created, that endpoint is
    /// closed again unless another session joined it in the meantime.
    pub async fn view(&self, stream_id: &str, session_id: &str) -> Result<Subscription> {
        if self.sessions.read().await.contains_key(session_id) {
            return Err(RelayError::AlreadyAttached(session_id.to_string()).into());
        }

        let (endpoint, created) = self.endpoint_for(stream_id).await?;

        let (audio_tx, audio_rx) = mpsc::channel(self.config.sink_capacity);
        let (video_tx, video_rx) = mpsc::channel(self.config.sink_capacity);

        let attached: Result<usize> = {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(session_id) {
                Err(RelayError::AlreadyAttached(session_id.to_string()).into())
            } else {
                match endpoint.attach(session_id, audio_tx, video_tx).await {
                    Ok(()) => {
                        sessions.insert(session_id.to_string(), stream_id.to_string());
                        Ok(sessions.len())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let sessions = match attached {
            Ok(sessions) => sessions,
            Err(e) => {
                if created {
                    self.abandon(stream_id).await;
                }
                return Err(e);
            }
        };

        tracing::debug!(
            stream_id = %stream_id,
            session_id = %session_id,
            sessions = sessions,
            "Viewer joined"
        );

        Ok(Subscription {
            session_id: session_id.to_string(),
            stream_id: stream_id.to_string(),
            audio: audio_rx,
            video: video_rx,
        })
    }

    /// Detach a viewer session
    ///
    /// Unknown sessions are ignored.
    pub async fn leave(&self, session_id: &str) {
        let stream_id = match self.sessions.write().await.remove(session_id) {
            Some(stream_id) => stream_id,
            None => {
                tracing::debug!(session_id = %session_id, "Leave for unknown session");
                return;
            }
        };

        if let Some(endpoint) = self.endpoint(&stream_id).await {
            match endpoint.detach(session_id).await {
                Ok(()) | Err(Error::EndpointClosed) => {}
                Err(e) => tracing::warn!(error = %e, "Detach failed"),
            }
        }

        tracing::debug!(stream_id = %stream_id, session_id = %session_id, "Viewer left");
    }

    /// Close a stream's endpoint and forget its sessions
    ///
    /// Returns `Ok(false)` if the stream had no endpoint. An endpoint still
    /// being created is closed by its creator once it finds its slot gone.
    pub async fn close_stream(&self, stream_id: &str) -> Result<bool> {
        let slot = match self.endpoints.write().await.remove(stream_id) {
            Some(slot) => slot,
            None => return Ok(false),
        };

        self.sessions.write().await.retain(|_, s| s != stream_id);

        match slot.get() {
            Some(endpoint) => match endpoint.close().await {
                Ok(()) | Err(Error::EndpointClosed) => Ok(true),
                Err(e) => Err(e),
            },
            None => Ok(true),
        }
    }

    /// Endpoint serving a stream, if any
    pub async fn endpoint(&self, stream_id: &str) -> Option<RelayEndpoint> {
        self.endpoints
            .read()
            .await
            .get(stream_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Streams with an endpoint, sorted
    pub async fn streams(&self) -> Vec<String> {
        let mut streams: Vec<String> = self
            .endpoints
            .read()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(stream_id, _)| stream_id.clone())
            .collect();
        streams.sort();
        streams
    }

    /// Number of attached sessions across all streams
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Close every endpoint, then stop the allocator
    pub async fn shutdown(&self) {
        let slots: Vec<Slot> = self.endpoints.write().await.drain().map(|(_, s)| s).collect();
        self.sessions.write().await.clear();

        for endpoint in slots.iter().filter_map(|slot| slot.get()) {
            if let Err(e) = endpoint.close().await {
                tracing::warn!(
                    stream_id = %endpoint.stream_id(),
                    error = %e,
                    "Failed to close endpoint during shutdown"
                );
            }
        }

        self.allocator.shutdown().await;
        tracing::info!("Edge node stopped");
    }

    /// Existing endpoint for a stream, or a newly created one
    ///
    /// Creation runs with no map lock held. Concurrent first views of one
    /// stream wait on the same slot, so each stream gets a single endpoint.
    /// The flag is set when this call created the endpoint.
    async fn endpoint_for(&self, stream_id: &str) -> Result<(RelayEndpoint, bool)> {
        loop {
            let slot = Arc::clone(
                self.endpoints
                    .write()
                    .await
                    .entry(stream_id.to_string())
                    .or_default(),
            );

            let created = AtomicBool::new(false);
            let result = slot
                .get_or_try_init(|| async {
                    let endpoint = RelayEndpoint::create(
                        &self.config.origin_addr,
                        stream_id,
                        &self.allocator,
                        Arc::clone(&self.control),
                        &self.config.endpoint,
                    )
                    .await?;
                    created.store(true, Ordering::Relaxed);
                    Ok::<_, Error>(endpoint)
                })
                .await;

            let endpoint = match result {
                Ok(endpoint) => endpoint.clone(),
                Err(e) => {
                    self.forget_empty_slot(stream_id, &slot).await;
                    return Err(e);
                }
            };
            let created = created.load(Ordering::Relaxed);

            if endpoint.phase().is_shutting_down() {
                let mut endpoints = self.endpoints.write().await;
                if endpoints.get(stream_id).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    endpoints.remove(stream_id);
                }
                tracing::debug!(stream_id = %stream_id, "Replacing closed endpoint");
                continue;
            }

            if created && !self.holds_slot(stream_id, &slot).await {
                tracing::debug!(stream_id = %stream_id, "Stream closed during creation");
                if let Err(e) = endpoint.close().await {
                    tracing::warn!(stream_id = %stream_id, error = %e, "Failed to close endpoint");
                }
                return Err(Error::EndpointClosed);
            }

            return Ok((endpoint, created));
        }
    }

    async fn holds_slot(&self, stream_id: &str, slot: &Slot) -> bool {
        self.endpoints
            .read()
            .await
            .get(stream_id)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    /// Drop a slot whose creation failed, unless someone else is waiting on it
    async fn forget_empty_slot(&self, stream_id: &str, slot: &Slot) {
        let mut endpoints = self.endpoints.write().await;
        let idle = endpoints.get(stream_id).is_some_and(|s| {
            // Clones are only taken under this lock: two means map + caller.
            Arc::ptr_eq(s, slot) && Arc::strong_count(slot) == 2 && !slot.initialized()
        });
        if idle {
            endpoints.remove(stream_id);
        }
    }

    /// Close an endpoint created for a session that never joined it
    async fn abandon(&self, stream_id: &str) {
        if self.sessions.read().await.values().any(|s| s == stream_id) {
            return;
        }

        tracing::debug!(stream_id = %stream_id, "Closing endpoint with no sessions");
        if let Err(e) = self.close_stream(stream_id).await {
            tracing::warn!(stream_id = %stream_id, error = %e, "Failed to close endpoint");
        }
    }
}
