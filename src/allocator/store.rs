//! Port allocator task and handle
//!
//! The lease table lives inside a single spawned task. Callers talk to it
//! through [`PortAllocator`], a cheap cloneable handle. The table only
//! records base ports; the sockets belong to the [`PortLease`] holder.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

use super::config::AllocatorConfig;
use super::error::AllocationError;
use super::lease::{PortLease, ReturnTicket};
use super::{AUDIO_OFFSET, BLOCK_SIZE, VIDEO2_OFFSET, VIDEO_OFFSET};

enum Request {
    Acquire {
        reply: oneshot::Sender<Result<PortLease, AllocationError>>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
    Leased {
        reply: oneshot::Sender<Vec<u16>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running port allocator
///
/// Cloning the handle shares the same allocator task. Allocators are
/// independent from each other, so tests can run several side by side on
/// disjoint ranges.
#[derive(Clone)]
pub struct PortAllocator {
    tx: mpsc::Sender<Request>,
    config: Arc<AllocatorConfig>,
}

impl PortAllocator {
    /// Validate the configuration and spawn the allocator task
    pub fn start(config: AllocatorConfig) -> Result<Self, AllocationError> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (returns_tx, returns_rx) = mpsc::unbounded_channel();
        let state = AllocatorState::new(&config, returns_tx);

        tracing::info!(
            port_min = config.port_min,
            port_max = config.port_max,
            blocks = config.block_count(),
            bind_ip = %config.bind_ip,
            "Port allocator started"
        );

        tokio::spawn(state.run(rx, returns_rx));

        Ok(Self {
            tx,
            config: Arc::new(config),
        })
    }

    /// Get the allocator configuration
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Lease the next free block of three bound sockets
    ///
    /// Dropping the returned lease, including dropping it unawaited inside
    /// a cancelled future, gives the block back once every socket handle
    /// cloned from it is gone.
    pub async fn acquire(&self) -> Result<PortLease, AllocationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Acquire { reply })
            .await
            .map_err(|_| AllocationError::Stopped)?;
        rx.await.map_err(|_| AllocationError::Stopped)?
    }

    /// Return a block to the pool and wait until the allocator has seen it
    ///
    /// The ports close with the lease. If socket handles cloned from the
    /// lease are still alive the block stays leased until they are dropped.
    /// Releasing after the allocator has stopped is a no-op.
    pub async fn release(&self, lease: PortLease) {
        let base_port = lease.base_port();
        let in_use = [lease.audio_socket(), lease.video_socket(), lease.video2_socket()]
            .iter()
            .any(|socket| Arc::strong_count(socket) > 1);
        drop(lease);

        if in_use {
            tracing::debug!(
                base_port = base_port,
                "Block still has socket handles, returning when they drop"
            );
        }

        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Flush { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Base ports currently leased, in ascending order
    pub async fn leased(&self) -> Result<Vec<u16>, AllocationError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Leased { reply })
            .await
            .map_err(|_| AllocationError::Stopped)?;
        rx.await.map_err(|_| AllocationError::Stopped)
    }

    /// Stop the allocator task
    ///
    /// Outstanding leases keep their sockets until their holders drop them.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Whether the allocator task is still accepting requests
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

struct AllocatorState {
    port_min: u16,
    port_max: u16,
    bind_ip: IpAddr,
    cursor: u16,
    leases: HashSet<u16>,
    returns: mpsc::UnboundedSender<u16>,
}

impl AllocatorState {
    fn new(config: &AllocatorConfig, returns: mpsc::UnboundedSender<u16>) -> Self {
        Self {
            port_min: config.port_min,
            port_max: config.port_max,
            bind_ip: config.bind_ip,
            cursor: config.port_min,
            leases: HashSet::new(),
            returns,
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Request>,
        mut returns: mpsc::UnboundedReceiver<u16>,
    ) {
        loop {
            // Returned blocks go first, so a request sent after a lease was
            // dropped always sees that block as free.
            tokio::select! {
                biased;
                Some(base_port) = returns.recv() => self.reclaim(base_port),
                request = rx.recv() => match request {
                    Some(request) => {
                        if !self.handle(request, &mut rx).await {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }

    /// Handle one request; returns `false` once the allocator should stop
    async fn handle(&mut self, request: Request, rx: &mut mpsc::Receiver<Request>) -> bool {
        match request {
            Request::Acquire { reply } => {
                // A caller that gave up waiting drops the lease with the
                // failed reply, which returns the block.
                let _ = reply.send(self.acquire().await);
            }
            Request::Flush { reply } => {
                let _ = reply.send(());
            }
            Request::Leased { reply } => {
                let mut ports: Vec<u16> = self.leases.iter().copied().collect();
                ports.sort_unstable();
                let _ = reply.send(ports);
            }
            Request::Shutdown { reply } => {
                rx.close();
                if !self.leases.is_empty() {
                    tracing::warn!(
                        outstanding = self.leases.len(),
                        "Port allocator stopped with leases still held"
                    );
                }
                self.leases.clear();
                tracing::info!("Port allocator stopped");
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn fits(&self, base: u16) -> bool {
        u32::from(base) + u32::from(BLOCK_SIZE) <= u32::from(self.port_max)
    }

    async fn acquire(&mut self) -> Result<PortLease, AllocationError> {
        let blocks = usize::from(self.port_max.saturating_sub(self.port_min) / BLOCK_SIZE);
        let mut base = self.cursor;

        for _ in 0..blocks {
            if !self.fits(base) {
                base = self.port_min;
            }

            if !self.leases.contains(&base) {
                match self.bind_block(base).await {
                    Ok(sockets) => {
                        self.cursor = base + BLOCK_SIZE;
                        self.leases.insert(base);
                        tracing::debug!(
                            base_port = base,
                            leased = self.leases.len(),
                            "Port block leased"
                        );
                        let ticket = ReturnTicket::new(base, self.returns.clone());
                        return Ok(PortLease::new(base, sockets, ticket));
                    }
                    Err(e) => {
                        tracing::warn!(
                            base_port = base,
                            error = %e,
                            "Failed to bind port block, skipping"
                        );
                    }
                }
            }

            base += BLOCK_SIZE;
        }

        self.cursor = self.port_min;
        tracing::warn!(
            port_min = self.port_min,
            port_max = self.port_max,
            leased = self.leases.len(),
            "Port range exhausted"
        );
        Err(AllocationError::ExhaustedRange)
    }

    /// Bind all three sockets of a block, or none of them
    async fn bind_block(&self, base: u16) -> std::io::Result<[UdpSocket; 3]> {
        // Sockets bound before a failure are dropped on return, so a
        // partially bound block never outlives this call.
        let audio = self.bind(base + AUDIO_OFFSET).await?;
        let video = self.bind(base + VIDEO_OFFSET).await?;
        let video2 = self.bind(base + VIDEO2_OFFSET).await?;

        Ok([audio, video, video2])
    }

    async fn bind(&self, port: u16) -> std::io::Result<UdpSocket> {
        UdpSocket::bind(SocketAddr::new(self.bind_ip, port)).await
    }

    /// Forget a block whose sockets are all closed
    ///
    /// Unknown base ports are ignored.
    fn reclaim(&mut self, base_port: u16) {
        if self.leases.remove(&base_port) {
            tracing::debug!(
                base_port = base_port,
                leased = self.leases.len(),
                "Port block released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn local_config(min: u16, max: u16) -> AllocatorConfig {
        AllocatorConfig::default()
            .port_range(min, max)
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn test_two_leases_then_exhausted() {
        let allocator = PortAllocator::start(local_config(45000, 45012)).unwrap();

        let first = allocator.acquire().await.unwrap();
        assert_eq!(first.base_port(), 45000);
        assert_eq!(first.ports(), [45000, 45002, 45004]);

        let second = allocator.acquire().await.unwrap();
        assert_eq!(second.base_port(), 45006);
        assert_eq!(second.ports(), [45006, 45008, 45010]);

        let third = allocator.acquire().await;
        assert_eq!(third.unwrap_err(), AllocationError::ExhaustedRange);

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_release_makes_block_reusable() {
        let allocator = PortAllocator::start(local_config(45020, 45032)).unwrap();

        let first = allocator.acquire().await.unwrap();
        let _second = allocator.acquire().await.unwrap();
        assert_err!(allocator.acquire().await);

        let base = first.base_port();
        allocator.release(first).await;

        let reused = allocator.acquire().await.unwrap();
        assert_eq!(reused.base_port(), base);

        allocator.shutdown().await;
    }

    fn port_is_free(port: u16) -> bool {
        std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
    }

    #[tokio::test]
    async fn test_release_closes_ports() {
        let allocator = PortAllocator::start(local_config(45040, 45052)).unwrap();

        let lease = allocator.acquire().await.unwrap();
        let ports = lease.ports();
        assert!(ports.iter().all(|&p| !port_is_free(p)));

        allocator.release(lease).await;

        assert!(ports.iter().all(|&p| port_is_free(p)));
        assert!(allocator.leased().await.unwrap().is_empty());

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_shared_socket_keeps_block_leased() {
        let allocator = PortAllocator::start(local_config(45180, 45186)).unwrap();

        let lease = allocator.acquire().await.unwrap();
        let socket = Arc::clone(lease.video2_socket());
        allocator.release(lease).await;

        // Still bound, so still leased; exhaustion here is genuine
        assert_eq!(allocator.leased().await.unwrap(), vec![45180]);
        assert!(!port_is_free(45184));
        assert_eq!(
            allocator.acquire().await.unwrap_err(),
            AllocationError::ExhaustedRange
        );

        drop(socket);

        assert!(allocator.leased().await.unwrap().is_empty());
        let again = allocator.acquire().await.unwrap();
        assert_eq!(again.base_port(), 45180);

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_lease_returns_block() {
        let allocator = PortAllocator::start(local_config(45200, 45206)).unwrap();

        let lease = allocator.acquire().await.unwrap();
        drop(lease);

        let again = assert_ok!(allocator.acquire().await);
        assert_eq!(again.base_port(), 45200);

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancelled_acquire_returns_block() {
        let allocator = PortAllocator::start(local_config(45220, 45226)).unwrap();

        // Reply dropped before the allocator answers
        let (reply, rx) = oneshot::channel();
        drop(rx);
        allocator.tx.send(Request::Acquire { reply }).await.unwrap();

        let lease = assert_ok!(allocator.acquire().await);
        assert_eq!(lease.base_port(), 45220);

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_failure_skips_whole_block() {
        // Occupy the video port of the first block
        let blocker = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 45062)).unwrap();
        let allocator = PortAllocator::start(local_config(45060, 45078)).unwrap();

        let lease = allocator.acquire().await.unwrap();
        assert_eq!(lease.base_port(), 45066);

        // The audio socket bound before the failure must have been dropped
        assert_ok!(std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 45060)));

        drop(blocker);
        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_cursor_advances_past_leased_block() {
        let allocator = PortAllocator::start(local_config(45080, 45098)).unwrap();

        let a = allocator.acquire().await.unwrap();
        let b = allocator.acquire().await.unwrap();
        let a_base = a.base_port();
        allocator.release(a).await;

        // Cursor continues forward before wrapping to the freed block
        let c = allocator.acquire().await.unwrap();
        assert_eq!(c.base_port(), 45092);

        let d = allocator.acquire().await.unwrap();
        assert_eq!(d.base_port(), a_base);
        assert_ne!(d.base_port(), b.base_port());

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_acquires_are_disjoint() {
        let allocator = PortAllocator::start(local_config(45100, 45130)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move { allocator.acquire().await }));
        }

        let mut leases = Vec::new();
        for handle in handles {
            leases.push(handle.await.unwrap().unwrap());
        }

        let mut ports = HashSet::new();
        for lease in &leases {
            for port in lease.ports() {
                assert!((45100..45130).contains(&port));
                assert!(ports.insert(port), "port {} leased twice", port);
            }
        }

        assert_eq!(
            allocator.acquire().await.unwrap_err(),
            AllocationError::ExhaustedRange
        );

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhaustion_is_not_spurious() {
        let allocator = PortAllocator::start(local_config(45140, 45158)).unwrap();

        let _a = allocator.acquire().await.unwrap();
        let b = allocator.acquire().await.unwrap();
        let _c = allocator.acquire().await.unwrap();
        assert_err!(allocator.acquire().await);

        // Free a block in the middle; the scan restarts from port_min
        let b_base = b.base_port();
        allocator.release(b).await;
        let again = allocator.acquire().await.unwrap();
        assert_eq!(again.base_port(), b_base);

        allocator.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_allocator() {
        let allocator = PortAllocator::start(local_config(45160, 45172)).unwrap();
        let lease = allocator.acquire().await.unwrap();
        allocator.shutdown().await;

        assert!(!allocator.is_running());
        assert_eq!(
            allocator.acquire().await.unwrap_err(),
            AllocationError::Stopped
        );

        // Release after shutdown still closes the ports
        allocator.release(lease).await;
        assert!(port_is_free(45160));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_range() {
        let result = PortAllocator::start(local_config(45000, 45004));
        assert!(matches!(
            result,
            Err(AllocationError::InvalidRange { .. })
        ));
    }
}
