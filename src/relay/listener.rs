//! Socket listener
//!
//! A listener owns the receive side of one relay socket. It copies each
//! datagram into a [`Frame`] and hands it to a fan-out owner without ever
//! waiting on it: when the frame queue is full the datagram is dropped.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::allocator::LeaseSocket;
use crate::stats::{ListenerCounters, ListenerStats};

use super::frame::Frame;

/// Where a listener reads datagrams from
pub trait DatagramSource: Send + Sync + 'static {
    /// Receive one datagram into `buf`
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Local address, used in logs
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSource for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

impl DatagramSource for LeaseSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// What a listener does with received datagrams
pub enum ListenerMode {
    /// Push every datagram into a fan-out owner's frame queue
    Forward(mpsc::Sender<Frame>),
    /// Read and count datagrams without forwarding them
    Drain,
}

/// Handle to a running socket listener
pub struct Listener {
    name: &'static str,
    counters: Arc<ListenerCounters>,
    task: JoinHandle<io::Result<()>>,
}

impl Listener {
    /// Spawn a listener task reading from `socket`
    pub fn spawn<S: DatagramSource>(
        name: &'static str,
        socket: Arc<S>,
        mode: ListenerMode,
        buffer_size: usize,
    ) -> Self {
        let counters = Arc::new(ListenerCounters::new());
        let task = tokio::spawn(receive_loop(
            name,
            socket,
            mode,
            buffer_size,
            Arc::clone(&counters),
        ));

        Self {
            name,
            counters,
            task,
        }
    }

    /// Listener name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current counters
    pub fn stats(&self) -> ListenerStats {
        self.counters.snapshot()
    }

    /// Whether the receive loop has exited on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the receive loop and release its socket handle
    ///
    /// Returns the socket error that ended the loop earlier, if any.
    pub async fn stop(self) -> io::Result<()> {
        self.task.abort();
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

async fn receive_loop<S: DatagramSource>(
    name: &'static str,
    socket: Arc<S>,
    mode: ListenerMode,
    buffer_size: usize,
    counters: Arc<ListenerCounters>,
) -> io::Result<()> {
    let local: Option<SocketAddr> = socket.local_addr().ok();
    let mut buf = vec![0u8; buffer_size];

    tracing::debug!(listener = name, local = ?local, "Listener started");

    loop {
        let (n, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                tracing::error!(
                    listener = name,
                    local = ?local,
                    error = %e,
                    "Failed to read UDP, closing listener"
                );
                return Err(e);
            }
        };

        counters.record_datagram(n);

        let tx = match mode {
            ListenerMode::Forward(ref tx) => tx,
            ListenerMode::Drain => continue,
        };

        match tx.try_send(Frame::copy_from(&buf[..n])) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                counters.record_overflow();
                tracing::trace!(listener = name, peer = %peer, "Frame queue full, datagram dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(listener = name, "Owner gone, closing listener");
                return Ok(());
            }
        }
    }
}

/// Datagram source that replays a fixed script
#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Yields each scripted result in turn, then never returns
    pub(crate) struct ScriptedSource {
        script: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    }

    impl ScriptedSource {
        pub(crate) fn new(script: Vec<io::Result<Vec<u8>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }

        /// Fails on the first read
        pub(crate) fn failing(kind: io::ErrorKind) -> Arc<Self> {
            Self::new(vec![Err(io::Error::from(kind))])
        }
    }

    impl DatagramSource for ScriptedSource {
        async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok((data.len(), self.local_addr()?))
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 9)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use super::*;

    async fn bound() -> (Arc<UdpSocket>, SocketAddr) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();
        (Arc::new(socket), addr)
    }

    #[tokio::test]
    async fn test_forward_copies_datagrams() {
        let (socket, addr) = bound().await;
        let (tx, mut rx) = mpsc::channel(8);
        let listener = Listener::spawn("audio", socket, ListenerMode::Forward(tx), 4096);

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        sender.send_to(&[0x80, 0x60, 0x12, 0x34], addr).await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload().as_ref(), &[0x80, 0x60, 0x12, 0x34]);

        let stats = listener.stats();
        assert_eq!(stats.datagrams, 1);
        assert_eq!(stats.bytes, 4);

        assert!(listener.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_counts_without_forwarding() {
        let (socket, addr) = bound().await;
        let listener = Listener::spawn("video", socket, ListenerMode::Drain, 4096);

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        for _ in 0..3 {
            sender.send_to(&[1, 2], addr).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while listener.stats().datagrams < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(listener.stats().bytes, 6);
        listener.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_exits_when_owner_gone() {
        let (socket, addr) = bound().await;
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let listener = Listener::spawn("video2", socket, ListenerMode::Forward(tx), 4096);

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        sender.send_to(&[5], addr).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !listener.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(listener.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_releases_socket() {
        let (socket, _addr) = bound().await;
        let weak = Arc::downgrade(&socket);
        let listener = Listener::spawn("audio", socket, ListenerMode::Drain, 4096);

        listener.stop().await.unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_counts_overflow() {
        let (socket, addr) = bound().await;
        let (tx, mut rx) = mpsc::channel(1);
        let listener = Listener::spawn("audio", socket, ListenerMode::Forward(tx), 4096);

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        for i in 0..4u8 {
            sender.send_to(&[i], addr).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while listener.stats().datagrams < 4 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(listener.stats().queue_overflows, 3);
        assert_eq!(rx.recv().await.unwrap().payload().as_ref(), &[0]);

        listener.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_error_ends_listener() {
        let source = scripted::ScriptedSource::new(vec![
            Ok(b"rtp".to_vec()),
            Err(io::Error::from(io::ErrorKind::ConnectionReset)),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let listener = Listener::spawn("audio", source, ListenerMode::Forward(tx), 4096);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.payload().as_ref(), b"rtp");

        tokio::time::timeout(Duration::from_secs(2), async {
            while !listener.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(listener.stats().datagrams, 1);
        let err = listener.stop().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        // The frame queue was released with the task
        assert!(rx.recv().await.is_none());
    }
}
