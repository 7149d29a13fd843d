//! Datagram transport.

use std::convert::Infallible;
use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rangehost_errors::ErrorCode;
use tokio::net::UdpSocket;
use tracing::{error, info};

use crate::{Host, HostError};

/// Non-blocking outbound datagram link.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait DatagramSink: Debug + Send + Sync {
    fn unicast(&self, addr: SocketAddr, packet: &[u8]) -> io::Result<()>;

    fn broadcast(&self, packet: &[u8]) -> io::Result<()>;
}

/// Inbound datagram link.
pub trait DatagramSource: Send + Sync {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

/// Pause after a failed receive so a persistent socket error does not spin.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// UDP socket shared by the receive loop and outbound sends.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    broadcast_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(listen: SocketAddr, broadcast_addr: SocketAddr) -> Result<Self, HostError> {
        let socket = UdpSocket::bind(listen)
            .await
            .map_err(|source| HostError::Bind {
                addr: listen,
                source,
            })?;
        socket.set_broadcast(true).map_err(HostError::Broadcast)?;
        info!(%listen, %broadcast_addr, "datagram transport bound");
        Ok(Self {
            socket,
            broadcast_addr,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSource for UdpTransport {
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        self.socket.recv_from(buf)
    }
}

impl DatagramSink for UdpTransport {
    fn unicast(&self, addr: SocketAddr, packet: &[u8]) -> io::Result<()> {
        self.socket.try_send_to(packet, addr).map(drop)
    }

    fn broadcast(&self, packet: &[u8]) -> io::Result<()> {
        self.socket
            .try_send_to(packet, self.broadcast_addr)
            .map(drop)
    }
}

/// Reads datagrams of at most `buffer_size` bytes and hands them to `host`.
///
/// Receive errors (ICMP refusals, buffer exhaustion) are recorded as
/// communication errors and the loop carries on. Runs until the task is
/// dropped.
pub async fn receive_loop<S: DatagramSource>(
    source: Arc<S>,
    host: Arc<Host>,
    buffer_size: usize,
) -> Result<(), Infallible> {
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        match source.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let datagram = buf.get(..len).unwrap_or_default().to_vec();
                if let Err(err) = host
                    .run_blocking(move |host| host.on_datagram(&datagram, from))
                    .await
                {
                    error!(%err, %from, "datagram handling panicked");
                }
            }
            Err(err) => {
                host.error_log().record_host(
                    ErrorCode::CommunicationError,
                    format!("datagram receive failed: {err}"),
                );
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Unicast(SocketAddr),
    Broadcast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub destination: Destination,
    pub bytes: Vec<u8>,
}

/// In-memory sink that records every packet. Used to drive a [`Host`]
/// without a socket.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<SentPacket>>,
    fail_unicast: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent unicast sends fail.
    pub fn fail_unicast(&self, fail: bool) {
        self.fail_unicast.store(fail, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        self.sent.lock().clone()
    }

    pub fn take(&self) -> Vec<SentPacket> {
        std::mem::take(&mut *self.sent.lock())
    }

    fn push(&self, destination: Destination, packet: &[u8]) {
        self.sent.lock().push(SentPacket {
            destination,
            bytes: packet.to_vec(),
        });
    }
}

impl DatagramSink for MemorySink {
    fn unicast(&self, addr: SocketAddr, packet: &[u8]) -> io::Result<()> {
        if self.fail_unicast.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::HostUnreachable, "unreachable"));
        }
        self.push(Destination::Unicast(addr), packet);
        Ok(())
    }

    fn broadcast(&self, packet: &[u8]) -> io::Result<()> {
        self.push(Destination::Broadcast, packet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rangehost_primitives::{ClientId, ManualClock};
    use rangehost_tasks::TaskManager;
    use tokio::sync::mpsc;

    use super::*;
    use crate::HostConfig;

    #[tokio::test]
    async fn test_unicast_and_broadcast_reach_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), peer_addr)
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        transport.unicast(peer_addr, &[0x04, 3, 0xFF]).unwrap();
        let (len, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0x04, 3, 0xFF]);

        transport.broadcast(&[0x02, 0xFF, 1, 2, 3]).unwrap();
        let (len, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0x02, 0xFF, 1, 2, 3]);
    }

    fn host() -> Arc<Host> {
        Arc::new(Host::new(
            HostConfig::default(),
            Arc::new(MemorySink::new()),
            Arc::new(ManualClock::new(0)),
        ))
    }

    async fn wait_for_queued(host: &Host) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while host.dispatcher().is_empty().unwrap_or(true) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_receive_loop_queues_datagrams() {
        let transport = Arc::new(
            UdpTransport::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:9".parse().unwrap())
                .await
                .unwrap(),
        );
        let host = host();
        let manager = TaskManager::current();
        let receiver = manager.executor().spawn_critical(
            "udp_receiver",
            receive_loop(transport.clone(), host.clone(), 256),
        );

        let node = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        node.send_to(&[0x01, 7], transport.local_addr().unwrap())
            .await
            .unwrap();

        wait_for_queued(&host).await;
        assert_eq!(host.drain_dispatch(), 1);
        assert_eq!(
            host.registry()
                .resolve(ClientId::new(7))
                .unwrap(),
            Some(node.local_addr().unwrap())
        );

        manager.fire_shutdown();
        tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .unwrap()
            .unwrap();
    }

    type Scripted = io::Result<(Vec<u8>, SocketAddr)>;

    /// Source that replays queued results, then waits forever.
    #[derive(Debug)]
    struct ScriptedSource {
        script: tokio::sync::Mutex<mpsc::UnboundedReceiver<Scripted>>,
    }

    impl DatagramSource for ScriptedSource {
        fn recv_from(
            &self,
            buf: &mut [u8],
        ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
            async move {
                let next = self.script.lock().await.recv().await;
                match next {
                    Some(Ok((bytes, from))) => {
                        let len = bytes.len().min(buf.len());
                        buf[..len].copy_from_slice(&bytes[..len]);
                        Ok((len, from))
                    }
                    Some(Err(err)) => Err(err),
                    None => std::future::pending().await,
                }
            }
        }
    }

    #[tokio::test]
    async fn test_receive_error_is_logged_and_loop_continues() {
        let (script, rx) = mpsc::unbounded_channel();
        let source = Arc::new(ScriptedSource {
            script: tokio::sync::Mutex::new(rx),
        });
        let host = host();
        let mut manager = TaskManager::current();
        manager
            .executor()
            .spawn_critical("udp_receiver", receive_loop(source, host.clone(), 256));

        let node: SocketAddr = "192.168.4.7:4210".parse().unwrap();
        script
            .send(Err(io::Error::from(io::ErrorKind::ConnectionRefused)))
            .unwrap();
        script.send(Ok((vec![0x01, 7], node))).unwrap();

        wait_for_queued(&host).await;
        assert_eq!(host.drain_dispatch(), 1);
        assert_eq!(host.registry().resolve(ClientId::new(7)).unwrap(), Some(node));

        let errors = host.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::CommunicationError);

        assert!(
            tokio::time::timeout(Duration::from_millis(50), manager.wait_for_critical_failure())
                .await
                .is_err()
        );
        manager.fire_shutdown();
    }

    #[test]
    fn test_memory_sink_failure_switch() {
        let sink = MemorySink::new();
        let addr: SocketAddr = "10.0.0.1:4210".parse().unwrap();
        sink.unicast(addr, &[1]).unwrap();
        sink.fail_unicast(true);
        assert!(sink.unicast(addr, &[2]).is_err());
        assert!(sink.broadcast(&[3]).is_ok());
        assert_eq!(
            sink.take(),
            vec![
                SentPacket {
                    destination: Destination::Unicast(addr),
                    bytes: vec![1]
                },
                SentPacket {
                    destination: Destination::Broadcast,
                    bytes: vec![3]
                },
            ]
        );
        assert!(sink.sent().is_empty());
    }
}
