//! UDP network layer feeding datagrams through the relay dispatcher
//!
//! The transport is unreliable and unordered; the relay adds nothing on
//! top of it. Inbound datagrams are decoded and dispatched one at a time,
//! and every outgoing send stands alone: a failure to reach one peer is
//! logged and the remaining fan-out proceeds.

use crate::dispatcher::{self, Outgoing};
use crate::registry::SessionRegistry;
use log::{debug, error, info, warn};
use shared::DecodeError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Events sent from network tasks to the main relay loop
#[derive(Debug)]
pub enum RelayEvent {
    DatagramReceived {
        payload: String,
        addr: SocketAddr,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Relay server owning the socket, the session registry, and the task
/// plumbing between them
pub struct RelayServer {
    socket: Arc<UdpSocket>,
    registry: Arc<RwLock<SessionRegistry>>,

    // Communication channels
    event_tx: mpsc::UnboundedSender<RelayEvent>,
    event_rx: mpsc::UnboundedReceiver<RelayEvent>,
    send_tx: mpsc::UnboundedSender<Outgoing>,
    send_rx: mpsc::UnboundedReceiver<Outgoing>,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (send_tx, send_rx) = mpsc::unbounded_channel();

        Ok(RelayServer {
            socket,
            registry: Arc::new(RwLock::new(SessionRegistry::new())),
            event_tx,
            event_rx,
            send_tx,
            send_rx,
        })
    }

    /// Address the relay socket is bound to; tests bind port 0 and need
    /// the assigned port back.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that continuously listens for inbound datagrams
    fn spawn_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let payload = match std::str::from_utf8(&buffer[..len]) {
                            Ok(text) => text.to_string(),
                            Err(_) => {
                                warn!("Dropping non-UTF-8 datagram from {}", addr);
                                continue;
                            }
                        };

                        if let Err(e) =
                            event_tx.send(RelayEvent::DatagramReceived { payload, addr })
                        {
                            error!("Failed to hand datagram to relay loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that delivers queued outgoing datagrams.
    ///
    /// Each send is attempted independently; a transport failure is logged
    /// and never aborts the rest of the queue.
    fn spawn_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut send_rx = std::mem::replace(&mut self.send_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(outgoing) = send_rx.recv().await {
                if let Err(e) = socket
                    .send_to(outgoing.payload.as_bytes(), outgoing.dest)
                    .await
                {
                    error!("Failed to send to {}: {}", outgoing.dest, e);
                }
            }
        });
    }

    /// Datagram handler entry point: decode, dispatch, queue the fan-out.
    ///
    /// Malformed input is dropped here and never crashes the relay loop.
    async fn handle_datagram(&self, payload: &str, addr: SocketAddr) {
        let command = match shared::decode(payload) {
            Ok(command) => command,
            Err(DecodeError::UnknownTag(tag)) => {
                debug!("Ignoring unknown command '{}' from {}", tag, addr);
                return;
            }
            Err(e) => {
                warn!("Dropping malformed datagram from {}: {}", addr, e);
                return;
            }
        };

        let tag = command.tag();
        let outgoing = {
            let mut registry = self.registry.write().await;
            dispatcher::dispatch(command, addr, &mut registry)
        };

        debug!(
            "Relayed '{}' from {} to {} destination(s)",
            tag,
            addr,
            outgoing.len()
        );

        for datagram in outgoing {
            if let Err(e) = self.send_tx.send(datagram) {
                error!("Failed to queue outgoing datagram: {}", e);
            }
        }
    }

    /// Main relay loop: one dispatch per inbound datagram, no ticks, no
    /// timeouts.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_receiver();
        self.spawn_sender();

        info!("Relay started successfully");

        while let Some(event) = self.event_rx.recv().await {
            match event {
                RelayEvent::DatagramReceived { payload, addr } => {
                    self.handle_datagram(&payload, addr).await;
                }
                RelayEvent::Shutdown => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000)
    }

    #[tokio::test]
    async fn test_bind_assigns_local_addr() {
        let relay = RelayServer::bind("127.0.0.1:0").await.unwrap();
        let addr = relay.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_malformed_datagrams_leave_registry_untouched() {
        let relay = RelayServer::bind("127.0.0.1:0").await.unwrap();

        relay.handle_datagram("", test_addr()).await;
        relay.handle_datagram("teleport,somewhere", test_addr()).await;
        relay.handle_datagram("join,not-a-uuid", test_addr()).await;
        relay
            .handle_datagram(
                "rotate,00000000-0000-0000-0000-000000000001,1,2,3",
                test_addr(),
            )
            .await;

        assert!(relay.registry.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_datagram_registers_sender() {
        let relay = RelayServer::bind("127.0.0.1:0").await.unwrap();
        let client = uuid::Uuid::from_u128(5);

        relay
            .handle_datagram(&format!("join,{}", client), test_addr())
            .await;

        let registry = relay.registry.read().await;
        assert_eq!(registry.resolve(&client), Some(test_addr()));
    }

    #[test]
    fn test_relay_event_construction() {
        let event = RelayEvent::DatagramReceived {
            payload: "join,success".to_string(),
            addr: test_addr(),
        };

        match event {
            RelayEvent::DatagramReceived { payload, addr } => {
                assert_eq!(payload, "join,success");
                assert_eq!(addr, test_addr());
            }
            _ => panic!("Unexpected event type"),
        }
    }
}
