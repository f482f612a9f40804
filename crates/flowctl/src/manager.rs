// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Mutex::lock().unwrap() is the standard pattern in Rust. The lock only fails
// if the mutex is poisoned (a thread panicked while holding it), which indicates
// a bug elsewhere that should propagate. We also suppress the "missing # Panics"
// warning since these are not user-actionable panics.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

//! Session manager.
//!
//! The [`SessionManager`] owns the registry and starts a connection task
//! for every socket it is given, whether accepted by a listener, dialed
//! out, or attached by the caller. Everything the connections report
//! arrives on a single [`SessionEvent`] channel.

use crate::connection::{spawn_connection, ConnectionContext};
use crate::machine::DatapathInfo;
use crate::registry::{PeerId, SessionRegistry};
use crate::{Config, ConnectionHandle, ConnectionState, Error};
use flowctl_transport::net::{TcpAcceptor, TcpDialer};
use flowctl_transport::{
    Acceptor, Dialer, Link, Listener, SendStatus, SocketEvents, TransportError, TransportSocket,
};
use flowctl_wire::{Body, Message, MessageType, StatsType};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Something that happened on one of the managed connections.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A connection completed its handshake.
    ConnectionOpened {
        /// The connection.
        peer: PeerId,
        /// What the handshake learned about the datapath.
        info: DatapathInfo,
    },
    /// An established connection was lost or closed.
    ConnectionClosed {
        /// The connection.
        peer: PeerId,
    },
    /// A reply or asynchronous message arrived.
    Message {
        /// The connection.
        peer: PeerId,
        /// Auxiliary channel the message came in on; zero for the main
        /// connection.
        auxiliary_id: u8,
        /// The message.
        message: Message,
    },
    /// A request got no reply within the request timeout.
    RequestTimeout {
        /// The connection.
        peer: PeerId,
        /// Transaction id of the request.
        xid: u32,
        /// Reply type that was expected.
        expected: MessageType,
        /// Statistics type of a stats request.
        sub_type: Option<StatsType>,
    },
}

impl SessionEvent {
    /// Returns the connection the event belongs to.
    #[must_use]
    pub const fn peer(&self) -> PeerId {
        match self {
            Self::ConnectionOpened { peer, .. }
            | Self::ConnectionClosed { peer }
            | Self::Message { peer, .. }
            | Self::RequestTimeout { peer, .. } => *peer,
        }
    }
}

/// Receiving half of the session event channel.
pub type SessionEvents = mpsc::Receiver<SessionEvent>;

#[derive(Debug)]
struct ManagerInner {
    ctx: ConnectionContext,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

/// Starts and tracks controller connections.
///
/// Cloning is cheap; clones share the registry and the event channel.
#[derive(Debug, Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Creates a manager and the channel its events arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<(Self, SessionEvents), Error> {
        config.validate()?;
        let (events, rx) = mpsc::channel(config.event_capacity);
        let ctx = ConnectionContext {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            events,
        };
        let manager = Self {
            inner: Arc::new(ManagerInner {
                ctx,
                listeners: Mutex::new(Vec::new()),
            }),
        };
        Ok((manager, rx))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.ctx.config
    }

    /// Returns the registry of live connections.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.ctx.registry
    }

    /// Accepts connections from `acceptor` until it fails or the manager
    /// shuts down.
    ///
    /// # Errors
    ///
    /// Returns the acceptor's error if it cannot report its address.
    pub fn listen<A: Acceptor>(&self, acceptor: A) -> Result<SocketAddr, Error> {
        let listener = Listener::new(acceptor, self.config().socket_config(false));
        let addr = listener.local_addr().map_err(TransportError::Io)?;
        let manager = self.clone();
        let task = tokio::spawn(async move { manager.accept_loop(listener).await });
        self.inner.listeners.lock().unwrap().push(task);
        Ok(addr)
    }

    /// Binds the configured listen address over TCP and accepts
    /// connections on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn listen_tcp(&self) -> Result<SocketAddr, Error> {
        let acceptor = TcpAcceptor::bind(self.config().listen_addr)
            .await
            .map_err(TransportError::Io)?;
        self.listen(acceptor)
    }

    #[instrument(skip_all, name = "listener", fields(addr = ?listener.local_addr().ok()))]
    async fn accept_loop<A: Acceptor>(self, listener: Listener<A>) {
        loop {
            match listener.accept().await {
                Ok((socket, events, addr)) => {
                    let peer = self.attach(socket, events);
                    info!(%peer, %addr, "connection accepted");
                }
                Err(e) => {
                    error!(error = %e, "accept failed, listener stopped");
                    listener.close();
                    return;
                }
            }
        }
    }

    /// Connects to a datapath through `dialer`.
    ///
    /// With reconnect enabled the connection redials after failures until
    /// it is closed.
    pub fn connect<D: Dialer>(&self, dialer: D) -> PeerId {
        let (socket, events) = TransportSocket::dial(dialer, &self.config().socket_config(true));
        let peer = self.attach(socket, events);
        debug!(%peer, "connecting");
        peer
    }

    /// Connects to a datapath at `target` (`host:port`) over TCP.
    pub fn connect_tcp(&self, target: impl Into<String>) -> PeerId {
        self.connect(TcpDialer::new(target))
    }

    /// Runs a connection over a socket created by the caller.
    pub fn attach<L: Link>(&self, socket: TransportSocket<L>, events: SocketEvents) -> PeerId {
        spawn_connection(self.inner.ctx.clone(), socket, events).peer()
    }

    /// Returns the handle of a connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPeer`] if no such connection is registered.
    pub fn handle(&self, peer: PeerId) -> Result<ConnectionHandle, Error> {
        self.registry().get(peer).ok_or(Error::UnknownPeer(peer))
    }

    /// Sends a request to `peer` and returns its transaction id.
    ///
    /// # Errors
    ///
    /// See [`ConnectionHandle::send_request`]; additionally
    /// [`Error::UnknownPeer`].
    pub async fn send_request(&self, peer: PeerId, body: Body) -> Result<u32, Error> {
        self.handle(peer)?.send_request(body).await
    }

    /// Sends a message that expects no reply to `peer`.
    ///
    /// # Errors
    ///
    /// See [`ConnectionHandle::send_notification`]; additionally
    /// [`Error::UnknownPeer`].
    pub async fn send_notification(&self, peer: PeerId, body: Body) -> Result<SendStatus, Error> {
        self.handle(peer)?.send_notification(body).await
    }

    /// Sends a message that expects no reply on an auxiliary channel of
    /// `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAuxiliary`] if the channel is not attached.
    pub async fn send_auxiliary(
        &self,
        peer: PeerId,
        auxiliary_id: u8,
        body: Body,
    ) -> Result<SendStatus, Error> {
        let channel = self
            .registry()
            .auxiliary(peer, auxiliary_id)
            .ok_or(Error::UnknownAuxiliary { peer, auxiliary_id })?;
        channel.send_notification(body).await
    }

    /// Closes a connection without reconnecting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPeer`] if no such connection is registered.
    pub async fn close(&self, peer: PeerId) -> Result<(), Error> {
        self.handle(peer)?.close().await;
        Ok(())
    }

    /// Returns the state of a connection.
    #[must_use]
    pub fn state(&self, peer: PeerId) -> Option<ConnectionState> {
        self.registry().get(peer).map(|handle| handle.state())
    }

    /// Returns the ids of all registered connections.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.registry().peers()
    }

    /// Returns the main connection of a datapath.
    #[must_use]
    pub fn find_datapath(&self, datapath_id: u64) -> Option<PeerId> {
        self.registry().find_datapath(datapath_id)
    }

    /// Stops all listeners and closes every connection.
    pub async fn shutdown(&self) {
        let listeners: Vec<JoinHandle<()>> = self.inner.listeners.lock().unwrap().drain(..).collect();
        for task in listeners {
            task.abort();
        }
        let handles = self.registry().handles();
        info!(connections = handles.len(), "shutting down");
        for handle in handles {
            handle.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowctl_transport::mock::{mock_link_pair, MockDialer};
    use flowctl_transport::LinkKind;
    use std::time::Duration;

    #[test]
    fn invalid_config_is_rejected() {
        let result = SessionManager::new(Config::new().with_versions(&[]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn unknown_peer() {
        let (manager, _events) = SessionManager::new(Config::new()).expect("config is valid");
        let (other, _) = SessionManager::new(Config::new()).expect("config is valid");
        let (link, _peer_side) = mock_link_pair(LinkKind::Stream);
        let (socket, events) = TransportSocket::from_link(link, &other.config().socket_config(false));
        let stranger = other.attach(socket, events);

        assert!(matches!(
            manager.send_request(stranger, Body::BarrierRequest).await,
            Err(Error::UnknownPeer(p)) if p == stranger
        ));
        assert!(matches!(
            manager.send_auxiliary(stranger, 1, Body::BarrierRequest).await,
            Err(Error::UnknownAuxiliary { auxiliary_id: 1, .. })
        ));
    }

    #[tokio::test]
    async fn requests_before_handshake_fail() {
        let (manager, _events) = SessionManager::new(Config::new()).expect("config is valid");
        let (link, _switch) = mock_link_pair(LinkKind::Stream);
        let (socket, events) = TransportSocket::accepted(link, &manager.config().socket_config(false));
        let peer = manager.attach(socket, events);

        assert_eq!(manager.peers(), vec![peer]);
        assert!(matches!(
            manager.send_request(peer, Body::BarrierRequest).await,
            Err(Error::NotEstablished { .. })
        ));
        assert!(matches!(
            manager.send_notification(peer, Body::BarrierRequest).await,
            Err(Error::NotEstablished { .. })
        ));
    }

    #[tokio::test]
    async fn close_unregisters() {
        let (manager, _events) = SessionManager::new(Config::new()).expect("config is valid");
        let (link, _switch) = mock_link_pair(LinkKind::Stream);
        let (socket, events) = TransportSocket::accepted(link, &manager.config().socket_config(false));
        let peer = manager.attach(socket, events);

        manager.close(peer).await.expect("close should succeed");
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.state(peer).is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("connection should unregister");
        assert!(manager.peers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dial_without_reconnect_unregisters() {
        let config = Config::new().with_reconnect(false);
        let (manager, _events) = SessionManager::new(config).expect("config is valid");
        let peer = manager.connect(MockDialer::new());

        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.state(peer).is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection should unregister");
    }
}
