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

//! TCP and UDP links.
//!
//! Thin wrappers giving tokio's sockets the [`Link`], [`Dialer`] and
//! [`Acceptor`] interfaces.

use crate::{Acceptor, Dialer, Link, LinkKind};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{lookup_host, TcpListener, TcpStream, UdpSocket};
use tracing::debug;

/// A TCP stream implementing [`Link`].
#[derive(Debug)]
pub struct TcpLink {
    inner: TcpStream,
}

impl TcpLink {
    /// Wraps a connected stream, disabling Nagle's algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket option cannot be set.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { inner: stream })
    }

    /// Returns a reference to the underlying stream.
    #[must_use]
    pub const fn inner(&self) -> &TcpStream {
        &self.inner
    }

    /// Consumes this wrapper and returns the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }
}

impl Link for TcpLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Stream
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    async fn readable(&self) -> io::Result<()> {
        self.inner.readable().await
    }

    async fn writable(&self) -> io::Result<()> {
        self.inner.writable().await
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.try_read(buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.try_write(buf)
    }
}

/// A connected UDP socket implementing [`Link`].
#[derive(Debug)]
pub struct UdpLink {
    inner: UdpSocket,
}

impl UdpLink {
    /// Wraps a socket that has already been connected to its peer.
    #[must_use]
    pub const fn new(socket: UdpSocket) -> Self {
        Self { inner: socket }
    }

    /// Returns a reference to the underlying socket.
    #[must_use]
    pub const fn inner(&self) -> &UdpSocket {
        &self.inner
    }
}

impl Link for UdpLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Datagram
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    async fn readable(&self) -> io::Result<()> {
        self.inner.readable().await
    }

    async fn writable(&self) -> io::Result<()> {
        self.inner.writable().await
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.try_recv(buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.try_send(buf)
    }
}

/// Dials a TCP target given as `host:port`.
///
/// The host is resolved on every attempt.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    target: String,
}

impl TcpDialer {
    /// Creates a dialer for `target`, e.g. `"switch-7.lab:6653"`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Returns the configured target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Dialer for TcpDialer {
    type Link = TcpLink;

    async fn dial(&self) -> io::Result<TcpLink> {
        debug!(target = %self.target, "dialing tcp");
        let stream = TcpStream::connect(self.target.as_str()).await?;
        TcpLink::new(stream)
    }
}

/// Dials a UDP target given as `host:port` and connects the socket to it.
#[derive(Debug, Clone)]
pub struct UdpDialer {
    target: String,
}

impl UdpDialer {
    /// Creates a dialer for `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Dialer for UdpDialer {
    type Link = UdpLink;

    async fn dial(&self) -> io::Result<UdpLink> {
        let remote = lookup_host(self.target.as_str())
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address found for {}", self.target),
                )
            })?;
        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        debug!(target = %self.target, %remote, "dialing udp");
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        Ok(UdpLink::new(socket))
    }
}

/// A bound TCP listener implementing [`Acceptor`].
#[derive(Debug)]
pub struct TcpAcceptor {
    inner: TcpListener,
}

impl TcpAcceptor {
    /// Binds to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr).await?,
        })
    }
}

impl From<TcpListener> for TcpAcceptor {
    fn from(listener: TcpListener) -> Self {
        Self { inner: listener }
    }
}

impl Acceptor for TcpAcceptor {
    type Link = TcpLink;

    async fn accept(&self) -> io::Result<(TcpLink, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;
        Ok((TcpLink::new(stream)?, addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
