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

//! Transport trait definitions.
//!
//! These traits abstract over the byte carriers a control channel can run
//! on, so the socket layer works the same over TCP, connected UDP and the
//! in-memory links used in tests.
//!
//! Links expose readiness futures plus non-blocking reads and writes. The
//! socket layer needs to learn that a write *would* block without waiting
//! for it, which `AsyncWrite` does not express.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

/// How a link delimits data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Byte stream; short writes leave a remainder to resend.
    Stream,
    /// Message oriented; a short write loses the datagram.
    Datagram,
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Datagram => write!(f, "datagram"),
        }
    }
}

/// An established, bidirectional link to a peer.
///
/// All methods take `&self` so one task can wait for readability while
/// another writes.
pub trait Link: Send + Sync + 'static {
    /// Returns how this link delimits data.
    fn kind(&self) -> LinkKind;

    /// Returns the remote address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not available.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Waits until the link may be readable.
    ///
    /// Readiness can be spurious; callers must handle
    /// [`io::ErrorKind::WouldBlock`] from [`try_read`](Self::try_read).
    fn readable(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Waits until the link may be writable.
    fn writable(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Reads without waiting.
    ///
    /// For streams `Ok(0)` means end of stream. For datagram links each
    /// call returns at most one datagram.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::WouldBlock`] if nothing is available.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes without waiting, returning the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::WouldBlock`] if the link cannot accept data.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}

/// Produces links by actively connecting to a fixed target.
///
/// The socket layer calls [`dial`](Self::dial) again on every reconnect
/// attempt, so implementations resolve the target each time.
pub trait Dialer: Send + Sync + 'static {
    /// The link type produced.
    type Link: Link;

    /// Connects to the target.
    fn dial(&self) -> impl Future<Output = io::Result<Self::Link>> + Send;
}

/// Produces links by accepting incoming connections.
pub trait Acceptor: Send + Sync + 'static {
    /// The link type produced.
    type Link: Link;

    /// Waits for the next incoming connection.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Link, SocketAddr)>> + Send;

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not available.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
