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
// if the mutex is poisoned, which indicates a bug elsewhere that should
// propagate.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

//! Mock transport implementation for testing.
//!
//! Provides in-memory links for unit and integration tests that need to
//! control exactly when a socket is writable, how much a write accepts and
//! when the peer goes away.

use crate::{Acceptor, Dialer, Link, LinkKind};
use bytes::{Buf, Bytes};
use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Poll, Waker};
use tokio::sync::mpsc;

/// Port used for the accepting side of mock links.
pub const MOCK_SERVER_PORT: u16 = 6653;

static NEXT_CLIENT_PORT: AtomicU16 = AtomicU16::new(40000);

/// One direction of a mock link.
#[derive(Debug, Default)]
struct Pipe {
    chunks: VecDeque<Bytes>,
    read_waker: Option<Waker>,
}

/// Per-side write controls.
#[derive(Debug)]
struct Side {
    writable: bool,
    write_limit: Option<usize>,
    write_waker: Option<Waker>,
    addr: SocketAddr,
}

/// State shared between the two ends of a mock link.
#[derive(Debug)]
struct SharedState {
    kind: LinkKind,
    /// `pipes[i]` carries data written by side `i`.
    pipes: [Pipe; 2],
    sides: [Side; 2],
    /// Live handles per side; the link closes when either reaches zero.
    handles: [usize; 2],
    closed: bool,
}

impl SharedState {
    fn wake_all(&mut self) {
        for pipe in &mut self.pipes {
            if let Some(waker) = pipe.read_waker.take() {
                waker.wake();
            }
        }
        for side in &mut self.sides {
            if let Some(waker) = side.write_waker.take() {
                waker.wake();
            }
        }
    }
}

/// Creates a connected pair of mock links.
///
/// Data written on one end can be read on the other. The first link is
/// the "client" end, the second the "server" end.
#[must_use]
pub fn mock_link_pair(kind: LinkKind) -> (MockLink, MockLink) {
    let client_port = NEXT_CLIENT_PORT.fetch_add(1, Ordering::Relaxed);
    let side = |port| Side {
        writable: true,
        write_limit: None,
        write_waker: None,
        addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
    };

    let state = Arc::new(Mutex::new(SharedState {
        kind,
        pipes: [Pipe::default(), Pipe::default()],
        sides: [side(client_port), side(MOCK_SERVER_PORT)],
        handles: [1, 1],
        closed: false,
    }));

    let client = MockLink {
        state: Arc::clone(&state),
        side: 0,
    };
    let server = MockLink { state, side: 1 };

    (client, server)
}

/// An in-memory link for testing.
///
/// Dropping the last handle to either end closes the link, like dropping
/// a socket.
#[derive(Debug)]
pub struct MockLink {
    state: Arc<Mutex<SharedState>>,
    side: usize,
}

impl Clone for MockLink {
    fn clone(&self) -> Self {
        self.state.lock().unwrap().handles[self.side] += 1;
        Self {
            state: Arc::clone(&self.state),
            side: self.side,
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.handles[self.side] -= 1;
            if state.handles[self.side] == 0 {
                state.closed = true;
                state.wake_all();
            }
        }
    }
}

impl MockLink {
    const fn peer(&self) -> usize {
        1 - self.side
    }

    /// Controls whether writes on this end succeed or would block.
    pub fn set_writable(&self, writable: bool) {
        let mut state = self.state.lock().unwrap();
        state.sides[self.side].writable = writable;
        if writable {
            if let Some(waker) = state.sides[self.side].write_waker.take() {
                waker.wake();
            }
        }
    }

    /// Caps how many bytes a single write on this end accepts.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.state.lock().unwrap().sides[self.side].write_limit = limit;
    }

    /// Tears down the link in both directions.
    ///
    /// Stream reads on either end drain buffered data and then see end of
    /// stream; datagram reads fail with `ConnectionReset`. Writes fail with
    /// `BrokenPipe`.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.wake_all();
    }

    /// Returns true if either end closed the link.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Number of written chunks not yet read by this end.
    #[must_use]
    pub fn pending_chunks(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.pipes[self.peer()].chunks.len()
    }

    /// Writes a whole buffer regardless of writability.
    ///
    /// # Errors
    ///
    /// Returns `BrokenPipe` if the link is closed.
    pub fn inject(&self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let side = self.side;
        state.pipes[side]
            .chunks
            .push_back(Bytes::copy_from_slice(data));
        if let Some(waker) = state.pipes[side].read_waker.take() {
            waker.wake();
        }
        Ok(())
    }

    /// Waits for the next chunk written by the other end.
    ///
    /// Returns `None` once the link is closed and drained.
    pub async fn recv(&self) -> Option<Bytes> {
        poll_fn(|cx| {
            let mut state = self.state.lock().unwrap();
            let peer = self.peer();
            if let Some(chunk) = state.pipes[peer].chunks.pop_front() {
                return Poll::Ready(Some(chunk));
            }
            if state.closed {
                return Poll::Ready(None);
            }
            state.pipes[peer].read_waker = Some(cx.waker().clone());
            Poll::Pending
        })
        .await
    }
}

impl Link for MockLink {
    fn kind(&self) -> LinkKind {
        self.state.lock().unwrap().kind
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        let state = self.state.lock().unwrap();
        Ok(state.sides[self.peer()].addr)
    }

    async fn readable(&self) -> io::Result<()> {
        poll_fn(|cx| {
            let mut state = self.state.lock().unwrap();
            let peer = self.peer();
            if state.closed || !state.pipes[peer].chunks.is_empty() {
                return Poll::Ready(Ok(()));
            }
            state.pipes[peer].read_waker = Some(cx.waker().clone());
            Poll::Pending
        })
        .await
    }

    async fn writable(&self) -> io::Result<()> {
        poll_fn(|cx| {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            let side = &mut state.sides[self.side];
            if side.writable {
                return Poll::Ready(Ok(()));
            }
            side.write_waker = Some(cx.waker().clone());
            Poll::Pending
        })
        .await
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let kind = state.kind;
        let closed = state.closed;
        let pipe = &mut state.pipes[self.peer()];

        match kind {
            LinkKind::Datagram => match pipe.chunks.pop_front() {
                Some(datagram) => {
                    let n = datagram.len().min(buf.len());
                    buf[..n].copy_from_slice(&datagram[..n]);
                    Ok(n)
                }
                None if closed => Err(io::ErrorKind::ConnectionReset.into()),
                None => Err(io::ErrorKind::WouldBlock.into()),
            },
            LinkKind::Stream => {
                if pipe.chunks.is_empty() {
                    return if closed {
                        Ok(0)
                    } else {
                        Err(io::ErrorKind::WouldBlock.into())
                    };
                }
                let mut filled = 0;
                while filled < buf.len() {
                    let Some(chunk) = pipe.chunks.front_mut() else {
                        break;
                    };
                    let n = chunk.len().min(buf.len() - filled);
                    buf[filled..filled + n].copy_from_slice(&chunk[..n]);
                    chunk.advance(n);
                    filled += n;
                    if chunk.is_empty() {
                        pipe.chunks.pop_front();
                    }
                }
                Ok(filled)
            }
        }
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let side = &state.sides[self.side];
        if !side.writable {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = side.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));

        let pipe = &mut state.pipes[self.side];
        pipe.chunks.push_back(Bytes::copy_from_slice(&buf[..n]));
        if let Some(waker) = pipe.read_waker.take() {
            waker.wake();
        }
        Ok(n)
    }
}

/// Hands out scripted links, one per dial attempt.
///
/// An empty script refuses the connection.
#[derive(Debug, Clone, Default)]
pub struct MockDialer {
    script: Arc<Mutex<VecDeque<io::Result<MockLink>>>>,
    attempts: Arc<AtomicUsize>,
}

impl MockDialer {
    /// Creates a dialer with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a link for a future dial attempt.
    pub fn push_link(&self, link: MockLink) {
        self.script.lock().unwrap().push_back(Ok(link));
    }

    /// Queues a failure for a future dial attempt.
    pub fn push_error(&self, kind: io::ErrorKind) {
        self.script.lock().unwrap().push_back(Err(kind.into()));
    }

    /// Number of dial attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Dialer for MockDialer {
    type Link = MockLink;

    async fn dial(&self) -> io::Result<MockLink> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(io::ErrorKind::ConnectionRefused.into()))
    }
}

/// Creates a mock listening endpoint.
///
/// Each [`MockConnector::connect`] produces a link pair and delivers the
/// server end to the [`MockAcceptor`].
#[must_use]
pub fn mock_listener(kind: LinkKind) -> (MockAcceptor, MockConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MockAcceptor {
            incoming: tokio::sync::Mutex::new(rx),
        },
        MockConnector { kind, tx },
    )
}

/// Accepting side of [`mock_listener`].
#[derive(Debug)]
pub struct MockAcceptor {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockLink>>,
}

impl Acceptor for MockAcceptor {
    type Link = MockLink;

    async fn accept(&self) -> io::Result<(MockLink, SocketAddr)> {
        let link = self
            .incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let addr = link.peer_addr()?;
        Ok((link, addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, MOCK_SERVER_PORT)))
    }
}

/// Connecting side of [`mock_listener`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    kind: LinkKind,
    tx: mpsc::UnboundedSender<MockLink>,
}

impl MockConnector {
    /// Connects to the paired acceptor and returns the client end.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionRefused` if the acceptor was dropped.
    pub fn connect(&self) -> io::Result<MockLink> {
        let (client, server) = mock_link_pair(self.kind);
        self.tx
            .send(server)
            .map_err(|_| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        Ok(client)
    }
}

impl Dialer for MockConnector {
    type Link = MockLink;

    async fn dial(&self) -> io::Result<MockLink> {
        self.connect()
    }
}
