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
// propagate. Constructors spawn onto the current tokio runtime and panic
// outside one, like `tokio::spawn`.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

//! Transport socket.
//!
//! A [`TransportSocket`] owns one link at a time and an I/O task that reads
//! from it, drains the outbound queue when the link becomes writable and,
//! for actively connected sockets, redials after failures. The owner
//! receives [`SocketEvent`]s on a channel and sends through
//! [`TransportSocket::send`], which never waits.

use crate::{
    Backoff, Dialer, Link, LinkKind, OutboundQueue, ReconnectPolicy, SendStatus, SocketRole,
    SocketState, TransportError,
};
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default read buffer size; large enough for any single control message.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default socket event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Socket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Maximum number of buffers waiting for the link to become writable.
    pub queue_capacity: usize,
    /// What to do when an actively connected link fails.
    pub reconnect: ReconnectPolicy,
    /// Size of the buffer used for each read.
    pub read_buffer_size: usize,
    /// Capacity of the event channel. A slow consumer stalls reads.
    pub event_capacity: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reconnect: ReconnectPolicy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SocketConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outbound queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the reconnect policy.
    #[must_use]
    pub const fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Something that happened on a socket.
#[derive(Debug)]
pub enum SocketEvent {
    /// A link is up. Emitted once per (re)connection.
    Connected {
        /// Remote address, if the link reports one.
        remote: Option<SocketAddr>,
    },
    /// Bytes read from the link, in arrival order.
    Data(Bytes),
    /// The link went down. `error` is `None` for an orderly close by the
    /// peer.
    Closed {
        /// Why the link went down.
        error: Option<TransportError>,
    },
    /// A reconnect attempt is scheduled.
    Reconnecting {
        /// Attempt number since the backoff was last reset.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
}

/// Receiving half of a socket's event channel.
pub type SocketEvents = mpsc::Receiver<SocketEvent>;

struct Inner<L> {
    state: SocketState,
    role: SocketRole,
    link: Option<Arc<L>>,
    remote: Option<SocketAddr>,
    queue: OutboundQueue,
    reconnect: ReconnectPolicy,
    backoff: Backoff,
    /// Write error seen by `send`, picked up by the I/O task.
    failure: Option<io::Error>,
}

struct Shared<L> {
    inner: Mutex<Inner<L>>,
    /// Signals the I/O task that the queue or failure state changed.
    wake: Notify,
    events: mpsc::Sender<SocketEvent>,
    read_buffer_size: usize,
}

impl<L: Link> Shared<L> {
    fn set_state(inner: &mut Inner<L>, next: SocketState) {
        if inner.state == next {
            return;
        }
        if !inner.state.can_transition_to(next) {
            debug!(from = %inner.state, to = %next, "unexpected socket transition");
        }
        trace!(from = %inner.state, to = %next, "socket state");
        inner.state = next;
    }

    fn attach(&self, link: Arc<L>) -> Option<SocketAddr> {
        let mut inner = self.inner.lock().unwrap();
        inner.remote = link.peer_addr().ok();
        inner.link = Some(link);
        inner.queue.clear();
        inner.failure = None;
        Self::set_state(&mut inner, SocketState::Established);
        inner.remote
    }

    fn detach(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.link = None;
        inner.queue.clear();
        inner.failure = None;
        Self::set_state(&mut inner, SocketState::Closed);
    }

    fn set_connecting(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::set_state(&mut inner, SocketState::Connecting);
    }

    fn set_closed(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::set_state(&mut inner, SocketState::Closed);
    }

    /// Returns the delay before the next attempt, or `None` if reconnect
    /// is disabled.
    fn next_retry(&self) -> Option<(u32, Duration)> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.reconnect.enabled {
            return None;
        }
        let delay = inner.backoff.next_delay();
        Some((inner.backoff.attempts(), delay))
    }

    async fn emit(&self, event: SocketEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    fn has_pending(&self) -> bool {
        !self.inner.lock().unwrap().queue.is_empty()
    }

    fn take_failure(&self) -> Option<io::Error> {
        self.inner.lock().unwrap().failure.take()
    }

    fn send(&self, buf: Bytes) -> Result<SendStatus, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let link = match (inner.state, &inner.link) {
            (SocketState::Established, Some(link)) => Arc::clone(link),
            (SocketState::Closed, _) => return Err(TransportError::Closed),
            (state, _) => {
                return Err(TransportError::InvalidState {
                    state,
                    operation: "send",
                })
            }
        };
        if inner.failure.is_some() {
            return Err(TransportError::Closed);
        }

        // Preserve ordering behind anything already queued.
        if !inner.queue.is_empty() || inner.queue.would_block() {
            let status = inner.queue.push(buf);
            drop(inner);
            self.wake.notify_one();
            return Ok(status);
        }

        let status = match link.try_write(&buf) {
            Ok(n) if n == buf.len() => SendStatus::Normal,
            Ok(n) if link.kind() == LinkKind::Stream => {
                inner.queue.set_would_block(true);
                inner.queue.push(buf.slice(n..))
            }
            Ok(n) => {
                warn!(written = n, len = buf.len(), "short datagram write, buffer dropped");
                return Ok(SendStatus::Normal);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                inner.queue.set_would_block(true);
                inner.queue.push(buf)
            }
            Err(e) => {
                warn!(error = %e, "write failed");
                inner.failure = Some(io::Error::new(e.kind(), e.to_string()));
                drop(inner);
                self.wake.notify_one();
                return Err(e.into());
            }
        };
        drop(inner);
        self.wake.notify_one();
        Ok(status)
    }

    /// Writes queued buffers until the queue is empty or the link would
    /// block.
    fn flush(&self, link: &L) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let kind = link.kind();

        while let Some(front) = inner.queue.front().cloned() {
            match link.try_write(&front) {
                Ok(n) if n == front.len() => {
                    inner.queue.pop();
                }
                Ok(0) if kind == LinkKind::Stream => {
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => match kind {
                    LinkKind::Stream => inner.queue.advance(n),
                    LinkKind::Datagram => {
                        warn!(written = n, len = front.len(), "short datagram write, buffer dropped");
                        inner.queue.pop();
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    inner.queue.set_would_block(true);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        inner.queue.set_would_block(false);
        Ok(())
    }
}

/// A non-blocking socket with an outbound queue and optional reconnect.
///
/// Dropping the socket stops its I/O task and closes the link.
pub struct TransportSocket<L: Link> {
    shared: Arc<Shared<L>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<L: Link> std::fmt::Debug for TransportSocket<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSocket")
            .field("state", &self.state())
            .field("role", &self.role())
            .field("remote", &self.remote_addr())
            .finish_non_exhaustive()
    }
}

impl<L: Link> TransportSocket<L> {
    fn with_role(role: SocketRole, config: &SocketConfig) -> (Self, SocketEvents) {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: SocketState::Idle,
                role,
                link: None,
                remote: None,
                queue: OutboundQueue::new(config.queue_capacity),
                reconnect: config.reconnect,
                backoff: Backoff::new(config.reconnect.base_interval),
                failure: None,
            }),
            wake: Notify::new(),
            events: tx,
            read_buffer_size: config.read_buffer_size.max(1),
        });
        (
            Self {
                shared,
                task: Mutex::new(None),
            },
            rx,
        )
    }

    /// Creates an idle socket. Call [`connect`](Self::connect) to start it.
    #[must_use]
    pub fn new(config: &SocketConfig) -> (Self, SocketEvents) {
        Self::with_role(SocketRole::Active, config)
    }

    /// Creates a socket and starts connecting through `dialer`.
    #[must_use]
    pub fn dial<D>(dialer: D, config: &SocketConfig) -> (Self, SocketEvents)
    where
        D: Dialer<Link = L>,
    {
        let (socket, events) = Self::new(config);
        socket.connect(dialer);
        (socket, events)
    }

    /// Wraps a link produced by a listening endpoint.
    #[must_use]
    pub fn accepted(link: L, config: &SocketConfig) -> (Self, SocketEvents) {
        Self::attached(link, SocketRole::Accepted, config)
    }

    /// Wraps a link that was connected by other means.
    #[must_use]
    pub fn from_link(link: L, config: &SocketConfig) -> (Self, SocketEvents) {
        Self::attached(link, SocketRole::Plain, config)
    }

    fn attached(link: L, role: SocketRole, config: &SocketConfig) -> (Self, SocketEvents) {
        let (socket, events) = Self::with_role(role, config);
        let link = Arc::new(link);
        let remote = socket.shared.attach(Arc::clone(&link));
        let shared = Arc::clone(&socket.shared);
        let task = tokio::spawn(run_attached(shared, link, remote));
        *socket.task.lock().unwrap() = Some(task);
        (socket, events)
    }

    /// Starts connecting through `dialer`.
    ///
    /// Any connection or scheduled retry in progress is abandoned first,
    /// together with its queued data.
    pub fn connect<D>(&self, dialer: D)
    where
        D: Dialer<Link = L>,
    {
        self.stop_task();
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.role = SocketRole::Active;
            inner.link = None;
            inner.queue.clear();
            inner.failure = None;
        }
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_active(shared, dialer));
        *self.task.lock().unwrap() = Some(task);
    }

    /// Queues `buf` for transmission without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after the socket closed, and
    /// [`TransportError::InvalidState`] before it is connected. A write
    /// failure detected immediately is returned as
    /// [`TransportError::Io`]; the socket then closes.
    pub fn send(&self, buf: Bytes) -> Result<SendStatus, TransportError> {
        let status = self.shared.send(buf)?;
        if status.is_backpressure() {
            debug!(%status, queued = self.queued(), "send backpressure");
        }
        Ok(status)
    }

    /// Closes the socket, cancelling any scheduled reconnect and
    /// discarding queued data.
    pub fn close(&self) {
        self.stop_task();
        let mut inner = self.shared.inner.lock().unwrap();
        inner.link = None;
        inner.queue.clear();
        if !inner.state.is_closed() {
            debug!(state = %inner.state, "socket closed locally");
            Shared::set_state(&mut inner, SocketState::Closed);
        }
    }

    /// Drops the current link as if it had failed.
    ///
    /// Unlike [`close`](Self::close) this leaves the reconnect policy in
    /// charge: an active socket with reconnect enabled dials again after
    /// the next backoff delay. The owner sees the usual
    /// [`SocketEvent::Closed`].
    pub fn disconnect(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if !inner.state.is_established() {
                return;
            }
            debug!("link aborted locally");
            inner.failure = Some(io::Error::new(io::ErrorKind::TimedOut, "link aborted"));
        }
        self.shared.wake.notify_one();
    }

    /// Restarts the reconnect backoff at its base interval.
    pub fn reset_backoff(&self) {
        self.shared.inner.lock().unwrap().backoff.reset();
    }

    /// Replaces the reconnect policy. Takes effect at the next failure.
    pub fn set_reconnect(&self, policy: ReconnectPolicy) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.reconnect.base_interval != policy.base_interval {
            inner.backoff = Backoff::new(policy.base_interval);
        }
        inner.reconnect = policy;
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.shared.inner.lock().unwrap().state
    }

    /// Returns how the socket came to exist.
    #[must_use]
    pub fn role(&self) -> SocketRole {
        self.shared.inner.lock().unwrap().role
    }

    /// Returns the remote address of the current or last link.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.shared.inner.lock().unwrap().remote
    }

    /// Returns the kind of the current link.
    #[must_use]
    pub fn link_kind(&self) -> Option<LinkKind> {
        self.shared
            .inner
            .lock()
            .unwrap()
            .link
            .as_ref()
            .map(|link| link.kind())
    }

    /// Number of buffers waiting to be written.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.inner.lock().unwrap().queue.len()
    }

    /// Reconnect delays handed out since the backoff was last reset.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().unwrap().backoff.attempts()
    }

    fn stop_task(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl<L: Link> Drop for TransportSocket<L> {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

#[instrument(skip_all, name = "socket", fields(role = "active"))]
async fn run_active<L, D>(shared: Arc<Shared<L>>, dialer: D)
where
    L: Link,
    D: Dialer<Link = L>,
{
    loop {
        shared.set_connecting();

        let (connected, error) = match dialer.dial().await {
            Ok(link) => {
                let link = Arc::new(link);
                let remote = shared.attach(Arc::clone(&link));
                info!(?remote, "connected");
                if !shared.emit(SocketEvent::Connected { remote }).await {
                    return;
                }
                let error = drive(&shared, link.as_ref()).await;
                shared.detach();
                (true, error)
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                shared.set_closed();
                (false, Some(TransportError::Io(e)))
            }
        };

        let retry = shared.next_retry();
        if connected || retry.is_none() {
            if !shared.emit(SocketEvent::Closed { error }).await {
                return;
            }
        }
        let Some((attempt, delay)) = retry else {
            return;
        };

        info!(attempt, ?delay, "reconnect scheduled");
        if !shared.emit(SocketEvent::Reconnecting { attempt, delay }).await {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

#[instrument(skip_all, name = "socket", fields(remote = ?remote))]
async fn run_attached<L: Link>(shared: Arc<Shared<L>>, link: Arc<L>, remote: Option<SocketAddr>) {
    if !shared.emit(SocketEvent::Connected { remote }).await {
        return;
    }
    let error = drive(&shared, link.as_ref()).await;
    shared.detach();
    shared.emit(SocketEvent::Closed { error }).await;
}

/// Moves data until the link fails. Returns `None` for an orderly close or
/// when the owner stopped listening.
async fn drive<L: Link>(shared: &Shared<L>, link: &L) -> Option<TransportError> {
    let mut buf = vec![0u8; shared.read_buffer_size];
    let kind = link.kind();

    loop {
        if let Some(e) = shared.take_failure() {
            warn!(error = %e, "link failed");
            return Some(e.into());
        }
        let pending = shared.has_pending();

        tokio::select! {
            ready = link.readable() => {
                if let Err(e) = ready {
                    warn!(error = %e, "read failed");
                    return Some(e.into());
                }
                match link.try_read(&mut buf) {
                    Ok(0) if kind == LinkKind::Stream => {
                        info!("peer closed the connection");
                        return None;
                    }
                    Ok(0) => {}
                    Ok(n) => {
                        trace!(len = n, "read");
                        let data = Bytes::copy_from_slice(&buf[..n]);
                        if !shared.emit(SocketEvent::Data(data)).await {
                            return None;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        warn!(error = %e, "read failed");
                        return Some(e.into());
                    }
                }
            }
            ready = link.writable(), if pending => {
                if let Err(e) = ready.and_then(|()| shared.flush(link)) {
                    warn!(error = %e, "write failed");
                    return Some(e.into());
                }
            }
            () = shared.wake.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_link_pair, MockDialer, MockLink};

    async fn next_event(events: &mut SocketEvents) -> SocketEvent {
        events.recv().await.expect("event channel should stay open")
    }

    async fn read_exact(link: &MockLink, len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        while out.len() < len {
            let chunk = link.recv().await.expect("link should stay open");
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn accepted_socket_sends_immediately() {
        let (client, server) = mock_link_pair(LinkKind::Stream);
        let (socket, mut events) = TransportSocket::accepted(server, &SocketConfig::new());

        assert_eq!(socket.state(), SocketState::Established);
        assert_eq!(socket.role(), SocketRole::Accepted);
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { remote: Some(_) }
        ));

        let status = socket
            .send(Bytes::from_static(b"hello"))
            .expect("send should succeed");
        assert_eq!(status, SendStatus::Normal);
        assert_eq!(read_exact(&client, 5).await, b"hello");

        client.inject(b"reply").expect("inject should succeed");
        match next_event(&mut events).await {
            SocketEvent::Data(data) => assert_eq!(&data[..], b"reply"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn seventeen_sends_into_sixteen_slots() {
        let (client, server) = mock_link_pair(LinkKind::Stream);
        server.set_writable(false);
        let (socket, _events) = TransportSocket::accepted(server.clone(), &SocketConfig::new());

        let statuses: Vec<SendStatus> = (0u8..17)
            .map(|n| socket.send(Bytes::from(vec![n])).expect("send should succeed"))
            .collect();

        assert!(statuses[..15].iter().all(|s| *s == SendStatus::Congestion));
        assert_eq!(statuses[15], SendStatus::QueueFull);
        assert_eq!(statuses[16], SendStatus::Dropped);
        assert_eq!(socket.queued(), 16);

        server.set_writable(true);
        let received = read_exact(&client, 16).await;
        assert_eq!(received, (0u8..16).collect::<Vec<_>>());

        assert_eq!(socket.queued(), 0);
        let status = socket
            .send(Bytes::from_static(b"x"))
            .expect("send should succeed");
        assert_eq!(status, SendStatus::Normal);
    }

    #[tokio::test]
    async fn stream_short_write_keeps_remainder() {
        let (client, server) = mock_link_pair(LinkKind::Stream);
        server.set_write_limit(Some(3));
        let (socket, _events) = TransportSocket::accepted(server.clone(), &SocketConfig::new());

        let status = socket
            .send(Bytes::from_static(b"abcdefgh"))
            .expect("send should succeed");
        assert_eq!(status, SendStatus::Congestion);

        assert_eq!(read_exact(&client, 8).await, b"abcdefgh");
    }

    #[tokio::test]
    async fn datagram_short_write_drops_buffer() {
        let (client, server) = mock_link_pair(LinkKind::Datagram);
        server.set_write_limit(Some(2));
        let (socket, _events) = TransportSocket::accepted(server.clone(), &SocketConfig::new());

        socket
            .send(Bytes::from_static(b"first"))
            .expect("send should succeed");
        assert_eq!(socket.queued(), 0);

        server.set_write_limit(None);
        socket
            .send(Bytes::from_static(b"second"))
            .expect("send should succeed");

        assert_eq!(client.recv().await.as_deref(), Some(&b"fi"[..]));
        assert_eq!(client.recv().await.as_deref(), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn peer_close_emits_closed() {
        let (client, server) = mock_link_pair(LinkKind::Stream);
        let (socket, mut events) = TransportSocket::accepted(server, &SocketConfig::new());
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { .. }
        ));

        drop(client);

        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Closed { error: None }
        ));
        assert_eq!(socket.state(), SocketState::Closed);
        assert!(matches!(
            socket.send(Bytes::from_static(b"late")),
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_purges_queue() {
        let (client, server) = mock_link_pair(LinkKind::Stream);
        server.set_writable(false);
        let (socket, _events) = TransportSocket::accepted(server.clone(), &SocketConfig::new());

        for _ in 0..3 {
            socket
                .send(Bytes::from_static(b"queued"))
                .expect("send should succeed");
        }
        assert_eq!(socket.queued(), 3);

        socket.close();
        server.set_writable(true);

        assert_eq!(socket.state(), SocketState::Closed);
        assert_eq!(socket.queued(), 0);
        assert!(socket.send(Bytes::from_static(b"x")).is_err());
        assert_eq!(client.pending_chunks(), 0);
    }

    #[tokio::test]
    async fn send_before_connect_is_rejected() {
        let (socket, _events) = TransportSocket::<MockLink>::new(&SocketConfig::new());
        assert_eq!(socket.state(), SocketState::Idle);
        assert!(matches!(
            socket.send(Bytes::from_static(b"x")),
            Err(TransportError::InvalidState {
                state: SocketState::Idle,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn dial_failure_without_reconnect_closes() {
        let dialer = MockDialer::new();
        let (socket, mut events) = TransportSocket::dial(dialer.clone(), &SocketConfig::new());

        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Closed { error: Some(_) }
        ));
        assert_eq!(socket.state(), SocketState::Closed);
        assert_eq!(dialer.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_with_backoff() {
        let dialer = MockDialer::new();
        dialer.push_error(io::ErrorKind::ConnectionRefused);
        dialer.push_error(io::ErrorKind::ConnectionRefused);
        let (link, peer) = mock_link_pair(LinkKind::Stream);
        dialer.push_link(link);

        let config = SocketConfig::new().with_reconnect(ReconnectPolicy::enabled(
            Duration::from_secs(1),
        ));
        let (socket, mut events) = TransportSocket::dial(dialer.clone(), &config);

        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 1, delay } if delay == Duration::from_secs(1)
        ));
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 2, delay } if delay == Duration::from_secs(2)
        ));
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { .. }
        ));
        assert_eq!(socket.state(), SocketState::Established);
        assert_eq!(dialer.attempts(), 3);

        // Not reset: the next retry continues the schedule.
        drop(peer);
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Closed { error: None }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 3, delay } if delay == Duration::from_secs(4)
        ));

        socket.close();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(dialer.attempts(), 3);
        assert_eq!(socket.state(), SocketState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_backoff_restarts_schedule() {
        let dialer = MockDialer::new();
        dialer.push_error(io::ErrorKind::ConnectionRefused);
        let (link, peer) = mock_link_pair(LinkKind::Stream);
        dialer.push_link(link);

        let config = SocketConfig::new().with_reconnect(ReconnectPolicy::enabled(
            Duration::from_millis(500),
        ));
        let (socket, mut events) = TransportSocket::dial(dialer, &config);

        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 1, .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { .. }
        ));

        socket.reset_backoff();
        assert_eq!(socket.reconnect_attempts(), 0);
        drop(peer);

        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Closed { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 1, delay } if delay == Duration::from_millis(500)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_connect_cancels_retry() {
        let first = MockDialer::new();
        let config = SocketConfig::new().with_reconnect(ReconnectPolicy::enabled(
            Duration::from_secs(5),
        ));
        let (socket, mut events) = TransportSocket::dial(first.clone(), &config);
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { .. }
        ));

        let second = MockDialer::new();
        let (link, _peer) = mock_link_pair(LinkKind::Stream);
        second.push_link(link);
        socket.connect(second.clone());

        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { .. }
        ));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(first.attempts(), 1);
        assert_eq!(second.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_hands_over_to_reconnect() {
        let dialer = MockDialer::new();
        let (first, _first_peer) = mock_link_pair(LinkKind::Stream);
        let (second, _second_peer) = mock_link_pair(LinkKind::Stream);
        dialer.push_link(first);
        dialer.push_link(second);

        let config = SocketConfig::new().with_reconnect(ReconnectPolicy::enabled(
            Duration::from_secs(1),
        ));
        let (socket, mut events) = TransportSocket::dial(dialer.clone(), &config);
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { .. }
        ));

        socket.disconnect();
        match next_event(&mut events).await {
            SocketEvent::Closed { error: Some(e) } => assert!(!e.is_closed()),
            other => panic!("expected a failed close, got {other:?}"),
        }
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Reconnecting { attempt: 1, .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            SocketEvent::Connected { .. }
        ));
        assert_eq!(dialer.attempts(), 2);
    }
}
