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

//! Connection driver.
//!
//! Each connection runs as one task that owns its [`TransportSocket`], the
//! frame reader and the [`ConnectionMachine`]. Socket events, application
//! commands and timers are handled in a single `select!` loop, so the
//! machine sees its inputs one at a time and in order.
//!
//! ```text
//!   socket events ──┐
//!   commands ───────┼──► Driver ──► ConnectionMachine ──► actions
//!   deadlines ──────┘      │                                 │
//!                          ◄──── socket sends / session events
//! ```

use crate::error::TimeoutKind;
use crate::machine::{Action, ConnectionMachine, Input};
use crate::registry::{PeerId, SessionRegistry};
use crate::{negotiation, Config, ConnectionState, Error, SessionEvent};
use bytes::Bytes;
use flowctl_transport::{Link, SendStatus, SocketEvent, SocketEvents, SocketRole, TransportSocket};
use flowctl_wire::error_msg::{codes, ERROR_DATA_LEN};
use flowctl_wire::{validate, Body, DecodeError, ErrorMsg, FrameReader, Message, RawHeader};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

/// Commands queued per connection before senders wait.
const COMMAND_CAPACITY: usize = 64;

#[derive(Debug)]
pub(crate) enum Command {
    Request {
        body: Body,
        reply: oneshot::Sender<Result<u32, Error>>,
    },
    Notify {
        body: Body,
        reply: oneshot::Sender<Result<SendStatus, Error>>,
    },
    Close,
}

pub(crate) type CommandReceiver = mpsc::Receiver<Command>;

/// Handle to a running connection task.
///
/// Cheap to clone; every clone talks to the same task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    peer: PeerId,
    commands: mpsc::Sender<Command>,
    state: Arc<AtomicU8>,
}

impl ConnectionHandle {
    /// Returns the peer id of the connection.
    #[must_use]
    pub const fn peer(&self) -> PeerId {
        self.peer
    }

    /// Returns the current state of the connection.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true while the connection task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Sends a request and returns its transaction id.
    ///
    /// The reply arrives as a [`SessionEvent::Message`]; if none arrives
    /// within the request timeout a [`SessionEvent::RequestTimeout`] is
    /// emitted instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEstablished`] before the handshake completes,
    /// [`Error::NotARequest`] for bodies without a reply type,
    /// [`Error::Dropped`] if the send queue was full, and
    /// [`Error::SessionClosed`] once the connection task has stopped.
    pub async fn send_request(&self, body: Body) -> Result<u32, Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Request { body, reply })
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Sends a message that expects no reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEstablished`] before the handshake completes and
    /// [`Error::SessionClosed`] once the connection task has stopped. A
    /// full queue is reported as [`SendStatus::Dropped`], not an error.
    pub async fn send_notification(&self, body: Body) -> Result<SendStatus, Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Notify { body, reply })
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Closes the connection. Queued data is discarded and no reconnect
    /// is attempted.
    pub async fn close(&self) {
        if self.commands.send(Command::Close).await.is_err() {
            trace!(peer = %self.peer, "connection already stopped");
        }
    }

    /// Requests a close without waiting for queue space.
    pub(crate) fn close_now(&self) {
        match self.commands.try_send(Command::Close) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                let commands = self.commands.clone();
                tokio::spawn(async move {
                    let _ = commands.send(command).await;
                });
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(peer: PeerId) -> (Self, CommandReceiver) {
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = Self {
            peer,
            commands,
            state: Arc::new(AtomicU8::new(ConnectionState::Init as u8)),
        };
        (handle, rx)
    }
}

/// Shared pieces every connection task needs.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) events: mpsc::Sender<SessionEvent>,
}

/// Registers a connection for `socket` and starts its task.
pub(crate) fn spawn_connection<L: Link>(
    ctx: ConnectionContext,
    socket: TransportSocket<L>,
    socket_events: SocketEvents,
) -> ConnectionHandle {
    let peer = ctx.registry.next_peer_id();
    let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
    let state = Arc::new(AtomicU8::new(ConnectionState::Init as u8));
    let handle = ConnectionHandle {
        peer,
        commands,
        state: Arc::clone(&state),
    };
    // Registered before the task runs so it can always find itself.
    ctx.registry.insert(handle.clone());

    let driver = Driver {
        peer,
        machine: ConnectionMachine::new(&ctx.config),
        ctx,
        socket,
        frames: FrameReader::new(),
        state,
        phase: Phase::Down,
        next_echo: None,
        owner: None,
    };
    tokio::spawn(driver.run(socket_events, rx));
    handle
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No link.
    Down,
    /// Link up, waiting for the peer's hello.
    Hello { deadline: Instant },
    /// Version agreed; frames go to the machine.
    Up,
}

struct Driver<L: Link> {
    peer: PeerId,
    ctx: ConnectionContext,
    socket: TransportSocket<L>,
    frames: FrameReader,
    machine: ConnectionMachine,
    state: Arc<AtomicU8>,
    phase: Phase,
    next_echo: Option<Instant>,
    /// Main connection, once this connection is attached as an auxiliary
    /// channel.
    owner: Option<PeerId>,
}

impl<L: Link> Driver<L> {
    #[instrument(skip_all, name = "connection", fields(peer = %self.peer))]
    async fn run(mut self, mut socket_events: SocketEvents, mut commands: CommandReceiver) {
        loop {
            let wake = self.next_wake();
            tokio::select! {
                event = socket_events.recv() => {
                    let Some(event) = event else { break };
                    if !self.on_socket_event(event).await {
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Close) | None => {
                        self.close().await;
                        break;
                    }
                    Some(command) => self.on_command(command),
                },
                () = sleep_until(wake) => self.on_timer().await,
            }
        }
        self.finish();
    }

    /// Returns false when the task should end.
    async fn on_socket_event(&mut self, event: SocketEvent) -> bool {
        match event {
            SocketEvent::Connected { remote } => {
                info!(?remote, "link up");
                self.frames.clear();
                let hello = negotiation::local_hello(&self.ctx.config.versions, self.machine.next_xid());
                self.transmit(&hello);
                self.phase = Phase::Hello {
                    deadline: Instant::now() + self.ctx.config.hello_timeout,
                };
                true
            }
            SocketEvent::Data(data) => {
                self.on_data(&data).await;
                true
            }
            SocketEvent::Closed { error } => {
                match &error {
                    Some(e) => warn!(error = %e, "link lost"),
                    None => info!("link closed by peer"),
                }
                self.phase = Phase::Down;
                self.frames.clear();
                self.step(Input::Closed).await;
                // Only dialed main connections come back.
                self.socket.role() == SocketRole::Active
                    && self.ctx.config.reconnect
                    && self.machine.info().auxiliary_id() == 0
            }
            SocketEvent::Reconnecting { attempt, delay } => {
                info!(attempt, ?delay, "reconnect scheduled");
                true
            }
        }
    }

    async fn on_data(&mut self, data: &Bytes) {
        self.frames.extend(data);
        loop {
            match self.frames.read_frame() {
                Ok(Some(frame)) => {
                    self.on_frame(&frame).await;
                    if self.phase == Phase::Down {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "framing error, dropping link");
                    self.drop_link();
                    break;
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: &Bytes) {
        match self.phase {
            Phase::Down => {}
            Phase::Hello { .. } => self.negotiate(frame).await,
            Phase::Up => self.on_message(frame).await,
        }
    }

    async fn negotiate(&mut self, frame: &Bytes) {
        let config = Arc::clone(&self.ctx.config);
        let peer = match negotiation::read_peer_hello(frame) {
            Ok(peer) => peer,
            Err(e) => {
                warn!(error = %e, "hello exchange failed");
                self.drop_link();
                return;
            }
        };
        match negotiation::negotiate(&config.versions, &peer) {
            Ok(version) => {
                info!(%version, "version negotiated");
                self.phase = Phase::Up;
                self.step(Input::Connected { version }).await;
            }
            Err(e) => {
                warn!(error = %e, "hello exchange failed");
                self.transmit(&negotiation::hello_failure(&config.versions, &peer));
                self.drop_link();
            }
        }
    }

    async fn on_message(&mut self, frame: &Bytes) {
        let msg = match Message::decode(frame) {
            Ok(msg) => msg,
            Err(DecodeError::UnknownType { code, .. }) => {
                error!(code, "unknown message type, dropping link");
                self.reject(frame, codes::BAD_TYPE);
                self.drop_link();
                return;
            }
            Err(e) => {
                error!(error = %e, "undecodable message, dropping link");
                self.drop_link();
                return;
            }
        };
        if Some(msg.version) != self.machine.version() {
            error!(version = %msg.version, xid = msg.xid, "message in wrong version, dropping link");
            self.reject(frame, codes::BAD_VERSION);
            self.drop_link();
            return;
        }
        if let Err(e) = validate(&msg) {
            debug!(xid = msg.xid, msg_type = %msg.msg_type(), error = %e, "invalid message rejected");
            let reply = ErrorMsg::for_rejected(msg.version, &e, frame);
            self.transmit(&Message::new(msg.version, msg.xid, Body::Error(reply)));
            return;
        }
        trace!(xid = msg.xid, msg_type = %msg.msg_type(), "received");
        self.step(Input::Received(msg)).await;
    }

    /// Answers a frame that ends the link with a bad-request error.
    fn reject(&mut self, frame: &Bytes, code: u16) {
        let Some(version) = self.machine.version() else {
            return;
        };
        let xid = RawHeader::parse(frame).map(|h| h.xid).unwrap_or_default();
        let data = frame.slice(..frame.len().min(ERROR_DATA_LEN));
        let error = ErrorMsg::new(codes::BAD_REQUEST, code, data);
        self.transmit(&Message::new(version, xid, Body::Error(error)));
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Request { body, reply } => {
                let result = self.request(body);
                if reply.send(result).is_err() {
                    trace!("requester went away");
                }
            }
            Command::Notify { body, reply } => {
                let result = self.notify(body);
                if reply.send(result).is_err() {
                    trace!("notifier went away");
                }
            }
            Command::Close => {}
        }
    }

    fn request(&mut self, body: Body) -> Result<u32, Error> {
        let msg = self.machine.request(body, Instant::now().into_std())?;
        match self.send(&msg) {
            Ok(SendStatus::Dropped) => {
                self.machine.cancel(msg.xid);
                Err(Error::Dropped)
            }
            Ok(_) => Ok(msg.xid),
            Err(e) => {
                self.machine.cancel(msg.xid);
                Err(e)
            }
        }
    }

    fn notify(&mut self, body: Body) -> Result<SendStatus, Error> {
        let msg = self.machine.notification(body)?;
        self.send(&msg)
    }

    async fn on_timer(&mut self) {
        let now = Instant::now();
        if let Phase::Hello { deadline } = self.phase {
            if deadline <= now {
                warn!(error = %Error::Timeout(TimeoutKind::Hello), "dropping link");
                self.drop_link();
            }
        }
        if self.next_echo.is_some_and(|at| at <= now) {
            self.next_echo = self.ctx.config.echo_interval.map(|interval| now + interval);
            self.machine.push(Input::Keepalive);
        }
        self.step(Input::Tick).await;
    }

    fn next_wake(&self) -> Option<Instant> {
        let hello = match self.phase {
            Phase::Hello { deadline } => Some(deadline),
            Phase::Down | Phase::Up => None,
        };
        let transaction = self.machine.next_deadline().map(Instant::from_std);
        [hello, transaction, self.next_echo]
            .into_iter()
            .flatten()
            .min()
    }

    async fn step(&mut self, input: Input) {
        let actions = self.machine.handle(input, Instant::now().into_std());
        for action in actions {
            self.apply(action).await;
        }
        self.state
            .store(self.machine.state() as u8, Ordering::Release);
    }

    async fn apply(&mut self, action: Action) {
        match action {
            Action::Send(msg) => self.transmit(&msg),
            Action::Deliver(message) => {
                let event = SessionEvent::Message {
                    peer: self.owner.unwrap_or(self.peer),
                    auxiliary_id: self.machine.info().auxiliary_id(),
                    message,
                };
                self.emit(event).await;
            }
            Action::Opened => self.opened().await,
            Action::Closed => self.closed().await,
            Action::RequestTimeout(tx) => {
                let event = SessionEvent::RequestTimeout {
                    peer: self.owner.unwrap_or(self.peer),
                    xid: tx.xid,
                    expected: tx.expected_type,
                    sub_type: tx.sub_type,
                };
                self.emit(event).await;
            }
            Action::Disconnect => self.drop_link(),
        }
    }

    async fn opened(&mut self) {
        self.socket.reset_backoff();
        self.next_echo = self
            .ctx
            .config
            .echo_interval
            .map(|interval| Instant::now() + interval);

        let info = self.machine.info().clone();
        let auxiliary_id = info.auxiliary_id();
        if auxiliary_id != 0 {
            match self
                .ctx
                .registry
                .attach_auxiliary(self.peer, info.datapath_id(), auxiliary_id)
            {
                Some(main) => {
                    info!(%main, auxiliary_id, "auxiliary channel attached");
                    self.owner = Some(main);
                }
                None => {
                    warn!(
                        datapath_id = format_args!("{:016x}", info.datapath_id()),
                        auxiliary_id,
                        "no main connection for auxiliary channel"
                    );
                    self.drop_link();
                }
            }
            return;
        }

        self.ctx.registry.set_datapath(self.peer, info.datapath_id());
        self.emit(SessionEvent::ConnectionOpened {
            peer: self.peer,
            info,
        })
        .await;
    }

    async fn closed(&mut self) {
        self.next_echo = None;
        let auxiliary_id = self.machine.info().auxiliary_id();
        if auxiliary_id != 0 {
            if let Some(main) = self.owner.take() {
                self.ctx.registry.detach_auxiliary(main, self.peer, auxiliary_id);
                debug!(%main, auxiliary_id, "auxiliary channel detached");
            }
            return;
        }

        self.ctx.registry.clear_datapath(self.peer);
        for channel in self.ctx.registry.take_auxiliaries(self.peer) {
            channel.close_now();
        }
        self.emit(SessionEvent::ConnectionClosed { peer: self.peer })
            .await;
    }

    async fn close(&mut self) {
        info!("closing connection");
        self.socket.close();
        self.phase = Phase::Down;
        self.frames.clear();
        self.step(Input::Closed).await;
    }

    fn finish(&mut self) {
        self.socket.close();
        if let Some(main) = self.owner.take() {
            let auxiliary_id = self.machine.info().auxiliary_id();
            self.ctx.registry.detach_auxiliary(main, self.peer, auxiliary_id);
        }
        for channel in self.ctx.registry.remove(self.peer) {
            channel.close_now();
        }
        self.state
            .store(ConnectionState::Disconnected as u8, Ordering::Release);
        debug!("connection task finished");
    }

    /// Drops the link; the socket reports the close and applies its
    /// reconnect policy.
    fn drop_link(&mut self) {
        self.phase = Phase::Down;
        self.frames.clear();
        self.socket.disconnect();
    }

    fn send(&self, msg: &Message) -> Result<SendStatus, Error> {
        let bytes = msg.to_bytes()?;
        let status = self.socket.send(bytes)?;
        trace!(xid = msg.xid, msg_type = %msg.msg_type(), %status, "sent");
        Ok(status)
    }

    /// Sends a message the machine or driver produced; failures are only
    /// logged since the socket reports them as a close.
    fn transmit(&self, msg: &Message) {
        match self.send(msg) {
            Ok(SendStatus::Dropped) => {
                warn!(xid = msg.xid, msg_type = %msg.msg_type(), "send queue full, message dropped");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(xid = msg.xid, msg_type = %msg.msg_type(), error = %e, "send failed");
            }
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if self.ctx.events.send(event).await.is_err() {
            trace!("session event receiver dropped");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
