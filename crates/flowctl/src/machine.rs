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

//! Connection state machine.
//!
//! [`ConnectionMachine`] runs the controller side of the handshake and
//! correlates replies for one control connection. It performs no I/O:
//! the driver queues [`Input`]s, calls [`process`](ConnectionMachine::process)
//! and carries out the returned [`Action`]s. Inputs are handled strictly
//! in arrival order.
//!
//! The transition function is total. A (state, input) pair with no
//! defined transition is logged and ignored.

use crate::multipart::MultipartAssembler;
use crate::transactions::{Transaction, TransactionTable};
use crate::{Config, ConnectionState, Error};
use bytes::Bytes;
use flowctl_wire::packet::NO_BUFFER;
use flowctl_wire::stats::TableStats;
use flowctl_wire::{
    Body, FeaturesReply, Message, MessageType, Port, StatsReplyBody, StatsRequest,
    StatsRequestBody, SwitchConfig, TableFeatures, Version,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Something that happened to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// The link is up and hello negotiation agreed on `version`.
    Connected {
        /// Negotiated protocol version.
        version: Version,
    },
    /// A decoded, validated message arrived.
    Received(Message),
    /// The link went down.
    Closed,
    /// A deadline may have passed.
    Tick,
    /// Time to send the peer an echo request.
    Keepalive,
}

/// Something the driver must do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send a message to the peer.
    Send(Message),
    /// Hand a message to the application.
    Deliver(Message),
    /// The handshake completed.
    Opened,
    /// An established connection was lost.
    Closed,
    /// An application request got no reply in time.
    RequestTimeout(Transaction),
    /// Drop the link; the handshake or keep-alive failed.
    Disconnect,
}

/// What the handshake learned about the datapath.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatapathInfo {
    /// Negotiated version.
    pub version: Option<Version>,
    /// Features reply.
    pub features: FeaturesReply,
    /// Switch configuration.
    pub config: Option<SwitchConfig>,
    /// Table counters (1.2).
    pub tables: Vec<TableStats>,
    /// Table capabilities (1.3).
    pub table_features: Vec<TableFeatures>,
    /// Ports, from the features reply or the port descriptions (1.3).
    pub ports: Vec<Port>,
}

impl DatapathInfo {
    /// Datapath id.
    #[must_use]
    pub const fn datapath_id(&self) -> u64 {
        self.features.datapath_id
    }

    /// Auxiliary connection id; zero for the main connection.
    #[must_use]
    pub const fn auxiliary_id(&self) -> u8 {
        self.features.auxiliary_id
    }
}

/// Controller-side state machine of one connection.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    version: Option<Version>,
    transactions: TransactionTable,
    multipart: MultipartAssembler,
    inputs: VecDeque<Input>,
    info: DatapathInfo,
    /// Transaction of the pending handshake step.
    handshake_xid: Option<u32>,
    /// Transaction of the outstanding keep-alive echo.
    echo_xid: Option<u32>,
    next_buffer_id: u32,
    handshake_timeout: Duration,
    request_timeout: Duration,
}

impl ConnectionMachine {
    /// Creates a machine in the `Init` state.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            state: ConnectionState::Init,
            version: None,
            transactions: TransactionTable::new(),
            multipart: MultipartAssembler::with_max_parts(config.max_multipart_parts),
            inputs: VecDeque::new(),
            info: DatapathInfo::default(),
            handshake_xid: None,
            echo_xid: None,
            next_buffer_id: 0,
            handshake_timeout: config.handshake_timeout,
            request_timeout: config.request_timeout,
        }
    }

    /// Queues an input for the next [`process`](Self::process) call.
    pub fn push(&mut self, input: Input) {
        self.inputs.push_back(input);
    }

    /// Handles every queued input in order and returns the resulting
    /// actions.
    pub fn process(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Some(input) = self.inputs.pop_front() {
            self.step(input, now, &mut actions);
        }
        actions
    }

    /// Queues `input` and processes the queue.
    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Action> {
        self.push(input);
        self.process(now)
    }

    /// Builds an application request and registers its transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEstablished`] before the handshake completes
    /// and [`Error::NotARequest`] for message types without a reply.
    pub fn request(&mut self, body: Body, now: Instant) -> Result<Message, Error> {
        let version = self.established_version()?;
        let msg_type = body.msg_type();
        let expected = msg_type
            .reply_type()
            .ok_or(Error::NotARequest(msg_type))?;
        let sub_type = match &body {
            Body::StatsRequest(req) => Some(req.body.stats_type()),
            _ => None,
        };
        let xid = self
            .transactions
            .allocate(expected, sub_type, self.request_timeout, now);
        trace!(xid, %msg_type, "request");
        Ok(Message::new(version, xid, body))
    }

    /// Builds a message that expects no reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEstablished`] before the handshake completes.
    pub fn notification(&mut self, body: Body) -> Result<Message, Error> {
        let version = self.established_version()?;
        let xid = self.transactions.next_async_xid();
        Ok(Message::new(version, xid, body))
    }

    /// Returns an xid for a message that needs no transaction, such as
    /// the hello.
    pub fn next_xid(&mut self) -> u32 {
        self.transactions.next_async_xid()
    }

    /// Allocates a controller-side packet buffer id for this session.
    ///
    /// Ids start at zero on every link, wrap around and never take the
    /// no-buffer value.
    pub fn allocate_buffer_id(&mut self) -> u32 {
        if self.next_buffer_id == NO_BUFFER {
            self.next_buffer_id = 0;
        }
        let id = self.next_buffer_id;
        self.next_buffer_id = self.next_buffer_id.wrapping_add(1);
        id
    }

    /// Forgets a request that never left, e.g. because its send was
    /// dropped.
    pub fn cancel(&mut self, xid: u32) -> Option<Transaction> {
        self.multipart.discard(xid);
        self.transactions.complete(xid)
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the negotiated version of the current link.
    #[must_use]
    pub const fn version(&self) -> Option<Version> {
        self.version
    }

    /// Returns what the handshake learned so far.
    #[must_use]
    pub const fn info(&self) -> &DatapathInfo {
        &self.info
    }

    /// Returns the live transactions.
    #[must_use]
    pub const fn transactions(&self) -> &TransactionTable {
        &self.transactions
    }

    /// Earliest transaction deadline; the driver feeds a
    /// [`Input::Tick`] once it passes.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.transactions.next_deadline()
    }

    fn established_version(&self) -> Result<Version, Error> {
        match (self.state, self.version) {
            (ConnectionState::Established, Some(version)) => Ok(version),
            (state, _) => Err(Error::NotEstablished { state }),
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "unexpected connection transition");
        }
        trace!(from = %self.state, to = %next, "connection state");
        self.state = next;
    }

    fn step(&mut self, input: Input, now: Instant, actions: &mut Vec<Action>) {
        use ConnectionState::{Disconnected, Init};

        match (self.state, input) {
            (Disconnected, input @ Input::Connected { .. }) => {
                // Reconnected: start over, then handle the connect.
                self.set_state(Init);
                self.inputs.push_front(input);
            }
            (Init, Input::Connected { version }) => self.start(version, now, actions),
            (Init | Disconnected, Input::Received(msg)) => {
                debug!(state = %self.state, msg_type = %msg.msg_type(), xid = msg.xid, "message before handshake ignored");
            }
            (Init | Disconnected, Input::Closed | Input::Keepalive) => {
                trace!(state = %self.state, "ignored");
            }
            (state, Input::Connected { .. }) => {
                warn!(%state, "connect event on a live connection ignored");
            }
            (_, Input::Closed) => self.disconnect(actions),
            (_, Input::Tick) => self.sweep(now, actions),
            (_, Input::Keepalive) => self.keepalive(now, actions),
            (_, Input::Received(msg)) => self.receive(msg, now, actions),
        }
    }

    fn start(&mut self, version: Version, now: Instant, actions: &mut Vec<Action>) {
        self.version = Some(version);
        self.info = DatapathInfo {
            version: Some(version),
            ..DatapathInfo::default()
        };
        self.transactions.clear();
        self.multipart.clear();
        self.echo_xid = None;
        self.next_buffer_id = 0;
        self.set_state(ConnectionState::Connected);
        self.handshake_request(Body::FeaturesRequest, now, actions);
    }

    fn handshake_request(&mut self, body: Body, now: Instant, actions: &mut Vec<Action>) {
        let Some(version) = self.version else {
            return;
        };
        let msg_type = body.msg_type();
        let Some(expected) = msg_type.reply_type() else {
            return;
        };
        let sub_type = match &body {
            Body::StatsRequest(req) => Some(req.body.stats_type()),
            _ => None,
        };
        let xid = self
            .transactions
            .allocate(expected, sub_type, self.handshake_timeout, now);
        self.handshake_xid = Some(xid);
        debug!(xid, %msg_type, state = %self.state, "handshake request");
        actions.push(Action::Send(Message::new(version, xid, body)));
    }

    fn discovery_request(&mut self, body: StatsRequestBody, now: Instant, actions: &mut Vec<Action>) {
        self.handshake_request(Body::StatsRequest(StatsRequest::new(body)), now, actions);
    }

    fn establish(&mut self, actions: &mut Vec<Action>) {
        self.handshake_xid = None;
        self.set_state(ConnectionState::Established);
        info!(
            datapath_id = format_args!("{:016x}", self.info.datapath_id()),
            auxiliary_id = self.info.auxiliary_id(),
            version = ?self.version,
            "connection established"
        );
        actions.push(Action::Opened);
    }

    /// Moves to `Disconnected`, dropping all transactions.
    fn disconnect(&mut self, actions: &mut Vec<Action>) {
        if matches!(
            self.state,
            ConnectionState::Init | ConnectionState::Disconnected
        ) {
            return;
        }
        let was_established = self.state.is_established();
        let dropped = self.transactions.len();
        self.transactions.clear();
        self.multipart.clear();
        self.handshake_xid = None;
        self.echo_xid = None;
        self.set_state(ConnectionState::Disconnected);
        if was_established {
            info!(dropped, "connection closed");
            actions.push(Action::Closed);
        } else {
            debug!(dropped, "handshake abandoned");
        }
    }

    /// Disconnects and asks the driver to drop the link.
    fn abort(&mut self, actions: &mut Vec<Action>) {
        if !matches!(
            self.state,
            ConnectionState::Init | ConnectionState::Disconnected
        ) {
            self.disconnect(actions);
            actions.push(Action::Disconnect);
        }
    }

    fn sweep(&mut self, now: Instant, actions: &mut Vec<Action>) {
        for tx in self.transactions.sweep(now) {
            self.multipart.discard(tx.xid);
            if self.handshake_xid == Some(tx.xid) {
                warn!(xid = tx.xid, expected = %tx.expected_type, state = %self.state, "handshake step timed out");
                self.abort(actions);
            } else if self.echo_xid == Some(tx.xid) {
                warn!(xid = tx.xid, "echo timed out");
                self.abort(actions);
            } else {
                debug!(xid = tx.xid, expected = %tx.expected_type, "request timed out");
                actions.push(Action::RequestTimeout(tx));
            }
        }
    }

    fn keepalive(&mut self, now: Instant, actions: &mut Vec<Action>) {
        if !self.state.is_established() || self.echo_xid.is_some() {
            return;
        }
        let Some(version) = self.version else {
            return;
        };
        let xid = self
            .transactions
            .allocate(MessageType::EchoReply, None, self.request_timeout, now);
        self.echo_xid = Some(xid);
        trace!(xid, "keepalive");
        actions.push(Action::Send(Message::new(
            version,
            xid,
            Body::EchoRequest(Bytes::new()),
        )));
    }

    fn receive(&mut self, msg: Message, now: Instant, actions: &mut Vec<Action>) {
        let msg_type = msg.msg_type();
        match msg.body {
            Body::EchoRequest(data) => {
                trace!(xid = msg.xid, "echo");
                actions.push(Action::Send(Message::new(
                    msg.version,
                    msg.xid,
                    Body::EchoReply(data),
                )));
                return;
            }
            Body::Hello(_) => {
                debug!(xid = msg.xid, "repeated hello ignored");
                return;
            }
            _ => {}
        }

        let is_reply = matches!(
            msg_type,
            MessageType::EchoReply
                | MessageType::FeaturesReply
                | MessageType::GetConfigReply
                | MessageType::StatsReply
                | MessageType::BarrierReply
                | MessageType::QueueGetConfigReply
                | MessageType::RoleReply
                | MessageType::GetAsyncReply
        );
        if is_reply || msg_type == MessageType::Error {
            self.correlate(msg, now, actions);
        } else {
            self.deliver(msg, actions);
        }
    }

    fn correlate(&mut self, msg: Message, now: Instant, actions: &mut Vec<Action>) {
        let msg_type = msg.msg_type();
        let xid = msg.xid;
        let stats_type = match &msg.body {
            Body::StatsReply(reply) => Some(reply.body.stats_type()),
            _ => None,
        };
        match self.transactions.peek(xid).map(|tx| (tx.expected_type, tx.sub_type)) {
            None if msg_type == MessageType::Error => {
                // Errors answer notifications too, which have no
                // transaction.
                self.deliver(msg, actions);
                return;
            }
            None => {
                warn!(xid, %msg_type, "uncorrelated reply discarded");
                return;
            }
            Some((expected, _)) if msg_type != MessageType::Error && expected != msg_type => {
                warn!(xid, %msg_type, %expected, "reply of wrong type discarded");
                return;
            }
            Some((_, Some(sub_type))) if stats_type.is_some_and(|t| t != sub_type) => {
                warn!(xid, ?stats_type, expected = ?sub_type, "reply of wrong type discarded");
                return;
            }
            Some(_) => {}
        }

        let msg = match msg.body {
            Body::StatsReply(part) => match self.multipart.push(xid, part) {
                Ok(Some(joined)) => Message::new(msg.version, xid, Body::StatsReply(joined)),
                Ok(None) => return,
                Err(e) => {
                    warn!(xid, error = %e, "multipart reply dropped");
                    self.transactions.complete(xid);
                    if self.handshake_xid == Some(xid) {
                        self.abort(actions);
                    }
                    return;
                }
            },
            body => Message::new(msg.version, xid, body),
        };

        self.multipart.discard(xid);
        self.transactions.complete(xid);
        if self.handshake_xid == Some(xid) {
            self.advance(msg, now, actions);
        } else if self.echo_xid == Some(xid) {
            trace!(xid, "keepalive answered");
            self.echo_xid = None;
            if let Body::Error(err) = &msg.body {
                debug!(err_type = err.err_type, code = err.code, "echo answered with an error");
            }
        } else {
            self.deliver(msg, actions);
        }
    }

    fn deliver(&mut self, msg: Message, actions: &mut Vec<Action>) {
        if self.state.is_established() {
            actions.push(Action::Deliver(msg));
        } else {
            debug!(state = %self.state, msg_type = %msg.msg_type(), xid = msg.xid, "message during handshake ignored");
        }
    }

    /// Takes the reply to the pending handshake step.
    fn advance(&mut self, msg: Message, now: Instant, actions: &mut Vec<Action>) {
        use ConnectionState::{ConfigReceived, Connected, FeaturesReceived};

        self.handshake_xid = None;
        match (self.state, msg.body) {
            (_, Body::Error(err)) => {
                warn!(
                    state = %self.state,
                    err_type = err.err_type,
                    code = err.code,
                    "handshake request rejected"
                );
                self.abort(actions);
            }
            (Connected, Body::FeaturesReply(features)) => {
                debug!(
                    datapath_id = format_args!("{:016x}", features.datapath_id),
                    n_tables = features.n_tables,
                    n_buffers = features.n_buffers,
                    auxiliary_id = features.auxiliary_id,
                    "features"
                );
                self.info.ports.clone_from(&features.ports);
                let auxiliary = features.auxiliary_id != 0;
                self.info.features = features;
                self.set_state(FeaturesReceived);
                if auxiliary {
                    // Auxiliary channels borrow the main connection's
                    // configuration.
                    self.establish(actions);
                } else {
                    self.handshake_request(Body::GetConfigRequest, now, actions);
                }
            }
            (FeaturesReceived, Body::GetConfigReply(config)) => {
                self.info.config = Some(config);
                match self.version {
                    Some(Version::V1_2) => {
                        self.set_state(ConfigReceived);
                        self.discovery_request(StatsRequestBody::Table, now, actions);
                    }
                    Some(Version::V1_3) => {
                        self.set_state(ConfigReceived);
                        self.discovery_request(StatsRequestBody::TableFeatures(Vec::new()), now, actions);
                    }
                    _ => self.establish(actions),
                }
            }
            (ConfigReceived, Body::StatsReply(reply)) => match reply.body {
                StatsReplyBody::Table(tables) => {
                    self.info.tables = tables;
                    self.establish(actions);
                }
                StatsReplyBody::TableFeatures(features) => {
                    self.info.table_features = features;
                    self.discovery_request(StatsRequestBody::PortDesc, now, actions);
                }
                StatsReplyBody::PortDesc(ports) => {
                    self.info.ports = ports;
                    self.establish(actions);
                }
                other => {
                    warn!(stats_type = ?other.stats_type(), "unexpected discovery reply");
                    self.abort(actions);
                }
            },
            (state, body) => {
                warn!(%state, msg_type = %body.msg_type(), "unexpected handshake reply");
                self.abort(actions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowctl_wire::stats::STATS_MORE;
    use flowctl_wire::{ErrorMsg, PortStatus, StatsReply, StatsType};

    const DPID: u64 = 0x0000_0a0b_0c0d_0e0f;

    fn features(auxiliary_id: u8) -> FeaturesReply {
        FeaturesReply {
            datapath_id: DPID,
            n_buffers: 256,
            n_tables: 4,
            auxiliary_id,
            ..FeaturesReply::default()
        }
    }

    fn only_send(actions: Vec<Action>) -> Message {
        match actions.as_slice() {
            [Action::Send(msg)] => msg.clone(),
            other => panic!("expected a single send, got {other:?}"),
        }
    }

    fn reply_to(request: &Message, body: Body) -> Input {
        Input::Received(Message::new(request.version, request.xid, body))
    }

    fn stats(body: StatsReplyBody, more: bool) -> Body {
        Body::StatsReply(StatsReply {
            flags: if more { STATS_MORE } else { 0 },
            body,
        })
    }

    fn port_status() -> Message {
        Message::new(
            Version::V1_3,
            77,
            Body::PortStatus(PortStatus {
                reason: 2,
                desc: Port::default(),
            }),
        )
    }

    /// Drives a machine through the handshake for `version`.
    fn established(version: Version, now: Instant) -> ConnectionMachine {
        let mut machine = ConnectionMachine::new(&Config::new());
        let request = only_send(machine.handle(Input::Connected { version }, now));
        let mut actions = machine.handle(reply_to(&request, Body::FeaturesReply(features(0))), now);
        let request = only_send(actions);
        actions = machine.handle(
            reply_to(&request, Body::GetConfigReply(SwitchConfig::default())),
            now,
        );
        if version == Version::V1_0 {
            assert_eq!(actions, vec![Action::Opened]);
            return machine;
        }
        let request = only_send(actions);
        if version == Version::V1_2 {
            actions = machine.handle(reply_to(&request, stats(StatsReplyBody::Table(Vec::new()), false)), now);
            assert_eq!(actions, vec![Action::Opened]);
            return machine;
        }
        let request_ports = only_send(machine.handle(
            reply_to(&request, stats(StatsReplyBody::TableFeatures(Vec::new()), false)),
            now,
        ));
        actions = machine.handle(
            reply_to(&request_ports, stats(StatsReplyBody::PortDesc(Vec::new()), false)),
            now,
        );
        assert_eq!(actions, vec![Action::Opened]);
        machine
    }

    #[test]
    fn handshake_1_3_with_multipart_discovery() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        assert_eq!(machine.state(), ConnectionState::Init);

        let request = only_send(machine.handle(
            Input::Connected {
                version: Version::V1_3,
            },
            now,
        ));
        assert_eq!(request.body, Body::FeaturesRequest);
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert_eq!(machine.transactions().len(), 1);

        let request = only_send(machine.handle(reply_to(&request, Body::FeaturesReply(features(0))), now));
        assert_eq!(request.body, Body::GetConfigRequest);
        assert_eq!(machine.state(), ConnectionState::FeaturesReceived);
        assert_eq!(machine.info().datapath_id(), DPID);

        let request = only_send(machine.handle(
            reply_to(&request, Body::GetConfigReply(SwitchConfig::default())),
            now,
        ));
        assert_eq!(machine.state(), ConnectionState::ConfigReceived);
        assert!(matches!(
            &request.body,
            Body::StatsRequest(req) if matches!(req.body, StatsRequestBody::TableFeatures(_))
        ));

        let table = |table_id| TableFeatures {
            table_id,
            ..TableFeatures::default()
        };
        let first = machine.handle(
            reply_to(&request, stats(StatsReplyBody::TableFeatures(vec![table(0)]), true)),
            now,
        );
        assert!(first.is_empty());
        assert_eq!(machine.state(), ConnectionState::ConfigReceived);

        let request = only_send(machine.handle(
            reply_to(&request, stats(StatsReplyBody::TableFeatures(vec![table(1)]), false)),
            now,
        ));
        assert!(matches!(
            &request.body,
            Body::StatsRequest(req) if req.body == StatsRequestBody::PortDesc
        ));
        assert_eq!(machine.info().table_features.len(), 2);

        let ports = vec![Port {
            port_no: 1,
            ..Port::default()
        }];
        let actions = machine.handle(
            reply_to(&request, stats(StatsReplyBody::PortDesc(ports.clone()), false)),
            now,
        );
        assert_eq!(actions, vec![Action::Opened]);
        assert_eq!(machine.state(), ConnectionState::Established);
        assert_eq!(machine.info().ports, ports);
        assert!(machine.transactions().is_empty());
    }

    #[test]
    fn stats_reply_of_wrong_kind_is_discarded() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        let request = only_send(machine.handle(Input::Connected { version: Version::V1_3 }, now));
        let request = only_send(machine.handle(reply_to(&request, Body::FeaturesReply(features(0))), now));
        let request = only_send(machine.handle(
            reply_to(&request, Body::GetConfigReply(SwitchConfig::default())),
            now,
        ));
        assert_eq!(
            machine.transactions().peek(request.xid).and_then(|tx| tx.sub_type),
            Some(StatsType::TableFeatures)
        );

        // Port descriptions on the table-features xid must not skip ahead.
        let actions = machine.handle(
            reply_to(&request, stats(StatsReplyBody::PortDesc(Vec::new()), false)),
            now,
        );
        assert!(actions.is_empty());
        assert_eq!(machine.state(), ConnectionState::ConfigReceived);
        assert!(machine.transactions().peek(request.xid).is_some());

        let next = only_send(machine.handle(
            reply_to(&request, stats(StatsReplyBody::TableFeatures(Vec::new()), false)),
            now,
        ));
        assert!(matches!(
            &next.body,
            Body::StatsRequest(req) if req.body == StatsRequestBody::PortDesc
        ));

        // Same rule for application requests.
        let mut machine = established(Version::V1_3, now);
        let request = machine
            .request(Body::StatsRequest(StatsRequest::new(StatsRequestBody::Desc)), now)
            .expect("request should succeed");
        let wrong = machine.handle(reply_to(&request, stats(StatsReplyBody::Table(Vec::new()), false)), now);
        assert!(wrong.is_empty());
        assert_eq!(machine.transactions().len(), 1);
    }

    #[test]
    fn oversized_discovery_reply_disconnects() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new().with_max_multipart_parts(2));
        let request = only_send(machine.handle(Input::Connected { version: Version::V1_3 }, now));
        let request = only_send(machine.handle(reply_to(&request, Body::FeaturesReply(features(0))), now));
        let request = only_send(machine.handle(
            reply_to(&request, Body::GetConfigReply(SwitchConfig::default())),
            now,
        ));

        for _ in 0..2 {
            let actions = machine.handle(
                reply_to(&request, stats(StatsReplyBody::TableFeatures(Vec::new()), true)),
                now,
            );
            assert!(actions.is_empty());
        }
        let actions = machine.handle(
            reply_to(&request, stats(StatsReplyBody::TableFeatures(Vec::new()), true)),
            now,
        );
        assert_eq!(actions, vec![Action::Disconnect]);
        assert!(machine.state().is_disconnected());
    }

    #[test]
    fn handshake_1_0_skips_discovery() {
        let machine = established(Version::V1_0, Instant::now());
        assert_eq!(machine.state(), ConnectionState::Established);
        assert_eq!(machine.version(), Some(Version::V1_0));
        assert!(machine.info().tables.is_empty());
    }

    #[test]
    fn handshake_1_2_reads_table_stats() {
        let machine = established(Version::V1_2, Instant::now());
        assert_eq!(machine.state(), ConnectionState::Established);
        assert!(machine.info().config.is_some());
    }

    #[test]
    fn auxiliary_channel_skips_config() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        let request = only_send(machine.handle(
            Input::Connected {
                version: Version::V1_3,
            },
            now,
        ));
        let actions = machine.handle(reply_to(&request, Body::FeaturesReply(features(2))), now);
        assert_eq!(actions, vec![Action::Opened]);
        assert_eq!(machine.info().auxiliary_id(), 2);
        assert!(machine.state().is_established());
    }

    #[test]
    fn uncorrelated_reply_is_discarded() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        let request = machine
            .request(Body::BarrierRequest, now)
            .expect("request should succeed");

        let stray = Message::new(Version::V1_3, request.xid.wrapping_add(1000), Body::BarrierReply);
        assert!(machine.handle(Input::Received(stray), now).is_empty());
        assert_eq!(machine.state(), ConnectionState::Established);
        assert_eq!(machine.transactions().len(), 1);

        // Right xid, wrong type: also dropped, transaction stays live.
        let wrong = Message::new(Version::V1_3, request.xid, Body::EchoReply(Bytes::new()));
        assert!(machine.handle(Input::Received(wrong), now).is_empty());
        assert!(machine.transactions().peek(request.xid).is_some());

        let answer = Message::new(Version::V1_3, request.xid, Body::BarrierReply);
        assert_eq!(
            machine.handle(Input::Received(answer.clone()), now),
            vec![Action::Deliver(answer)]
        );
        assert!(machine.transactions().is_empty());
    }

    #[test]
    fn handshake_expiry_disconnects() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        machine.handle(
            Input::Connected {
                version: Version::V1_3,
            },
            now,
        );

        assert!(machine
            .handle(Input::Tick, now + Duration::from_secs(4))
            .is_empty());
        assert_eq!(machine.state(), ConnectionState::Connected);

        let actions = machine.handle(Input::Tick, now + Duration::from_secs(5));
        assert_eq!(actions, vec![Action::Disconnect]);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(machine.transactions().is_empty());
    }

    #[test]
    fn request_timeout_is_reported() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        let request = machine
            .request(
                Body::StatsRequest(StatsRequest::new(StatsRequestBody::Desc)),
                now,
            )
            .expect("request should succeed");

        let actions = machine.handle(Input::Tick, now + Duration::from_secs(5));
        match actions.as_slice() {
            [Action::RequestTimeout(tx)] => {
                assert_eq!(tx.xid, request.xid);
                assert_eq!(tx.expected_type, MessageType::StatsReply);
                assert_eq!(tx.sub_type, Some(flowctl_wire::StatsType::Desc));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(machine.state().is_established());
    }

    #[test]
    fn closed_fires_once_for_established() {
        let now = Instant::now();
        let mut machine = established(Version::V1_0, now);
        machine
            .request(Body::BarrierRequest, now)
            .expect("request should succeed");

        assert_eq!(machine.handle(Input::Closed, now), vec![Action::Closed]);
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(machine.transactions().is_empty());
        assert!(machine.handle(Input::Closed, now).is_empty());
    }

    #[test]
    fn closed_during_handshake_is_silent() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        machine.handle(
            Input::Connected {
                version: Version::V1_2,
            },
            now,
        );
        assert!(machine.handle(Input::Closed, now).is_empty());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn reconnect_restarts_handshake() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        machine.handle(Input::Closed, now);

        let request = only_send(machine.handle(
            Input::Connected {
                version: Version::V1_0,
            },
            now,
        ));
        assert_eq!(request.body, Body::FeaturesRequest);
        assert_eq!(request.version, Version::V1_0);
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert_eq!(machine.info().datapath_id(), 0);
    }

    #[test]
    fn handshake_error_reply_disconnects() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        let request = only_send(machine.handle(
            Input::Connected {
                version: Version::V1_3,
            },
            now,
        ));
        let actions = machine.handle(
            reply_to(&request, Body::Error(ErrorMsg::new(1, 1, Bytes::new()))),
            now,
        );
        assert_eq!(actions, vec![Action::Disconnect]);
        assert!(machine.state().is_disconnected());
    }

    #[test]
    fn echo_requests_are_answered_during_handshake() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        machine.handle(
            Input::Connected {
                version: Version::V1_3,
            },
            now,
        );
        let echo = Message::new(Version::V1_3, 55, Body::EchoRequest(Bytes::from_static(b"hi")));
        let reply = only_send(machine.handle(Input::Received(echo), now));
        assert_eq!(reply.xid, 55);
        assert_eq!(reply.body, Body::EchoReply(Bytes::from_static(b"hi")));
    }

    #[test]
    fn async_messages_wait_for_established() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        machine.handle(
            Input::Connected {
                version: Version::V1_3,
            },
            now,
        );
        assert!(machine.handle(Input::Received(port_status()), now).is_empty());

        let mut machine = established(Version::V1_3, now);
        assert_eq!(
            machine.handle(Input::Received(port_status()), now),
            vec![Action::Deliver(port_status())]
        );
    }

    #[test]
    fn errors_for_notifications_are_delivered() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        let barrier = machine
            .notification(Body::BarrierRequest)
            .expect("notification should succeed");
        assert!(machine.transactions().is_empty());

        let error = Message::new(
            Version::V1_3,
            barrier.xid,
            Body::Error(ErrorMsg::new(5, 0, Bytes::new())),
        );
        assert_eq!(
            machine.handle(Input::Received(error.clone()), now),
            vec![Action::Deliver(error)]
        );
    }

    #[test]
    fn keepalive_expiry_closes() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        let echo = only_send(machine.handle(Input::Keepalive, now));
        assert!(matches!(echo.body, Body::EchoRequest(_)));

        // A second echo waits for the first.
        assert!(machine.handle(Input::Keepalive, now).is_empty());

        let actions = machine.handle(Input::Tick, now + Duration::from_secs(5));
        assert_eq!(actions, vec![Action::Closed, Action::Disconnect]);
    }

    #[test]
    fn keepalive_reply_is_consumed() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        let echo = only_send(machine.handle(Input::Keepalive, now));
        assert!(machine
            .handle(reply_to(&echo, Body::EchoReply(Bytes::new())), now)
            .is_empty());
        assert!(machine.transactions().is_empty());
        assert_eq!(only_send(machine.handle(Input::Keepalive, now)).body, Body::EchoRequest(Bytes::new()));
    }

    #[test]
    fn requests_need_established_and_a_reply_type() {
        let now = Instant::now();
        let mut machine = ConnectionMachine::new(&Config::new());
        assert!(matches!(
            machine.request(Body::BarrierRequest, now),
            Err(Error::NotEstablished {
                state: ConnectionState::Init
            })
        ));

        let mut machine = established(Version::V1_3, now);
        assert!(matches!(
            machine.request(Body::PortStatus(PortStatus { reason: 0, desc: Port::default() }), now),
            Err(Error::NotARequest(MessageType::PortStatus))
        ));
        let request = machine
            .request(Body::BarrierRequest, now)
            .expect("request should succeed");
        assert!(machine.cancel(request.xid).is_some());
        assert!(machine.transactions().is_empty());
    }

    #[test]
    fn buffer_ids_skip_no_buffer() {
        let now = Instant::now();
        let mut machine = established(Version::V1_3, now);
        assert_eq!(machine.allocate_buffer_id(), 0);
        assert_eq!(machine.allocate_buffer_id(), 1);

        machine.next_buffer_id = NO_BUFFER - 1;
        assert_eq!(machine.allocate_buffer_id(), NO_BUFFER - 1);
        assert_eq!(machine.allocate_buffer_id(), 0);

        machine.handle(Input::Closed, now);
        machine.handle(Input::Connected { version: Version::V1_3 }, now);
        assert_eq!(machine.allocate_buffer_id(), 0);
    }

    /// Drives a fresh machine into `state`.
    fn machine_in(state: ConnectionState, now: Instant) -> ConnectionMachine {
        match state {
            ConnectionState::Established => return established(Version::V1_3, now),
            ConnectionState::Disconnected => {
                let mut machine = established(Version::V1_0, now);
                machine.handle(Input::Closed, now);
                return machine;
            }
            _ => {}
        }

        let mut machine = ConnectionMachine::new(&Config::new());
        let steps = [
            ConnectionState::Connected,
            ConnectionState::FeaturesReceived,
            ConnectionState::ConfigReceived,
        ];
        let mut pending: Option<Message> = None;
        for step in steps {
            if machine.state() == state {
                break;
            }
            let actions = match (step, pending.take()) {
                (ConnectionState::Connected, _) => machine.handle(
                    Input::Connected {
                        version: Version::V1_3,
                    },
                    now,
                ),
                (ConnectionState::FeaturesReceived, Some(request)) => {
                    machine.handle(reply_to(&request, Body::FeaturesReply(features(0))), now)
                }
                (_, Some(request)) => machine.handle(
                    reply_to(&request, Body::GetConfigReply(SwitchConfig::default())),
                    now,
                ),
                (_, None) => panic!("handshake stalled before {step}"),
            };
            pending = Some(only_send(actions));
        }
        assert_eq!(machine.state(), state);
        machine
    }

    #[test]
    fn transition_function_is_total() {
        let now = Instant::now();
        let states = [
            ConnectionState::Init,
            ConnectionState::Connected,
            ConnectionState::FeaturesReceived,
            ConnectionState::ConfigReceived,
            ConnectionState::Established,
            ConnectionState::Disconnected,
        ];
        let inputs = [
            Input::Connected {
                version: Version::V1_3,
            },
            Input::Received(port_status()),
            Input::Received(Message::new(Version::V1_3, 9999, Body::BarrierReply)),
            Input::Received(Message::new(
                Version::V1_3,
                9998,
                Body::FeaturesReply(features(0)),
            )),
            Input::Received(Message::new(
                Version::V1_3,
                9997,
                Body::Error(ErrorMsg::new(1, 1, Bytes::new())),
            )),
            Input::Closed,
            Input::Tick,
            Input::Keepalive,
        ];

        for state in states {
            for input in &inputs {
                let mut machine = machine_in(state, now);
                machine.handle(input.clone(), now + Duration::from_secs(60));
                let after = machine.state();
                // A reconnect passes through Init on its way to Connected.
                let reconnect = state.is_disconnected() && after == ConnectionState::Connected;
                assert!(
                    state == after || state.can_transition_to(after) || reconnect,
                    "{input:?}: {state} -> {after}"
                );
            }
        }
    }
}
