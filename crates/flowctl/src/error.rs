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

//! Error types for controller sessions.

use crate::registry::PeerId;
use crate::ConnectionState;
use flowctl_transport::TransportError;
use flowctl_wire::{DecodeError, EncodeError, MessageType};
use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Hello negotiation failed.
    #[error("negotiation failed: {0}")]
    NegotiationFailed(#[from] NegotiationError),

    /// Protocol violation detected.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Operation timed out.
    #[error("timeout: {0}")]
    Timeout(TimeoutKind),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A message could not be encoded for the negotiated version.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The byte stream could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The connection has not completed its handshake.
    #[error("connection not established (state {state})")]
    NotEstablished {
        /// State at the time of the call.
        state: ConnectionState,
    },

    /// The message type expects no reply and cannot be sent as a request.
    #[error("{0} is not a request")]
    NotARequest(MessageType),

    /// No connection is registered under this id.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    /// No auxiliary channel with this id is attached.
    #[error("peer {peer} has no auxiliary channel {auxiliary_id}")]
    UnknownAuxiliary {
        /// Main connection.
        peer: PeerId,
        /// Requested auxiliary id.
        auxiliary_id: u8,
    },

    /// The connection task has stopped.
    #[error("session closed")]
    SessionClosed,

    /// The outbound queue was full and the message was discarded.
    #[error("message dropped: send queue full")]
    Dropped,
}

impl Error {
    /// Creates a protocol violation error.
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }
}

/// Errors that can occur during hello negotiation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// No compatible protocol version found.
    #[error("no compatible protocol version: local supports {local:?}, remote offered 0x{remote:02x}")]
    NoCommonVersion {
        /// Versions supported locally.
        local: Vec<flowctl_wire::Version>,
        /// Highest version in the peer's header.
        remote: u8,
    },

    /// The first message from the peer was not a hello.
    #[error("expected hello, got message type {type_code}")]
    UnexpectedMessage {
        /// Type code of the message received.
        type_code: u8,
    },

    /// The peer answered our hello with an error.
    #[error("peer rejected the hello")]
    Rejected,

    /// No hello arrived in time.
    #[error("negotiation timed out")]
    Timeout,
}

/// Types of timeout that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Timeout waiting for the peer's hello.
    Hello,
    /// Timeout waiting for a handshake reply.
    Handshake,
    /// Timeout waiting for an application reply.
    Request,
    /// Timeout waiting for a keep-alive echo.
    Echo,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hello => write!(f, "hello"),
            Self::Handshake => write!(f, "handshake"),
            Self::Request => write!(f, "request"),
            Self::Echo => write!(f, "echo"),
        }
    }
}
