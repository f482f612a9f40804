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

//! Transport socket state machine.

/// Transport socket lifecycle state.
///
/// ```text
/// Idle ──► Connecting ──► Established ──► Closed
///   │          ▲                ▲             │
///   │          └────────────────┼─────────────┘ (reconnect backoff)
///   └──► Listening ── accept ───┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SocketState {
    /// Created, not yet connecting or listening.
    #[default]
    Idle,
    /// Accepting incoming connections.
    Listening,
    /// Connection attempt in progress.
    Connecting,
    /// Connected; data can flow.
    Established,
    /// Closed by either side or after an error.
    Closed,
}

impl SocketState {
    /// Returns true if data can be sent.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self, Self::Established)
    }

    /// Returns true if the socket is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if a transition to the target state is valid.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        use SocketState::{Closed, Connecting, Established, Idle, Listening};

        match (*self, target) {
            (Idle, Listening | Connecting | Established) => true,
            // Accepting yields an established socket.
            (Listening | Connecting, Established) => true,
            // A manual connect restarts an attempt in progress.
            (Connecting | Established | Closed, Connecting) => true,
            (Idle | Listening | Connecting | Established, Closed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Connecting => write!(f, "connecting"),
            Self::Established => write!(f, "established"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// How a socket came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketRole {
    /// A listening endpoint.
    Listening,
    /// Connected by dialing out; eligible for reconnect.
    Active,
    /// Produced by accepting on a listening endpoint.
    Accepted,
    /// Wraps a link that was connected elsewhere.
    Plain,
}

impl std::fmt::Display for SocketRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listening => write!(f, "listening"),
            Self::Active => write!(f, "active"),
            Self::Accepted => write!(f, "accepted"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_forward_transitions() {
        assert!(SocketState::Idle.can_transition_to(SocketState::Listening));
        assert!(SocketState::Idle.can_transition_to(SocketState::Connecting));
        assert!(SocketState::Connecting.can_transition_to(SocketState::Established));
        assert!(SocketState::Established.can_transition_to(SocketState::Closed));
    }

    #[test]
    fn closed_can_only_reconnect() {
        assert!(SocketState::Closed.can_transition_to(SocketState::Connecting));
        assert!(!SocketState::Closed.can_transition_to(SocketState::Established));
        assert!(!SocketState::Closed.can_transition_to(SocketState::Listening));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!SocketState::Established.can_transition_to(SocketState::Listening));
        assert!(!SocketState::Established.can_transition_to(SocketState::Idle));
        assert!(!SocketState::Listening.can_transition_to(SocketState::Connecting));
    }

    #[test]
    fn state_display() {
        assert_eq!(SocketState::Idle.to_string(), "idle");
        assert_eq!(SocketState::Established.to_string(), "established");
        assert_eq!(SocketRole::Accepted.to_string(), "accepted");
    }
}
