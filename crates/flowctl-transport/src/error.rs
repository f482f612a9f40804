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

//! Transport error types.

use crate::SocketState;
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket was closed, locally or by the peer.
    #[error("socket closed")]
    Closed,

    /// The operation is not valid in the socket's current state.
    #[error("cannot {operation} in {state} state")]
    InvalidState {
        /// Current socket state.
        state: SocketState,
        /// Rejected operation.
        operation: &'static str,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Returns true if the peer went away rather than an I/O failure.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TransportError::InvalidState {
            state: SocketState::Listening,
            operation: "send",
        };
        assert_eq!(err.to_string(), "cannot send in listening state");

        let io = TransportError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(io.to_string().starts_with("I/O error"));
        assert!(!io.is_closed());
        assert!(TransportError::Closed.is_closed());
    }
}
