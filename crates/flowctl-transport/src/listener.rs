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

//! Listening endpoint.

use crate::{Acceptor, SocketConfig, SocketEvents, SocketState, TransportError, TransportSocket};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Accepts incoming links and wraps each in a [`TransportSocket`].
#[derive(Debug)]
pub struct Listener<A: Acceptor> {
    acceptor: A,
    config: SocketConfig,
    closed: AtomicBool,
}

impl<A: Acceptor> Listener<A> {
    /// Starts listening on `acceptor`. Accepted sockets use `config`.
    #[must_use]
    pub fn new(acceptor: A, config: SocketConfig) -> Self {
        if let Ok(addr) = acceptor.local_addr() {
            info!(%addr, "listening");
        }
        Self {
            acceptor,
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Waits for the next incoming connection.
    ///
    /// The returned socket is already established and its I/O task is
    /// running.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] after [`close`](Self::close), or
    /// the acceptor's I/O error.
    pub async fn accept(
        &self,
    ) -> Result<(TransportSocket<A::Link>, SocketEvents, SocketAddr), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let (link, addr) = self.acceptor.accept().await?;
        debug!(%addr, "accepted");
        let (socket, events) = TransportSocket::accepted(link, &self.config);
        Ok((socket, events, addr))
    }

    /// Stops accepting.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("listener closed");
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        if self.closed.load(Ordering::SeqCst) {
            SocketState::Closed
        } else {
            SocketState::Listening
        }
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the acceptor cannot report it.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    /// Configuration applied to accepted sockets.
    #[must_use]
    pub const fn config(&self) -> &SocketConfig {
        &self.config
    }
}
