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

//! Non-blocking transport sockets for control channels.
//!
//! A [`TransportSocket`] carries bytes between a controller and one peer.
//! It knows nothing about message contents; it provides:
//!
//! - A bounded outbound queue with progressive backpressure reported as
//!   [`SendStatus`]
//! - Reconnect with exponential [`Backoff`] for actively connected sockets
//! - Stream and datagram links behind the [`Link`] trait, with TCP and
//!   connected UDP implementations in [`net`]
//!
//! Enable the `mock` feature for in-memory links with controllable
//! writability.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use flowctl_transport::net::TcpDialer;
//! use flowctl_transport::{SocketConfig, SocketEvent, TransportSocket};
//!
//! # async fn run() -> Result<(), flowctl_transport::TransportError> {
//! let (socket, mut events) =
//!     TransportSocket::dial(TcpDialer::new("switch-7.lab:6653"), &SocketConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SocketEvent::Connected { .. } => {
//!             socket.send(Bytes::from_static(&[4, 0, 0, 8, 0, 0, 0, 1]))?;
//!         }
//!         SocketEvent::Data(bytes) => println!("{} bytes", bytes.len()),
//!         SocketEvent::Closed { .. } => break,
//!         SocketEvent::Reconnecting { .. } => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod backoff;
mod error;
mod listener;
pub mod net;
mod queue;
mod socket;
mod state;
mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backoff::{Backoff, ReconnectPolicy, MAX_BACKOFF_FACTOR};
pub use error::TransportError;
pub use listener::Listener;
pub use queue::{OutboundQueue, SendStatus};
pub use socket::{
    SocketConfig, SocketEvent, SocketEvents, TransportSocket, DEFAULT_EVENT_CAPACITY,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_BUFFER_SIZE,
};
pub use state::{SocketRole, SocketState};
pub use traits::{Acceptor, Dialer, Link, LinkKind};
