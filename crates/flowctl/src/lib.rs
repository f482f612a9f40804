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

//! Controller-side sessions for the OpenFlow 1.0, 1.2 and 1.3 control
//! channel.
//!
//! `flowctl` sits on top of [`flowctl_transport`] sockets and the
//! [`flowctl_wire`] codec and adds:
//!
//! - Version negotiation with hello bitmaps and header-version fallback
//! - The feature discovery handshake, including multipart table and port
//!   descriptions on 1.3
//! - Request/reply correlation by transaction id with per-request expiry
//! - Echo keepalive, reconnect after failure, and auxiliary channels
//! - A registry that finds connections by peer id and datapath id
//!
//! # Architecture
//!
//! [`ConnectionMachine`] is the sans-IO core: it consumes [`Input`]s and
//! returns [`Action`]s. Each connection runs it inside a task driven by
//! socket events, application commands and deadlines. The
//! [`SessionManager`] starts those tasks and reports what happens on a
//! single [`SessionEvent`] channel.
//!
//! # Example
//!
//! ```no_run
//! use flowctl::{Body, Config, SessionEvent, SessionManager};
//!
//! # async fn run() -> Result<(), flowctl::Error> {
//! let (manager, mut events) = SessionManager::new(Config::default())?;
//! manager.listen_tcp().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::ConnectionOpened { peer, info } => {
//!             println!("{peer}: datapath {:016x}", info.datapath_id());
//!             manager.send_request(peer, Body::BarrierRequest).await?;
//!         }
//!         SessionEvent::Message { peer, message, .. } => {
//!             println!("{peer}: {}", message.msg_type());
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use flowctl_transport::SendStatus;
pub use flowctl_wire::{Body, Message, MessageType, Version};

mod config;
mod connection;
mod error;
mod machine;
mod manager;
mod multipart;
mod negotiation;
mod registry;
mod state;
mod transactions;

pub use config::{Config, ConfigError, DEFAULT_MAX_MULTIPART_PARTS, DEFAULT_PORT};
pub use connection::ConnectionHandle;
pub use error::{Error, NegotiationError, TimeoutKind};
pub use machine::{Action, ConnectionMachine, DatapathInfo, Input};
pub use manager::{SessionEvent, SessionEvents, SessionManager};
pub use multipart::MultipartAssembler;
pub use negotiation::{hello_failure, local_hello, negotiate, read_peer_hello};
pub use registry::{PeerId, SessionRegistry};
pub use state::ConnectionState;
pub use transactions::{Transaction, TransactionTable};
