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

//! Message codec for the OpenFlow 1.0, 1.2 and 1.3 control channel.
//!
//! This crate turns bytes into typed [`Message`]s and back. It performs no
//! I/O; the connection layer feeds it frames produced by a
//! [`FrameReader`].
//!
//! # Message Layout
//!
//! Every message starts with the same eight-byte header:
//!
//! ```text
//! ┌─────────┬─────────┬──────────────────┬───────────────────────────┐
//! │ version │  type   │  length (u16 BE) │     transaction id        │
//! └─────────┴─────────┴──────────────────┴───────────────────────────┘
//! ```
//!
//! The body layout depends on the version. Struct layouts differ between
//! generations (1.0 has a fixed match and 16-bit port numbers, 1.2+ use
//! OXM matches and instructions), so every nested structure takes the
//! version as a parameter and fails with [`EncodeError::Unsupported`]
//! when asked for something its version cannot express.
//!
//! # Errors
//!
//! [`DecodeError`] is fatal for the byte stream. [`ValidationError`] marks
//! a well-framed but meaningless message; [`ErrorMsg::for_rejected`]
//! turns it into the reply the peer expects.
//!
//! # Example
//!
//! ```
//! use flowctl_wire::{Body, Message, Version};
//!
//! let msg = Message::new(Version::V1_3, 7, Body::BarrierRequest);
//! let bytes = msg.to_bytes().expect("barrier encodes");
//! assert_eq!(bytes.len(), 8);
//!
//! let decoded = Message::decode(&bytes).expect("barrier decodes");
//! assert_eq!(decoded, msg);
//! ```

pub mod action;
mod buf;
pub mod error;
pub mod error_msg;
pub mod features;
pub mod flow;
mod framing;
pub mod group;
pub mod header;
pub mod hello;
pub mod instruction;
pub mod match10;
pub mod matching;
mod message;
pub mod meter;
pub mod oxm;
pub mod packet;
pub mod port;
pub mod queue;
pub mod role;
pub mod stats;
pub mod table_features;
mod validate;
mod version;

pub use action::Action;
pub use error::{DecodeError, EncodeError, ValidationError, Violation};
pub use error_msg::ErrorMsg;
pub use features::{Capabilities, FeaturesReply, SwitchConfig};
pub use flow::{FlowMod, FlowRemoved, TableMod};
pub use framing::FrameReader;
pub use group::{Bucket, GroupMod};
pub use header::{RawHeader, HEADER_LEN, MAX_MESSAGE_LEN};
pub use hello::{peek_hello, Hello, HelloElement, PeerHello};
pub use instruction::Instruction;
pub use match10::Match10;
pub use matching::{Match, OxmMatch};
pub use message::{Body, Message};
pub use meter::{MeterBand, MeterMod};
pub use oxm::{OxmBasic, OxmField};
pub use packet::{PacketIn, PacketOut};
pub use port::{Port, PortMod, PortStatus};
pub use queue::{PacketQueue, QueueGetConfigReply};
pub use role::{AsyncConfig, ControllerRole, Role};
pub use stats::{StatsReply, StatsReplyBody, StatsRequest, StatsRequestBody};
pub use table_features::TableFeatures;
pub use validate::{validate, validate_match};
pub use version::{MessageType, StatsType, Version};
