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

//! Packet-in and packet-out.

use crate::action::Action;
use crate::buf::{BufMutExt, Reader};
use crate::matching::OxmMatch;
use crate::oxm::OxmBasic;
use crate::port::{port_from_v10, port_to_v10, ports, read_port};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// Buffer id meaning "the packet is not buffered on the datapath".
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// Packet-in reason codes.
pub mod packet_in_reason {
    /// No matching flow (table miss).
    pub const NO_MATCH: u8 = 0;
    /// Output to controller action.
    pub const ACTION: u8 = 1;
    /// Invalid TTL (1.2+).
    pub const INVALID_TTL: u8 = 2;
}

/// A packet delivered to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    /// Datapath buffer holding the full packet, or [`NO_BUFFER`].
    pub buffer_id: u32,
    /// Full length of the packet.
    pub total_len: u16,
    /// One of [`packet_in_reason`].
    pub reason: u8,
    /// Table the packet was looked up in (1.2+).
    pub table_id: u8,
    /// Cookie of the flow that sent the packet (1.3).
    pub cookie: u64,
    /// Ingress port (1.0; later versions carry it in the match).
    pub in_port: u32,
    /// Packet metadata (1.2+).
    pub match_fields: OxmMatch,
    /// Packet bytes (possibly truncated to `miss_send_len`).
    pub data: Bytes,
}

impl PacketIn {
    /// Ingress port, wherever the version keeps it.
    #[must_use]
    pub fn ingress_port(&self) -> Option<u32> {
        if !self.match_fields.fields.is_empty() {
            return self
                .match_fields
                .get(OxmBasic::InPort)
                .and_then(|f| f.value_u64())
                .map(|v| v as u32);
        }
        Some(self.in_port)
    }

    pub(crate) fn body_len(&self, version: Version) -> usize {
        let fixed = match version {
            Version::V1_0 => 10,
            Version::V1_2 => 8 + self.match_fields.wire_len() + 2,
            Version::V1_3 => 16 + self.match_fields.wire_len() + 2,
        };
        fixed + self.data.len()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u32(self.buffer_id);
        buf.put_u16(self.total_len);
        match version {
            Version::V1_0 => {
                if !self.match_fields.fields.is_empty() {
                    return Err(EncodeError::unsupported(version, "packet-in match"));
                }
                if self.table_id != 0 || self.cookie != 0 {
                    return Err(EncodeError::unsupported(version, "packet-in table and cookie"));
                }
                buf.put_u16(port_to_v10(self.in_port)?);
                buf.put_u8(self.reason);
                buf.put_zeros(1);
            }
            Version::V1_2 | Version::V1_3 => {
                if self.in_port != 0 {
                    return Err(EncodeError::unsupported(version, "packet-in in_port field"));
                }
                buf.put_u8(self.reason);
                buf.put_u8(self.table_id);
                if version == Version::V1_3 {
                    buf.put_u64(self.cookie);
                } else if self.cookie != 0 {
                    return Err(EncodeError::unsupported(version, "packet-in cookie"));
                }
                self.match_fields.encode(version, buf)?;
                buf.put_zeros(2);
            }
        }
        buf.put_slice(&self.data);
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let buffer_id = r.u32()?;
        let total_len = r.u16()?;
        let mut msg = Self {
            buffer_id,
            total_len,
            reason: 0,
            table_id: 0,
            cookie: 0,
            in_port: 0,
            match_fields: OxmMatch::new(),
            data: Bytes::new(),
        };
        match version {
            Version::V1_0 => {
                msg.in_port = port_from_v10(r.u16()?);
                msg.reason = r.u8()?;
                r.skip(1)?;
            }
            Version::V1_2 | Version::V1_3 => {
                msg.reason = r.u8()?;
                msg.table_id = r.u8()?;
                if version == Version::V1_3 {
                    msg.cookie = r.u64()?;
                }
                msg.match_fields = OxmMatch::decode(version, r)?;
                r.skip(2)?;
            }
        }
        msg.data = r.rest();
        Ok(msg)
    }
}

/// A packet injected by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    /// Buffered packet to send, or [`NO_BUFFER`] to send `data`.
    pub buffer_id: u32,
    /// Port the packet is treated as arriving on.
    pub in_port: u32,
    /// Actions to apply.
    pub actions: Vec<Action>,
    /// Packet bytes when not buffered.
    pub data: Bytes,
}

impl PacketOut {
    /// Sends `data` out of `port`.
    #[must_use]
    pub fn to_port(port: u32, data: Bytes) -> Self {
        Self {
            buffer_id: NO_BUFFER,
            in_port: ports::CONTROLLER,
            actions: vec![Action::output(port)],
            data,
        }
    }

    pub(crate) fn body_len(&self, version: Version) -> usize {
        let fixed = match version {
            Version::V1_0 => 8,
            Version::V1_2 | Version::V1_3 => 16,
        };
        fixed + Action::list_len(&self.actions, version) + self.data.len()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let actions_len = Action::list_len(&self.actions, version);
        buf.put_u32(self.buffer_id);
        match version {
            Version::V1_0 => {
                buf.put_u16(port_to_v10(self.in_port)?);
                buf.put_u16(actions_len as u16);
            }
            Version::V1_2 | Version::V1_3 => {
                buf.put_u32(self.in_port);
                buf.put_u16(actions_len as u16);
                buf.put_zeros(6);
            }
        }
        Action::encode_list(&self.actions, version, buf)?;
        buf.put_slice(&self.data);
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let buffer_id = r.u32()?;
        let in_port = read_port(r, version)?;
        let actions_len = usize::from(r.u16()?);
        if version.has_oxm() {
            r.skip(6)?;
        }
        let mut actions = r.take(actions_len)?;
        Ok(Self {
            buffer_id,
            in_port,
            actions: Action::decode_list(version, &mut actions)?,
            data: r.rest(),
        })
    }
}
