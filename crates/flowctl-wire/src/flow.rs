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

//! Flow table modification and flow removal.
//!
//! 1.0 attaches actions directly to a flow; 1.2+ attaches instructions.
//! [`FlowMod`] carries both lists and the encoder rejects whichever one
//! the target version cannot express.

use crate::action::Action;
use crate::buf::{BufMutExt, Reader};
use crate::group::GROUP_ANY;
use crate::instruction::Instruction;
use crate::matching::Match;
use crate::packet::NO_BUFFER;
use crate::port::{port_from_v10, port_to_v10, ports};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, BytesMut};

/// Flow modification commands.
pub mod flow_command {
    /// New flow.
    pub const ADD: u8 = 0;
    /// Modify all matching flows.
    pub const MODIFY: u8 = 1;
    /// Modify the flow with exactly this match and priority.
    pub const MODIFY_STRICT: u8 = 2;
    /// Delete all matching flows.
    pub const DELETE: u8 = 3;
    /// Delete the flow with exactly this match and priority.
    pub const DELETE_STRICT: u8 = 4;
}

/// Flow modification flags.
pub mod flow_flags {
    /// Send a flow-removed message when the flow expires or is deleted.
    pub const SEND_FLOW_REM: u16 = 1 << 0;
    /// Refuse to add an overlapping flow.
    pub const CHECK_OVERLAP: u16 = 1 << 1;
    /// Emergency flow (1.0) or reset counters (1.2+).
    pub const EMERG_OR_RESET_COUNTS: u16 = 1 << 2;
    /// Do not count packets (1.3).
    pub const NO_PKT_COUNTS: u16 = 1 << 3;
    /// Do not count bytes (1.3).
    pub const NO_BYT_COUNTS: u16 = 1 << 4;
}

/// Table id meaning "every table" (deletes) or "no table" (adds).
pub const TABLE_ALL: u8 = 0xff;

/// A flow table modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    /// Opaque controller-issued identifier.
    pub cookie: u64,
    /// Cookie bits that must match for modify/delete (1.2+).
    pub cookie_mask: u64,
    /// Target table (1.2+).
    pub table_id: u8,
    /// One of [`flow_command`].
    pub command: u8,
    /// Idle time before discarding, in seconds.
    pub idle_timeout: u16,
    /// Maximum time before discarding, in seconds.
    pub hard_timeout: u16,
    /// Flow priority.
    pub priority: u16,
    /// Buffered packet to apply the flow to, or [`NO_BUFFER`].
    pub buffer_id: u32,
    /// Delete filter: require an output to this port.
    pub out_port: u32,
    /// Delete filter: require an output to this group (1.2+).
    pub out_group: u32,
    /// Combination of [`flow_flags`].
    pub flags: u16,
    /// Fields to match.
    pub match_fields: Match,
    /// Actions (1.0).
    pub actions: Vec<Action>,
    /// Instructions (1.2+).
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// An add command for `match_fields` with default timeouts and filters.
    #[must_use]
    pub fn add(match_fields: Match) -> Self {
        Self {
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            command: flow_command::ADD,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0x8000,
            buffer_id: NO_BUFFER,
            out_port: ports::ANY,
            out_group: GROUP_ANY,
            flags: 0,
            match_fields,
            actions: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// A delete command removing every flow in table 0 matching
    /// `match_fields`. On 1.2+ set `table_id` to [`TABLE_ALL`] to cover
    /// every table.
    #[must_use]
    pub fn delete(match_fields: Match) -> Self {
        Self {
            command: flow_command::DELETE,
            ..Self::add(match_fields)
        }
    }

    pub(crate) fn body_len(&self, version: Version) -> usize {
        match version {
            Version::V1_0 => 64 + Action::list_len(&self.actions, version),
            Version::V1_2 | Version::V1_3 => {
                40 + self.match_fields.wire_len() + Instruction::list_len(&self.instructions, version)
            }
        }
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match version {
            Version::V1_0 => self.encode_v10(buf),
            Version::V1_2 | Version::V1_3 => self.encode_oxm(version, buf),
        }
    }

    fn encode_v10(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let version = Version::V1_0;
        if !self.instructions.is_empty() {
            return Err(EncodeError::unsupported(version, "instructions"));
        }
        // 1.0 has a single table and no cookie masks or group filters.
        if self.cookie_mask != 0 {
            return Err(EncodeError::unsupported(version, "cookie mask"));
        }
        if self.table_id != 0 {
            return Err(EncodeError::out_of_range(
                version,
                "table id",
                u64::from(self.table_id),
            ));
        }
        if self.out_group != GROUP_ANY {
            return Err(EncodeError::unsupported(version, "out_group filter"));
        }
        self.match_fields.encode(version, buf)?;
        buf.put_u64(self.cookie);
        buf.put_u16(u16::from(self.command));
        buf.put_u16(self.idle_timeout);
        buf.put_u16(self.hard_timeout);
        buf.put_u16(self.priority);
        buf.put_u32(self.buffer_id);
        buf.put_u16(port_to_v10(self.out_port)?);
        buf.put_u16(self.flags);
        Action::encode_list(&self.actions, version, buf)
    }

    fn encode_oxm(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if !self.actions.is_empty() {
            return Err(EncodeError::unsupported(version, "bare flow actions"));
        }
        buf.put_u64(self.cookie);
        buf.put_u64(self.cookie_mask);
        buf.put_u8(self.table_id);
        buf.put_u8(self.command);
        buf.put_u16(self.idle_timeout);
        buf.put_u16(self.hard_timeout);
        buf.put_u16(self.priority);
        buf.put_u32(self.buffer_id);
        buf.put_u32(self.out_port);
        buf.put_u32(self.out_group);
        buf.put_u16(self.flags);
        buf.put_zeros(2);
        self.match_fields.encode(version, buf)?;
        Instruction::encode_list(&self.instructions, version, buf)
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if version == Version::V1_0 {
            let match_fields = Match::decode(version, r)?;
            let cookie = r.u64()?;
            let command = r.u16()?;
            let command = u8::try_from(command)
                .map_err(|_| DecodeError::unknown_sub_type("flow command", version, command))?;
            let mut fm = Self::add(match_fields);
            fm.cookie = cookie;
            fm.command = command;
            fm.idle_timeout = r.u16()?;
            fm.hard_timeout = r.u16()?;
            fm.priority = r.u16()?;
            fm.buffer_id = r.u32()?;
            fm.out_port = port_from_v10(r.u16()?);
            fm.flags = r.u16()?;
            fm.actions = Action::decode_list(version, r)?;
            return Ok(fm);
        }

        let cookie = r.u64()?;
        let cookie_mask = r.u64()?;
        let table_id = r.u8()?;
        let command = r.u8()?;
        let idle_timeout = r.u16()?;
        let hard_timeout = r.u16()?;
        let priority = r.u16()?;
        let buffer_id = r.u32()?;
        let out_port = r.u32()?;
        let out_group = r.u32()?;
        let flags = r.u16()?;
        r.skip(2)?;
        let match_fields = Match::decode(version, r)?;
        Ok(Self {
            cookie,
            cookie_mask,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id,
            out_port,
            out_group,
            flags,
            match_fields,
            actions: Vec::new(),
            instructions: Instruction::decode_list(version, r)?,
        })
    }
}

/// Flow removal reasons.
pub mod flow_removed_reason {
    /// Idle timeout expired.
    pub const IDLE_TIMEOUT: u8 = 0;
    /// Hard timeout expired.
    pub const HARD_TIMEOUT: u8 = 1;
    /// Deleted by a flow modification.
    pub const DELETE: u8 = 2;
    /// Group was removed (1.2+).
    pub const GROUP_DELETE: u8 = 3;
}

/// Notification that a flow entry was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct FlowRemoved {
    pub cookie: u64,
    pub priority: u16,
    /// One of [`flow_removed_reason`].
    pub reason: u8,
    /// 1.2+ only.
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    /// 1.2+ only.
    pub hard_timeout: u16,
    pub packet_count: u64,
    pub byte_count: u64,
    pub match_fields: Match,
}

impl FlowRemoved {
    pub(crate) fn body_len(&self, version: Version) -> usize {
        match version {
            Version::V1_0 => 80,
            Version::V1_2 | Version::V1_3 => 40 + self.match_fields.wire_len(),
        }
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if version == Version::V1_0 {
            if self.table_id != 0 || self.hard_timeout != 0 {
                return Err(EncodeError::unsupported(version, "flow-removed table and hard timeout"));
            }
            self.match_fields.encode(version, buf)?;
            buf.put_u64(self.cookie);
            buf.put_u16(self.priority);
            buf.put_u8(self.reason);
            buf.put_zeros(1);
            buf.put_u32(self.duration_sec);
            buf.put_u32(self.duration_nsec);
            buf.put_u16(self.idle_timeout);
            buf.put_zeros(2);
        } else {
            buf.put_u64(self.cookie);
            buf.put_u16(self.priority);
            buf.put_u8(self.reason);
            buf.put_u8(self.table_id);
            buf.put_u32(self.duration_sec);
            buf.put_u32(self.duration_nsec);
            buf.put_u16(self.idle_timeout);
            buf.put_u16(self.hard_timeout);
        }
        buf.put_u64(self.packet_count);
        buf.put_u64(self.byte_count);
        if version.has_oxm() {
            self.match_fields.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if version == Version::V1_0 {
            let match_fields = Match::decode(version, r)?;
            let cookie = r.u64()?;
            let priority = r.u16()?;
            let reason = r.u8()?;
            r.skip(1)?;
            let duration_sec = r.u32()?;
            let duration_nsec = r.u32()?;
            let idle_timeout = r.u16()?;
            r.skip(2)?;
            return Ok(Self {
                cookie,
                priority,
                reason,
                table_id: 0,
                duration_sec,
                duration_nsec,
                idle_timeout,
                hard_timeout: 0,
                packet_count: r.u64()?,
                byte_count: r.u64()?,
                match_fields,
            });
        }
        Ok(Self {
            cookie: r.u64()?,
            priority: r.u16()?,
            reason: r.u8()?,
            table_id: r.u8()?,
            duration_sec: r.u32()?,
            duration_nsec: r.u32()?,
            idle_timeout: r.u16()?,
            hard_timeout: r.u16()?,
            packet_count: r.u64()?,
            byte_count: r.u64()?,
            match_fields: Match::decode(version, r)?,
        })
    }
}

/// Table configuration change (1.2+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMod {
    /// Table to configure, or [`TABLE_ALL`].
    pub table_id: u8,
    /// Table configuration bits.
    pub config: u32,
}

impl TableMod {
    pub(crate) const LEN: usize = 8;

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.table_id);
        buf.put_zeros(3);
        buf.put_u32(self.config);
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let table_id = r.u8()?;
        r.skip(3)?;
        Ok(Self {
            table_id,
            config: r.u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match10::Match10;
    use crate::matching::OxmMatch;
    use crate::oxm::OxmField;

    #[test]
    fn v10_flow_mod_is_72_bytes_without_actions() {
        let fm = FlowMod::add(Match::Standard(Match10::any().with_in_port(1)));
        assert_eq!(fm.body_len(Version::V1_0) + 8, 72);

        let mut buf = BytesMut::new();
        fm.encode(Version::V1_0, &mut buf).expect("encode");
        assert_eq!(buf.len(), 64);
        let decoded = FlowMod::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, fm);
    }

    #[test]
    fn v13_flow_mod_with_instructions() {
        let mut fm = FlowMod::add(Match::Oxm(
            OxmMatch::new()
                .with(OxmField::eth_type(0x0800))
                .with(OxmField::ip_proto(6))
                .with(OxmField::tcp_dst(80)),
        ));
        fm.table_id = 1;
        fm.flags = flow_flags::SEND_FLOW_REM;
        fm.instructions = vec![
            Instruction::ApplyActions(vec![Action::output(2)]),
            Instruction::GotoTable(2),
        ];

        let mut buf = BytesMut::new();
        fm.encode(Version::V1_3, &mut buf).expect("encode");
        assert_eq!(buf.len(), fm.body_len(Version::V1_3));
        let decoded = FlowMod::decode(Version::V1_3, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, fm);
    }

    #[test]
    fn instructions_unsupported_on_v10() {
        let mut fm = FlowMod::add(Match::any(Version::V1_0));
        fm.instructions = vec![Instruction::ClearActions];
        let mut buf = BytesMut::new();
        assert_eq!(
            fm.encode(Version::V1_0, &mut buf),
            Err(EncodeError::unsupported(Version::V1_0, "instructions"))
        );
    }

    #[test]
    fn flow_removed_lengths() {
        let fr = FlowRemoved {
            cookie: 1,
            priority: 10,
            reason: flow_removed_reason::IDLE_TIMEOUT,
            table_id: 0,
            duration_sec: 4,
            duration_nsec: 0,
            idle_timeout: 5,
            hard_timeout: 0,
            packet_count: 9,
            byte_count: 900,
            match_fields: Match::any(Version::V1_0),
        };
        let mut buf = BytesMut::new();
        fr.encode(Version::V1_0, &mut buf).expect("encode");
        assert_eq!(buf.len() + 8, 88);
        let decoded = FlowRemoved::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, fr);

        let fr = FlowRemoved {
            table_id: 3,
            hard_timeout: 30,
            match_fields: Match::any(Version::V1_2),
            ..fr
        };
        let mut buf = BytesMut::new();
        fr.encode(Version::V1_2, &mut buf).expect("encode");
        assert_eq!(buf.len() + 8, 48 + 8);
        let decoded = FlowRemoved::decode(Version::V1_2, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, fr);
    }
}
