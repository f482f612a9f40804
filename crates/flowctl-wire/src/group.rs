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

//! Group table structures (1.2+).

use crate::action::Action;
use crate::buf::{BufMutExt, Reader};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, BytesMut};

/// Group type codes.
pub mod group_type {
    /// Execute all buckets.
    pub const ALL: u8 = 0;
    /// Execute one bucket chosen by the datapath.
    pub const SELECT: u8 = 1;
    /// Execute the single bucket.
    pub const INDIRECT: u8 = 2;
    /// Execute the first live bucket.
    pub const FAST_FAILOVER: u8 = 3;
}

/// Group modification commands.
pub mod group_command {
    /// Create a group.
    pub const ADD: u16 = 0;
    /// Replace a group's buckets.
    pub const MODIFY: u16 = 1;
    /// Delete a group.
    pub const DELETE: u16 = 2;
}

/// Group id addressing every group in delete commands.
pub const GROUP_ALL: u32 = 0xffff_fffc;
/// Wildcard group id.
pub const GROUP_ANY: u32 = 0xffff_ffff;

/// An action bucket of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Relative weight for select groups.
    pub weight: u16,
    /// Port whose liveness gates the bucket (fast failover).
    pub watch_port: u32,
    /// Group whose liveness gates the bucket (fast failover).
    pub watch_group: u32,
    /// Actions executed by the bucket.
    pub actions: Vec<Action>,
}

impl Bucket {
    /// A bucket with no liveness watch.
    #[must_use]
    pub const fn new(actions: Vec<Action>) -> Self {
        Self {
            weight: 0,
            watch_port: crate::port::ports::ANY,
            watch_group: GROUP_ANY,
            actions,
        }
    }

    /// Encoded size.
    #[must_use]
    pub fn wire_len(&self, version: Version) -> usize {
        16 + Action::list_len(&self.actions, version)
    }

    pub(crate) fn list_len(buckets: &[Self], version: Version) -> usize {
        buckets.iter().map(|b| b.wire_len(version)).sum()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(self.wire_len(version) as u16);
        buf.put_u16(self.weight);
        buf.put_u32(self.watch_port);
        buf.put_u32(self.watch_group);
        buf.put_zeros(4);
        Action::encode_list(&self.actions, version, buf)
    }

    pub(crate) fn encode_list(
        buckets: &[Self],
        version: Version,
        buf: &mut BytesMut,
    ) -> Result<(), EncodeError> {
        for bucket in buckets {
            bucket.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut b = r.element("bucket", 0, 16)?;
        b.skip(2)?;
        let weight = b.u16()?;
        let watch_port = b.u32()?;
        let watch_group = b.u32()?;
        b.skip(4)?;
        Ok(Self {
            weight,
            watch_port,
            watch_group,
            actions: Action::decode_list(version, &mut b)?,
        })
    }

    pub(crate) fn decode_list(version: Version, r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        while !r.is_empty() {
            out.push(Self::decode(version, r)?);
        }
        Ok(out)
    }
}

/// Group table modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMod {
    /// One of [`group_command`].
    pub command: u16,
    /// One of [`group_type`].
    pub group_type: u8,
    /// Group id.
    pub group_id: u32,
    /// Buckets of the group.
    pub buckets: Vec<Bucket>,
}

impl GroupMod {
    pub(crate) fn body_len(&self, version: Version) -> usize {
        8 + Bucket::list_len(&self.buckets, version)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(self.command);
        buf.put_u8(self.group_type);
        buf.put_zeros(1);
        buf.put_u32(self.group_id);
        Bucket::encode_list(&self.buckets, version, buf)
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let command = r.u16()?;
        let group_type = r.u8()?;
        r.skip(1)?;
        let group_id = r.u32()?;
        Ok(Self {
            command,
            group_type,
            group_id,
            buckets: Bucket::decode_list(version, r)?,
        })
    }
}
