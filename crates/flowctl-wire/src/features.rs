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

//! Datapath features and switch configuration.

use crate::buf::{BufMutExt, Reader};
use crate::port::Port;
use crate::{DecodeError, EncodeError, Version};
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Datapath capability bits from the features reply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        /// Flow statistics.
        const FLOW_STATS = 1 << 0;
        /// Table statistics.
        const TABLE_STATS = 1 << 1;
        /// Port statistics.
        const PORT_STATS = 1 << 2;
        /// Group statistics (802.1D spanning tree on 1.0).
        const GROUP_STATS = 1 << 3;
        /// Can reassemble IP fragments.
        const IP_REASM = 1 << 5;
        /// Queue statistics.
        const QUEUE_STATS = 1 << 6;
        /// Matches IP addresses in ARP packets (1.0).
        const ARP_MATCH_IP = 1 << 7;
        /// Blocks looping ports (1.2+).
        const PORT_BLOCKED = 1 << 8;
    }
}

/// Body of a features reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeaturesReply {
    /// Datapath id; the low 48 bits are usually a MAC address.
    pub datapath_id: u64,
    /// Packets the datapath can buffer for the controller.
    pub n_buffers: u32,
    /// Number of flow tables.
    pub n_tables: u8,
    /// Auxiliary connection id; zero on the main connection (1.3).
    pub auxiliary_id: u8,
    /// Capability bits.
    pub capabilities: Capabilities,
    /// Supported action bitmap (1.0) or reserved word (1.2+).
    pub actions: u32,
    /// Ports (1.0 and 1.2; 1.3 uses a port-description request).
    pub ports: Vec<Port>,
}

impl FeaturesReply {
    pub(crate) fn body_len(&self, version: Version) -> usize {
        24 + self.ports.len() * Port::wire_len(version)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u64(self.datapath_id);
        buf.put_u32(self.n_buffers);
        buf.put_u8(self.n_tables);
        if version == Version::V1_3 {
            buf.put_u8(self.auxiliary_id);
            buf.put_zeros(2);
        } else {
            if self.auxiliary_id != 0 {
                return Err(EncodeError::unsupported(version, "auxiliary connection id"));
            }
            buf.put_zeros(3);
        }
        buf.put_u32(self.capabilities.bits());
        buf.put_u32(self.actions);
        if version == Version::V1_3 && !self.ports.is_empty() {
            return Err(EncodeError::unsupported(version, "ports in features reply"));
        }
        for port in &self.ports {
            port.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let datapath_id = r.u64()?;
        let n_buffers = r.u32()?;
        let n_tables = r.u8()?;
        let auxiliary_id = if version == Version::V1_3 {
            let aux = r.u8()?;
            r.skip(2)?;
            aux
        } else {
            r.skip(3)?;
            0
        };
        let capabilities = Capabilities::from_bits_retain(r.u32()?);
        let actions = r.u32()?;
        let ports = if version == Version::V1_3 {
            Vec::new()
        } else {
            Port::decode_list(version, r)?
        };
        Ok(Self {
            datapath_id,
            n_buffers,
            n_tables,
            auxiliary_id,
            capabilities,
            actions,
            ports,
        })
    }
}

/// Fragment handling flags of the switch configuration.
pub mod config_flags {
    /// No special fragment handling.
    pub const FRAG_NORMAL: u16 = 0;
    /// Drop fragments.
    pub const FRAG_DROP: u16 = 1;
    /// Reassemble fragments.
    pub const FRAG_REASM: u16 = 2;
}

/// Switch configuration (get-config reply and set-config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchConfig {
    /// Combination of [`config_flags`].
    pub flags: u16,
    /// Bytes of each packet sent to the controller on a table miss.
    pub miss_send_len: u16,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            flags: config_flags::FRAG_NORMAL,
            miss_send_len: 128,
        }
    }
}

impl SwitchConfig {
    pub(crate) const LEN: usize = 4;

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.flags);
        buf.put_u16(self.miss_send_len);
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            flags: r.u16()?,
            miss_send_len: r.u16()?,
        })
    }
}
