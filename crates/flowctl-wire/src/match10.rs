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

//! The fixed 40-byte match structure of OpenFlow 1.0.

use crate::buf::{BufMutExt, Reader};
use crate::port::{port_from_v10, port_to_v10};
use crate::{DecodeError, EncodeError};
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

/// Wildcard bits of the 1.0 match.
pub mod wildcards {
    /// Switch input port.
    pub const IN_PORT: u32 = 1 << 0;
    /// VLAN id.
    pub const DL_VLAN: u32 = 1 << 1;
    /// Ethernet source address.
    pub const DL_SRC: u32 = 1 << 2;
    /// Ethernet destination address.
    pub const DL_DST: u32 = 1 << 3;
    /// Ethernet frame type.
    pub const DL_TYPE: u32 = 1 << 4;
    /// IP protocol.
    pub const NW_PROTO: u32 = 1 << 5;
    /// TCP/UDP source port.
    pub const TP_SRC: u32 = 1 << 6;
    /// TCP/UDP destination port.
    pub const TP_DST: u32 = 1 << 7;
    /// Shift of the "ignored low bits of nw_src" count.
    pub const NW_SRC_SHIFT: u32 = 8;
    /// Mask of the nw_src bit count.
    pub const NW_SRC_MASK: u32 = 0x3f << NW_SRC_SHIFT;
    /// Shift of the "ignored low bits of nw_dst" count.
    pub const NW_DST_SHIFT: u32 = 14;
    /// Mask of the nw_dst bit count.
    pub const NW_DST_MASK: u32 = 0x3f << NW_DST_SHIFT;
    /// VLAN priority.
    pub const DL_VLAN_PCP: u32 = 1 << 20;
    /// IP ToS bits.
    pub const NW_TOS: u32 = 1 << 21;
    /// Every field wildcarded.
    pub const ALL: u32 = (1 << 22) - 1;
}

/// The 1.0 match.
///
/// Field values are only meaningful when the matching wildcard bit is
/// clear. The builder methods keep the two in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Match10 {
    pub wildcards: u32,
    pub in_port: u32,
    pub dl_src: [u8; 6],
    pub dl_dst: [u8; 6],
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub dl_type: u16,
    pub nw_tos: u8,
    pub nw_proto: u8,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for Match10 {
    fn default() -> Self {
        Self::any()
    }
}

impl Match10 {
    /// Encoded size.
    pub const LEN: usize = 40;

    /// A match with every field wildcarded.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            wildcards: wildcards::ALL,
            in_port: 0,
            dl_src: [0; 6],
            dl_dst: [0; 6],
            dl_vlan: 0,
            dl_vlan_pcp: 0,
            dl_type: 0,
            nw_tos: 0,
            nw_proto: 0,
            nw_src: 0,
            nw_dst: 0,
            tp_src: 0,
            tp_dst: 0,
        }
    }

    /// Matches an input port.
    #[must_use]
    pub const fn with_in_port(mut self, port: u32) -> Self {
        self.in_port = port;
        self.wildcards &= !wildcards::IN_PORT;
        self
    }

    /// Matches an Ethernet source.
    #[must_use]
    pub const fn with_dl_src(mut self, addr: [u8; 6]) -> Self {
        self.dl_src = addr;
        self.wildcards &= !wildcards::DL_SRC;
        self
    }

    /// Matches an Ethernet destination.
    #[must_use]
    pub const fn with_dl_dst(mut self, addr: [u8; 6]) -> Self {
        self.dl_dst = addr;
        self.wildcards &= !wildcards::DL_DST;
        self
    }

    /// Matches a VLAN id.
    #[must_use]
    pub const fn with_dl_vlan(mut self, vlan: u16) -> Self {
        self.dl_vlan = vlan;
        self.wildcards &= !wildcards::DL_VLAN;
        self
    }

    /// Matches an Ethernet type.
    #[must_use]
    pub const fn with_dl_type(mut self, ethertype: u16) -> Self {
        self.dl_type = ethertype;
        self.wildcards &= !wildcards::DL_TYPE;
        self
    }

    /// Matches an IP protocol.
    #[must_use]
    pub const fn with_nw_proto(mut self, proto: u8) -> Self {
        self.nw_proto = proto;
        self.wildcards &= !wildcards::NW_PROTO;
        self
    }

    /// Matches an IPv4 source prefix.
    #[must_use]
    pub fn with_nw_src(mut self, addr: Ipv4Addr, prefix_len: u8) -> Self {
        self.nw_src = u32::from(addr);
        self.wildcards = (self.wildcards & !wildcards::NW_SRC_MASK)
            | (u32::from(32 - prefix_len.min(32)) << wildcards::NW_SRC_SHIFT);
        self
    }

    /// Matches an IPv4 destination prefix.
    #[must_use]
    pub fn with_nw_dst(mut self, addr: Ipv4Addr, prefix_len: u8) -> Self {
        self.nw_dst = u32::from(addr);
        self.wildcards = (self.wildcards & !wildcards::NW_DST_MASK)
            | (u32::from(32 - prefix_len.min(32)) << wildcards::NW_DST_SHIFT);
        self
    }

    /// Matches a transport source port.
    #[must_use]
    pub const fn with_tp_src(mut self, port: u16) -> Self {
        self.tp_src = port;
        self.wildcards &= !wildcards::TP_SRC;
        self
    }

    /// Matches a transport destination port.
    #[must_use]
    pub const fn with_tp_dst(mut self, port: u16) -> Self {
        self.tp_dst = port;
        self.wildcards &= !wildcards::TP_DST;
        self
    }

    /// Returns true if `bit` is wildcarded.
    #[must_use]
    pub const fn is_wild(&self, bit: u32) -> bool {
        self.wildcards & bit != 0
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u32(self.wildcards);
        buf.put_u16(port_to_v10(self.in_port)?);
        buf.put_slice(&self.dl_src);
        buf.put_slice(&self.dl_dst);
        buf.put_u16(self.dl_vlan);
        buf.put_u8(self.dl_vlan_pcp);
        buf.put_zeros(1);
        buf.put_u16(self.dl_type);
        buf.put_u8(self.nw_tos);
        buf.put_u8(self.nw_proto);
        buf.put_zeros(2);
        buf.put_u32(self.nw_src);
        buf.put_u32(self.nw_dst);
        buf.put_u16(self.tp_src);
        buf.put_u16(self.tp_dst);
        Ok(())
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let wildcards = r.u32()?;
        let in_port = port_from_v10(r.u16()?);
        let dl_src = r.array()?;
        let dl_dst = r.array()?;
        let dl_vlan = r.u16()?;
        let dl_vlan_pcp = r.u8()?;
        r.skip(1)?;
        let dl_type = r.u16()?;
        let nw_tos = r.u8()?;
        let nw_proto = r.u8()?;
        r.skip(2)?;
        Ok(Self {
            wildcards,
            in_port,
            dl_src,
            dl_dst,
            dl_vlan,
            dl_vlan_pcp,
            dl_type,
            nw_tos,
            nw_proto,
            nw_src: r.u32()?,
            nw_dst: r.u32()?,
            tp_src: r.u16()?,
            tp_dst: r.u16()?,
        })
    }
}
