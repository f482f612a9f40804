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

//! OpenFlow extensible match (OXM) TLVs.
//!
//! ```text
//! ┌────────────┬──────────┬───┬─────────┬───────────────┬──────────────┐
//! │ class (16) │ field (7)│ M │ len (8) │ value         │ mask (if M)  │
//! └────────────┴──────────┴───┴─────────┴───────────────┴──────────────┘
//! ```
//!
//! Fields are kept generic (class, field, raw value and mask) so unknown
//! classes survive a decode/encode cycle untouched. [`OxmBasic`] names the
//! standard fields of the `0x8000` class and knows their widths.

use crate::buf::Reader;
use crate::{DecodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// The OXM class holding the standard match fields.
pub const OPENFLOW_BASIC: u16 = 0x8000;
/// The OXM class for experimenter fields.
pub const EXPERIMENTER_CLASS: u16 = 0xffff;

/// A standard (`OPENFLOW_BASIC`) match field.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OxmBasic {
    InPort = 0,
    InPhyPort = 1,
    Metadata = 2,
    EthDst = 3,
    EthSrc = 4,
    EthType = 5,
    VlanVid = 6,
    VlanPcp = 7,
    IpDscp = 8,
    IpEcn = 9,
    IpProto = 10,
    Ipv4Src = 11,
    Ipv4Dst = 12,
    TcpSrc = 13,
    TcpDst = 14,
    UdpSrc = 15,
    UdpDst = 16,
    SctpSrc = 17,
    SctpDst = 18,
    Icmpv4Type = 19,
    Icmpv4Code = 20,
    ArpOp = 21,
    ArpSpa = 22,
    ArpTpa = 23,
    ArpSha = 24,
    ArpTha = 25,
    Ipv6Src = 26,
    Ipv6Dst = 27,
    Ipv6Flabel = 28,
    Icmpv6Type = 29,
    Icmpv6Code = 30,
    Ipv6NdTarget = 31,
    Ipv6NdSll = 32,
    Ipv6NdTll = 33,
    MplsLabel = 34,
    MplsTc = 35,
    MplsBos = 36,
    PbbIsid = 37,
    TunnelId = 38,
    Ipv6Exthdr = 39,
}

const BASIC_FIELDS: [OxmBasic; 40] = {
    use OxmBasic::*;
    [
        InPort, InPhyPort, Metadata, EthDst, EthSrc, EthType, VlanVid, VlanPcp, IpDscp, IpEcn,
        IpProto, Ipv4Src, Ipv4Dst, TcpSrc, TcpDst, UdpSrc, UdpDst, SctpSrc, SctpDst, Icmpv4Type,
        Icmpv4Code, ArpOp, ArpSpa, ArpTpa, ArpSha, ArpTha, Ipv6Src, Ipv6Dst, Ipv6Flabel,
        Icmpv6Type, Icmpv6Code, Ipv6NdTarget, Ipv6NdSll, Ipv6NdTll, MplsLabel, MplsTc, MplsBos,
        PbbIsid, TunnelId, Ipv6Exthdr,
    ]
};

impl OxmBasic {
    /// Looks up a field number.
    #[must_use]
    pub fn from_field(field: u8) -> Option<Self> {
        BASIC_FIELDS.get(usize::from(field)).copied()
    }

    /// Width of the field value in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        use OxmBasic::*;
        match self {
            VlanPcp | IpDscp | IpEcn | IpProto | Icmpv4Type | Icmpv4Code | Icmpv6Type
            | Icmpv6Code | MplsTc | MplsBos => 1,
            EthType | VlanVid | TcpSrc | TcpDst | UdpSrc | UdpDst | SctpSrc | SctpDst | ArpOp
            | Ipv6Exthdr => 2,
            PbbIsid => 3,
            InPort | InPhyPort | Ipv4Src | Ipv4Dst | ArpSpa | ArpTpa | Ipv6Flabel | MplsLabel => 4,
            EthDst | EthSrc | ArpSha | ArpTha | Ipv6NdSll | Ipv6NdTll => 6,
            Metadata | TunnelId => 8,
            Ipv6Src | Ipv6Dst | Ipv6NdTarget => 16,
        }
    }

    /// Returns true if the field may carry a mask.
    #[must_use]
    pub const fn maskable(self) -> bool {
        use OxmBasic::*;
        matches!(
            self,
            Metadata
                | EthDst
                | EthSrc
                | VlanVid
                | Ipv4Src
                | Ipv4Dst
                | ArpSpa
                | ArpTpa
                | ArpSha
                | ArpTha
                | Ipv6Src
                | Ipv6Dst
                | Ipv6Flabel
                | PbbIsid
                | TunnelId
                | Ipv6Exthdr
        )
    }

    /// Oldest version that defines the field.
    #[must_use]
    pub const fn since(self) -> Version {
        match self {
            Self::MplsBos | Self::PbbIsid | Self::TunnelId | Self::Ipv6Exthdr => Version::V1_3,
            _ => Version::V1_2,
        }
    }
}

/// VLAN id bit marking "a VLAN tag is present".
pub const VLAN_PRESENT: u16 = 0x1000;

/// One OXM TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OxmField {
    /// OXM class.
    pub class: u16,
    /// Field number within the class.
    pub field: u8,
    /// Field value.
    pub value: Bytes,
    /// Optional mask, same width as the value.
    pub mask: Option<Bytes>,
}

impl OxmField {
    /// Builds a standard field from its raw value.
    pub fn basic(field: OxmBasic, value: impl Into<Bytes>) -> Self {
        Self {
            class: OPENFLOW_BASIC,
            field: field as u8,
            value: value.into(),
            mask: None,
        }
    }

    /// Builds a masked standard field.
    pub fn basic_masked(field: OxmBasic, value: impl Into<Bytes>, mask: impl Into<Bytes>) -> Self {
        Self {
            mask: Some(mask.into()),
            ..Self::basic(field, value)
        }
    }

    /// Ingress port.
    #[must_use]
    pub fn in_port(port: u32) -> Self {
        Self::basic(OxmBasic::InPort, port.to_be_bytes().to_vec())
    }

    /// Table metadata.
    #[must_use]
    pub fn metadata(value: u64) -> Self {
        Self::basic(OxmBasic::Metadata, value.to_be_bytes().to_vec())
    }

    /// Ethernet destination.
    #[must_use]
    pub fn eth_dst(addr: [u8; 6]) -> Self {
        Self::basic(OxmBasic::EthDst, addr.to_vec())
    }

    /// Ethernet source.
    #[must_use]
    pub fn eth_src(addr: [u8; 6]) -> Self {
        Self::basic(OxmBasic::EthSrc, addr.to_vec())
    }

    /// Ethernet type.
    #[must_use]
    pub fn eth_type(ethertype: u16) -> Self {
        Self::basic(OxmBasic::EthType, ethertype.to_be_bytes().to_vec())
    }

    /// VLAN id, with the presence bit set.
    #[must_use]
    pub fn vlan_vid(vid: u16) -> Self {
        Self::basic(OxmBasic::VlanVid, (vid | VLAN_PRESENT).to_be_bytes().to_vec())
    }

    /// VLAN priority.
    #[must_use]
    pub fn vlan_pcp(pcp: u8) -> Self {
        Self::basic(OxmBasic::VlanPcp, vec![pcp])
    }

    /// IP protocol number.
    #[must_use]
    pub fn ip_proto(proto: u8) -> Self {
        Self::basic(OxmBasic::IpProto, vec![proto])
    }

    /// IPv4 source address.
    #[must_use]
    pub fn ipv4_src(addr: Ipv4Addr) -> Self {
        Self::basic(OxmBasic::Ipv4Src, addr.octets().to_vec())
    }

    /// IPv4 source prefix.
    #[must_use]
    pub fn ipv4_src_masked(addr: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self::basic_masked(OxmBasic::Ipv4Src, addr.octets().to_vec(), mask.octets().to_vec())
    }

    /// IPv4 destination address.
    #[must_use]
    pub fn ipv4_dst(addr: Ipv4Addr) -> Self {
        Self::basic(OxmBasic::Ipv4Dst, addr.octets().to_vec())
    }

    /// IPv6 source address.
    #[must_use]
    pub fn ipv6_src(addr: Ipv6Addr) -> Self {
        Self::basic(OxmBasic::Ipv6Src, addr.octets().to_vec())
    }

    /// IPv6 destination address.
    #[must_use]
    pub fn ipv6_dst(addr: Ipv6Addr) -> Self {
        Self::basic(OxmBasic::Ipv6Dst, addr.octets().to_vec())
    }

    /// TCP source port.
    #[must_use]
    pub fn tcp_src(port: u16) -> Self {
        Self::basic(OxmBasic::TcpSrc, port.to_be_bytes().to_vec())
    }

    /// TCP destination port.
    #[must_use]
    pub fn tcp_dst(port: u16) -> Self {
        Self::basic(OxmBasic::TcpDst, port.to_be_bytes().to_vec())
    }

    /// UDP source port.
    #[must_use]
    pub fn udp_src(port: u16) -> Self {
        Self::basic(OxmBasic::UdpSrc, port.to_be_bytes().to_vec())
    }

    /// UDP destination port.
    #[must_use]
    pub fn udp_dst(port: u16) -> Self {
        Self::basic(OxmBasic::UdpDst, port.to_be_bytes().to_vec())
    }

    /// ARP opcode.
    #[must_use]
    pub fn arp_op(op: u16) -> Self {
        Self::basic(OxmBasic::ArpOp, op.to_be_bytes().to_vec())
    }

    /// ICMPv6 type.
    #[must_use]
    pub fn icmpv6_type(ty: u8) -> Self {
        Self::basic(OxmBasic::Icmpv6Type, vec![ty])
    }

    /// MPLS label.
    #[must_use]
    pub fn mpls_label(label: u32) -> Self {
        Self::basic(OxmBasic::MplsLabel, label.to_be_bytes().to_vec())
    }

    /// Logical tunnel id (1.3).
    #[must_use]
    pub fn tunnel_id(id: u64) -> Self {
        Self::basic(OxmBasic::TunnelId, id.to_be_bytes().to_vec())
    }

    /// Returns the standard field this TLV carries, if any.
    #[must_use]
    pub fn basic_field(&self) -> Option<OxmBasic> {
        if self.class == OPENFLOW_BASIC {
            OxmBasic::from_field(self.field)
        } else {
            None
        }
    }

    /// Interprets the value as a big-endian integer of up to eight bytes.
    #[must_use]
    pub fn value_u64(&self) -> Option<u64> {
        if self.value.len() > 8 {
            return None;
        }
        Some(self.value.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Payload length carried in the TLV header.
    fn payload_len(&self) -> usize {
        self.value.len() + self.mask.as_ref().map_or(0, Bytes::len)
    }

    /// Encoded size including the 4-byte TLV header.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        4 + self.payload_len()
    }

    /// The 32-bit TLV header.
    #[must_use]
    pub fn header(&self) -> u32 {
        let has_mask = u32::from(self.mask.is_some());
        (u32::from(self.class) << 16)
            | (u32::from(self.field & 0x7f) << 9)
            | (has_mask << 8)
            | (self.payload_len() as u32 & 0xff)
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.header());
        buf.put_slice(&self.value);
        if let Some(mask) = &self.mask {
            buf.put_slice(mask);
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let header = r.u32()?;
        let class = (header >> 16) as u16;
        let field = ((header >> 9) & 0x7f) as u8;
        let has_mask = header & 0x100 != 0;
        let len = (header & 0xff) as usize;

        if has_mask {
            if len % 2 != 0 {
                return Err(DecodeError::bad_length("masked oxm field", len));
            }
            let value = r.bytes(len / 2)?;
            let mask = r.bytes(len / 2)?;
            Ok(Self {
                class,
                field,
                value,
                mask: Some(mask),
            })
        } else {
            Ok(Self {
                class,
                field,
                value: r.bytes(len)?,
                mask: None,
            })
        }
    }

    /// Decodes TLVs until the reader is exhausted.
    pub(crate) fn decode_list(r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        while !r.is_empty() {
            out.push(Self::decode(r)?);
        }
        Ok(out)
    }
}
