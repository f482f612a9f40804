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

//! Port numbers and physical port descriptions.
//!
//! Port numbers are 16 bits wide on 1.0 and 32 bits wide afterwards. In
//! memory they are always 32 bits; the reserved range (`0xff00..` on 1.0,
//! `0xffffff00..` later) maps one-to-one between the two widths.

use crate::buf::{BufMutExt, Reader};
use crate::{DecodeError, EncodeError, Version};
use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Well-known port numbers in their 32-bit form.
pub mod ports {
    /// Highest number usable for a physical port.
    pub const MAX: u32 = 0xffff_ff00;
    /// Send the packet out the input port.
    pub const IN_PORT: u32 = 0xffff_fff8;
    /// Submit the packet to the first flow table (packet-out only).
    pub const TABLE: u32 = 0xffff_fff9;
    /// Process with normal L2/L3 switching.
    pub const NORMAL: u32 = 0xffff_fffa;
    /// Flood along the spanning tree.
    pub const FLOOD: u32 = 0xffff_fffb;
    /// All physical ports except the input port.
    pub const ALL: u32 = 0xffff_fffc;
    /// Send to the controller.
    pub const CONTROLLER: u32 = 0xffff_fffd;
    /// The local networking stack.
    pub const LOCAL: u32 = 0xffff_fffe;
    /// Wildcard port (called `NONE` on 1.0).
    pub const ANY: u32 = 0xffff_ffff;
}

const V10_RESERVED_BASE: u16 = 0xff00;

/// Narrows a port number to the 1.0 layout.
pub(crate) fn port_to_v10(port: u32) -> Result<u16, EncodeError> {
    if port >= ports::MAX {
        Ok(V10_RESERVED_BASE + (port - ports::MAX) as u16)
    } else if port < u32::from(V10_RESERVED_BASE) {
        Ok(port as u16)
    } else {
        Err(EncodeError::out_of_range(
            Version::V1_0,
            "port number",
            u64::from(port),
        ))
    }
}

/// Widens a 1.0 port number.
pub(crate) fn port_from_v10(port: u16) -> u32 {
    if port >= V10_RESERVED_BASE {
        ports::MAX + u32::from(port - V10_RESERVED_BASE)
    } else {
        u32::from(port)
    }
}

pub(crate) fn put_port(buf: &mut BytesMut, version: Version, port: u32) -> Result<(), EncodeError> {
    match version {
        Version::V1_0 => buf.put_u16(port_to_v10(port)?),
        Version::V1_2 | Version::V1_3 => buf.put_u32(port),
    }
    Ok(())
}

pub(crate) fn read_port(r: &mut Reader<'_>, version: Version) -> Result<u32, DecodeError> {
    match version {
        Version::V1_0 => Ok(port_from_v10(r.u16()?)),
        Version::V1_2 | Version::V1_3 => r.u32(),
    }
}

bitflags! {
    /// Administrative port configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PortConfig: u32 {
        /// Port is administratively down.
        const PORT_DOWN = 1 << 0;
        /// Disable 802.1D spanning tree (1.0).
        const NO_STP = 1 << 1;
        /// Drop all packets received by the port.
        const NO_RECV = 1 << 2;
        /// Drop received 802.1D STP packets (1.0).
        const NO_RECV_STP = 1 << 3;
        /// Exclude from flooding (1.0).
        const NO_FLOOD = 1 << 4;
        /// Drop packets forwarded to the port.
        const NO_FWD = 1 << 5;
        /// Do not send packet-in messages for the port.
        const NO_PACKET_IN = 1 << 6;
    }
}

bitflags! {
    /// Operational port state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PortState: u32 {
        /// No physical link present.
        const LINK_DOWN = 1 << 0;
        /// Port is blocked (1.2+).
        const BLOCKED = 1 << 1;
        /// Live for fast failover groups (1.2+).
        const LIVE = 1 << 2;
    }
}

/// Description of one datapath port.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Port {
    /// Port number.
    pub port_no: u32,
    /// Hardware address.
    pub hw_addr: [u8; 6],
    /// Human-readable name, at most 15 bytes on the wire.
    pub name: String,
    /// Administrative configuration.
    pub config: PortConfig,
    /// Operational state.
    pub state: PortState,
    /// Current features bitmap.
    pub curr: u32,
    /// Advertised features bitmap.
    pub advertised: u32,
    /// Supported features bitmap.
    pub supported: u32,
    /// Features advertised by the link peer.
    pub peer: u32,
    /// Current bitrate in kbps (1.2+).
    pub curr_speed: u32,
    /// Maximum bitrate in kbps (1.2+).
    pub max_speed: u32,
}

/// Width of the port name field.
pub const PORT_NAME_LEN: usize = 16;

impl Port {
    /// Encoded size of a port description.
    #[must_use]
    pub const fn wire_len(version: Version) -> usize {
        match version {
            Version::V1_0 => 48,
            Version::V1_2 | Version::V1_3 => 64,
        }
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match version {
            Version::V1_0 => {
                if self.curr_speed != 0 || self.max_speed != 0 {
                    return Err(EncodeError::unsupported(version, "port speed fields"));
                }
                buf.put_u16(port_to_v10(self.port_no)?);
                buf.put_slice(&self.hw_addr);
                buf.put_fixed_str(&self.name, PORT_NAME_LEN);
            }
            Version::V1_2 | Version::V1_3 => {
                buf.put_u32(self.port_no);
                buf.put_zeros(4);
                buf.put_slice(&self.hw_addr);
                buf.put_zeros(2);
                buf.put_fixed_str(&self.name, PORT_NAME_LEN);
            }
        }
        buf.put_u32(self.config.bits());
        buf.put_u32(self.state.bits());
        buf.put_u32(self.curr);
        buf.put_u32(self.advertised);
        buf.put_u32(self.supported);
        buf.put_u32(self.peer);
        if version.has_oxm() {
            buf.put_u32(self.curr_speed);
            buf.put_u32(self.max_speed);
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut port = Self::default();
        match version {
            Version::V1_0 => {
                port.port_no = port_from_v10(r.u16()?);
                port.hw_addr = r.array()?;
                port.name = r.fixed_str(PORT_NAME_LEN)?;
            }
            Version::V1_2 | Version::V1_3 => {
                port.port_no = r.u32()?;
                r.skip(4)?;
                port.hw_addr = r.array()?;
                r.skip(2)?;
                port.name = r.fixed_str(PORT_NAME_LEN)?;
            }
        }
        port.config = PortConfig::from_bits_retain(r.u32()?);
        port.state = PortState::from_bits_retain(r.u32()?);
        port.curr = r.u32()?;
        port.advertised = r.u32()?;
        port.supported = r.u32()?;
        port.peer = r.u32()?;
        if version.has_oxm() {
            port.curr_speed = r.u32()?;
            port.max_speed = r.u32()?;
        }
        Ok(port)
    }

    /// Decodes a back-to-back array of port descriptions.
    pub(crate) fn decode_list(version: Version, r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        let width = Self::wire_len(version);
        if r.remaining() % width != 0 {
            return Err(DecodeError::bad_length("port list", r.remaining()));
        }
        let mut out = Vec::with_capacity(r.remaining() / width);
        while !r.is_empty() {
            out.push(Self::decode(version, r)?);
        }
        Ok(out)
    }
}

/// Port status change reasons.
pub mod port_reason {
    /// Port was added.
    pub const ADD: u8 = 0;
    /// Port was removed.
    pub const DELETE: u8 = 1;
    /// Some attribute of the port changed.
    pub const MODIFY: u8 = 2;
}

/// Notification that a port was added, removed or changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    /// One of [`port_reason`].
    pub reason: u8,
    /// The port's new description.
    pub desc: Port,
}

impl PortStatus {
    pub(crate) const fn body_len(version: Version) -> usize {
        8 + Port::wire_len(version)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.reason);
        buf.put_zeros(7);
        self.desc.encode(version, buf)
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let reason = r.u8()?;
        r.skip(7)?;
        Ok(Self {
            reason,
            desc: Port::decode(version, r)?,
        })
    }
}

/// Port configuration change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMod {
    /// Port to modify.
    pub port_no: u32,
    /// Hardware address of the port, used as a sanity check.
    pub hw_addr: [u8; 6],
    /// New configuration bits.
    pub config: PortConfig,
    /// Configuration bits to change.
    pub mask: PortConfig,
    /// Features to advertise; zero leaves them unchanged.
    pub advertise: u32,
}

impl PortMod {
    pub(crate) const fn body_len(version: Version) -> usize {
        match version {
            Version::V1_0 => 24,
            Version::V1_2 | Version::V1_3 => 32,
        }
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match version {
            Version::V1_0 => {
                buf.put_u16(port_to_v10(self.port_no)?);
                buf.put_slice(&self.hw_addr);
            }
            Version::V1_2 | Version::V1_3 => {
                buf.put_u32(self.port_no);
                buf.put_zeros(4);
                buf.put_slice(&self.hw_addr);
                buf.put_zeros(2);
            }
        }
        buf.put_u32(self.config.bits());
        buf.put_u32(self.mask.bits());
        buf.put_u32(self.advertise);
        buf.put_zeros(4);
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let port_no = read_port(r, version)?;
        if version.has_oxm() {
            r.skip(4)?;
        }
        let hw_addr = r.array()?;
        if version.has_oxm() {
            r.skip(2)?;
        }
        let config = PortConfig::from_bits_retain(r.u32()?);
        let mask = PortConfig::from_bits_retain(r.u32()?);
        let advertise = r.u32()?;
        r.skip(4)?;
        Ok(Self {
            port_no,
            hw_addr,
            config,
            mask,
            advertise,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Port {
        Port {
            port_no: 3,
            hw_addr: [0x02, 0, 0, 0, 0, 0x03],
            name: "eth3".into(),
            config: PortConfig::NO_PACKET_IN,
            state: PortState::LINK_DOWN,
            curr: 0x840,
            advertised: 0,
            supported: 0x840,
            peer: 0,
            curr_speed: 0,
            max_speed: 0,
        }
    }

    #[test]
    fn reserved_ports_map_between_widths() {
        assert_eq!(port_to_v10(ports::CONTROLLER), Ok(0xfffd));
        assert_eq!(port_to_v10(ports::ANY), Ok(0xffff));
        assert_eq!(port_from_v10(0xfff8), ports::IN_PORT);
        assert_eq!(port_from_v10(12), 12);
        assert!(port_to_v10(0x1_0000).is_err());
    }

    #[test]
    fn v10_port_layout() {
        let mut buf = BytesMut::new();
        sample().encode(Version::V1_0, &mut buf).expect("encode");
        assert_eq!(buf.len(), Port::wire_len(Version::V1_0));
        assert_eq!(&buf[..2], &[0, 3]);
        assert_eq!(&buf[8..12], b"eth3");

        let decoded = Port::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, sample());
    }

    #[test]
    fn v13_port_carries_speeds() {
        let port = Port {
            curr_speed: 10_000_000,
            max_speed: 10_000_000,
            ..sample()
        };
        let mut buf = BytesMut::new();
        port.encode(Version::V1_3, &mut buf).expect("encode");
        assert_eq!(buf.len(), 64);
        let decoded = Port::decode(Version::V1_3, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, port);

        let mut buf = BytesMut::new();
        assert!(matches!(
            port.encode(Version::V1_0, &mut buf),
            Err(EncodeError::Unsupported { .. })
        ));
    }

    #[test]
    fn port_list_must_be_whole_entries() {
        let buf = [0u8; 50];
        assert!(Port::decode_list(Version::V1_0, &mut Reader::new(&buf)).is_err());
    }

    #[test]
    fn port_mod_widths() {
        let pm = PortMod {
            port_no: 4,
            hw_addr: [2, 0, 0, 0, 0, 4],
            config: PortConfig::PORT_DOWN,
            mask: PortConfig::PORT_DOWN,
            advertise: 0,
        };
        for version in Version::ALL {
            let mut buf = BytesMut::new();
            pm.encode(version, &mut buf).expect("encode");
            assert_eq!(buf.len(), PortMod::body_len(version));
            let decoded = PortMod::decode(version, &mut Reader::new(&buf)).expect("decode");
            assert_eq!(decoded, pm);
        }
    }

    #[test]
    fn port_status_wraps_description() {
        let status = PortStatus {
            reason: port_reason::MODIFY,
            desc: sample(),
        };
        let mut buf = BytesMut::new();
        status.encode(Version::V1_0, &mut buf).expect("encode");
        assert_eq!(buf.len() + 8, 64);
        let decoded = PortStatus::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, status);
    }
}
