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

//! Actions.
//!
//! 1.0 rewrites header fields with dedicated actions; 1.2 and later use a
//! generic set-field action carrying an OXM TLV plus tag push/pop and TTL
//! manipulation. Both families share one enum, and each variant knows in
//! which generations it exists.

use crate::buf::{pad8, BufMutExt, Reader};
use crate::oxm::OxmField;
use crate::port::{port_from_v10, port_to_v10};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// `max_len` value asking the datapath not to buffer the packet.
pub const CONTROLLER_NO_BUFFER: u16 = 0xffff;

/// An action applied to a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Output to a port; `max_len` bounds bytes sent to the controller.
    Output {
        /// Output port.
        port: u32,
        /// Maximum bytes to send when the port is the controller.
        max_len: u16,
    },
    /// Set the 802.1q VLAN id (1.0).
    SetVlanVid(u16),
    /// Set the 802.1q priority (1.0).
    SetVlanPcp(u8),
    /// Strip the 802.1q header (1.0).
    StripVlan,
    /// Set the Ethernet source address (1.0).
    SetDlSrc([u8; 6]),
    /// Set the Ethernet destination address (1.0).
    SetDlDst([u8; 6]),
    /// Set the IPv4 source address (1.0).
    SetNwSrc(u32),
    /// Set the IPv4 destination address (1.0).
    SetNwDst(u32),
    /// Set the IP ToS bits (1.0).
    SetNwTos(u8),
    /// Set the transport source port (1.0).
    SetTpSrc(u16),
    /// Set the transport destination port (1.0).
    SetTpDst(u16),
    /// Output to a queue attached to a port (1.0).
    Enqueue {
        /// Output port.
        port: u32,
        /// Queue on that port.
        queue_id: u32,
    },
    /// Copy TTL outwards (1.2+).
    CopyTtlOut,
    /// Copy TTL inwards (1.2+).
    CopyTtlIn,
    /// Set the MPLS TTL (1.2+).
    SetMplsTtl(u8),
    /// Decrement the MPLS TTL (1.2+).
    DecMplsTtl,
    /// Push a VLAN tag with the given ethertype (1.2+).
    PushVlan(u16),
    /// Pop the outer VLAN tag (1.2+).
    PopVlan,
    /// Push an MPLS label with the given ethertype (1.2+).
    PushMpls(u16),
    /// Pop the outer MPLS label, setting the ethertype (1.2+).
    PopMpls(u16),
    /// Set the queue id for output (1.2+).
    SetQueue(u32),
    /// Apply a group (1.2+).
    Group(u32),
    /// Set the IP TTL (1.2+).
    SetNwTtl(u8),
    /// Decrement the IP TTL (1.2+).
    DecNwTtl,
    /// Rewrite a header field (1.2+).
    SetField(OxmField),
    /// Push a PBB service tag (1.3).
    PushPbb(u16),
    /// Pop the outer PBB service tag (1.3).
    PopPbb,
    /// Vendor (1.0) or experimenter (1.2+) action.
    Experimenter {
        /// Vendor or experimenter id.
        experimenter: u32,
        /// Opaque body; padded to eight-byte alignment on the wire.
        data: Bytes,
    },
}

const EXPERIMENTER_TYPE: u16 = 0xffff;

impl Action {
    /// Shorthand for an output action with no controller byte limit.
    #[must_use]
    pub const fn output(port: u32) -> Self {
        Self::Output {
            port,
            max_len: CONTROLLER_NO_BUFFER,
        }
    }

    /// Returns the wire type code, or an error if the version lacks the action.
    pub fn type_code(&self, version: Version) -> Result<u16, EncodeError> {
        let v10 = matches!(version, Version::V1_0);
        let code = match self {
            Self::Output { .. } => Some(0),
            Self::Experimenter { .. } => Some(EXPERIMENTER_TYPE),
            Self::SetVlanVid(_) if v10 => Some(1),
            Self::SetVlanPcp(_) if v10 => Some(2),
            Self::StripVlan if v10 => Some(3),
            Self::SetDlSrc(_) if v10 => Some(4),
            Self::SetDlDst(_) if v10 => Some(5),
            Self::SetNwSrc(_) if v10 => Some(6),
            Self::SetNwDst(_) if v10 => Some(7),
            Self::SetNwTos(_) if v10 => Some(8),
            Self::SetTpSrc(_) if v10 => Some(9),
            Self::SetTpDst(_) if v10 => Some(10),
            Self::Enqueue { .. } if v10 => Some(11),
            Self::CopyTtlOut if !v10 => Some(11),
            Self::CopyTtlIn if !v10 => Some(12),
            Self::SetMplsTtl(_) if !v10 => Some(15),
            Self::DecMplsTtl if !v10 => Some(16),
            Self::PushVlan(_) if !v10 => Some(17),
            Self::PopVlan if !v10 => Some(18),
            Self::PushMpls(_) if !v10 => Some(19),
            Self::PopMpls(_) if !v10 => Some(20),
            Self::SetQueue(_) if !v10 => Some(21),
            Self::Group(_) if !v10 => Some(22),
            Self::SetNwTtl(_) if !v10 => Some(23),
            Self::DecNwTtl if !v10 => Some(24),
            Self::SetField(_) if !v10 => Some(25),
            Self::PushPbb(_) if version == Version::V1_3 => Some(26),
            Self::PopPbb if version == Version::V1_3 => Some(27),
            _ => None,
        };
        code.ok_or_else(|| EncodeError::unsupported(version, self.name()))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Output { .. } => "output action",
            Self::SetVlanVid(_) => "set-vlan-vid action",
            Self::SetVlanPcp(_) => "set-vlan-pcp action",
            Self::StripVlan => "strip-vlan action",
            Self::SetDlSrc(_) => "set-dl-src action",
            Self::SetDlDst(_) => "set-dl-dst action",
            Self::SetNwSrc(_) => "set-nw-src action",
            Self::SetNwDst(_) => "set-nw-dst action",
            Self::SetNwTos(_) => "set-nw-tos action",
            Self::SetTpSrc(_) => "set-tp-src action",
            Self::SetTpDst(_) => "set-tp-dst action",
            Self::Enqueue { .. } => "enqueue action",
            Self::CopyTtlOut => "copy-ttl-out action",
            Self::CopyTtlIn => "copy-ttl-in action",
            Self::SetMplsTtl(_) => "set-mpls-ttl action",
            Self::DecMplsTtl => "dec-mpls-ttl action",
            Self::PushVlan(_) => "push-vlan action",
            Self::PopVlan => "pop-vlan action",
            Self::PushMpls(_) => "push-mpls action",
            Self::PopMpls(_) => "pop-mpls action",
            Self::SetQueue(_) => "set-queue action",
            Self::Group(_) => "group action",
            Self::SetNwTtl(_) => "set-nw-ttl action",
            Self::DecNwTtl => "dec-nw-ttl action",
            Self::SetField(_) => "set-field action",
            Self::PushPbb(_) => "push-pbb action",
            Self::PopPbb => "pop-pbb action",
            Self::Experimenter { .. } => "experimenter action",
        }
    }

    /// Encoded size for `version`.
    #[must_use]
    pub fn wire_len(&self, version: Version) -> usize {
        match self {
            Self::Output { .. } if version.has_oxm() => 16,
            Self::SetDlSrc(_) | Self::SetDlDst(_) | Self::Enqueue { .. } => 16,
            Self::SetField(field) => pad8(4 + field.wire_len()),
            Self::Experimenter { data, .. } => pad8(8 + data.len()),
            _ => 8,
        }
    }

    /// Total encoded size of an action list.
    #[must_use]
    pub fn list_len(actions: &[Self], version: Version) -> usize {
        actions.iter().map(|a| a.wire_len(version)).sum()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = self.wire_len(version);
        buf.put_u16(self.type_code(version)?);
        buf.put_u16(len as u16);
        match self {
            Self::Output { port, max_len } => {
                if version.has_oxm() {
                    buf.put_u32(*port);
                    buf.put_u16(*max_len);
                    buf.put_zeros(6);
                } else {
                    buf.put_u16(port_to_v10(*port)?);
                    buf.put_u16(*max_len);
                }
            }
            Self::SetVlanVid(v) | Self::SetTpSrc(v) | Self::SetTpDst(v) => {
                buf.put_u16(*v);
                buf.put_zeros(2);
            }
            Self::PushVlan(ethertype)
            | Self::PushMpls(ethertype)
            | Self::PopMpls(ethertype)
            | Self::PushPbb(ethertype) => {
                buf.put_u16(*ethertype);
                buf.put_zeros(2);
            }
            Self::SetVlanPcp(v) | Self::SetNwTos(v) | Self::SetMplsTtl(v) | Self::SetNwTtl(v) => {
                buf.put_u8(*v);
                buf.put_zeros(3);
            }
            Self::StripVlan
            | Self::CopyTtlOut
            | Self::CopyTtlIn
            | Self::DecMplsTtl
            | Self::PopVlan
            | Self::DecNwTtl
            | Self::PopPbb => buf.put_zeros(4),
            Self::SetDlSrc(addr) | Self::SetDlDst(addr) => {
                buf.put_slice(addr);
                buf.put_zeros(6);
            }
            Self::SetNwSrc(v) | Self::SetNwDst(v) | Self::SetQueue(v) | Self::Group(v) => {
                buf.put_u32(*v);
            }
            Self::Enqueue { port, queue_id } => {
                buf.put_u16(port_to_v10(*port)?);
                buf.put_zeros(6);
                buf.put_u32(*queue_id);
            }
            Self::SetField(field) => {
                field.encode(buf);
                buf.put_zeros(len - 4 - field.wire_len());
            }
            Self::Experimenter { experimenter, data } => {
                buf.put_u32(*experimenter);
                buf.put_slice(data);
                buf.put_zeros(len - 8 - data.len());
            }
        }
        Ok(())
    }

    pub(crate) fn encode_list(
        actions: &[Self],
        version: Version,
        buf: &mut BytesMut,
    ) -> Result<(), EncodeError> {
        for action in actions {
            action.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut a = r.element("action", 2, 8)?;
        let code = a.u16()?;
        let len = usize::from(a.u16()?);
        if len % 8 != 0 {
            return Err(DecodeError::bad_length("action", len));
        }
        let v10 = matches!(version, Version::V1_0);
        let unknown = || DecodeError::unknown_sub_type("action", version, code);

        let action = match code {
            0 if v10 => {
                let port = port_from_v10(a.u16()?);
                Self::Output {
                    port,
                    max_len: a.u16()?,
                }
            }
            0 => {
                let port = a.u32()?;
                let max_len = a.u16()?;
                a.skip(6)?;
                Self::Output { port, max_len }
            }
            EXPERIMENTER_TYPE => Self::Experimenter {
                experimenter: a.u32()?,
                data: a.rest(),
            },
            _ if v10 => match code {
                1 => Self::SetVlanVid(read_u16_pad(&mut a)?),
                2 => Self::SetVlanPcp(read_u8_pad(&mut a)?),
                3 => {
                    a.skip(4)?;
                    Self::StripVlan
                }
                4 => Self::SetDlSrc(read_addr_pad(&mut a)?),
                5 => Self::SetDlDst(read_addr_pad(&mut a)?),
                6 => Self::SetNwSrc(a.u32()?),
                7 => Self::SetNwDst(a.u32()?),
                8 => Self::SetNwTos(read_u8_pad(&mut a)?),
                9 => Self::SetTpSrc(read_u16_pad(&mut a)?),
                10 => Self::SetTpDst(read_u16_pad(&mut a)?),
                11 => {
                    let port = port_from_v10(a.u16()?);
                    a.skip(6)?;
                    Self::Enqueue {
                        port,
                        queue_id: a.u32()?,
                    }
                }
                _ => return Err(unknown()),
            },
            11 => skip_pad(&mut a, Self::CopyTtlOut)?,
            12 => skip_pad(&mut a, Self::CopyTtlIn)?,
            15 => Self::SetMplsTtl(read_u8_pad(&mut a)?),
            16 => skip_pad(&mut a, Self::DecMplsTtl)?,
            17 => Self::PushVlan(read_u16_pad(&mut a)?),
            18 => skip_pad(&mut a, Self::PopVlan)?,
            19 => Self::PushMpls(read_u16_pad(&mut a)?),
            20 => Self::PopMpls(read_u16_pad(&mut a)?),
            21 => Self::SetQueue(a.u32()?),
            22 => Self::Group(a.u32()?),
            23 => Self::SetNwTtl(read_u8_pad(&mut a)?),
            24 => skip_pad(&mut a, Self::DecNwTtl)?,
            25 => {
                let field = OxmField::decode(&mut a)?;
                // Remaining bytes are alignment padding.
                a.rest();
                Self::SetField(field)
            }
            26 if version == Version::V1_3 => Self::PushPbb(read_u16_pad(&mut a)?),
            27 if version == Version::V1_3 => skip_pad(&mut a, Self::PopPbb)?,
            _ => return Err(unknown()),
        };
        a.finish("action")?;
        Ok(action)
    }

    pub(crate) fn decode_list(version: Version, r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        while !r.is_empty() {
            out.push(Self::decode(version, r)?);
        }
        Ok(out)
    }
}

fn read_u16_pad(r: &mut Reader<'_>) -> Result<u16, DecodeError> {
    let v = r.u16()?;
    r.skip(2)?;
    Ok(v)
}

fn read_u8_pad(r: &mut Reader<'_>) -> Result<u8, DecodeError> {
    let v = r.u8()?;
    r.skip(3)?;
    Ok(v)
}

fn read_addr_pad(r: &mut Reader<'_>) -> Result<[u8; 6], DecodeError> {
    let addr = r.array()?;
    r.skip(6)?;
    Ok(addr)
}

fn skip_pad(r: &mut Reader<'_>, action: Action) -> Result<Action, DecodeError> {
    r.skip(4)?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ports;

    fn encode(action: &Action, version: Version) -> BytesMut {
        let mut buf = BytesMut::new();
        action.encode(version, &mut buf).expect("encode");
        assert_eq!(buf.len(), action.wire_len(version));
        buf
    }

    #[test]
    fn output_layout_differs_by_version() {
        let action = Action::output(ports::CONTROLLER);

        let v10 = encode(&action, Version::V1_0);
        assert_eq!(&v10[..], &[0, 0, 0, 8, 0xff, 0xfd, 0xff, 0xff]);

        let v13 = encode(&action, Version::V1_3);
        assert_eq!(v13.len(), 16);
        assert_eq!(&v13[4..8], &[0xff, 0xff, 0xff, 0xfd]);

        for version in [Version::V1_0, Version::V1_3] {
            let buf = encode(&action, version);
            let decoded = Action::decode(version, &mut Reader::new(&buf)).expect("decode");
            assert_eq!(decoded, action);
        }
    }

    #[test]
    fn v10_actions_rejected_on_later_versions() {
        let mut buf = BytesMut::new();
        let err = Action::SetDlDst([1, 2, 3, 4, 5, 6])
            .encode(Version::V1_3, &mut buf)
            .expect_err("1.0 only");
        assert_eq!(
            err,
            EncodeError::unsupported(Version::V1_3, "set-dl-dst action")
        );
    }

    #[test]
    fn pbb_is_v13_only() {
        assert!(Action::PopPbb.type_code(Version::V1_2).is_err());
        assert_eq!(Action::PopPbb.type_code(Version::V1_3), Ok(27));
    }

    #[test]
    fn set_field_is_padded() {
        let action = Action::SetField(OxmField::eth_type(0x86dd));
        assert_eq!(action.wire_len(Version::V1_2), 16);
        let buf = encode(&action, Version::V1_2);
        let decoded = Action::decode(Version::V1_2, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, action);
    }

    #[test]
    fn code_eleven_depends_on_version() {
        let enqueue = Action::Enqueue {
            port: 1,
            queue_id: 7,
        };
        let buf = encode(&enqueue, Version::V1_0);
        assert_eq!(
            Action::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode"),
            enqueue
        );

        let buf = encode(&Action::CopyTtlOut, Version::V1_2);
        assert_eq!(
            Action::decode(Version::V1_2, &mut Reader::new(&buf)).expect("decode"),
            Action::CopyTtlOut
        );
    }

    #[test]
    fn list_of_mixed_actions() {
        let actions = vec![
            Action::PushVlan(0x8100),
            Action::SetField(OxmField::vlan_vid(42)),
            Action::Group(3),
            Action::output(4),
        ];
        let mut buf = BytesMut::new();
        Action::encode_list(&actions, Version::V1_3, &mut buf).expect("encode");
        assert_eq!(buf.len(), Action::list_len(&actions, Version::V1_3));

        let decoded = Action::decode_list(Version::V1_3, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, actions);
    }

    #[test]
    fn unaligned_action_length_rejected() {
        let buf = [0, 0, 0, 12, 0, 1, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Action::decode(Version::V1_3, &mut Reader::new(&buf)),
            Err(DecodeError::BadLength { length: 12, .. })
        ));
    }

    #[test]
    fn unknown_action_rejected() {
        let buf = [0, 13, 0, 8, 0, 0, 0, 0];
        assert!(matches!(
            Action::decode(Version::V1_3, &mut Reader::new(&buf)),
            Err(DecodeError::UnknownSubType { code: 13, .. })
        ));
    }
}
