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

//! Complete protocol messages.
//!
//! A [`Message`] pairs a header (version, transaction id) with a typed
//! [`Body`]. The wire type code and length are derived: the type from the
//! body variant through the version's table, the length by summing the
//! lengths of every nested structure.

use crate::buf::Reader;
use crate::error_msg::ErrorMsg;
use crate::features::{FeaturesReply, SwitchConfig};
use crate::flow::{FlowMod, FlowRemoved, TableMod};
use crate::group::GroupMod;
use crate::header::{RawHeader, HEADER_LEN, MAX_MESSAGE_LEN};
use crate::hello::Hello;
use crate::meter::MeterMod;
use crate::packet::{PacketIn, PacketOut};
use crate::port::{PortMod, PortStatus};
use crate::queue::{self, QueueGetConfigReply};
use crate::role::{AsyncConfig, Role};
use crate::stats::{StatsReply, StatsRequest};
use crate::{DecodeError, EncodeError, MessageType, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// Typed message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Version negotiation.
    Hello(Hello),
    /// Error notification.
    Error(ErrorMsg),
    /// Keepalive request with arbitrary payload.
    EchoRequest(Bytes),
    /// Keepalive reply echoing the request payload.
    EchoReply(Bytes),
    /// Vendor (1.0) or experimenter extension message.
    Experimenter {
        /// Vendor or experimenter id.
        experimenter: u32,
        /// Experimenter-defined type (1.2+).
        exp_type: u32,
        /// Opaque body.
        data: Bytes,
    },
    /// Capability query.
    FeaturesRequest,
    /// Capability answer.
    FeaturesReply(FeaturesReply),
    /// Configuration query.
    GetConfigRequest,
    /// Configuration answer.
    GetConfigReply(SwitchConfig),
    /// Configuration update.
    SetConfig(SwitchConfig),
    /// Packet delivered to the controller.
    PacketIn(PacketIn),
    /// Flow entry removed.
    FlowRemoved(FlowRemoved),
    /// Port changed.
    PortStatus(PortStatus),
    /// Packet injected by the controller.
    PacketOut(PacketOut),
    /// Flow table modification.
    FlowMod(FlowMod),
    /// Group table modification (1.2+).
    GroupMod(GroupMod),
    /// Port configuration change.
    PortMod(PortMod),
    /// Table configuration change (1.2+).
    TableMod(TableMod),
    /// Statistics or multipart request.
    StatsRequest(StatsRequest),
    /// Statistics or multipart reply.
    StatsReply(StatsReply),
    /// Barrier request.
    BarrierRequest,
    /// Barrier reply.
    BarrierReply,
    /// Queue configuration query for a port.
    QueueGetConfigRequest {
        /// Port to query.
        port: u32,
    },
    /// Queue configuration answer.
    QueueGetConfigReply(QueueGetConfigReply),
    /// Role change request (1.2+).
    RoleRequest(Role),
    /// Role change reply (1.2+).
    RoleReply(Role),
    /// Asynchronous filter query (1.3).
    GetAsyncRequest,
    /// Asynchronous filter answer (1.3).
    GetAsyncReply(AsyncConfig),
    /// Asynchronous filter update (1.3).
    SetAsync(AsyncConfig),
    /// Meter table modification (1.3).
    MeterMod(MeterMod),
}

impl Body {
    /// The version-independent type of this body.
    #[must_use]
    pub const fn msg_type(&self) -> MessageType {
        match self {
            Self::Hello(_) => MessageType::Hello,
            Self::Error(_) => MessageType::Error,
            Self::EchoRequest(_) => MessageType::EchoRequest,
            Self::EchoReply(_) => MessageType::EchoReply,
            Self::Experimenter { .. } => MessageType::Experimenter,
            Self::FeaturesRequest => MessageType::FeaturesRequest,
            Self::FeaturesReply(_) => MessageType::FeaturesReply,
            Self::GetConfigRequest => MessageType::GetConfigRequest,
            Self::GetConfigReply(_) => MessageType::GetConfigReply,
            Self::SetConfig(_) => MessageType::SetConfig,
            Self::PacketIn(_) => MessageType::PacketIn,
            Self::FlowRemoved(_) => MessageType::FlowRemoved,
            Self::PortStatus(_) => MessageType::PortStatus,
            Self::PacketOut(_) => MessageType::PacketOut,
            Self::FlowMod(_) => MessageType::FlowMod,
            Self::GroupMod(_) => MessageType::GroupMod,
            Self::PortMod(_) => MessageType::PortMod,
            Self::TableMod(_) => MessageType::TableMod,
            Self::StatsRequest(_) => MessageType::StatsRequest,
            Self::StatsReply(_) => MessageType::StatsReply,
            Self::BarrierRequest => MessageType::BarrierRequest,
            Self::BarrierReply => MessageType::BarrierReply,
            Self::QueueGetConfigRequest { .. } => MessageType::QueueGetConfigRequest,
            Self::QueueGetConfigReply(_) => MessageType::QueueGetConfigReply,
            Self::RoleRequest(_) => MessageType::RoleRequest,
            Self::RoleReply(_) => MessageType::RoleReply,
            Self::GetAsyncRequest => MessageType::GetAsyncRequest,
            Self::GetAsyncReply(_) => MessageType::GetAsyncReply,
            Self::SetAsync(_) => MessageType::SetAsync,
            Self::MeterMod(_) => MessageType::MeterMod,
        }
    }

    fn wire_len(&self, version: Version) -> usize {
        match self {
            Self::Hello(hello) => hello.body_len(),
            Self::Error(err) => err.body_len(),
            Self::EchoRequest(data) | Self::EchoReply(data) => data.len(),
            Self::Experimenter { data, .. } => {
                if version.has_oxm() {
                    8 + data.len()
                } else {
                    4 + data.len()
                }
            }
            Self::FeaturesRequest
            | Self::GetConfigRequest
            | Self::BarrierRequest
            | Self::BarrierReply
            | Self::GetAsyncRequest => 0,
            Self::FeaturesReply(reply) => reply.body_len(version),
            Self::GetConfigReply(_) | Self::SetConfig(_) => SwitchConfig::LEN,
            Self::PacketIn(pin) => pin.body_len(version),
            Self::FlowRemoved(fr) => fr.body_len(version),
            Self::PortStatus(_) => PortStatus::body_len(version),
            Self::PacketOut(out) => out.body_len(version),
            Self::FlowMod(fm) => fm.body_len(version),
            Self::GroupMod(gm) => gm.body_len(version),
            Self::PortMod(_) => PortMod::body_len(version),
            Self::TableMod(_) => TableMod::LEN,
            Self::StatsRequest(req) => req.body_len(version),
            Self::StatsReply(reply) => reply.body_len(version),
            Self::QueueGetConfigRequest { .. } => queue::queue_request_len(version),
            Self::QueueGetConfigReply(reply) => reply.body_len(version),
            Self::RoleRequest(_) | Self::RoleReply(_) => Role::LEN,
            Self::GetAsyncReply(_) | Self::SetAsync(_) => AsyncConfig::LEN,
            Self::MeterMod(mm) => mm.body_len(),
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Self::Hello(hello) => hello.encode(version, buf)?,
            Self::Error(err) => err.encode(version, buf)?,
            Self::EchoRequest(data) | Self::EchoReply(data) => buf.put_slice(data),
            Self::Experimenter {
                experimenter,
                exp_type,
                data,
            } => {
                buf.put_u32(*experimenter);
                if version.has_oxm() {
                    buf.put_u32(*exp_type);
                } else if *exp_type != 0 {
                    return Err(EncodeError::unsupported(version, "experimenter type"));
                }
                buf.put_slice(data);
            }
            Self::FeaturesRequest
            | Self::GetConfigRequest
            | Self::BarrierRequest
            | Self::BarrierReply
            | Self::GetAsyncRequest => {}
            Self::FeaturesReply(reply) => reply.encode(version, buf)?,
            Self::GetConfigReply(cfg) | Self::SetConfig(cfg) => cfg.encode(buf),
            Self::PacketIn(pin) => pin.encode(version, buf)?,
            Self::FlowRemoved(fr) => fr.encode(version, buf)?,
            Self::PortStatus(ps) => ps.encode(version, buf)?,
            Self::PacketOut(out) => out.encode(version, buf)?,
            Self::FlowMod(fm) => fm.encode(version, buf)?,
            Self::GroupMod(gm) => gm.encode(version, buf)?,
            Self::PortMod(pm) => pm.encode(version, buf)?,
            Self::TableMod(tm) => tm.encode(buf),
            Self::StatsRequest(req) => req.encode(version, buf)?,
            Self::StatsReply(reply) => reply.encode(version, buf)?,
            Self::QueueGetConfigRequest { port } => queue::encode_queue_request(version, *port, buf)?,
            Self::QueueGetConfigReply(reply) => reply.encode(version, buf)?,
            Self::RoleRequest(role) | Self::RoleReply(role) => role.encode(buf),
            Self::GetAsyncReply(cfg) | Self::SetAsync(cfg) => cfg.encode(buf),
            Self::MeterMod(mm) => mm.encode(version, buf)?,
        }
        Ok(())
    }

    fn decode(version: Version, ty: MessageType, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let body = match ty {
            MessageType::Hello => Self::Hello(Hello::decode(version, r)?),
            MessageType::Error => Self::Error(ErrorMsg::decode(version, r)?),
            MessageType::EchoRequest => Self::EchoRequest(r.rest()),
            MessageType::EchoReply => Self::EchoReply(r.rest()),
            MessageType::Experimenter => {
                let experimenter = r.u32()?;
                let exp_type = if version.has_oxm() { r.u32()? } else { 0 };
                Self::Experimenter {
                    experimenter,
                    exp_type,
                    data: r.rest(),
                }
            }
            MessageType::FeaturesRequest => Self::FeaturesRequest,
            MessageType::FeaturesReply => Self::FeaturesReply(FeaturesReply::decode(version, r)?),
            MessageType::GetConfigRequest => Self::GetConfigRequest,
            MessageType::GetConfigReply => Self::GetConfigReply(SwitchConfig::decode(r)?),
            MessageType::SetConfig => Self::SetConfig(SwitchConfig::decode(r)?),
            MessageType::PacketIn => Self::PacketIn(PacketIn::decode(version, r)?),
            MessageType::FlowRemoved => Self::FlowRemoved(FlowRemoved::decode(version, r)?),
            MessageType::PortStatus => Self::PortStatus(PortStatus::decode(version, r)?),
            MessageType::PacketOut => Self::PacketOut(PacketOut::decode(version, r)?),
            MessageType::FlowMod => Self::FlowMod(FlowMod::decode(version, r)?),
            MessageType::GroupMod => Self::GroupMod(GroupMod::decode(version, r)?),
            MessageType::PortMod => Self::PortMod(PortMod::decode(version, r)?),
            MessageType::TableMod => Self::TableMod(TableMod::decode(r)?),
            MessageType::StatsRequest => Self::StatsRequest(StatsRequest::decode(version, r)?),
            MessageType::StatsReply => Self::StatsReply(StatsReply::decode(version, r)?),
            MessageType::BarrierRequest => Self::BarrierRequest,
            MessageType::BarrierReply => Self::BarrierReply,
            MessageType::QueueGetConfigRequest => Self::QueueGetConfigRequest {
                port: queue::decode_queue_request(version, r)?,
            },
            MessageType::QueueGetConfigReply => {
                Self::QueueGetConfigReply(QueueGetConfigReply::decode(version, r)?)
            }
            MessageType::RoleRequest => Self::RoleRequest(Role::decode(r)?),
            MessageType::RoleReply => Self::RoleReply(Role::decode(r)?),
            MessageType::GetAsyncRequest => Self::GetAsyncRequest,
            MessageType::GetAsyncReply => Self::GetAsyncReply(AsyncConfig::decode(r)?),
            MessageType::SetAsync => Self::SetAsync(AsyncConfig::decode(r)?),
            MessageType::MeterMod => Self::MeterMod(MeterMod::decode(r)?),
        };
        Ok(body)
    }
}

/// A complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Protocol version of the header and body layout.
    pub version: Version,
    /// Transaction id.
    pub xid: u32,
    /// Typed body.
    pub body: Body,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub const fn new(version: Version, xid: u32, body: Body) -> Self {
        Self { version, xid, body }
    }

    /// The version-independent message type.
    #[must_use]
    pub const fn msg_type(&self) -> MessageType {
        self.body.msg_type()
    }

    /// Total encoded length in bytes, header included.
    ///
    /// This is the value the header's length field carries once encoded.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.body.wire_len(self.version)
    }

    /// Encodes into `dst`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::BufferTooSmall`] if `dst` cannot hold the
    /// message, [`EncodeError::Unsupported`] if the body uses something
    /// the version lacks, and [`EncodeError::TooLarge`] if the message
    /// exceeds the 16-bit length field.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize, EncodeError> {
        let encoded = self.encode_to_vec()?;
        if dst.len() < encoded.len() {
            return Err(EncodeError::BufferTooSmall {
                needed: encoded.len(),
                available: dst.len(),
            });
        }
        dst[..encoded.len()].copy_from_slice(&encoded);
        Ok(encoded.len())
    }

    /// Encodes into a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Message::encode`].
    pub fn to_bytes(&self) -> Result<Bytes, EncodeError> {
        Ok(self.encode_to_vec()?.freeze())
    }

    fn encode_to_vec(&self) -> Result<BytesMut, EncodeError> {
        let code = self
            .msg_type()
            .code(self.version)
            .ok_or(EncodeError::unsupported(self.version, "message type"))?;
        let length = self.encoded_len();
        if length > MAX_MESSAGE_LEN {
            return Err(EncodeError::TooLarge(length));
        }
        let header = RawHeader {
            version: self.version.wire(),
            type_code: code,
            length: length as u16,
            xid: self.xid,
        };
        let mut buf = BytesMut::with_capacity(length);
        buf.put_slice(&header.to_bytes());
        self.body.encode(self.version, &mut buf)?;
        if buf.len() != length {
            return Err(EncodeError::LengthMismatch {
                computed: length,
                written: buf.len(),
            });
        }
        Ok(buf)
    }

    /// Decodes one message from the start of `buf`.
    ///
    /// Only the `length` bytes the header declares are read; anything
    /// after them belongs to the next message.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the header is short or inconsistent,
    /// the version or type is unknown, or the body is malformed.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let header = RawHeader::parse(buf)?;
        let version =
            Version::from_wire(header.version).ok_or(DecodeError::UnknownVersion(header.version))?;
        let ty = MessageType::from_code(version, header.type_code).ok_or(DecodeError::UnknownType {
            version,
            code: header.type_code,
        })?;
        let length = usize::from(header.length);
        if buf.len() < length {
            return Err(DecodeError::Truncated {
                needed: length,
                available: buf.len(),
            });
        }
        let mut r = Reader::new(&buf[HEADER_LEN..length]);
        let body = Body::decode(version, ty, &mut r)?;
        r.finish("message body")?;
        Ok(Self {
            version,
            xid: header.xid,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::features::Capabilities;
    use crate::flow::flow_command;
    use crate::group::{group_command, group_type, Bucket};
    use crate::instruction::Instruction;
    use crate::match10::Match10;
    use crate::matching::{Match, OxmMatch};
    use crate::meter::{meter_command, meter_flags, MeterBand};
    use crate::oxm::OxmField;
    use crate::packet::{packet_in_reason, NO_BUFFER};
    use crate::port::{Port, PortConfig, PortState};
    use crate::queue::{PacketQueue, QueueProperty};
    use crate::role::ControllerRole;
    use crate::stats::{
        AggregateStats, Counter, DescStats, FlowStats, FlowStatsRequest, GroupDesc, GroupFeatures,
        GroupStats, MeterConfig, MeterFeatures, MeterStats, PortStats, QueueStats, StatsReplyBody,
        StatsRequestBody, TableInfo, TableStats,
    };
    use crate::table_features::{TableFeatureProp, TableFeatures};
    use crate::StatsType;
    use std::collections::HashSet;
    use std::net::Ipv4Addr;

    fn roundtrip(msg: &Message) -> Bytes {
        let bytes = msg.to_bytes().expect("encode should succeed");
        assert_eq!(bytes.len(), msg.encoded_len());
        assert_eq!(
            usize::from(u16::from_be_bytes([bytes[2], bytes[3]])),
            bytes.len()
        );
        let decoded = Message::decode(&bytes).expect("decode should succeed");
        assert_eq!(&decoded, msg);
        bytes
    }

    fn port(version: Version, port_no: u32) -> Port {
        let (curr_speed, max_speed) = if version.has_oxm() {
            (1_000_000, 10_000_000)
        } else {
            (0, 0)
        };
        Port {
            port_no,
            hw_addr: [0x02, 0, 0, 0, 0, port_no as u8],
            name: format!("eth{port_no}"),
            config: PortConfig::NO_PACKET_IN,
            state: PortState::LINK_DOWN,
            curr: 0x20,
            advertised: 0x20,
            supported: 0x2f,
            peer: 0x08,
            curr_speed,
            max_speed,
        }
    }

    fn reply(body: StatsReplyBody) -> Body {
        Body::StatsReply(StatsReply::new(body))
    }

    /// Bodies a datapath sends on every version.
    fn datapath_bodies(version: Version) -> Vec<Body> {
        let oxm = version.has_oxm();
        let (table_info, queue_port) = match version {
            Version::V1_0 => (
                Some(TableInfo::V10 {
                    name: "classifier".into(),
                    wildcards: 0x003f_ffff,
                    max_entries: 1 << 20,
                }),
                0,
            ),
            Version::V1_2 => (
                Some(TableInfo::V12 {
                    name: "classifier".into(),
                    match_fields: 0xffff,
                    wildcards: 0xfff0,
                    write_actions: 0x3f,
                    apply_actions: 0x3f,
                    write_setfields: 0xff,
                    apply_setfields: 0xff,
                    metadata_match: u64::MAX,
                    metadata_write: u64::MAX,
                    instructions: 0x3e,
                    config: 3,
                    max_entries: 1 << 20,
                }),
                5,
            ),
            Version::V1_3 => (None, 5),
        };
        let duration = if version == Version::V1_3 { (12, 500) } else { (0, 0) };
        let mut properties = vec![QueueProperty::MinRate(100)];
        if oxm {
            properties.push(QueueProperty::MaxRate(900));
        }

        let mut flow_stats = FlowStats {
            table_id: 1,
            duration_sec: 30,
            duration_nsec: 7,
            priority: 100,
            idle_timeout: 60,
            hard_timeout: 600,
            flags: 0,
            cookie: 0xc0de,
            packet_count: 12,
            byte_count: 1_500,
            match_fields: Match::any(version),
            actions: Vec::new(),
            instructions: Vec::new(),
        };
        if oxm {
            flow_stats.instructions = vec![Instruction::ApplyActions(vec![Action::output(3)])];
        } else {
            flow_stats.actions = vec![Action::output(3)];
        }
        if version == Version::V1_3 {
            flow_stats.flags = 1;
        }

        let (match_fields, table_id, hard_timeout) = if oxm {
            (Match::Oxm(OxmMatch::new().with(OxmField::in_port(4))), 2, 300)
        } else {
            (Match::Standard(Match10::any().with_in_port(4)), 0, 0)
        };
        let flow_removed = FlowRemoved {
            cookie: 0xc0de,
            priority: 10,
            reason: 2,
            table_id,
            duration_sec: 90,
            duration_nsec: 250,
            idle_timeout: 30,
            hard_timeout,
            packet_count: 44,
            byte_count: 4_400,
            match_fields,
        };

        let mut packet_in = PacketIn {
            buffer_id: NO_BUFFER,
            total_len: 64,
            reason: packet_in_reason::ACTION,
            table_id: 0,
            cookie: 0,
            in_port: 0,
            match_fields: OxmMatch::new(),
            data: Bytes::from_static(b"frame"),
        };
        if oxm {
            packet_in.table_id = 1;
            packet_in.match_fields = OxmMatch::new().with(OxmField::in_port(4));
        } else {
            packet_in.in_port = 4;
        }
        if version == Version::V1_3 {
            packet_in.cookie = 0xfeed;
        }

        vec![
            Body::EchoReply(Bytes::from_static(b"pong")),
            Body::GetConfigReply(SwitchConfig {
                flags: 1,
                miss_send_len: 0xffe5,
            }),
            Body::PacketIn(packet_in),
            Body::FlowRemoved(flow_removed),
            Body::PortStatus(PortStatus {
                reason: 2,
                desc: port(version, 7),
            }),
            Body::PortMod(PortMod {
                port_no: 7,
                hw_addr: [0x02, 0, 0, 0, 0, 7],
                config: PortConfig::PORT_DOWN,
                mask: PortConfig::PORT_DOWN | PortConfig::NO_FWD,
                advertise: 0x20,
            }),
            Body::QueueGetConfigReply(QueueGetConfigReply {
                port: 5,
                queues: vec![PacketQueue {
                    queue_id: 1,
                    port: queue_port,
                    properties,
                }],
            }),
            reply(StatsReplyBody::Flow(vec![flow_stats])),
            reply(StatsReplyBody::Aggregate(AggregateStats {
                packet_count: 9,
                byte_count: 900,
                flow_count: 3,
            })),
            reply(StatsReplyBody::Table(vec![TableStats {
                table_id: 0,
                active_count: 4,
                lookup_count: 100,
                matched_count: 80,
                info: table_info,
            }])),
            reply(StatsReplyBody::Port(vec![PortStats {
                port_no: 7,
                rx_packets: 1,
                tx_packets: 2,
                rx_bytes: 3,
                tx_bytes: 4,
                rx_dropped: 5,
                tx_dropped: 6,
                rx_errors: 7,
                tx_errors: 8,
                rx_frame_err: 9,
                rx_over_err: 10,
                rx_crc_err: 11,
                collisions: 12,
                duration_sec: duration.0,
                duration_nsec: duration.1,
            }])),
            reply(StatsReplyBody::Queue(vec![QueueStats {
                port_no: 7,
                queue_id: 1,
                tx_bytes: 640,
                tx_packets: 10,
                tx_errors: 1,
                duration_sec: duration.0,
                duration_nsec: duration.1,
            }])),
            reply(StatsReplyBody::Experimenter {
                experimenter: 0x2320,
                exp_type: if oxm { 3 } else { 0 },
                data: Bytes::from_static(b"vendor"),
            }),
        ]
    }

    fn samples(version: Version) -> Vec<Message> {
        let mut bodies = vec![
            Body::Hello(Hello::new()),
            Body::EchoRequest(Bytes::from_static(b"ping")),
            Body::FeaturesRequest,
            Body::GetConfigRequest,
            Body::SetConfig(SwitchConfig::default()),
            Body::BarrierRequest,
            Body::BarrierReply,
            Body::QueueGetConfigRequest { port: 1 },
            Body::Error(ErrorMsg::new(1, 1, Bytes::from_static(&[1, 2, 3]))),
            Body::PacketOut(PacketOut::to_port(3, Bytes::from_static(b"payload"))),
            Body::StatsRequest(StatsRequest::new(StatsRequestBody::Desc)),
            Body::StatsRequest(StatsRequest::new(StatsRequestBody::Flow(FlowStatsRequest::all(
                version,
            )))),
            Body::StatsReply(StatsReply::new(StatsReplyBody::Desc(DescStats {
                mfr_desc: "mfr".into(),
                ..DescStats::default()
            }))),
            Body::Experimenter {
                experimenter: 0x2320,
                exp_type: 0,
                data: Bytes::from_static(b"nx"),
            },
        ];
        match version {
            Version::V1_0 => {
                let mut fm = FlowMod::add(Match::Standard(
                    Match10::any()
                        .with_dl_type(0x0800)
                        .with_nw_src(Ipv4Addr::new(10, 0, 0, 0), 8),
                ));
                fm.actions = vec![Action::output(2)];
                bodies.push(Body::FlowMod(fm));
                bodies.push(Body::FeaturesReply(FeaturesReply {
                    datapath_id: 1,
                    n_buffers: 256,
                    n_tables: 1,
                    capabilities: Capabilities::FLOW_STATS,
                    ports: vec![Port {
                        port_no: 1,
                        name: "eth1".into(),
                        ..Port::default()
                    }],
                    ..FeaturesReply::default()
                }));
            }
            Version::V1_2 | Version::V1_3 => {
                let mut fm = FlowMod::add(Match::Oxm(
                    OxmMatch::new()
                        .with(OxmField::in_port(1))
                        .with(OxmField::eth_type(0x0800)),
                ));
                fm.command = flow_command::MODIFY;
                fm.instructions = vec![Instruction::ApplyActions(vec![Action::output(2)])];
                bodies.push(Body::FlowMod(fm));
                bodies.push(Body::GroupMod(GroupMod {
                    command: group_command::ADD,
                    group_type: group_type::ALL,
                    group_id: 1,
                    buckets: vec![Bucket::new(vec![Action::output(1)])],
                }));
                bodies.push(Body::RoleRequest(Role {
                    role: ControllerRole::Equal,
                    generation_id: 0,
                }));
                bodies.push(Body::TableMod(TableMod {
                    table_id: 0,
                    config: 3,
                }));
                bodies.push(Body::RoleReply(Role {
                    role: ControllerRole::Master,
                    generation_id: 0x1234_5678_9abc,
                }));
                bodies.push(Body::FeaturesReply(FeaturesReply {
                    datapath_id: 2,
                    n_buffers: 64,
                    n_tables: 8,
                    capabilities: Capabilities::FLOW_STATS | Capabilities::GROUP_STATS,
                    ports: if version == Version::V1_2 {
                        vec![port(version, 1), port(version, 2)]
                    } else {
                        Vec::new()
                    },
                    ..FeaturesReply::default()
                }));
                let duration = if version == Version::V1_3 { (5, 9) } else { (0, 0) };
                bodies.push(reply(StatsReplyBody::Group(vec![GroupStats {
                    group_id: 1,
                    ref_count: 2,
                    packet_count: 30,
                    byte_count: 3_000,
                    duration_sec: duration.0,
                    duration_nsec: duration.1,
                    bucket_stats: vec![Counter {
                        packet_count: 30,
                        byte_count: 3_000,
                    }],
                }])));
                bodies.push(reply(StatsReplyBody::GroupDesc(vec![GroupDesc {
                    group_type: group_type::SELECT,
                    group_id: 1,
                    buckets: vec![Bucket {
                        weight: 10,
                        ..Bucket::new(vec![Action::output(2)])
                    }],
                }])));
                bodies.push(reply(StatsReplyBody::GroupFeatures(GroupFeatures {
                    types: 0xf,
                    capabilities: 0x3,
                    max_groups: [16, 8, 4, 2],
                    actions: [1, 2, 3, 4],
                })));
            }
        }
        if version == Version::V1_3 {
            let bands = vec![
                MeterBand::Drop {
                    rate: 10_000,
                    burst_size: 100,
                },
                MeterBand::DscpRemark {
                    rate: 5_000,
                    burst_size: 50,
                    prec_level: 1,
                },
            ];
            bodies.push(Body::Hello(Hello::with_versions(&Version::ALL)));
            bodies.push(Body::GetAsyncRequest);
            bodies.push(Body::SetAsync(AsyncConfig::default()));
            bodies.push(Body::GetAsyncReply(AsyncConfig {
                packet_in_mask: [0x7, 0x1],
                port_status_mask: [0x7, 0x7],
                flow_removed_mask: [0xf, 0],
            }));
            bodies.push(Body::FeaturesReply(FeaturesReply {
                datapath_id: 7,
                auxiliary_id: 1,
                ..FeaturesReply::default()
            }));
            bodies.push(Body::MeterMod(MeterMod {
                command: meter_command::ADD,
                flags: meter_flags::KBPS | meter_flags::BURST,
                meter_id: 3,
                bands: bands.clone(),
            }));
            bodies.push(reply(StatsReplyBody::Meter(vec![MeterStats {
                meter_id: 3,
                flow_count: 2,
                packet_in_count: 70,
                byte_in_count: 7_000,
                duration_sec: 40,
                duration_nsec: 1,
                band_stats: vec![Counter {
                    packet_count: 6,
                    byte_count: 600,
                }],
            }])));
            bodies.push(reply(StatsReplyBody::MeterConfig(vec![MeterConfig {
                flags: meter_flags::KBPS,
                meter_id: 3,
                bands,
            }])));
            bodies.push(reply(StatsReplyBody::MeterFeatures(MeterFeatures {
                max_meter: 64,
                band_types: 0x6,
                capabilities: 0xf,
                max_bands: 4,
                max_color: 2,
            })));
            bodies.push(reply(StatsReplyBody::TableFeatures(vec![TableFeatures {
                table_id: 0,
                name: "acl".into(),
                metadata_match: u64::MAX,
                metadata_write: 0xff,
                config: 0,
                max_entries: 4_096,
                properties: vec![
                    TableFeatureProp::NextTables {
                        miss: false,
                        tables: vec![1, 2, 3],
                    },
                    TableFeatureProp::Match(vec![OxmField::in_port(0).header()]),
                ],
            }])));
            bodies.push(reply(StatsReplyBody::PortDesc(vec![port(version, 1), port(version, 2)])));
        }
        bodies.extend(datapath_bodies(version));
        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| Message::new(version, i as u32 + 1, body))
            .collect()
    }

    #[test]
    fn representative_messages_roundtrip() {
        for version in Version::ALL {
            for msg in samples(version) {
                roundtrip(&msg);
            }
        }
    }

    #[test]
    fn samples_cover_every_type_of_each_version() {
        for version in Version::ALL {
            let samples = samples(version);
            let types: HashSet<MessageType> = samples.iter().map(Message::msg_type).collect();
            let stats: HashSet<StatsType> = samples
                .iter()
                .filter_map(|msg| match &msg.body {
                    Body::StatsReply(reply) => Some(reply.body.stats_type()),
                    _ => None,
                })
                .collect();
            for code in 0..=u8::MAX {
                if let Some(ty) = MessageType::from_code(version, code) {
                    assert!(types.contains(&ty), "{ty} missing on {version:?}");
                }
            }
            for code in (0..=13).chain([0xffff]) {
                if let Some(ty) = StatsType::from_code(version, code) {
                    assert!(stats.contains(&ty), "{ty:?} reply missing on {version:?}");
                }
            }
        }
    }

    #[test]
    fn header_fields_per_version() {
        let msg = Message::new(Version::V1_3, 0x0102_0304, Body::BarrierRequest);
        let bytes = roundtrip(&msg);
        assert_eq!(&bytes[..], &[0x04, 20, 0, 8, 1, 2, 3, 4]);

        // Barrier request is type 18 on 1.0.
        let msg = Message::new(Version::V1_0, 1, Body::BarrierRequest);
        let bytes = roundtrip(&msg);
        assert_eq!(bytes[1], 18);
    }

    #[test]
    fn every_prefix_is_rejected() {
        for version in Version::ALL {
            for msg in samples(version) {
                let bytes = msg.to_bytes().expect("encode should succeed");
                for cut in 0..bytes.len() {
                    assert!(
                        Message::decode(&bytes[..cut]).is_err(),
                        "{} prefix of {} bytes decoded",
                        msg.msg_type(),
                        cut
                    );
                }
            }
        }
    }

    #[test]
    fn trailing_data_after_declared_length_is_ignored() {
        let msg = Message::new(Version::V1_2, 5, Body::EchoReply(Bytes::from_static(b"abc")));
        let mut bytes = msg.to_bytes().expect("encode should succeed").to_vec();
        bytes.extend_from_slice(b"next message");
        assert_eq!(Message::decode(&bytes).expect("decode should succeed"), msg);
    }

    #[test]
    fn small_destination_rejected() {
        let msg = Message::new(Version::V1_0, 1, Body::EchoRequest(Bytes::from_static(b"1234")));
        let mut dst = [0u8; 10];
        assert_eq!(
            msg.encode(&mut dst),
            Err(EncodeError::BufferTooSmall {
                needed: 12,
                available: 10
            })
        );
        let mut dst = [0u8; 12];
        assert_eq!(msg.encode(&mut dst), Ok(12));
    }

    #[test]
    fn types_missing_from_a_version() {
        let msg = Message::new(Version::V1_0, 1, Body::GetAsyncRequest);
        assert_eq!(
            msg.to_bytes(),
            Err(EncodeError::unsupported(Version::V1_0, "message type"))
        );

        // Type 22 is role request on 1.2+, undefined on 1.0.
        let raw = [0x01, 22, 0, 8, 0, 0, 0, 1];
        assert_eq!(
            Message::decode(&raw),
            Err(DecodeError::UnknownType {
                version: Version::V1_0,
                code: 22
            })
        );
    }

    #[test]
    fn unknown_version_rejected() {
        let raw = [0x02, 0, 0, 8, 0, 0, 0, 1];
        assert_eq!(Message::decode(&raw), Err(DecodeError::UnknownVersion(2)));
    }

    #[test]
    fn fixed_body_with_extra_bytes_rejected() {
        // Barrier request with a stray byte.
        let raw = [0x04, 20, 0, 9, 0, 0, 0, 1, 0xff];
        assert!(matches!(
            Message::decode(&raw),
            Err(DecodeError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn oversized_message_rejected() {
        let msg = Message::new(
            Version::V1_3,
            1,
            Body::EchoRequest(Bytes::from(vec![0u8; MAX_MESSAGE_LEN])),
        );
        assert_eq!(msg.to_bytes(), Err(EncodeError::TooLarge(MAX_MESSAGE_LEN + 8)));
    }
}
