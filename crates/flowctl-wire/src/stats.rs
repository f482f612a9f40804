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

//! Statistics requests and replies.
//!
//! 1.3 renames these "multipart" messages; the layout of the common
//! header is the same as 1.2. Replies too large for one message set the
//! [`STATS_MORE`] flag on every part but the last.

use crate::action::Action;
use crate::buf::{BufMutExt, Reader};
use crate::group::Bucket;
use crate::instruction::Instruction;
use crate::matching::Match;
use crate::meter::MeterBand;
use crate::port::{port_from_v10, port_to_v10, ports, read_port, Port};
use crate::table_features::{TableFeatures, TABLE_NAME_LEN};
use crate::version::StatsType;
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// Flag set on every reply part except the last (and on request parts).
pub const STATS_MORE: u16 = 0x0001;

/// Table id addressing every table in statistics requests.
pub const ALL_TABLES: u8 = 0xff;

const DESC_STR_LEN: usize = 256;
const SERIAL_NUM_LEN: usize = 32;

/// Selects flows for flow and aggregate statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStatsRequest {
    /// Table to read, or [`ALL_TABLES`].
    pub table_id: u8,
    /// Require an output action to this port ([`ports::ANY`] for no filter).
    pub out_port: u32,
    /// Require an output to this group (1.2+).
    pub out_group: u32,
    /// Cookie value to match (1.2+).
    pub cookie: u64,
    /// Cookie bits that must match (1.2+).
    pub cookie_mask: u64,
    /// Fields to match.
    pub match_fields: Match,
}

impl FlowStatsRequest {
    /// Selects every flow in every table.
    #[must_use]
    pub fn all(version: Version) -> Self {
        Self {
            table_id: ALL_TABLES,
            out_port: ports::ANY,
            out_group: crate::group::GROUP_ANY,
            cookie: 0,
            cookie_mask: 0,
            match_fields: Match::any(version),
        }
    }

    fn wire_len(&self, version: Version) -> usize {
        match version {
            Version::V1_0 => 44,
            Version::V1_2 | Version::V1_3 => 32 + self.match_fields.wire_len(),
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match version {
            Version::V1_0 => {
                if self.cookie != 0 || self.cookie_mask != 0 {
                    return Err(EncodeError::unsupported(version, "cookie filter"));
                }
                self.match_fields.encode(version, buf)?;
                buf.put_u8(self.table_id);
                buf.put_zeros(1);
                buf.put_u16(port_to_v10(self.out_port)?);
            }
            Version::V1_2 | Version::V1_3 => {
                buf.put_u8(self.table_id);
                buf.put_zeros(3);
                buf.put_u32(self.out_port);
                buf.put_u32(self.out_group);
                buf.put_zeros(4);
                buf.put_u64(self.cookie);
                buf.put_u64(self.cookie_mask);
                self.match_fields.encode(version, buf)?;
            }
        }
        Ok(())
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match version {
            Version::V1_0 => {
                let match_fields = Match::decode(version, r)?;
                let table_id = r.u8()?;
                r.skip(1)?;
                Ok(Self {
                    table_id,
                    out_port: port_from_v10(r.u16()?),
                    out_group: crate::group::GROUP_ANY,
                    cookie: 0,
                    cookie_mask: 0,
                    match_fields,
                })
            }
            Version::V1_2 | Version::V1_3 => {
                let table_id = r.u8()?;
                r.skip(3)?;
                let out_port = r.u32()?;
                let out_group = r.u32()?;
                r.skip(4)?;
                Ok(Self {
                    table_id,
                    out_port,
                    out_group,
                    cookie: r.u64()?,
                    cookie_mask: r.u64()?,
                    match_fields: Match::decode(version, r)?,
                })
            }
        }
    }
}

/// Statistics request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsRequestBody {
    /// Datapath description.
    Desc,
    /// Individual flows.
    Flow(FlowStatsRequest),
    /// Aggregate over matching flows.
    Aggregate(FlowStatsRequest),
    /// Table counters.
    Table,
    /// Port counters ([`ports::ANY`] for all ports).
    Port {
        /// Port to query.
        port_no: u32,
    },
    /// Queue counters.
    Queue {
        /// Port to query.
        port_no: u32,
        /// Queue to query (`0xffffffff` for all).
        queue_id: u32,
    },
    /// Group counters (1.2+).
    Group {
        /// Group to query.
        group_id: u32,
    },
    /// Group descriptions (1.2+).
    GroupDesc,
    /// Group capabilities (1.2+).
    GroupFeatures,
    /// Meter counters (1.3).
    Meter {
        /// Meter to query.
        meter_id: u32,
    },
    /// Meter configuration (1.3).
    MeterConfig {
        /// Meter to query.
        meter_id: u32,
    },
    /// Meter capabilities (1.3).
    MeterFeatures,
    /// Table capabilities; a non-empty list asks the datapath to reconfigure (1.3).
    TableFeatures(Vec<TableFeatures>),
    /// Port descriptions (1.3).
    PortDesc,
    /// Vendor (1.0) or experimenter statistics.
    Experimenter {
        /// Vendor or experimenter id.
        experimenter: u32,
        /// Experimenter-defined type (1.2+).
        exp_type: u32,
        /// Opaque body.
        data: Bytes,
    },
}

impl StatsRequestBody {
    /// Statistics type of this body.
    #[must_use]
    pub const fn stats_type(&self) -> StatsType {
        match self {
            Self::Desc => StatsType::Desc,
            Self::Flow(_) => StatsType::Flow,
            Self::Aggregate(_) => StatsType::Aggregate,
            Self::Table => StatsType::Table,
            Self::Port { .. } => StatsType::Port,
            Self::Queue { .. } => StatsType::Queue,
            Self::Group { .. } => StatsType::Group,
            Self::GroupDesc => StatsType::GroupDesc,
            Self::GroupFeatures => StatsType::GroupFeatures,
            Self::Meter { .. } => StatsType::Meter,
            Self::MeterConfig { .. } => StatsType::MeterConfig,
            Self::MeterFeatures => StatsType::MeterFeatures,
            Self::TableFeatures(_) => StatsType::TableFeatures,
            Self::PortDesc => StatsType::PortDesc,
            Self::Experimenter { .. } => StatsType::Experimenter,
        }
    }

    fn wire_len(&self, version: Version) -> usize {
        match self {
            Self::Desc
            | Self::Table
            | Self::GroupDesc
            | Self::GroupFeatures
            | Self::MeterFeatures
            | Self::PortDesc => 0,
            Self::Flow(req) | Self::Aggregate(req) => req.wire_len(version),
            Self::Port { .. }
            | Self::Queue { .. }
            | Self::Group { .. }
            | Self::Meter { .. }
            | Self::MeterConfig { .. } => 8,
            Self::TableFeatures(tables) => tables.iter().map(TableFeatures::wire_len).sum(),
            Self::Experimenter { data, .. } => experimenter_len(version) + data.len(),
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Self::Desc
            | Self::Table
            | Self::GroupDesc
            | Self::GroupFeatures
            | Self::MeterFeatures
            | Self::PortDesc => Ok(()),
            Self::Flow(req) | Self::Aggregate(req) => req.encode(version, buf),
            Self::Port { port_no } => {
                if version.has_oxm() {
                    buf.put_u32(*port_no);
                    buf.put_zeros(4);
                } else {
                    buf.put_u16(port_to_v10(*port_no)?);
                    buf.put_zeros(6);
                }
                Ok(())
            }
            Self::Queue { port_no, queue_id } => {
                if version.has_oxm() {
                    buf.put_u32(*port_no);
                } else {
                    buf.put_u16(port_to_v10(*port_no)?);
                    buf.put_zeros(2);
                }
                buf.put_u32(*queue_id);
                Ok(())
            }
            Self::Group { group_id: id }
            | Self::Meter { meter_id: id }
            | Self::MeterConfig { meter_id: id } => {
                buf.put_u32(*id);
                buf.put_zeros(4);
                Ok(())
            }
            Self::TableFeatures(tables) => {
                for table in tables {
                    table.encode(buf);
                }
                Ok(())
            }
            Self::Experimenter {
                experimenter,
                exp_type,
                data,
            } => encode_experimenter(version, *experimenter, *exp_type, data, buf),
        }
    }

    fn decode(version: Version, ty: StatsType, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let body = match ty {
            StatsType::Desc => Self::Desc,
            StatsType::Table => Self::Table,
            StatsType::GroupDesc => Self::GroupDesc,
            StatsType::GroupFeatures => Self::GroupFeatures,
            StatsType::MeterFeatures => Self::MeterFeatures,
            StatsType::PortDesc => Self::PortDesc,
            StatsType::Flow => Self::Flow(FlowStatsRequest::decode(version, r)?),
            StatsType::Aggregate => Self::Aggregate(FlowStatsRequest::decode(version, r)?),
            StatsType::Port => {
                let port_no = read_port(r, version)?;
                r.skip(if version.has_oxm() { 4 } else { 6 })?;
                Self::Port { port_no }
            }
            StatsType::Queue => {
                let port_no = read_port(r, version)?;
                if !version.has_oxm() {
                    r.skip(2)?;
                }
                Self::Queue {
                    port_no,
                    queue_id: r.u32()?,
                }
            }
            StatsType::Group => Self::Group {
                group_id: read_id_pad(r)?,
            },
            StatsType::Meter => Self::Meter {
                meter_id: read_id_pad(r)?,
            },
            StatsType::MeterConfig => Self::MeterConfig {
                meter_id: read_id_pad(r)?,
            },
            StatsType::TableFeatures => {
                let mut tables = Vec::new();
                while !r.is_empty() {
                    tables.push(TableFeatures::decode(r)?);
                }
                Self::TableFeatures(tables)
            }
            StatsType::Experimenter => {
                let (experimenter, exp_type, data) = decode_experimenter(version, r)?;
                Self::Experimenter {
                    experimenter,
                    exp_type,
                    data,
                }
            }
        };
        Ok(body)
    }
}

fn read_id_pad(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let id = r.u32()?;
    r.skip(4)?;
    Ok(id)
}

const fn experimenter_len(version: Version) -> usize {
    match version {
        Version::V1_0 => 4,
        Version::V1_2 | Version::V1_3 => 8,
    }
}

fn encode_experimenter(
    version: Version,
    experimenter: u32,
    exp_type: u32,
    data: &Bytes,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    buf.put_u32(experimenter);
    if version.has_oxm() {
        buf.put_u32(exp_type);
    } else if exp_type != 0 {
        return Err(EncodeError::unsupported(version, "experimenter type"));
    }
    buf.put_slice(data);
    Ok(())
}

fn decode_experimenter(
    version: Version,
    r: &mut Reader<'_>,
) -> Result<(u32, u32, Bytes), DecodeError> {
    let experimenter = r.u32()?;
    let exp_type = if version.has_oxm() { r.u32()? } else { 0 };
    Ok((experimenter, exp_type, r.rest()))
}

/// A statistics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    /// Request flags.
    pub flags: u16,
    /// Request body.
    pub body: StatsRequestBody,
}

impl StatsRequest {
    /// A single-part request.
    #[must_use]
    pub const fn new(body: StatsRequestBody) -> Self {
        Self { flags: 0, body }
    }

    pub(crate) fn body_len(&self, version: Version) -> usize {
        version.stats_header_len() - crate::header::HEADER_LEN + self.body.wire_len(version)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        put_stats_header(version, self.body.stats_type(), self.flags, buf)?;
        self.body.encode(version, buf)
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let (ty, flags) = read_stats_header(version, r)?;
        Ok(Self {
            flags,
            body: StatsRequestBody::decode(version, ty, r)?,
        })
    }
}

fn put_stats_header(
    version: Version,
    ty: StatsType,
    flags: u16,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    let code = ty
        .code(version)
        .ok_or(EncodeError::unsupported(version, "statistics type"))?;
    buf.put_u16(code);
    buf.put_u16(flags);
    if version.has_oxm() {
        buf.put_zeros(4);
    }
    Ok(())
}

fn read_stats_header(version: Version, r: &mut Reader<'_>) -> Result<(StatsType, u16), DecodeError> {
    let code = r.u16()?;
    let ty = StatsType::from_code(version, code)
        .ok_or(DecodeError::unknown_sub_type("statistics", version, code))?;
    let flags = r.u16()?;
    if version.has_oxm() {
        r.skip(4)?;
    }
    Ok((ty, flags))
}

/// Datapath description strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct DescStats {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
    pub dp_desc: String,
}

impl DescStats {
    const LEN: usize = 4 * DESC_STR_LEN + SERIAL_NUM_LEN;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_fixed_str(&self.mfr_desc, DESC_STR_LEN);
        buf.put_fixed_str(&self.hw_desc, DESC_STR_LEN);
        buf.put_fixed_str(&self.sw_desc, DESC_STR_LEN);
        buf.put_fixed_str(&self.serial_num, SERIAL_NUM_LEN);
        buf.put_fixed_str(&self.dp_desc, DESC_STR_LEN);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            mfr_desc: r.fixed_str(DESC_STR_LEN)?,
            hw_desc: r.fixed_str(DESC_STR_LEN)?,
            sw_desc: r.fixed_str(DESC_STR_LEN)?,
            serial_num: r.fixed_str(SERIAL_NUM_LEN)?,
            dp_desc: r.fixed_str(DESC_STR_LEN)?,
        })
    }
}

/// One flow entry's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct FlowStats {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    /// Flow-mod flags (1.3).
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub match_fields: Match,
    /// Actions (1.0).
    pub actions: Vec<Action>,
    /// Instructions (1.2+).
    pub instructions: Vec<Instruction>,
}

impl FlowStats {
    fn wire_len(&self, version: Version) -> usize {
        match version {
            Version::V1_0 => 88 + Action::list_len(&self.actions, version),
            Version::V1_2 | Version::V1_3 => {
                48 + self.match_fields.wire_len() + Instruction::list_len(&self.instructions, version)
            }
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(self.wire_len(version) as u16);
        buf.put_u8(self.table_id);
        buf.put_zeros(1);
        if version == Version::V1_0 {
            if !self.instructions.is_empty() {
                return Err(EncodeError::unsupported(version, "instructions"));
            }
            self.match_fields.encode(version, buf)?;
        } else if !self.actions.is_empty() {
            return Err(EncodeError::unsupported(version, "bare flow actions"));
        }
        buf.put_u32(self.duration_sec);
        buf.put_u32(self.duration_nsec);
        buf.put_u16(self.priority);
        buf.put_u16(self.idle_timeout);
        buf.put_u16(self.hard_timeout);
        if version == Version::V1_3 {
            buf.put_u16(self.flags);
            buf.put_zeros(4);
        } else {
            if self.flags != 0 {
                return Err(EncodeError::unsupported(version, "flow stats flags"));
            }
            buf.put_zeros(6);
        }
        buf.put_u64(self.cookie);
        buf.put_u64(self.packet_count);
        buf.put_u64(self.byte_count);
        if version == Version::V1_0 {
            Action::encode_list(&self.actions, version, buf)
        } else {
            self.match_fields.encode(version, buf)?;
            Instruction::encode_list(&self.instructions, version, buf)
        }
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let min = if version == Version::V1_0 { 88 } else { 56 };
        let mut e = r.element("flow stats", 0, min)?;
        e.skip(2)?;
        let table_id = e.u8()?;
        e.skip(1)?;
        let v10_match = if version == Version::V1_0 {
            Some(Match::decode(version, &mut e)?)
        } else {
            None
        };
        let duration_sec = e.u32()?;
        let duration_nsec = e.u32()?;
        let priority = e.u16()?;
        let idle_timeout = e.u16()?;
        let hard_timeout = e.u16()?;
        let flags = if version == Version::V1_3 {
            let flags = e.u16()?;
            e.skip(4)?;
            flags
        } else {
            e.skip(6)?;
            0
        };
        let cookie = e.u64()?;
        let packet_count = e.u64()?;
        let byte_count = e.u64()?;
        let (match_fields, actions, instructions) = match v10_match {
            Some(m) => (m, Action::decode_list(version, &mut e)?, Vec::new()),
            None => {
                let m = Match::decode(version, &mut e)?;
                (m, Vec::new(), Instruction::decode_list(version, &mut e)?)
            }
        };
        Ok(Self {
            table_id,
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            flags,
            cookie,
            packet_count,
            byte_count,
            match_fields,
            actions,
            instructions,
        })
    }
}

/// Aggregate counters over matching flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct AggregateStats {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

/// Generation-specific table description carried by table statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TableInfo {
    /// 1.0 table description.
    V10 {
        name: String,
        wildcards: u32,
        max_entries: u32,
    },
    /// 1.2 table capabilities.
    V12 {
        name: String,
        match_fields: u64,
        wildcards: u64,
        write_actions: u32,
        apply_actions: u32,
        write_setfields: u64,
        apply_setfields: u64,
        metadata_match: u64,
        metadata_write: u64,
        instructions: u32,
        config: u32,
        max_entries: u32,
    },
}

/// One flow table's counters.
///
/// 1.3 reports only the counters; earlier generations also describe the
/// table in [`TableStats::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TableStats {
    pub table_id: u8,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
    pub info: Option<TableInfo>,
}

impl TableStats {
    const fn wire_len(version: Version) -> usize {
        match version {
            Version::V1_0 => 64,
            Version::V1_2 => 128,
            Version::V1_3 => 24,
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.table_id);
        match (version, &self.info) {
            (
                Version::V1_0,
                Some(TableInfo::V10 {
                    name,
                    wildcards,
                    max_entries,
                }),
            ) => {
                buf.put_zeros(3);
                buf.put_fixed_str(name, TABLE_NAME_LEN);
                buf.put_u32(*wildcards);
                buf.put_u32(*max_entries);
                buf.put_u32(self.active_count);
            }
            (
                Version::V1_2,
                Some(TableInfo::V12 {
                    name,
                    match_fields,
                    wildcards,
                    write_actions,
                    apply_actions,
                    write_setfields,
                    apply_setfields,
                    metadata_match,
                    metadata_write,
                    instructions,
                    config,
                    max_entries,
                }),
            ) => {
                buf.put_zeros(7);
                buf.put_fixed_str(name, TABLE_NAME_LEN);
                buf.put_u64(*match_fields);
                buf.put_u64(*wildcards);
                buf.put_u32(*write_actions);
                buf.put_u32(*apply_actions);
                buf.put_u64(*write_setfields);
                buf.put_u64(*apply_setfields);
                buf.put_u64(*metadata_match);
                buf.put_u64(*metadata_write);
                buf.put_u32(*instructions);
                buf.put_u32(*config);
                buf.put_u32(*max_entries);
                buf.put_u32(self.active_count);
            }
            (Version::V1_3, None) => {
                buf.put_zeros(3);
                buf.put_u32(self.active_count);
            }
            _ => return Err(EncodeError::unsupported(version, "table stats layout")),
        }
        buf.put_u64(self.lookup_count);
        buf.put_u64(self.matched_count);
        Ok(())
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let table_id = r.u8()?;
        let (info, active_count) = match version {
            Version::V1_0 => {
                r.skip(3)?;
                let name = r.fixed_str(TABLE_NAME_LEN)?;
                let wildcards = r.u32()?;
                let max_entries = r.u32()?;
                let info = TableInfo::V10 {
                    name,
                    wildcards,
                    max_entries,
                };
                (Some(info), r.u32()?)
            }
            Version::V1_2 => {
                r.skip(7)?;
                let info = TableInfo::V12 {
                    name: r.fixed_str(TABLE_NAME_LEN)?,
                    match_fields: r.u64()?,
                    wildcards: r.u64()?,
                    write_actions: r.u32()?,
                    apply_actions: r.u32()?,
                    write_setfields: r.u64()?,
                    apply_setfields: r.u64()?,
                    metadata_match: r.u64()?,
                    metadata_write: r.u64()?,
                    instructions: r.u32()?,
                    config: r.u32()?,
                    max_entries: r.u32()?,
                };
                (Some(info), r.u32()?)
            }
            Version::V1_3 => {
                r.skip(3)?;
                (None, r.u32()?)
            }
        };
        Ok(Self {
            table_id,
            active_count,
            lookup_count: r.u64()?,
            matched_count: r.u64()?,
            info,
        })
    }
}

/// Port counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct PortStats {
    pub port_no: u32,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
    /// Time the port has been alive (1.3).
    pub duration_sec: u32,
    /// Sub-second part of the port lifetime (1.3).
    pub duration_nsec: u32,
}

impl PortStats {
    const fn wire_len(version: Version) -> usize {
        match version {
            Version::V1_0 | Version::V1_2 => 104,
            Version::V1_3 => 112,
        }
    }

    fn counters(&self) -> [u64; 12] {
        [
            self.rx_packets,
            self.tx_packets,
            self.rx_bytes,
            self.tx_bytes,
            self.rx_dropped,
            self.tx_dropped,
            self.rx_errors,
            self.tx_errors,
            self.rx_frame_err,
            self.rx_over_err,
            self.rx_crc_err,
            self.collisions,
        ]
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if version.has_oxm() {
            buf.put_u32(self.port_no);
            buf.put_zeros(4);
        } else {
            buf.put_u16(port_to_v10(self.port_no)?);
            buf.put_zeros(6);
        }
        for counter in self.counters() {
            buf.put_u64(counter);
        }
        put_duration(version, self.duration_sec, self.duration_nsec, buf)
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let port_no = read_port(r, version)?;
        r.skip(if version.has_oxm() { 4 } else { 6 })?;
        let mut stats = Self {
            port_no,
            rx_packets: r.u64()?,
            tx_packets: r.u64()?,
            rx_bytes: r.u64()?,
            tx_bytes: r.u64()?,
            rx_dropped: r.u64()?,
            tx_dropped: r.u64()?,
            rx_errors: r.u64()?,
            tx_errors: r.u64()?,
            rx_frame_err: r.u64()?,
            rx_over_err: r.u64()?,
            rx_crc_err: r.u64()?,
            collisions: r.u64()?,
            ..Self::default()
        };
        (stats.duration_sec, stats.duration_nsec) = read_duration(version, r)?;
        Ok(stats)
    }
}

fn put_duration(version: Version, sec: u32, nsec: u32, buf: &mut BytesMut) -> Result<(), EncodeError> {
    if version == Version::V1_3 {
        buf.put_u32(sec);
        buf.put_u32(nsec);
    } else if sec != 0 || nsec != 0 {
        return Err(EncodeError::unsupported(version, "duration counters"));
    }
    Ok(())
}

fn read_duration(version: Version, r: &mut Reader<'_>) -> Result<(u32, u32), DecodeError> {
    if version == Version::V1_3 {
        Ok((r.u32()?, r.u32()?))
    } else {
        Ok((0, 0))
    }
}

/// Queue counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct QueueStats {
    pub port_no: u32,
    pub queue_id: u32,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    /// 1.3 only.
    pub duration_sec: u32,
    /// 1.3 only.
    pub duration_nsec: u32,
}

impl QueueStats {
    const fn wire_len(version: Version) -> usize {
        match version {
            Version::V1_0 | Version::V1_2 => 32,
            Version::V1_3 => 40,
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if version.has_oxm() {
            buf.put_u32(self.port_no);
        } else {
            buf.put_u16(port_to_v10(self.port_no)?);
            buf.put_zeros(2);
        }
        buf.put_u32(self.queue_id);
        buf.put_u64(self.tx_bytes);
        buf.put_u64(self.tx_packets);
        buf.put_u64(self.tx_errors);
        put_duration(version, self.duration_sec, self.duration_nsec, buf)
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let port_no = read_port(r, version)?;
        if !version.has_oxm() {
            r.skip(2)?;
        }
        let mut stats = Self {
            port_no,
            queue_id: r.u32()?,
            tx_bytes: r.u64()?,
            tx_packets: r.u64()?,
            tx_errors: r.u64()?,
            ..Self::default()
        };
        (stats.duration_sec, stats.duration_nsec) = read_duration(version, r)?;
        Ok(stats)
    }
}

/// Packet and byte counters of one bucket or meter band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct Counter {
    pub packet_count: u64,
    pub byte_count: u64,
}

impl Counter {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.packet_count);
        buf.put_u64(self.byte_count);
    }

    fn decode_list(r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        if r.remaining() % 16 != 0 {
            return Err(DecodeError::bad_length("counter list", r.remaining()));
        }
        let mut out = Vec::with_capacity(r.remaining() / 16);
        while !r.is_empty() {
            out.push(Self {
                packet_count: r.u64()?,
                byte_count: r.u64()?,
            });
        }
        Ok(out)
    }
}

/// Group counters (1.2+).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct GroupStats {
    pub group_id: u32,
    pub ref_count: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    /// 1.3 only.
    pub duration_sec: u32,
    /// 1.3 only.
    pub duration_nsec: u32,
    pub bucket_stats: Vec<Counter>,
}

impl GroupStats {
    fn wire_len(&self, version: Version) -> usize {
        let fixed = if version == Version::V1_3 { 40 } else { 32 };
        fixed + 16 * self.bucket_stats.len()
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(self.wire_len(version) as u16);
        buf.put_zeros(2);
        buf.put_u32(self.group_id);
        buf.put_u32(self.ref_count);
        buf.put_zeros(4);
        buf.put_u64(self.packet_count);
        buf.put_u64(self.byte_count);
        put_duration(version, self.duration_sec, self.duration_nsec, buf)?;
        for counter in &self.bucket_stats {
            counter.encode(buf);
        }
        Ok(())
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let min = if version == Version::V1_3 { 40 } else { 32 };
        let mut e = r.element("group stats", 0, min)?;
        e.skip(4)?;
        let group_id = e.u32()?;
        let ref_count = e.u32()?;
        e.skip(4)?;
        let packet_count = e.u64()?;
        let byte_count = e.u64()?;
        let (duration_sec, duration_nsec) = read_duration(version, &mut e)?;
        Ok(Self {
            group_id,
            ref_count,
            packet_count,
            byte_count,
            duration_sec,
            duration_nsec,
            bucket_stats: Counter::decode_list(&mut e)?,
        })
    }
}

/// Group description (1.2+).
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct GroupDesc {
    pub group_type: u8,
    pub group_id: u32,
    pub buckets: Vec<Bucket>,
}

impl GroupDesc {
    fn wire_len(&self, version: Version) -> usize {
        8 + Bucket::list_len(&self.buckets, version)
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(self.wire_len(version) as u16);
        buf.put_u8(self.group_type);
        buf.put_zeros(1);
        buf.put_u32(self.group_id);
        Bucket::encode_list(&self.buckets, version, buf)
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut e = r.element("group desc", 0, 8)?;
        e.skip(2)?;
        let group_type = e.u8()?;
        e.skip(1)?;
        Ok(Self {
            group_type,
            group_id: e.u32()?,
            buckets: Bucket::decode_list(version, &mut e)?,
        })
    }
}

/// Group table capabilities (1.2+).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct GroupFeatures {
    pub types: u32,
    pub capabilities: u32,
    pub max_groups: [u32; 4],
    pub actions: [u32; 4],
}

/// Meter counters (1.3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct MeterStats {
    pub meter_id: u32,
    pub flow_count: u32,
    pub packet_in_count: u64,
    pub byte_in_count: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub band_stats: Vec<Counter>,
}

impl MeterStats {
    fn wire_len(&self) -> usize {
        40 + 16 * self.band_stats.len()
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.meter_id);
        buf.put_u16(self.wire_len() as u16);
        buf.put_zeros(6);
        buf.put_u32(self.flow_count);
        buf.put_u64(self.packet_in_count);
        buf.put_u64(self.byte_in_count);
        buf.put_u32(self.duration_sec);
        buf.put_u32(self.duration_nsec);
        for counter in &self.band_stats {
            counter.encode(buf);
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut e = r.element("meter stats", 4, 40)?;
        let meter_id = e.u32()?;
        e.skip(8)?;
        Ok(Self {
            meter_id,
            flow_count: e.u32()?,
            packet_in_count: e.u64()?,
            byte_in_count: e.u64()?,
            duration_sec: e.u32()?,
            duration_nsec: e.u32()?,
            band_stats: Counter::decode_list(&mut e)?,
        })
    }
}

/// Meter configuration entry (1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MeterConfig {
    pub flags: u16,
    pub meter_id: u32,
    pub bands: Vec<MeterBand>,
}

impl MeterConfig {
    fn wire_len(&self) -> usize {
        8 + MeterBand::list_len(&self.bands)
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.wire_len() as u16);
        buf.put_u16(self.flags);
        buf.put_u32(self.meter_id);
        MeterBand::encode_list(&self.bands, buf);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut e = r.element("meter config", 0, 8)?;
        e.skip(2)?;
        Ok(Self {
            flags: e.u16()?,
            meter_id: e.u32()?,
            bands: MeterBand::decode_list(&mut e)?,
        })
    }
}

/// Meter capabilities (1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct MeterFeatures {
    pub max_meter: u32,
    pub band_types: u32,
    pub capabilities: u32,
    pub max_bands: u8,
    pub max_color: u8,
}

/// Statistics reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StatsReplyBody {
    Desc(DescStats),
    Flow(Vec<FlowStats>),
    Aggregate(AggregateStats),
    Table(Vec<TableStats>),
    Port(Vec<PortStats>),
    Queue(Vec<QueueStats>),
    Group(Vec<GroupStats>),
    GroupDesc(Vec<GroupDesc>),
    GroupFeatures(GroupFeatures),
    Meter(Vec<MeterStats>),
    MeterConfig(Vec<MeterConfig>),
    MeterFeatures(MeterFeatures),
    TableFeatures(Vec<TableFeatures>),
    PortDesc(Vec<Port>),
    Experimenter {
        experimenter: u32,
        exp_type: u32,
        data: Bytes,
    },
}

impl StatsReplyBody {
    /// Statistics type of this body.
    #[must_use]
    pub const fn stats_type(&self) -> StatsType {
        match self {
            Self::Desc(_) => StatsType::Desc,
            Self::Flow(_) => StatsType::Flow,
            Self::Aggregate(_) => StatsType::Aggregate,
            Self::Table(_) => StatsType::Table,
            Self::Port(_) => StatsType::Port,
            Self::Queue(_) => StatsType::Queue,
            Self::Group(_) => StatsType::Group,
            Self::GroupDesc(_) => StatsType::GroupDesc,
            Self::GroupFeatures(_) => StatsType::GroupFeatures,
            Self::Meter(_) => StatsType::Meter,
            Self::MeterConfig(_) => StatsType::MeterConfig,
            Self::MeterFeatures(_) => StatsType::MeterFeatures,
            Self::TableFeatures(_) => StatsType::TableFeatures,
            Self::PortDesc(_) => StatsType::PortDesc,
            Self::Experimenter { .. } => StatsType::Experimenter,
        }
    }

    fn wire_len(&self, version: Version) -> usize {
        match self {
            Self::Desc(_) => DescStats::LEN,
            Self::Flow(flows) => flows.iter().map(|f| f.wire_len(version)).sum(),
            Self::Aggregate(_) => 24,
            Self::Table(tables) => tables.len() * TableStats::wire_len(version),
            Self::Port(stats) => stats.len() * PortStats::wire_len(version),
            Self::Queue(stats) => stats.len() * QueueStats::wire_len(version),
            Self::Group(stats) => stats.iter().map(|g| g.wire_len(version)).sum(),
            Self::GroupDesc(descs) => descs.iter().map(|g| g.wire_len(version)).sum(),
            Self::GroupFeatures(_) => 40,
            Self::Meter(stats) => stats.iter().map(MeterStats::wire_len).sum(),
            Self::MeterConfig(configs) => configs.iter().map(MeterConfig::wire_len).sum(),
            Self::MeterFeatures(_) => 16,
            Self::TableFeatures(tables) => tables.iter().map(TableFeatures::wire_len).sum(),
            Self::PortDesc(ports) => ports.len() * Port::wire_len(version),
            Self::Experimenter { data, .. } => experimenter_len(version) + data.len(),
        }
    }

    /// Appends the entries of a later reply part of the same type.
    ///
    /// Returns the other part back if the types differ or the body is not
    /// a list.
    pub fn merge(&mut self, other: Self) -> Result<(), Self> {
        match (self, other) {
            (Self::Flow(a), Self::Flow(b)) => a.extend(b),
            (Self::Table(a), Self::Table(b)) => a.extend(b),
            (Self::Port(a), Self::Port(b)) => a.extend(b),
            (Self::Queue(a), Self::Queue(b)) => a.extend(b),
            (Self::Group(a), Self::Group(b)) => a.extend(b),
            (Self::GroupDesc(a), Self::GroupDesc(b)) => a.extend(b),
            (Self::Meter(a), Self::Meter(b)) => a.extend(b),
            (Self::MeterConfig(a), Self::MeterConfig(b)) => a.extend(b),
            (Self::TableFeatures(a), Self::TableFeatures(b)) => a.extend(b),
            (Self::PortDesc(a), Self::PortDesc(b)) => a.extend(b),
            (
                Self::Experimenter { data: a, .. },
                Self::Experimenter { data: b, .. },
            ) => {
                let mut joined = BytesMut::with_capacity(a.len() + b.len());
                joined.extend_from_slice(a);
                joined.extend_from_slice(&b);
                *a = joined.freeze();
            }
            (_, other) => return Err(other),
        }
        Ok(())
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Self::Desc(desc) => desc.encode(buf),
            Self::Flow(flows) => {
                for flow in flows {
                    flow.encode(version, buf)?;
                }
            }
            Self::Aggregate(agg) => {
                buf.put_u64(agg.packet_count);
                buf.put_u64(agg.byte_count);
                buf.put_u32(agg.flow_count);
                buf.put_zeros(4);
            }
            Self::Table(tables) => {
                for table in tables {
                    table.encode(version, buf)?;
                }
            }
            Self::Port(stats) => {
                for s in stats {
                    s.encode(version, buf)?;
                }
            }
            Self::Queue(stats) => {
                for s in stats {
                    s.encode(version, buf)?;
                }
            }
            Self::Group(stats) => {
                for s in stats {
                    s.encode(version, buf)?;
                }
            }
            Self::GroupDesc(descs) => {
                for d in descs {
                    d.encode(version, buf)?;
                }
            }
            Self::GroupFeatures(f) => {
                buf.put_u32(f.types);
                buf.put_u32(f.capabilities);
                for v in f.max_groups.iter().chain(f.actions.iter()) {
                    buf.put_u32(*v);
                }
            }
            Self::Meter(stats) => {
                for s in stats {
                    s.encode(buf);
                }
            }
            Self::MeterConfig(configs) => {
                for c in configs {
                    c.encode(buf);
                }
            }
            Self::MeterFeatures(f) => {
                buf.put_u32(f.max_meter);
                buf.put_u32(f.band_types);
                buf.put_u32(f.capabilities);
                buf.put_u8(f.max_bands);
                buf.put_u8(f.max_color);
                buf.put_zeros(2);
            }
            Self::TableFeatures(tables) => {
                for t in tables {
                    t.encode(buf);
                }
            }
            Self::PortDesc(ports) => {
                for p in ports {
                    p.encode(version, buf)?;
                }
            }
            Self::Experimenter {
                experimenter,
                exp_type,
                data,
            } => encode_experimenter(version, *experimenter, *exp_type, data, buf)?,
        }
        Ok(())
    }

    fn decode(version: Version, ty: StatsType, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        fn fixed_list<T>(
            r: &mut Reader<'_>,
            width: usize,
            context: &'static str,
            mut decode: impl FnMut(&mut Reader<'_>) -> Result<T, DecodeError>,
        ) -> Result<Vec<T>, DecodeError> {
            if r.remaining() % width != 0 {
                return Err(DecodeError::bad_length(context, r.remaining()));
            }
            let mut out = Vec::with_capacity(r.remaining() / width);
            while !r.is_empty() {
                out.push(decode(r)?);
            }
            Ok(out)
        }

        fn element_list<T>(
            r: &mut Reader<'_>,
            mut decode: impl FnMut(&mut Reader<'_>) -> Result<T, DecodeError>,
        ) -> Result<Vec<T>, DecodeError> {
            let mut out = Vec::new();
            while !r.is_empty() {
                out.push(decode(r)?);
            }
            Ok(out)
        }

        let body = match ty {
            StatsType::Desc => Self::Desc(DescStats::decode(r)?),
            StatsType::Flow => Self::Flow(element_list(r, |e| FlowStats::decode(version, e))?),
            StatsType::Aggregate => {
                let agg = AggregateStats {
                    packet_count: r.u64()?,
                    byte_count: r.u64()?,
                    flow_count: r.u32()?,
                };
                r.skip(4)?;
                Self::Aggregate(agg)
            }
            StatsType::Table => Self::Table(fixed_list(
                r,
                TableStats::wire_len(version),
                "table stats",
                |e| TableStats::decode(version, e),
            )?),
            StatsType::Port => Self::Port(fixed_list(
                r,
                PortStats::wire_len(version),
                "port stats",
                |e| PortStats::decode(version, e),
            )?),
            StatsType::Queue => Self::Queue(fixed_list(
                r,
                QueueStats::wire_len(version),
                "queue stats",
                |e| QueueStats::decode(version, e),
            )?),
            StatsType::Group => Self::Group(element_list(r, |e| GroupStats::decode(version, e))?),
            StatsType::GroupDesc => {
                Self::GroupDesc(element_list(r, |e| GroupDesc::decode(version, e))?)
            }
            StatsType::GroupFeatures => {
                let types = r.u32()?;
                let capabilities = r.u32()?;
                let mut max_groups = [0u32; 4];
                for v in &mut max_groups {
                    *v = r.u32()?;
                }
                let mut actions = [0u32; 4];
                for v in &mut actions {
                    *v = r.u32()?;
                }
                Self::GroupFeatures(GroupFeatures {
                    types,
                    capabilities,
                    max_groups,
                    actions,
                })
            }
            StatsType::Meter => Self::Meter(element_list(r, MeterStats::decode)?),
            StatsType::MeterConfig => Self::MeterConfig(element_list(r, MeterConfig::decode)?),
            StatsType::MeterFeatures => {
                let f = MeterFeatures {
                    max_meter: r.u32()?,
                    band_types: r.u32()?,
                    capabilities: r.u32()?,
                    max_bands: r.u8()?,
                    max_color: r.u8()?,
                };
                r.skip(2)?;
                Self::MeterFeatures(f)
            }
            StatsType::TableFeatures => Self::TableFeatures(element_list(r, TableFeatures::decode)?),
            StatsType::PortDesc => Self::PortDesc(Port::decode_list(version, r)?),
            StatsType::Experimenter => {
                let (experimenter, exp_type, data) = decode_experimenter(version, r)?;
                Self::Experimenter {
                    experimenter,
                    exp_type,
                    data,
                }
            }
        };
        Ok(body)
    }
}

/// A statistics reply (or one part of a multipart reply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReply {
    /// Reply flags; see [`STATS_MORE`].
    pub flags: u16,
    /// Reply body.
    pub body: StatsReplyBody,
}

impl StatsReply {
    /// A final (single-part) reply.
    #[must_use]
    pub const fn new(body: StatsReplyBody) -> Self {
        Self { flags: 0, body }
    }

    /// Returns true if more parts follow.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.flags & STATS_MORE != 0
    }

    pub(crate) fn body_len(&self, version: Version) -> usize {
        version.stats_header_len() - crate::header::HEADER_LEN + self.body.wire_len(version)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        put_stats_header(version, self.body.stats_type(), self.flags, buf)?;
        self.body.encode(version, buf)
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let (ty, flags) = read_stats_header(version, r)?;
        Ok(Self {
            flags,
            body: StatsReplyBody::decode(version, ty, r)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::OxmMatch;
    use crate::oxm::OxmField;

    fn roundtrip_reply(version: Version, reply: &StatsReply) -> StatsReply {
        let mut buf = BytesMut::new();
        reply.encode(version, &mut buf).expect("encode");
        assert_eq!(buf.len(), reply.body_len(version));
        let mut r = Reader::new(&buf);
        let decoded = StatsReply::decode(version, &mut r).expect("decode");
        assert!(r.is_empty());
        decoded
    }

    #[test]
    fn desc_is_1056_bytes() {
        let reply = StatsReply::new(StatsReplyBody::Desc(DescStats {
            mfr_desc: "Farlight".into(),
            hw_desc: "virtual".into(),
            sw_desc: "0.1".into(),
            serial_num: "None".into(),
            dp_desc: "test datapath".into(),
        }));
        assert_eq!(reply.body_len(Version::V1_0), 4 + 1056);
        assert_eq!(roundtrip_reply(Version::V1_0, &reply), reply);
    }

    #[test]
    fn port_stats_width_per_version() {
        let stats = PortStats {
            port_no: 1,
            rx_packets: 10,
            tx_bytes: 999,
            ..PortStats::default()
        };
        for (version, width) in [
            (Version::V1_0, 104),
            (Version::V1_2, 104),
            (Version::V1_3, 112),
        ] {
            let reply = StatsReply::new(StatsReplyBody::Port(vec![stats.clone(), stats.clone()]));
            assert_eq!(
                reply.body_len(version),
                version.stats_header_len() - 8 + 2 * width
            );
            assert_eq!(roundtrip_reply(version, &reply), reply);
        }
    }

    #[test]
    fn duration_rejected_before_v13() {
        let reply = StatsReply::new(StatsReplyBody::Queue(vec![QueueStats {
            duration_sec: 5,
            ..QueueStats::default()
        }]));
        let mut buf = BytesMut::new();
        assert!(reply.encode(Version::V1_2, &mut buf).is_err());
    }

    #[test]
    fn v13_flow_stats_with_instructions() {
        let flow = FlowStats {
            table_id: 1,
            duration_sec: 30,
            duration_nsec: 500,
            priority: 100,
            idle_timeout: 60,
            hard_timeout: 0,
            flags: 1,
            cookie: 0xdead,
            packet_count: 5,
            byte_count: 320,
            match_fields: Match::Oxm(OxmMatch::new().with(OxmField::in_port(3))),
            actions: vec![],
            instructions: vec![Instruction::ApplyActions(vec![Action::output(4)])],
        };
        let reply = StatsReply {
            flags: STATS_MORE,
            body: StatsReplyBody::Flow(vec![flow]),
        };
        let decoded = roundtrip_reply(Version::V1_3, &reply);
        assert!(decoded.has_more());
        assert_eq!(decoded, reply);
    }

    #[test]
    fn v10_flow_stats_request_is_44_bytes() {
        let req = StatsRequest::new(StatsRequestBody::Flow(FlowStatsRequest::all(Version::V1_0)));
        assert_eq!(req.body_len(Version::V1_0), 4 + 44);
        let mut buf = BytesMut::new();
        req.encode(Version::V1_0, &mut buf).expect("encode");
        let decoded = StatsRequest::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, req);
    }

    #[test]
    fn table_stats_layout_must_match_version() {
        let v13 = TableStats {
            table_id: 0,
            active_count: 3,
            lookup_count: 10,
            matched_count: 8,
            info: None,
        };
        let reply = StatsReply::new(StatsReplyBody::Table(vec![v13.clone()]));
        assert_eq!(roundtrip_reply(Version::V1_3, &reply), reply);

        let mut buf = BytesMut::new();
        assert!(reply.encode(Version::V1_0, &mut buf).is_err());
    }

    #[test]
    fn meter_types_unknown_before_v13() {
        let req = StatsRequest::new(StatsRequestBody::Meter { meter_id: 1 });
        let mut buf = BytesMut::new();
        assert_eq!(
            req.encode(Version::V1_2, &mut buf),
            Err(EncodeError::unsupported(Version::V1_2, "statistics type"))
        );
    }

    #[test]
    fn merge_joins_list_bodies() {
        let mut first = StatsReplyBody::PortDesc(vec![Port {
            port_no: 1,
            ..Port::default()
        }]);
        let second = StatsReplyBody::PortDesc(vec![Port {
            port_no: 2,
            ..Port::default()
        }]);
        first.merge(second).expect("same type");
        match &first {
            StatsReplyBody::PortDesc(ports) => assert_eq!(ports.len(), 2),
            other => panic!("unexpected body {other:?}"),
        }

        let desc = StatsReplyBody::Desc(DescStats::default());
        assert!(first.merge(desc).is_err());
    }
}
