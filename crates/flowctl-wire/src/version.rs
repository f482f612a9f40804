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

//! Protocol versions and the per-version message type tables.
//!
//! Message types are version independent in memory. The wire code of a
//! type differs between generations (1.0 has no group or table
//! modification, so every later code is shifted), so all conversions go
//! through the tables here.

use serde::{Deserialize, Serialize};

/// A supported protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Version {
    /// OpenFlow 1.0, wire version `0x01`.
    #[serde(rename = "1.0")]
    V1_0,
    /// OpenFlow 1.2, wire version `0x03`.
    #[serde(rename = "1.2")]
    V1_2,
    /// OpenFlow 1.3, wire version `0x04`.
    #[serde(rename = "1.3")]
    V1_3,
}

impl Version {
    /// All supported versions, oldest first.
    pub const ALL: [Self; 3] = [Self::V1_0, Self::V1_2, Self::V1_3];

    /// Returns the version byte carried in the header.
    #[must_use]
    pub const fn wire(self) -> u8 {
        match self {
            Self::V1_0 => 0x01,
            Self::V1_2 => 0x03,
            Self::V1_3 => 0x04,
        }
    }

    /// Parses a header version byte.
    #[must_use]
    pub const fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::V1_0),
            0x03 => Some(Self::V1_2),
            0x04 => Some(Self::V1_3),
            _ => None,
        }
    }

    /// Returns true for versions with multi-table pipelines and OXM matches.
    #[must_use]
    pub const fn has_oxm(self) -> bool {
        !matches!(self, Self::V1_0)
    }

    /// Length of the statistics/multipart header preceding the body.
    #[must_use]
    pub const fn stats_header_len(self) -> usize {
        match self {
            Self::V1_0 => 12,
            Self::V1_2 | Self::V1_3 => 16,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1_0 => write!(f, "OpenFlow 1.0"),
            Self::V1_2 => write!(f, "OpenFlow 1.2"),
            Self::V1_3 => write!(f, "OpenFlow 1.3"),
        }
    }
}

/// Version-independent message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Version negotiation.
    Hello,
    /// Error notification.
    Error,
    /// Keepalive request.
    EchoRequest,
    /// Keepalive reply.
    EchoReply,
    /// Vendor or experimenter extension.
    Experimenter,
    /// Datapath capability query.
    FeaturesRequest,
    /// Datapath capability answer.
    FeaturesReply,
    /// Switch configuration query.
    GetConfigRequest,
    /// Switch configuration answer.
    GetConfigReply,
    /// Switch configuration update.
    SetConfig,
    /// Packet delivered to the controller.
    PacketIn,
    /// Flow entry removal notification.
    FlowRemoved,
    /// Port change notification.
    PortStatus,
    /// Packet injected by the controller.
    PacketOut,
    /// Flow table modification.
    FlowMod,
    /// Group table modification (1.2+).
    GroupMod,
    /// Port configuration change.
    PortMod,
    /// Table configuration change (1.2+).
    TableMod,
    /// Statistics (multipart on 1.3) request.
    StatsRequest,
    /// Statistics (multipart on 1.3) reply.
    StatsReply,
    /// Barrier request.
    BarrierRequest,
    /// Barrier reply.
    BarrierReply,
    /// Queue configuration query.
    QueueGetConfigRequest,
    /// Queue configuration answer.
    QueueGetConfigReply,
    /// Controller role change request (1.2+).
    RoleRequest,
    /// Controller role change reply (1.2+).
    RoleReply,
    /// Asynchronous message filter query (1.3).
    GetAsyncRequest,
    /// Asynchronous message filter answer (1.3).
    GetAsyncReply,
    /// Asynchronous message filter update (1.3).
    SetAsync,
    /// Meter table modification (1.3).
    MeterMod,
}

use MessageType as T;

const V10_TYPES: [MessageType; 22] = [
    T::Hello,
    T::Error,
    T::EchoRequest,
    T::EchoReply,
    T::Experimenter,
    T::FeaturesRequest,
    T::FeaturesReply,
    T::GetConfigRequest,
    T::GetConfigReply,
    T::SetConfig,
    T::PacketIn,
    T::FlowRemoved,
    T::PortStatus,
    T::PacketOut,
    T::FlowMod,
    T::PortMod,
    T::StatsRequest,
    T::StatsReply,
    T::BarrierRequest,
    T::BarrierReply,
    T::QueueGetConfigRequest,
    T::QueueGetConfigReply,
];

const V13_TYPES: [MessageType; 30] = [
    T::Hello,
    T::Error,
    T::EchoRequest,
    T::EchoReply,
    T::Experimenter,
    T::FeaturesRequest,
    T::FeaturesReply,
    T::GetConfigRequest,
    T::GetConfigReply,
    T::SetConfig,
    T::PacketIn,
    T::FlowRemoved,
    T::PortStatus,
    T::PacketOut,
    T::FlowMod,
    T::GroupMod,
    T::PortMod,
    T::TableMod,
    T::StatsRequest,
    T::StatsReply,
    T::BarrierRequest,
    T::BarrierReply,
    T::QueueGetConfigRequest,
    T::QueueGetConfigReply,
    T::RoleRequest,
    T::RoleReply,
    T::GetAsyncRequest,
    T::GetAsyncReply,
    T::SetAsync,
    T::MeterMod,
];

/// 1.2 defines the first 26 entries of the 1.3 table.
const V12_TYPE_COUNT: usize = 26;

fn table(version: Version) -> &'static [MessageType] {
    match version {
        Version::V1_0 => &V10_TYPES,
        Version::V1_2 => &V13_TYPES[..V12_TYPE_COUNT],
        Version::V1_3 => &V13_TYPES,
    }
}

impl MessageType {
    /// Returns the wire code for this type, if the version defines it.
    #[must_use]
    pub fn code(self, version: Version) -> Option<u8> {
        table(version)
            .iter()
            .position(|t| *t == self)
            .map(|pos| pos as u8)
    }

    /// Looks up a wire code in the version's table.
    #[must_use]
    pub fn from_code(version: Version, code: u8) -> Option<Self> {
        table(version).get(usize::from(code)).copied()
    }

    /// Returns the reply type a request of this type expects, if any.
    #[must_use]
    pub const fn reply_type(self) -> Option<Self> {
        match self {
            Self::EchoRequest => Some(Self::EchoReply),
            Self::FeaturesRequest => Some(Self::FeaturesReply),
            Self::GetConfigRequest => Some(Self::GetConfigReply),
            Self::StatsRequest => Some(Self::StatsReply),
            Self::BarrierRequest => Some(Self::BarrierReply),
            Self::QueueGetConfigRequest => Some(Self::QueueGetConfigReply),
            Self::RoleRequest => Some(Self::RoleReply),
            Self::GetAsyncRequest => Some(Self::GetAsyncReply),
            _ => None,
        }
    }

    /// Returns true for messages a datapath sends unsolicited.
    #[must_use]
    pub const fn is_async(self) -> bool {
        matches!(self, Self::PacketIn | Self::FlowRemoved | Self::PortStatus)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Statistics (multipart) body type, shared by requests and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsType {
    /// Datapath description.
    Desc,
    /// Individual flow statistics.
    Flow,
    /// Aggregate flow statistics.
    Aggregate,
    /// Flow table statistics.
    Table,
    /// Port counters.
    Port,
    /// Queue counters.
    Queue,
    /// Group counters (1.2+).
    Group,
    /// Group descriptions (1.2+).
    GroupDesc,
    /// Group capabilities (1.2+).
    GroupFeatures,
    /// Meter counters (1.3).
    Meter,
    /// Meter configuration (1.3).
    MeterConfig,
    /// Meter capabilities (1.3).
    MeterFeatures,
    /// Table capabilities (1.3).
    TableFeatures,
    /// Port descriptions (1.3).
    PortDesc,
    /// Vendor or experimenter statistics.
    Experimenter,
}

impl StatsType {
    const EXPERIMENTER_CODE: u16 = 0xffff;

    /// Returns the wire code for this statistics type, if the version defines it.
    #[must_use]
    pub const fn code(self, version: Version) -> Option<u16> {
        let code = match self {
            Self::Desc => 0,
            Self::Flow => 1,
            Self::Aggregate => 2,
            Self::Table => 3,
            Self::Port => 4,
            Self::Queue => 5,
            Self::Group => 6,
            Self::GroupDesc => 7,
            Self::GroupFeatures => 8,
            Self::Meter => 9,
            Self::MeterConfig => 10,
            Self::MeterFeatures => 11,
            Self::TableFeatures => 12,
            Self::PortDesc => 13,
            Self::Experimenter => return Some(Self::EXPERIMENTER_CODE),
        };
        let max = match version {
            Version::V1_0 => 5,
            Version::V1_2 => 8,
            Version::V1_3 => 13,
        };
        if code <= max {
            Some(code)
        } else {
            None
        }
    }

    /// Looks up a statistics wire code for the version.
    #[must_use]
    pub const fn from_code(version: Version, code: u16) -> Option<Self> {
        let ty = match code {
            0 => Self::Desc,
            1 => Self::Flow,
            2 => Self::Aggregate,
            3 => Self::Table,
            4 => Self::Port,
            5 => Self::Queue,
            6 => Self::Group,
            7 => Self::GroupDesc,
            8 => Self::GroupFeatures,
            9 => Self::Meter,
            10 => Self::MeterConfig,
            11 => Self::MeterFeatures,
            12 => Self::TableFeatures,
            13 => Self::PortDesc,
            Self::EXPERIMENTER_CODE => Self::Experimenter,
            _ => return None,
        };
        match ty.code(version) {
            Some(_) => Some(ty),
            None => None,
        }
    }
}
