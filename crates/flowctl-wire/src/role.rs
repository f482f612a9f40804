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

//! Controller roles and asynchronous message filters.

use crate::buf::{BufMutExt, Reader};
use crate::DecodeError;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Controller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerRole {
    /// Query the current role without changing it.
    NoChange,
    /// Full access, shared with other equal controllers.
    Equal,
    /// Full access, at most one master.
    Master,
    /// Read-only access.
    Slave,
}

impl ControllerRole {
    /// Wire value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::NoChange => 0,
            Self::Equal => 1,
            Self::Master => 2,
            Self::Slave => 3,
        }
    }

    /// Parses a wire value.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::NoChange),
            1 => Some(Self::Equal),
            2 => Some(Self::Master),
            3 => Some(Self::Slave),
            _ => None,
        }
    }
}

/// Body of role request and role reply messages (1.2+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    /// Requested or current role.
    pub role: ControllerRole,
    /// Master election generation id.
    pub generation_id: u64,
}

impl Role {
    pub(crate) const LEN: usize = 16;

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.role.code());
        buf.put_zeros(4);
        buf.put_u64(self.generation_id);
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let code = r.u32()?;
        let role = ControllerRole::from_code(code).ok_or(DecodeError::unknown_sub_type(
            "controller role",
            crate::Version::V1_2,
            code as u16,
        ))?;
        r.skip(4)?;
        Ok(Self {
            role,
            generation_id: r.u64()?,
        })
    }
}

/// Asynchronous message filter (1.3).
///
/// Each mask pair holds the reason bits delivered to a controller in the
/// master/equal role (index 0) and in the slave role (index 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AsyncConfig {
    /// Packet-in reasons.
    pub packet_in_mask: [u32; 2],
    /// Port-status reasons.
    pub port_status_mask: [u32; 2],
    /// Flow-removed reasons.
    pub flow_removed_mask: [u32; 2],
}

impl AsyncConfig {
    pub(crate) const LEN: usize = 24;

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        for mask in [self.packet_in_mask, self.port_status_mask, self.flow_removed_mask] {
            buf.put_u32(mask[0]);
            buf.put_u32(mask[1]);
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut pair = || -> Result<[u32; 2], DecodeError> { Ok([r.u32()?, r.u32()?]) };
        Ok(Self {
            packet_in_mask: pair()?,
            port_status_mask: pair()?,
            flow_removed_mask: pair()?,
        })
    }
}
