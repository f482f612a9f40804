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

//! Flow instructions (1.2+).

use crate::action::Action;
use crate::buf::{pad8, BufMutExt, Reader};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// An instruction attached to a flow entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Continue processing in a later table.
    GotoTable(u8),
    /// Write masked metadata.
    WriteMetadata {
        /// Metadata value.
        metadata: u64,
        /// Bits of `metadata` to write.
        mask: u64,
    },
    /// Merge actions into the action set.
    WriteActions(Vec<Action>),
    /// Apply actions immediately.
    ApplyActions(Vec<Action>),
    /// Clear the action set.
    ClearActions,
    /// Send the packet through a meter (1.3).
    Meter(u32),
    /// Experimenter instruction.
    Experimenter {
        /// Experimenter id.
        experimenter: u32,
        /// Opaque body.
        data: Bytes,
    },
}

impl Instruction {
    /// Wire type code.
    #[must_use]
    pub const fn type_code(&self) -> u16 {
        match self {
            Self::GotoTable(_) => 1,
            Self::WriteMetadata { .. } => 2,
            Self::WriteActions(_) => 3,
            Self::ApplyActions(_) => 4,
            Self::ClearActions => 5,
            Self::Meter(_) => 6,
            Self::Experimenter { .. } => 0xffff,
        }
    }

    /// Encoded size for `version`.
    #[must_use]
    pub fn wire_len(&self, version: Version) -> usize {
        match self {
            Self::WriteMetadata { .. } => 24,
            Self::WriteActions(actions) | Self::ApplyActions(actions) => {
                8 + Action::list_len(actions, version)
            }
            Self::Experimenter { data, .. } => pad8(8 + data.len()),
            Self::GotoTable(_) | Self::ClearActions | Self::Meter(_) => 8,
        }
    }

    /// Total encoded size of an instruction list.
    #[must_use]
    pub fn list_len(instructions: &[Self], version: Version) -> usize {
        instructions.iter().map(|i| i.wire_len(version)).sum()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if !version.has_oxm() {
            return Err(EncodeError::unsupported(version, "instructions"));
        }
        if matches!(self, Self::Meter(_)) && version != Version::V1_3 {
            return Err(EncodeError::unsupported(version, "meter instruction"));
        }
        let len = self.wire_len(version);
        buf.put_u16(self.type_code());
        buf.put_u16(len as u16);
        match self {
            Self::GotoTable(table) => {
                buf.put_u8(*table);
                buf.put_zeros(3);
            }
            Self::WriteMetadata { metadata, mask } => {
                buf.put_zeros(4);
                buf.put_u64(*metadata);
                buf.put_u64(*mask);
            }
            Self::WriteActions(actions) | Self::ApplyActions(actions) => {
                buf.put_zeros(4);
                Action::encode_list(actions, version, buf)?;
            }
            Self::ClearActions => buf.put_zeros(4),
            Self::Meter(meter_id) => buf.put_u32(*meter_id),
            Self::Experimenter { experimenter, data } => {
                buf.put_u32(*experimenter);
                buf.put_slice(data);
                buf.put_zeros(len - 8 - data.len());
            }
        }
        Ok(())
    }

    pub(crate) fn encode_list(
        instructions: &[Self],
        version: Version,
        buf: &mut BytesMut,
    ) -> Result<(), EncodeError> {
        for instruction in instructions {
            instruction.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut i = r.element("instruction", 2, 8)?;
        let code = i.u16()?;
        i.skip(2)?;
        let instruction = match code {
            1 => {
                let table = i.u8()?;
                i.skip(3)?;
                Self::GotoTable(table)
            }
            2 => {
                i.skip(4)?;
                Self::WriteMetadata {
                    metadata: i.u64()?,
                    mask: i.u64()?,
                }
            }
            3 | 4 => {
                i.skip(4)?;
                let actions = Action::decode_list(version, &mut i)?;
                if code == 3 {
                    Self::WriteActions(actions)
                } else {
                    Self::ApplyActions(actions)
                }
            }
            5 => {
                i.skip(4)?;
                Self::ClearActions
            }
            6 if version == Version::V1_3 => Self::Meter(i.u32()?),
            0xffff => Self::Experimenter {
                experimenter: i.u32()?,
                data: i.rest(),
            },
            _ => return Err(DecodeError::unknown_sub_type("instruction", version, code)),
        };
        i.finish("instruction")?;
        Ok(instruction)
    }

    pub(crate) fn decode_list(version: Version, r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        while !r.is_empty() {
            out.push(Self::decode(version, r)?);
        }
        Ok(out)
    }
}
