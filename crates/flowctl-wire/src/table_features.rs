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

//! Table feature descriptions (1.3 multipart).
//!
//! Each table carries a list of properties. A property's length field
//! excludes its trailing padding, which aligns the next one to eight
//! bytes.

use crate::buf::{pad8, BufMutExt, Reader};
use crate::{DecodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// Width of the table name field.
pub const TABLE_NAME_LEN: usize = 32;

/// An instruction or action id inside a feature property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeId {
    /// Instruction or action type code.
    pub code: u16,
    /// Extra bytes (experimenter id for experimenter types).
    pub data: Bytes,
}

impl TypeId {
    /// A plain id with no extra bytes.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self {
            code,
            data: Bytes::new(),
        }
    }

    fn wire_len(&self) -> usize {
        4 + self.data.len()
    }
}

/// One table feature property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableFeatureProp {
    /// Supported instructions (for table-miss when `miss`).
    Instructions {
        /// Applies to the table-miss entry.
        miss: bool,
        /// Instruction ids.
        ids: Vec<TypeId>,
    },
    /// Tables reachable through goto-table.
    NextTables {
        /// Applies to the table-miss entry.
        miss: bool,
        /// Table ids.
        tables: Vec<u8>,
    },
    /// Actions usable in write-actions.
    WriteActions {
        /// Applies to the table-miss entry.
        miss: bool,
        /// Action ids.
        ids: Vec<TypeId>,
    },
    /// Actions usable in apply-actions.
    ApplyActions {
        /// Applies to the table-miss entry.
        miss: bool,
        /// Action ids.
        ids: Vec<TypeId>,
    },
    /// Matchable fields (OXM headers).
    Match(Vec<u32>),
    /// Fields that may be wildcarded (OXM headers).
    Wildcards(Vec<u32>),
    /// Fields settable through write-actions.
    WriteSetfield {
        /// Applies to the table-miss entry.
        miss: bool,
        /// OXM headers.
        fields: Vec<u32>,
    },
    /// Fields settable through apply-actions.
    ApplySetfield {
        /// Applies to the table-miss entry.
        miss: bool,
        /// OXM headers.
        fields: Vec<u32>,
    },
    /// Experimenter property.
    Experimenter {
        /// Applies to the table-miss entry.
        miss: bool,
        /// Experimenter id.
        experimenter: u32,
        /// Experimenter-defined type.
        exp_type: u32,
        /// Opaque body.
        data: Bytes,
    },
}

impl TableFeatureProp {
    fn type_code(&self) -> u16 {
        let (base, miss) = match self {
            Self::Instructions { miss, .. } => (0, *miss),
            Self::NextTables { miss, .. } => (2, *miss),
            Self::WriteActions { miss, .. } => (4, *miss),
            Self::ApplyActions { miss, .. } => (6, *miss),
            Self::Match(_) => (8, false),
            Self::Wildcards(_) => (10, false),
            Self::WriteSetfield { miss, .. } => (12, *miss),
            Self::ApplySetfield { miss, .. } => (14, *miss),
            Self::Experimenter { miss, .. } => (0xfffe, *miss),
        };
        base + u16::from(miss)
    }

    /// Length declared in the property header (without padding).
    fn declared_len(&self) -> usize {
        4 + match self {
            Self::Instructions { ids, .. }
            | Self::WriteActions { ids, .. }
            | Self::ApplyActions { ids, .. } => ids.iter().map(TypeId::wire_len).sum(),
            Self::NextTables { tables, .. } => tables.len(),
            Self::Match(fields)
            | Self::Wildcards(fields)
            | Self::WriteSetfield { fields, .. }
            | Self::ApplySetfield { fields, .. } => 4 * fields.len(),
            Self::Experimenter { data, .. } => 8 + data.len(),
        }
    }

    fn wire_len(&self) -> usize {
        pad8(self.declared_len())
    }

    fn encode(&self, buf: &mut BytesMut) {
        let declared = self.declared_len();
        buf.put_u16(self.type_code());
        buf.put_u16(declared as u16);
        match self {
            Self::Instructions { ids, .. }
            | Self::WriteActions { ids, .. }
            | Self::ApplyActions { ids, .. } => {
                for id in ids {
                    buf.put_u16(id.code);
                    buf.put_u16(id.wire_len() as u16);
                    buf.put_slice(&id.data);
                }
            }
            Self::NextTables { tables, .. } => buf.put_slice(tables),
            Self::Match(fields)
            | Self::Wildcards(fields)
            | Self::WriteSetfield { fields, .. }
            | Self::ApplySetfield { fields, .. } => {
                for field in fields {
                    buf.put_u32(*field);
                }
            }
            Self::Experimenter {
                experimenter,
                exp_type,
                data,
                ..
            } => {
                buf.put_u32(*experimenter);
                buf.put_u32(*exp_type);
                buf.put_slice(data);
            }
        }
        buf.put_zeros(pad8(declared) - declared);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let code = r.peek_u16(0)?;
        let declared = usize::from(r.peek_u16(2)?);
        if declared < 4 {
            return Err(DecodeError::bad_length("table feature property", declared));
        }
        // The last property may omit its padding.
        let padded = pad8(declared).min(r.remaining().max(declared));
        let mut whole = r.take(padded)?;
        let mut p = whole.take(declared)?;
        p.skip(4)?;

        let miss = code & 1 == 1;
        let prop = match code {
            0 | 1 => Self::Instructions {
                miss,
                ids: decode_ids(&mut p)?,
            },
            2 | 3 => Self::NextTables {
                miss,
                tables: p.rest().to_vec(),
            },
            4 | 5 => Self::WriteActions {
                miss,
                ids: decode_ids(&mut p)?,
            },
            6 | 7 => Self::ApplyActions {
                miss,
                ids: decode_ids(&mut p)?,
            },
            8 => Self::Match(decode_headers(&mut p)?),
            10 => Self::Wildcards(decode_headers(&mut p)?),
            12 | 13 => Self::WriteSetfield {
                miss,
                fields: decode_headers(&mut p)?,
            },
            14 | 15 => Self::ApplySetfield {
                miss,
                fields: decode_headers(&mut p)?,
            },
            0xfffe | 0xffff => Self::Experimenter {
                miss,
                experimenter: p.u32()?,
                exp_type: p.u32()?,
                data: p.rest(),
            },
            _ => {
                return Err(DecodeError::unknown_sub_type(
                    "table feature property",
                    Version::V1_3,
                    code,
                ))
            }
        };
        Ok(prop)
    }
}

fn decode_ids(r: &mut Reader<'_>) -> Result<Vec<TypeId>, DecodeError> {
    let mut out = Vec::new();
    while !r.is_empty() {
        let mut id = r.element("feature id", 2, 4)?;
        let code = id.u16()?;
        id.skip(2)?;
        out.push(TypeId {
            code,
            data: id.rest(),
        });
    }
    Ok(out)
}

fn decode_headers(r: &mut Reader<'_>) -> Result<Vec<u32>, DecodeError> {
    if r.remaining() % 4 != 0 {
        return Err(DecodeError::bad_length("oxm id list", r.remaining()));
    }
    let mut out = Vec::with_capacity(r.remaining() / 4);
    while !r.is_empty() {
        out.push(r.u32()?);
    }
    Ok(out)
}

/// Capabilities of one flow table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableFeatures {
    /// Table id.
    pub table_id: u8,
    /// Table name.
    pub name: String,
    /// Metadata bits matchable.
    pub metadata_match: u64,
    /// Metadata bits writable.
    pub metadata_write: u64,
    /// Table configuration bitmap.
    pub config: u32,
    /// Maximum number of entries.
    pub max_entries: u32,
    /// Feature properties.
    pub properties: Vec<TableFeatureProp>,
}

impl TableFeatures {
    const FIXED_LEN: usize = 64;

    /// Encoded size.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        Self::FIXED_LEN
            + self
                .properties
                .iter()
                .map(TableFeatureProp::wire_len)
                .sum::<usize>()
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.wire_len() as u16);
        buf.put_u8(self.table_id);
        buf.put_zeros(5);
        buf.put_fixed_str(&self.name, TABLE_NAME_LEN);
        buf.put_u64(self.metadata_match);
        buf.put_u64(self.metadata_write);
        buf.put_u32(self.config);
        buf.put_u32(self.max_entries);
        for prop in &self.properties {
            prop.encode(buf);
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut t = r.element("table features", 0, Self::FIXED_LEN)?;
        t.skip(2)?;
        let table_id = t.u8()?;
        t.skip(5)?;
        let name = t.fixed_str(TABLE_NAME_LEN)?;
        let metadata_match = t.u64()?;
        let metadata_write = t.u64()?;
        let config = t.u32()?;
        let max_entries = t.u32()?;
        let mut properties = Vec::new();
        while !t.is_empty() {
            properties.push(TableFeatureProp::decode(&mut t)?);
        }
        Ok(Self {
            table_id,
            name,
            metadata_match,
            metadata_write,
            config,
            max_entries,
            properties,
        })
    }

    /// Tables reachable from this one (regular entries).
    #[must_use]
    pub fn next_tables(&self) -> Option<&[u8]> {
        self.properties.iter().find_map(|p| match p {
            TableFeatureProp::NextTables {
                miss: false,
                tables,
            } => Some(tables.as_slice()),
            _ => None,
        })
    }
}
