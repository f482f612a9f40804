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

//! Flow match structures.
//!
//! 1.0 uses the fixed [`Match10`]; 1.2 and 1.3 use an OXM list wrapped in
//! a `type`/`length` header and padded to a multiple of eight bytes.

use crate::buf::{pad8, BufMutExt, Reader};
use crate::match10::Match10;
use crate::oxm::{OxmBasic, OxmField};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, BytesMut};

/// Match type code for OXM matches.
const MATCH_TYPE_OXM: u16 = 1;

/// An OXM match: an ordered list of TLVs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OxmMatch {
    /// The match fields, in wire order.
    pub fields: Vec<OxmField>,
}

impl OxmMatch {
    /// Creates an empty (match-everything) OXM match.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a field.
    #[must_use]
    pub fn with(mut self, field: OxmField) -> Self {
        self.fields.push(field);
        self
    }

    /// Finds the first standard field of the given kind.
    #[must_use]
    pub fn get(&self, field: OxmBasic) -> Option<&OxmField> {
        self.fields.iter().find(|f| f.basic_field() == Some(field))
    }

    /// Length declared in the match header (without trailing padding).
    #[must_use]
    pub fn declared_len(&self) -> usize {
        4 + self.fields.iter().map(OxmField::wire_len).sum::<usize>()
    }

    /// Bytes the match occupies on the wire, padding included.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        pad8(self.declared_len())
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        for field in &self.fields {
            if let Some(basic) = field.basic_field() {
                if basic.since() > version {
                    return Err(EncodeError::unsupported(version, "match field"));
                }
            }
        }
        let declared = self.declared_len();
        buf.put_u16(MATCH_TYPE_OXM);
        buf.put_u16(declared as u16);
        for field in &self.fields {
            field.encode(buf);
        }
        buf.put_zeros(pad8(declared) - declared);
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let match_type = r.peek_u16(0)?;
        if match_type != MATCH_TYPE_OXM {
            return Err(DecodeError::unknown_sub_type("match", version, match_type));
        }
        let declared = usize::from(r.peek_u16(2)?);
        if declared < 4 {
            return Err(DecodeError::bad_length("match", declared));
        }
        let mut whole = r.take(pad8(declared))?;
        let mut body = whole.take(declared)?;
        body.skip(4)?;
        Ok(Self {
            fields: OxmField::decode_list(&mut body)?,
        })
    }
}

/// A flow match in the layout of one protocol generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// The fixed 1.0 match.
    Standard(Match10),
    /// An OXM match (1.2+).
    Oxm(OxmMatch),
}

impl Default for Match {
    fn default() -> Self {
        Self::Oxm(OxmMatch::new())
    }
}

impl Match {
    /// The match-everything value for `version`.
    #[must_use]
    pub fn any(version: Version) -> Self {
        match version {
            Version::V1_0 => Self::Standard(Match10::any()),
            Version::V1_2 | Version::V1_3 => Self::Oxm(OxmMatch::new()),
        }
    }

    /// Bytes the match occupies on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        match self {
            Self::Standard(_) => Match10::LEN,
            Self::Oxm(m) => m.wire_len(),
        }
    }

    /// Returns the OXM list, if this is an OXM match.
    #[must_use]
    pub const fn as_oxm(&self) -> Option<&OxmMatch> {
        match self {
            Self::Oxm(m) => Some(m),
            Self::Standard(_) => None,
        }
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match (self, version) {
            (Self::Standard(m), Version::V1_0) => m.encode(buf),
            (Self::Oxm(m), Version::V1_2 | Version::V1_3) => m.encode(version, buf),
            (Self::Standard(_), _) => Err(EncodeError::unsupported(version, "1.0 standard match")),
            (Self::Oxm(_), _) => Err(EncodeError::unsupported(version, "OXM match")),
        }
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match version {
            Version::V1_0 => Ok(Self::Standard(Match10::decode(r)?)),
            Version::V1_2 | Version::V1_3 => Ok(Self::Oxm(OxmMatch::decode(version, r)?)),
        }
    }
}
