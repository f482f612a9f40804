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

//! The fixed message header shared by every protocol generation.
//!
//! ```text
//! ┌─────────┬─────────┬──────────────────┬───────────────────────────┐
//! │ version │  type   │ length (BE u16)  │      xid (BE u32)         │
//! │  1 byte │ 1 byte  │   incl. header   │                           │
//! └─────────┴─────────┴──────────────────┴───────────────────────────┘
//! ```

use crate::DecodeError;

/// Size of the header in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest message the 16-bit length field can describe.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// The header as it appears on the wire, before the version is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    /// Version byte.
    pub version: u8,
    /// Type code, interpreted through the version's table.
    pub type_code: u8,
    /// Total message length including the header.
    pub length: u16,
    /// Transaction id.
    pub xid: u32,
}

impl RawHeader {
    /// Parses the first eight bytes of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if fewer than eight bytes are
    /// available and [`DecodeError::BadLength`] if the declared length is
    /// smaller than the header itself.
    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::Truncated {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }
        let header = Self {
            version: buf[0],
            type_code: buf[1],
            length: u16::from_be_bytes([buf[2], buf[3]]),
            xid: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        };
        if usize::from(header.length) < HEADER_LEN {
            return Err(DecodeError::bad_length("header", usize::from(header.length)));
        }
        Ok(header)
    }

    /// Serializes the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.version;
        out[1] = self.type_code;
        out[2..4].copy_from_slice(&self.length.to_be_bytes());
        out[4..8].copy_from_slice(&self.xid.to_be_bytes());
        out
    }
}
