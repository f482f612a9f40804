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

//! Hello messages and version bitmaps.
//!
//! A hello is the one message whose header version may be one this codec
//! does not speak, so [`peek_hello`] parses it without going through the
//! version-checked decoder.

use crate::buf::{pad8, BufMutExt, Reader};
use crate::header::{RawHeader, HEADER_LEN};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

const ELEMENT_VERSION_BITMAP: u16 = 1;

/// Wire code of the hello message in every generation.
pub const HELLO_TYPE_CODE: u8 = 0;

/// A hello element (1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloElement {
    /// Bitmap of supported wire versions; bit `n` of word `n / 32` set
    /// means wire version `n` is supported.
    VersionBitmap(Vec<u32>),
    /// An element type this codec does not interpret.
    Unknown {
        /// Element type.
        element_type: u16,
        /// Element body.
        data: Bytes,
    },
}

impl HelloElement {
    fn declared_len(&self) -> usize {
        match self {
            Self::VersionBitmap(words) => 4 + 4 * words.len(),
            Self::Unknown { data, .. } => 4 + data.len(),
        }
    }

    fn wire_len(&self) -> usize {
        pad8(self.declared_len())
    }

    fn encode(&self, buf: &mut BytesMut) {
        let declared = self.declared_len();
        match self {
            Self::VersionBitmap(words) => {
                buf.put_u16(ELEMENT_VERSION_BITMAP);
                buf.put_u16(declared as u16);
                for word in words {
                    buf.put_u32(*word);
                }
            }
            Self::Unknown { element_type, data } => {
                buf.put_u16(*element_type);
                buf.put_u16(declared as u16);
                buf.put_slice(data);
            }
        }
        buf.put_zeros(pad8(declared) - declared);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let element_type = r.peek_u16(0)?;
        let declared = usize::from(r.peek_u16(2)?);
        if declared < 4 {
            return Err(DecodeError::bad_length("hello element", declared));
        }
        let mut e = r.take(declared)?;
        // The last element may omit its padding.
        r.skip((pad8(declared) - declared).min(r.remaining()))?;
        e.skip(4)?;
        if element_type == ELEMENT_VERSION_BITMAP {
            if e.remaining() % 4 != 0 {
                return Err(DecodeError::bad_length("version bitmap", declared));
            }
            let mut words = Vec::with_capacity(e.remaining() / 4);
            while !e.is_empty() {
                words.push(e.u32()?);
            }
            Ok(Self::VersionBitmap(words))
        } else {
            Ok(Self::Unknown {
                element_type,
                data: e.rest(),
            })
        }
    }
}

/// A hello message body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hello {
    /// Hello elements (1.3 only).
    pub elements: Vec<HelloElement>,
}

impl Hello {
    /// A hello without elements.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// A hello advertising `versions` in a version bitmap.
    #[must_use]
    pub fn with_versions(versions: &[Version]) -> Self {
        Self {
            elements: vec![HelloElement::VersionBitmap(bitmap_of(versions))],
        }
    }

    /// Returns the advertised bitmap, if any.
    #[must_use]
    pub fn bitmap(&self) -> Option<&[u32]> {
        self.elements.iter().find_map(|e| match e {
            HelloElement::VersionBitmap(words) => Some(words.as_slice()),
            HelloElement::Unknown { .. } => None,
        })
    }

    pub(crate) fn body_len(&self) -> usize {
        self.elements.iter().map(HelloElement::wire_len).sum()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if !self.elements.is_empty() && version != Version::V1_3 {
            return Err(EncodeError::unsupported(version, "hello elements"));
        }
        for element in &self.elements {
            element.encode(buf);
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if version != Version::V1_3 {
            // Older generations define no body; whatever follows is ignored.
            r.rest();
            return Ok(Self::new());
        }
        let mut elements = Vec::new();
        while !r.is_empty() {
            elements.push(HelloElement::decode(r)?);
        }
        Ok(Self { elements })
    }
}

/// Builds a version bitmap covering `versions`.
#[must_use]
pub fn bitmap_of(versions: &[Version]) -> Vec<u32> {
    let highest = versions.iter().map(|v| v.wire()).max().unwrap_or(0);
    let mut words = vec![0u32; usize::from(highest / 32) + 1];
    for version in versions {
        let bit = version.wire();
        words[usize::from(bit / 32)] |= 1 << (bit % 32);
    }
    words
}

/// Returns true if the bitmap has the bit for `wire_version` set.
#[must_use]
pub fn bitmap_contains(bitmap: &[u32], wire_version: u8) -> bool {
    bitmap
        .get(usize::from(wire_version / 32))
        .is_some_and(|word| word & (1 << (wire_version % 32)) != 0)
}

/// A hello as received, before a version has been agreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHello {
    /// Version byte of the peer's header (its highest version).
    pub wire_version: u8,
    /// Transaction id of the hello.
    pub xid: u32,
    /// Version bitmap, if the peer sent one.
    pub bitmap: Option<Vec<u32>>,
}

/// Parses a hello frame from a peer of any version.
///
/// Elements are read whenever the body is non-empty and the header
/// version is at least 1.3's; a malformed element list is treated as
/// absent rather than fatal, since the header version alone still allows
/// negotiation.
pub fn peek_hello(frame: &[u8]) -> Result<PeerHello, DecodeError> {
    let header = RawHeader::parse(frame)?;
    let length = usize::from(header.length);
    if frame.len() < length {
        return Err(DecodeError::Truncated {
            needed: length,
            available: frame.len(),
        });
    }
    if header.type_code != HELLO_TYPE_CODE {
        return Err(DecodeError::UnknownType {
            version: Version::from_wire(header.version).unwrap_or(Version::V1_3),
            code: header.type_code,
        });
    }

    let mut bitmap = None;
    if header.version >= Version::V1_3.wire() {
        let mut r = Reader::new(&frame[HEADER_LEN..length]);
        while !r.is_empty() {
            match HelloElement::decode(&mut r) {
                Ok(HelloElement::VersionBitmap(words)) => {
                    bitmap = Some(words);
                    break;
                }
                Ok(HelloElement::Unknown { .. }) => {}
                Err(_) => break,
            }
        }
    }

    Ok(PeerHello {
        wire_version: header.version,
        xid: header.xid,
        bitmap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_bits_follow_wire_versions() {
        let words = bitmap_of(&[Version::V1_0, Version::V1_3]);
        assert_eq!(words, vec![0b1_0010]);
        assert!(bitmap_contains(&words, 0x04));
        assert!(!bitmap_contains(&words, 0x03));
        assert!(!bitmap_contains(&words, 0x40));
    }

    #[test]
    fn hello_with_bitmap_layout() {
        let hello = Hello::with_versions(&Version::ALL);
        let mut buf = BytesMut::new();
        hello.encode(Version::V1_3, &mut buf).expect("encode");
        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[..], &[0, 1, 0, 8, 0, 0, 0, 0x1a]);

        let decoded = Hello::decode(Version::V1_3, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, hello);
        assert_eq!(decoded.bitmap(), Some(&[0x1a][..]));
    }

    #[test]
    fn elements_rejected_before_v13() {
        let hello = Hello::with_versions(&[Version::V1_0]);
        let mut buf = BytesMut::new();
        assert!(hello.encode(Version::V1_0, &mut buf).is_err());
    }

    #[test]
    fn peek_accepts_unknown_versions() {
        // A 1.5 hello with a bitmap element advertising 0x01 and 0x06.
        let frame = [
            0x06, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x09, 0x00, 0x01, 0x00, 0x08, 0x00, 0x00,
            0x00, 0x42,
        ];
        let hello = peek_hello(&frame).expect("peek");
        assert_eq!(hello.wire_version, 0x06);
        assert_eq!(hello.xid, 9);
        assert_eq!(hello.bitmap, Some(vec![0x42]));
    }

    #[test]
    fn peek_tolerates_garbage_elements() {
        let frame = [0x04, 0x00, 0x00, 0x0a, 0, 0, 0, 1, 0xff, 0xff];
        let hello = peek_hello(&frame).expect("peek");
        assert_eq!(hello.bitmap, None);
    }

    #[test]
    fn peek_rejects_non_hello() {
        let frame = [0x04, 0x02, 0x00, 0x08, 0, 0, 0, 1];
        assert!(peek_hello(&frame).is_err());
    }
}
