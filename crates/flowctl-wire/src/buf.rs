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

//! Bounds-checked reading and padded writing helpers.
//!
//! Every read is checked against the bytes remaining before it happens,
//! so a lying length field can only ever produce a [`DecodeError`].

use crate::DecodeError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Checked big-endian reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn need(&self, n: usize) -> Result<(), DecodeError> {
        if self.buf.len() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn u64(&mut self) -> Result<u64, DecodeError> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }

    /// Splits off the next `n` bytes as their own reader.
    pub(crate) fn take(&mut self, n: usize) -> Result<Reader<'a>, DecodeError> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(Reader::new(head))
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        Ok(Bytes::copy_from_slice(self.take(n)?.buf))
    }

    pub(crate) fn rest(&mut self) -> Bytes {
        let out = Bytes::copy_from_slice(self.buf);
        self.buf = &[];
        out
    }

    /// Reads a NUL-padded fixed-width string.
    pub(crate) fn fixed_str(&mut self, width: usize) -> Result<String, DecodeError> {
        let raw = self.take(width)?.buf;
        // The last byte is reserved for the terminator.
        let limit = width.saturating_sub(1);
        let end = raw[..limit].iter().position(|b| *b == 0).unwrap_or(limit);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Peeks a big-endian `u16` at `offset` without consuming.
    pub(crate) fn peek_u16(&self, offset: usize) -> Result<u16, DecodeError> {
        self.need(offset + 2)?;
        Ok(u16::from_be_bytes([self.buf[offset], self.buf[offset + 1]]))
    }

    /// Fails if any bytes are left over.
    pub(crate) fn finish(&self, context: &'static str) -> Result<(), DecodeError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes {
                context,
                count: self.buf.len(),
            })
        }
    }

    /// Reads a length-prefixed element: the `u16` length at `len_offset`
    /// covers the whole element, which must be at least `min` bytes.
    pub(crate) fn element(
        &mut self,
        context: &'static str,
        len_offset: usize,
        min: usize,
    ) -> Result<Reader<'a>, DecodeError> {
        let len = usize::from(self.peek_u16(len_offset)?);
        if len < min {
            return Err(DecodeError::bad_length(context, len));
        }
        self.take(len)
    }
}

/// Rounds `len` up to the next multiple of eight.
pub(crate) const fn pad8(len: usize) -> usize {
    (len + 7) / 8 * 8
}

/// Extension helpers for building wire structures.
pub(crate) trait BufMutExt: BufMut {
    fn put_zeros(&mut self, n: usize) {
        self.put_bytes(0, n);
    }

    /// Writes `s` NUL-padded (and truncated) to exactly `width` bytes.
    fn put_fixed_str(&mut self, s: &str, width: usize) {
        let raw = s.as_bytes();
        let n = raw.len().min(width.saturating_sub(1));
        self.put_slice(&raw[..n]);
        self.put_zeros(width - n);
    }
}

impl BufMutExt for BytesMut {}

/// Patches a big-endian `u16` at `offset` of an already written buffer.
pub(crate) fn patch_u16(buf: &mut BytesMut, offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}
