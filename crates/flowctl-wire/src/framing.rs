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

//! Stream framing.
//!
//! Messages are self-delimiting: the header's length field covers the
//! whole message, so a frame is complete once that many bytes have been
//! buffered. Datagram transports carry one message per datagram and can
//! bypass the reader entirely.

use crate::header::{RawHeader, HEADER_LEN};
use crate::DecodeError;
use bytes::{Bytes, BytesMut};

/// Reassembles complete messages from a byte stream.
///
/// Data can be appended in arbitrarily sized pieces as it arrives from the
/// socket; [`FrameReader::read_frame`] yields one message at a time.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: BytesMut,
}

impl FrameReader {
    /// Creates a new frame reader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Creates a new frame reader with the specified initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to split off one complete message.
    ///
    /// Returns `Ok(Some(frame))` with the full message (header included),
    /// `Ok(None)` if more data is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffered header declares a length shorter
    /// than the header. The stream cannot be resynchronized after that.
    pub fn read_frame(&mut self) -> Result<Option<Bytes>, DecodeError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let header = RawHeader::parse(&self.buffer)?;
        let length = usize::from(header.length);
        if self.buffer.len() < length {
            return Ok(None);
        }

        Ok(Some(self.buffer.split_to(length).freeze()))
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(xid: u32, payload: &[u8]) -> Vec<u8> {
        let header = RawHeader {
            version: 0x04,
            type_code: 2,
            length: (HEADER_LEN + payload.len()) as u16,
            xid,
        };
        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn single_frame() {
        let mut reader = FrameReader::new();
        reader.extend(&echo(1, b"ping"));

        let frame = reader
            .read_frame()
            .expect("read should succeed")
            .expect("frame should be complete");
        assert_eq!(frame.len(), 12);
        assert_eq!(&frame[8..], b"ping");
        assert!(reader.is_empty());
    }

    #[test]
    fn partial_frame() {
        let mut reader = FrameReader::new();
        let data = echo(7, b"hello world");

        reader.extend(&data[..5]);
        assert!(reader.read_frame().expect("read should succeed").is_none());

        reader.extend(&data[5..10]);
        assert!(reader.read_frame().expect("read should succeed").is_none());

        reader.extend(&data[10..]);
        let frame = reader
            .read_frame()
            .expect("read should succeed")
            .expect("frame should be complete");
        assert_eq!(&frame[..], &data[..]);
    }

    #[test]
    fn back_to_back_frames() {
        let mut reader = FrameReader::with_capacity(64);
        let mut data = echo(1, b"a");
        data.extend_from_slice(&echo(2, b""));
        data.extend_from_slice(&echo(3, b"ccc"));
        reader.extend(&data);

        let mut xids = Vec::new();
        while let Some(frame) = reader.read_frame().expect("read should succeed") {
            xids.push(RawHeader::parse(&frame).expect("header").xid);
        }
        assert_eq!(xids, vec![1, 2, 3]);
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn short_declared_length_is_fatal() {
        let mut reader = FrameReader::new();
        reader.extend(&[0x01, 0x00, 0x00, 0x02, 0, 0, 0, 0]);
        assert!(matches!(
            reader.read_frame(),
            Err(DecodeError::BadLength { length: 2, .. })
        ));
    }
}
