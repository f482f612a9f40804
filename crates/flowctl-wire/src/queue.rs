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

//! Packet queue descriptions returned by queue-config queries.

use crate::buf::{pad8, BufMutExt, Reader};
use crate::port::{port_from_v10, port_to_v10};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// A property of a packet queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueProperty {
    /// Guaranteed minimum rate in 1/10 of a percent.
    MinRate(u16),
    /// Maximum rate in 1/10 of a percent (1.2+).
    MaxRate(u16),
    /// Experimenter property (1.2+).
    Experimenter {
        /// Experimenter id.
        experimenter: u32,
        /// Opaque body.
        data: Bytes,
    },
}

impl QueueProperty {
    fn wire_len(&self) -> usize {
        match self {
            Self::MinRate(_) | Self::MaxRate(_) => 16,
            Self::Experimenter { data, .. } => pad8(16 + data.len()),
        }
    }

    fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = self.wire_len();
        let code = match self {
            Self::MinRate(_) => 1,
            Self::MaxRate(_) if version.has_oxm() => 2,
            Self::Experimenter { .. } if version.has_oxm() => 0xffff,
            _ => return Err(EncodeError::unsupported(version, "queue property")),
        };
        buf.put_u16(code);
        buf.put_u16(len as u16);
        buf.put_zeros(4);
        match self {
            Self::MinRate(rate) | Self::MaxRate(rate) => {
                buf.put_u16(*rate);
                buf.put_zeros(6);
            }
            Self::Experimenter { experimenter, data } => {
                buf.put_u32(*experimenter);
                buf.put_zeros(4);
                buf.put_slice(data);
                buf.put_zeros(len - 16 - data.len());
            }
        }
        Ok(())
    }

    fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut p = r.element("queue property", 2, 8)?;
        let code = p.u16()?;
        p.skip(6)?;
        let prop = match code {
            1 | 2 if code == 1 || version.has_oxm() => {
                let rate = p.u16()?;
                p.skip(6)?;
                if code == 1 {
                    Self::MinRate(rate)
                } else {
                    Self::MaxRate(rate)
                }
            }
            0xffff if version.has_oxm() => {
                let experimenter = p.u32()?;
                p.skip(4)?;
                Self::Experimenter {
                    experimenter,
                    data: p.rest(),
                }
            }
            _ => return Err(DecodeError::unknown_sub_type("queue property", version, code)),
        };
        p.finish("queue property")?;
        Ok(prop)
    }
}

/// A packet queue attached to a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketQueue {
    /// Queue id.
    pub queue_id: u32,
    /// Port the queue is attached to (1.2+; zero on 1.0).
    pub port: u32,
    /// Queue properties.
    pub properties: Vec<QueueProperty>,
}

impl PacketQueue {
    fn header_len(version: Version) -> usize {
        match version {
            Version::V1_0 => 8,
            Version::V1_2 | Version::V1_3 => 16,
        }
    }

    /// Encoded size.
    #[must_use]
    pub fn wire_len(&self, version: Version) -> usize {
        Self::header_len(version) + self.properties.iter().map(QueueProperty::wire_len).sum::<usize>()
    }

    pub(crate) fn list_len(queues: &[Self], version: Version) -> usize {
        queues.iter().map(|q| q.wire_len(version)).sum()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = self.wire_len(version) as u16;
        buf.put_u32(self.queue_id);
        if version.has_oxm() {
            buf.put_u32(self.port);
            buf.put_u16(len);
            buf.put_zeros(6);
        } else {
            if self.port != 0 {
                return Err(EncodeError::unsupported(version, "queue port field"));
            }
            buf.put_u16(len);
            buf.put_zeros(2);
        }
        for prop in &self.properties {
            prop.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let len_offset = if version.has_oxm() { 8 } else { 4 };
        let mut q = r.element("packet queue", len_offset, Self::header_len(version))?;
        let queue_id = q.u32()?;
        let port = if version.has_oxm() {
            let port = q.u32()?;
            q.skip(8)?;
            port
        } else {
            q.skip(4)?;
            0
        };
        let mut properties = Vec::new();
        while !q.is_empty() {
            properties.push(QueueProperty::decode(version, &mut q)?);
        }
        Ok(Self {
            queue_id,
            port,
            properties,
        })
    }
}

/// Queue configuration request body.
pub(crate) fn encode_queue_request(
    version: Version,
    port: u32,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    if version.has_oxm() {
        buf.put_u32(port);
        buf.put_zeros(4);
    } else {
        buf.put_u16(port_to_v10(port)?);
        buf.put_zeros(2);
    }
    Ok(())
}

pub(crate) fn decode_queue_request(version: Version, r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    if version.has_oxm() {
        let port = r.u32()?;
        r.skip(4)?;
        Ok(port)
    } else {
        let port = port_from_v10(r.u16()?);
        r.skip(2)?;
        Ok(port)
    }
}

/// Size of the queue request body, also the fixed part of the reply.
pub(crate) const fn queue_request_len(version: Version) -> usize {
    match version {
        Version::V1_0 => 4,
        Version::V1_2 | Version::V1_3 => 8,
    }
}

/// Queue configuration reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueGetConfigReply {
    /// Port queried.
    pub port: u32,
    /// Queues configured on the port.
    pub queues: Vec<PacketQueue>,
}

impl QueueGetConfigReply {
    pub(crate) fn body_len(&self, version: Version) -> usize {
        // Port plus padding is eight bytes in every generation.
        8 + PacketQueue::list_len(&self.queues, version)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if version.has_oxm() {
            buf.put_u32(self.port);
            buf.put_zeros(4);
        } else {
            buf.put_u16(port_to_v10(self.port)?);
            buf.put_zeros(6);
        }
        for queue in &self.queues {
            queue.encode(version, buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let port = if version.has_oxm() {
            let port = r.u32()?;
            r.skip(4)?;
            port
        } else {
            let port = port_from_v10(r.u16()?);
            r.skip(6)?;
            port
        };
        let mut queues = Vec::new();
        while !r.is_empty() {
            queues.push(PacketQueue::decode(version, r)?);
        }
        Ok(Self { port, queues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v10_queue_layout() {
        let reply = QueueGetConfigReply {
            port: 1,
            queues: vec![PacketQueue {
                queue_id: 7,
                port: 0,
                properties: vec![QueueProperty::MinRate(500)],
            }],
        };
        let mut buf = BytesMut::new();
        reply.encode(Version::V1_0, &mut buf).expect("encode");
        assert_eq!(buf.len(), reply.body_len(Version::V1_0));
        assert_eq!(buf.len(), 8 + 8 + 16);

        let decoded =
            QueueGetConfigReply::decode(Version::V1_0, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, reply);
    }

    #[test]
    fn max_rate_needs_v12() {
        let queue = PacketQueue {
            queue_id: 1,
            port: 0,
            properties: vec![QueueProperty::MaxRate(900)],
        };
        let mut buf = BytesMut::new();
        assert!(queue.encode(Version::V1_0, &mut buf).is_err());

        let queue = PacketQueue { port: 3, ..queue };
        let mut buf = BytesMut::new();
        queue.encode(Version::V1_3, &mut buf).expect("encode");
        assert_eq!(buf.len(), 32);
        let decoded = PacketQueue::decode(Version::V1_3, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, queue);
    }
}
