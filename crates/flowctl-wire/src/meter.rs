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

//! Meter structures (1.3).

use crate::buf::{pad8, BufMutExt, Reader};
use crate::{DecodeError, EncodeError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// Meter modification commands.
pub mod meter_command {
    /// Create a meter.
    pub const ADD: u16 = 0;
    /// Replace a meter's bands.
    pub const MODIFY: u16 = 1;
    /// Delete a meter.
    pub const DELETE: u16 = 2;
}

/// Meter configuration flags.
pub mod meter_flags {
    /// Rates are in kb/s.
    pub const KBPS: u16 = 1 << 0;
    /// Rates are in packets/s.
    pub const PKTPS: u16 = 1 << 1;
    /// Burst sizes are honoured.
    pub const BURST: u16 = 1 << 2;
    /// Collect statistics.
    pub const STATS: u16 = 1 << 3;
}

/// A meter band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterBand {
    /// Drop packets above the rate.
    Drop {
        /// Rate threshold.
        rate: u32,
        /// Burst size.
        burst_size: u32,
    },
    /// Raise the drop precedence of packets above the rate.
    DscpRemark {
        /// Rate threshold.
        rate: u32,
        /// Burst size.
        burst_size: u32,
        /// Precedence levels to add.
        prec_level: u8,
    },
    /// Experimenter band.
    Experimenter {
        /// Rate threshold.
        rate: u32,
        /// Burst size.
        burst_size: u32,
        /// Experimenter id.
        experimenter: u32,
        /// Opaque body.
        data: Bytes,
    },
}

impl MeterBand {
    /// Encoded size.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        match self {
            Self::Drop { .. } | Self::DscpRemark { .. } => 16,
            Self::Experimenter { data, .. } => pad8(16 + data.len()),
        }
    }

    /// The band's rate.
    #[must_use]
    pub const fn rate(&self) -> u32 {
        match self {
            Self::Drop { rate, .. } | Self::DscpRemark { rate, .. } | Self::Experimenter { rate, .. } => {
                *rate
            }
        }
    }

    pub(crate) fn list_len(bands: &[Self]) -> usize {
        bands.iter().map(Self::wire_len).sum()
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let len = self.wire_len();
        match self {
            Self::Drop { rate, burst_size } => {
                put_band_header(buf, 1, len, *rate, *burst_size);
                buf.put_zeros(4);
            }
            Self::DscpRemark {
                rate,
                burst_size,
                prec_level,
            } => {
                put_band_header(buf, 2, len, *rate, *burst_size);
                buf.put_u8(*prec_level);
                buf.put_zeros(3);
            }
            Self::Experimenter {
                rate,
                burst_size,
                experimenter,
                data,
            } => {
                put_band_header(buf, 0xffff, len, *rate, *burst_size);
                buf.put_u32(*experimenter);
                buf.put_slice(data);
                buf.put_zeros(len - 16 - data.len());
            }
        }
    }

    pub(crate) fn encode_list(bands: &[Self], buf: &mut BytesMut) {
        for band in bands {
            band.encode(buf);
        }
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut b = r.element("meter band", 2, 16)?;
        let code = b.u16()?;
        b.skip(2)?;
        let rate = b.u32()?;
        let burst_size = b.u32()?;
        let band = match code {
            1 => {
                b.skip(4)?;
                Self::Drop { rate, burst_size }
            }
            2 => {
                let prec_level = b.u8()?;
                b.skip(3)?;
                Self::DscpRemark {
                    rate,
                    burst_size,
                    prec_level,
                }
            }
            0xffff => Self::Experimenter {
                rate,
                burst_size,
                experimenter: b.u32()?,
                data: b.rest(),
            },
            _ => {
                return Err(DecodeError::unknown_sub_type(
                    "meter band",
                    Version::V1_3,
                    code,
                ))
            }
        };
        b.finish("meter band")?;
        Ok(band)
    }

    pub(crate) fn decode_list(r: &mut Reader<'_>) -> Result<Vec<Self>, DecodeError> {
        let mut out = Vec::new();
        while !r.is_empty() {
            out.push(Self::decode(r)?);
        }
        Ok(out)
    }
}

fn put_band_header(buf: &mut BytesMut, code: u16, len: usize, rate: u32, burst: u32) {
    buf.put_u16(code);
    buf.put_u16(len as u16);
    buf.put_u32(rate);
    buf.put_u32(burst);
}

/// Meter table modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterMod {
    /// One of [`meter_command`].
    pub command: u16,
    /// Combination of [`meter_flags`].
    pub flags: u16,
    /// Meter id.
    pub meter_id: u32,
    /// Bands of the meter.
    pub bands: Vec<MeterBand>,
}

impl MeterMod {
    pub(crate) fn body_len(&self) -> usize {
        8 + MeterBand::list_len(&self.bands)
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        if version != Version::V1_3 {
            return Err(EncodeError::unsupported(version, "meter modification"));
        }
        buf.put_u16(self.command);
        buf.put_u16(self.flags);
        buf.put_u32(self.meter_id);
        MeterBand::encode_list(&self.bands, buf);
        Ok(())
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            command: r.u16()?,
            flags: r.u16()?,
            meter_id: r.u32()?,
            bands: MeterBand::decode_list(r)?,
        })
    }
}
