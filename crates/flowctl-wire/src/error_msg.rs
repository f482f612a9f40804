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

//! Error messages exchanged with the peer.

use crate::buf::Reader;
use crate::{DecodeError, EncodeError, ValidationError, Version};
use bytes::{BufMut, Bytes, BytesMut};

/// Error type and code numbers.
///
/// Top-level constants are the 1.2/1.3 numbering; [`codes::v10`] holds the
/// 1.0 numbering where it differs.
pub mod codes {
    /// Hello exchange failed.
    pub const HELLO_FAILED: u16 = 0;
    /// No version in common.
    pub const HELLO_INCOMPATIBLE: u16 = 0;

    /// Request was not understood.
    pub const BAD_REQUEST: u16 = 1;
    /// Unsupported version in the header.
    pub const BAD_VERSION: u16 = 0;
    /// Unsupported message type.
    pub const BAD_TYPE: u16 = 1;
    /// Wrong request length for the type.
    pub const BAD_LEN: u16 = 6;

    /// Error in an action.
    pub const BAD_ACTION: u16 = 2;
    /// Problem validating an output port.
    pub const BAD_OUT_PORT: u16 = 4;

    /// Error in an instruction.
    pub const BAD_INSTRUCTION: u16 = 3;
    /// Unknown instruction.
    pub const UNSUP_INST: u16 = 1;
    /// Invalid table id in goto-table.
    pub const BAD_TABLE_ID_INST: u16 = 2;
    /// Instruction type repeated (1.3).
    pub const DUP_INST: u16 = 9;

    /// Error in a match.
    pub const BAD_MATCH: u16 = 4;
    /// Field length is wrong.
    pub const BAD_MATCH_LEN: u16 = 1;
    /// Unsupported field masking or wildcarding.
    pub const BAD_WILDCARDS: u16 = 5;
    /// Unsupported mask.
    pub const BAD_MATCH_MASK: u16 = 8;
    /// A prerequisite was not met.
    pub const BAD_PREREQ: u16 = 9;
    /// A field was repeated.
    pub const DUP_FIELD: u16 = 10;

    /// Flow modification failed.
    pub const FLOW_MOD_FAILED: u16 = 5;
    /// Table does not exist or cannot hold the flow.
    pub const BAD_TABLE_ID_FLOW: u16 = 2;

    /// Group modification failed.
    pub const GROUP_MOD_FAILED: u16 = 6;
    /// Error in a bucket.
    pub const BAD_BUCKET: u16 = 12;

    /// Port modification failed.
    pub const PORT_MOD_FAILED: u16 = 7;
    /// Table modification failed.
    pub const TABLE_MOD_FAILED: u16 = 8;
    /// Queue operation failed.
    pub const QUEUE_OP_FAILED: u16 = 9;
    /// Switch configuration failed.
    pub const SWITCH_CONFIG_FAILED: u16 = 10;
    /// Role request failed.
    pub const ROLE_REQUEST_FAILED: u16 = 11;

    /// Meter modification failed (1.3).
    pub const METER_MOD_FAILED: u16 = 12;
    /// Invalid band.
    pub const BAD_BAND: u16 = 9;

    /// Table features request failed (1.3).
    pub const TABLE_FEATURES_FAILED: u16 = 13;

    /// Experimenter error; the code is the experimenter-defined type.
    pub const EXPERIMENTER: u16 = 0xffff;

    /// 1.0 numbering.
    pub mod v10 {
        /// Hello exchange failed.
        pub const HELLO_FAILED: u16 = 0;
        /// Request was not understood.
        pub const BAD_REQUEST: u16 = 1;
        /// Wrong request length for the type.
        pub const BAD_LEN: u16 = 6;
        /// Error in an action.
        pub const BAD_ACTION: u16 = 2;
        /// Problem validating an output port.
        pub const BAD_OUT_PORT: u16 = 4;
        /// Flow modification failed.
        pub const FLOW_MOD_FAILED: u16 = 3;
        /// Unsupported flow modification.
        pub const UNSUPPORTED: u16 = 5;
        /// Port modification failed.
        pub const PORT_MOD_FAILED: u16 = 4;
        /// Queue operation failed.
        pub const QUEUE_OP_FAILED: u16 = 5;
    }
}

/// Bytes of the offending message echoed back in an error reply.
pub const ERROR_DATA_LEN: usize = 64;

/// An error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    /// Error type.
    pub err_type: u16,
    /// Error code, or the experimenter-defined type when `err_type` is
    /// [`codes::EXPERIMENTER`].
    pub code: u16,
    /// Experimenter id of experimenter errors (1.2+).
    pub experimenter: Option<u32>,
    /// Context: usually the start of the offending message, or ASCII text
    /// for hello failures.
    pub data: Bytes,
}

impl ErrorMsg {
    /// Creates a standard error.
    pub fn new(err_type: u16, code: u16, data: impl Into<Bytes>) -> Self {
        Self {
            err_type,
            code,
            experimenter: None,
            data: data.into(),
        }
    }

    /// Builds the reply to a message that failed validation.
    #[must_use]
    pub fn for_rejected(version: Version, err: &ValidationError, offending: &[u8]) -> Self {
        let (err_type, code) = err.error_code(version);
        let n = offending.len().min(ERROR_DATA_LEN);
        Self::new(err_type, code, Bytes::copy_from_slice(&offending[..n]))
    }

    /// Builds the hello-failed reply sent when no version is shared.
    #[must_use]
    pub fn hello_incompatible(reason: &str) -> Self {
        Self::new(
            codes::HELLO_FAILED,
            codes::HELLO_INCOMPATIBLE,
            Bytes::copy_from_slice(reason.as_bytes()),
        )
    }

    /// Returns true if this reports a failed hello exchange.
    #[must_use]
    pub const fn is_hello_failed(&self) -> bool {
        self.err_type == codes::HELLO_FAILED && self.experimenter.is_none()
    }

    pub(crate) fn body_len(&self) -> usize {
        let fixed = if self.experimenter.is_some() { 8 } else { 4 };
        fixed + self.data.len()
    }

    pub(crate) fn encode(&self, version: Version, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let is_experimenter = self.err_type == codes::EXPERIMENTER;
        match (self.experimenter, is_experimenter && version.has_oxm()) {
            (Some(experimenter), true) => {
                buf.put_u16(codes::EXPERIMENTER);
                buf.put_u16(self.code);
                buf.put_u32(experimenter);
            }
            (None, false) => {
                buf.put_u16(self.err_type);
                buf.put_u16(self.code);
            }
            (Some(_), false) => {
                return Err(EncodeError::unsupported(version, "experimenter error"));
            }
            (None, true) => {
                return Err(EncodeError::unsupported(
                    version,
                    "experimenter error without experimenter id",
                ));
            }
        }
        buf.put_slice(&self.data);
        Ok(())
    }

    pub(crate) fn decode(version: Version, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let err_type = r.u16()?;
        let code = r.u16()?;
        let experimenter = if err_type == codes::EXPERIMENTER && version.has_oxm() {
            Some(r.u32()?)
        } else {
            None
        };
        Ok(Self {
            err_type,
            code,
            experimenter,
            data: r.rest(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Violation;

    #[test]
    fn rejected_reply_truncates_offending_message() {
        let offending = [0xabu8; 200];
        let err = ValidationError::new(Violation::DuplicateField, "eth_type twice");
        let reply = ErrorMsg::for_rejected(Version::V1_3, &err, &offending);
        assert_eq!(reply.err_type, codes::BAD_MATCH);
        assert_eq!(reply.code, codes::DUP_FIELD);
        assert_eq!(reply.data.len(), ERROR_DATA_LEN);
    }

    #[test]
    fn experimenter_error_layout() {
        let err = ErrorMsg {
            err_type: codes::EXPERIMENTER,
            code: 7,
            experimenter: Some(0x0000_2320),
            data: Bytes::from_static(b"x"),
        };
        let mut buf = BytesMut::new();
        err.encode(Version::V1_2, &mut buf).expect("encode");
        assert_eq!(buf.len(), err.body_len());
        assert_eq!(&buf[..8], &[0xff, 0xff, 0, 7, 0, 0, 0x23, 0x20]);
        let decoded = ErrorMsg::decode(Version::V1_2, &mut Reader::new(&buf)).expect("decode");
        assert_eq!(decoded, err);

        let mut buf = BytesMut::new();
        assert!(err.encode(Version::V1_0, &mut buf).is_err());
    }

    #[test]
    fn hello_failed_carries_text() {
        let err = ErrorMsg::hello_incompatible("no common version");
        assert!(err.is_hello_failed());
        assert_eq!(&err.data[..], b"no common version");
    }
}
