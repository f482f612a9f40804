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

//! Error types for the wire codec.
//!
//! Decoding failures are framing errors: the byte stream can no longer be
//! trusted and the connection carrying it should be closed. Validation
//! failures are protocol errors on a well-framed message and are answered
//! with an error reply instead.

use crate::version::Version;
use thiserror::Error;

/// Errors produced while decoding bytes into messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes are available than the structure being read requires.
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to continue.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A length field is inconsistent with its structure or container.
    #[error("bad length in {context}: {length}")]
    BadLength {
        /// The structure whose length field was rejected.
        context: &'static str,
        /// The offending length.
        length: usize,
    },

    /// The header carries a protocol version this codec does not speak.
    #[error("unknown protocol version 0x{0:02x}")]
    UnknownVersion(u8),

    /// The message type code is not defined for the declared version.
    #[error("unknown message type {code} for {version}")]
    UnknownType {
        /// The declared version.
        version: Version,
        /// The unknown type code.
        code: u8,
    },

    /// A nested structure carries a type code unknown in this context.
    #[error("unknown {context} type {code} for {version}")]
    UnknownSubType {
        /// The structure family (action, instruction, statistics, ...).
        context: &'static str,
        /// The declared version.
        version: Version,
        /// The unknown code.
        code: u16,
    },

    /// Trailing bytes remain after a fixed-size body.
    #[error("{count} trailing bytes after {context}")]
    TrailingBytes {
        /// The structure that should have consumed them.
        context: &'static str,
        /// Number of unconsumed bytes.
        count: usize,
    },
}

impl DecodeError {
    /// Creates a bad-length error.
    #[must_use]
    pub const fn bad_length(context: &'static str, length: usize) -> Self {
        Self::BadLength { context, length }
    }

    /// Creates an unknown-subtype error.
    #[must_use]
    pub const fn unknown_sub_type(context: &'static str, version: Version, code: u16) -> Self {
        Self::UnknownSubType {
            context,
            version,
            code,
        }
    }
}

/// Errors produced while encoding messages into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The destination buffer cannot hold the encoded message.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available in the destination.
        available: usize,
    },

    /// The message uses a field or structure the target version lacks.
    #[error("{what} is not supported by {version}")]
    Unsupported {
        /// The target version.
        version: Version,
        /// Description of the unsupported element.
        what: &'static str,
    },

    /// A value does not fit its field in the target version's layout.
    #[error("{what} value {value} does not fit the {version} layout")]
    OutOfRange {
        /// The target version.
        version: Version,
        /// The field that overflowed.
        what: &'static str,
        /// The offending value.
        value: u64,
    },

    /// The encoded message exceeds the 16-bit length field.
    #[error("encoded message is {0} bytes, larger than the 65535 byte limit")]
    TooLarge(usize),

    /// The computed length disagrees with the bytes actually written.
    ///
    /// This indicates a bug in a structure's length computation.
    #[error("length mismatch: computed {computed}, wrote {written}")]
    LengthMismatch {
        /// Length computed before encoding.
        computed: usize,
        /// Bytes written by the encoder.
        written: usize,
    },
}

impl EncodeError {
    /// Creates an unsupported-for-version error.
    #[must_use]
    pub const fn unsupported(version: Version, what: &'static str) -> Self {
        Self::Unsupported { version, what }
    }

    /// Creates an out-of-range error.
    #[must_use]
    pub const fn out_of_range(version: Version, what: &'static str, value: u64) -> Self {
        Self::OutOfRange {
            version,
            what,
            value,
        }
    }
}

/// The semantic rule a well-framed message violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A match field appears without the fields it depends on.
    BadPrerequisite,
    /// The same match field appears twice.
    DuplicateField,
    /// A match field's value or mask has the wrong width.
    BadFieldLength,
    /// A masked match field whose type forbids masking.
    BadMask,
    /// Transport ports are matched without an IP protocol (1.0 match).
    InconsistentWildcards,
    /// A goto-table instruction does not point to a later table.
    BadGotoTable,
    /// An instruction type appears more than once.
    DuplicateInstruction,
    /// A flow modification targets a table id that cannot hold flows.
    BadTableId,
    /// An output action names a port number that is not allowed.
    BadOutPort,
    /// A group modification is inconsistent with its group type.
    BadGroup,
    /// A meter modification carries an invalid band list.
    BadMeterBand,
}

/// A semantic validation failure.
///
/// Carries enough information to build a version-correct error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{violation:?}: {detail}")]
pub struct ValidationError {
    /// The rule that was violated.
    pub violation: Violation,
    /// Human-readable detail for logs.
    pub detail: String,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(violation: Violation, detail: impl Into<String>) -> Self {
        Self {
            violation,
            detail: detail.into(),
        }
    }

    /// Returns the `(error type, error code)` pair reported to the peer.
    #[must_use]
    pub const fn error_code(&self, version: Version) -> (u16, u16) {
        use crate::error_msg::codes;

        match version {
            Version::V1_0 => match self.violation {
                Violation::BadOutPort => (codes::v10::BAD_ACTION, codes::v10::BAD_OUT_PORT),
                Violation::BadTableId => (codes::v10::FLOW_MOD_FAILED, codes::v10::UNSUPPORTED),
                _ => (codes::v10::BAD_REQUEST, codes::v10::BAD_LEN),
            },
            Version::V1_2 | Version::V1_3 => {
                let v13 = matches!(version, Version::V1_3);
                match self.violation {
                    Violation::BadPrerequisite => (codes::BAD_MATCH, codes::BAD_PREREQ),
                    Violation::DuplicateField => (codes::BAD_MATCH, codes::DUP_FIELD),
                    Violation::BadFieldLength => (codes::BAD_MATCH, codes::BAD_MATCH_LEN),
                    Violation::BadMask => (codes::BAD_MATCH, codes::BAD_MATCH_MASK),
                    Violation::InconsistentWildcards => (codes::BAD_MATCH, codes::BAD_WILDCARDS),
                    Violation::BadGotoTable => (codes::BAD_INSTRUCTION, codes::BAD_TABLE_ID_INST),
                    Violation::DuplicateInstruction if v13 => {
                        (codes::BAD_INSTRUCTION, codes::DUP_INST)
                    }
                    Violation::DuplicateInstruction => {
                        (codes::BAD_INSTRUCTION, codes::UNSUP_INST)
                    }
                    Violation::BadTableId => (codes::FLOW_MOD_FAILED, codes::BAD_TABLE_ID_FLOW),
                    Violation::BadOutPort => (codes::BAD_ACTION, codes::BAD_OUT_PORT),
                    Violation::BadGroup => (codes::GROUP_MOD_FAILED, codes::BAD_BUCKET),
                    Violation::BadMeterBand if v13 => (codes::METER_MOD_FAILED, codes::BAD_BAND),
                    Violation::BadMeterBand => (codes::BAD_REQUEST, codes::BAD_TYPE),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_msg::codes;

    #[test]
    fn decode_error_display() {
        let err = DecodeError::Truncated {
            needed: 8,
            available: 3,
        };
        assert_eq!(err.to_string(), "truncated input: need 8 bytes, have 3");

        let err = DecodeError::UnknownType {
            version: Version::V1_3,
            code: 99,
        };
        assert!(err.to_string().contains("99"));
        assert!(err.to_string().contains("1.3"));
    }

    #[test]
    fn unsupported_names_version() {
        let err = EncodeError::unsupported(Version::V1_0, "instructions");
        assert_eq!(err.to_string(), "instructions is not supported by OpenFlow 1.0");
    }

    #[test]
    fn duplicate_instruction_code_depends_on_version() {
        let err = ValidationError::new(Violation::DuplicateInstruction, "apply-actions twice");
        assert_eq!(
            err.error_code(Version::V1_3),
            (codes::BAD_INSTRUCTION, codes::DUP_INST)
        );
        assert_eq!(
            err.error_code(Version::V1_2),
            (codes::BAD_INSTRUCTION, codes::UNSUP_INST)
        );
    }

    #[test]
    fn prerequisite_maps_to_bad_match() {
        let err = ValidationError::new(Violation::BadPrerequisite, "ipv4_src without eth_type");
        assert_eq!(
            err.error_code(Version::V1_2),
            (codes::BAD_MATCH, codes::BAD_PREREQ)
        );
    }
}
